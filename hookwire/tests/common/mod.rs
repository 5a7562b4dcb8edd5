//! Shared helpers for integration tests

use std::cell::RefCell;
use std::rc::Rc;
use tracing_subscriber::EnvFilter;

/// Route runtime logs to the test harness; `RUST_LOG` picks the level
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Shared append-only log
pub type Log<T> = Rc<RefCell<Vec<T>>>;

pub fn log<T>() -> Log<T> {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn snapshot<T: Clone>(log: &Log<T>) -> Vec<T> {
    log.borrow().clone()
}
