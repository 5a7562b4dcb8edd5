use hookwire::HookError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to access storage file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode stored value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No cookie named `{0}`")]
    UnknownCookie(String),
}

impl From<StorageError> for HookError {
    fn from(err: StorageError) -> Self {
        HookError::Other(Box::new(err))
    }
}
