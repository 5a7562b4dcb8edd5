//! In-process broadcast hub
//!
//! The hub plays the part of a broadcast channel registry shared by several
//! runtimes, possibly on different threads. Each runtime connects one
//! endpoint; messages are queued in the receiving endpoint's inbox and
//! handed to its handlers when that runtime pumps. A publisher never
//! receives its own messages.

use super::{RemoteHandler, Transport};
use crate::effect::Cleanup;
use crate::error::HookResult;
use crate::types::{EndpointId, SubscriptionId};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

static GLOBAL_HUB: Lazy<BroadcastHub> = Lazy::new(BroadcastHub::new);

#[derive(Default)]
struct EndpointState {
    channels: HashSet<String>,
    inbox: VecDeque<(String, Value)>,
}

#[derive(Default)]
struct HubState {
    endpoints: HashMap<EndpointId, EndpointState>,
}

/// Shared registry of broadcast endpoints
///
/// Cloning yields another handle to the same hub.
#[derive(Clone, Default)]
pub struct BroadcastHub {
    state: Arc<Mutex<HubState>>,
}

impl BroadcastHub {
    /// Create an empty, private hub
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide hub
    pub fn global() -> Self {
        GLOBAL_HUB.clone()
    }

    /// Connect a new endpoint
    pub fn connect(&self) -> HubTransport {
        let id = EndpointId::new();
        self.state.lock().endpoints.insert(id, EndpointState::default());
        tracing::debug!(endpoint = %id, "endpoint connected");
        HubTransport {
            id,
            hub: self.clone(),
            handlers: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Number of connected endpoints
    pub fn endpoint_count(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    fn deliver(&self, from: EndpointId, channel: &str, value: &Value) -> usize {
        let mut state = self.state.lock();
        let mut delivered = 0;
        for (id, endpoint) in state.endpoints.iter_mut() {
            if *id != from && endpoint.channels.contains(channel) {
                endpoint.inbox.push_back((channel.to_string(), value.clone()));
                delivered += 1;
            }
        }
        delivered
    }

    fn listen(&self, id: EndpointId, channel: &str) {
        if let Some(endpoint) = self.state.lock().endpoints.get_mut(&id) {
            endpoint.channels.insert(channel.to_string());
        }
    }

    fn unlisten(&self, id: EndpointId, channel: &str) {
        if let Some(endpoint) = self.state.lock().endpoints.get_mut(&id) {
            endpoint.channels.remove(channel);
            endpoint.inbox.retain(|(queued, _)| queued != channel);
        }
    }

    fn reset_endpoint(&self, id: EndpointId) {
        if let Some(endpoint) = self.state.lock().endpoints.get_mut(&id) {
            endpoint.channels.clear();
            endpoint.inbox.clear();
        }
    }

    fn take_inbox(&self, id: EndpointId) -> VecDeque<(String, Value)> {
        self.state
            .lock()
            .endpoints
            .get_mut(&id)
            .map(|endpoint| std::mem::take(&mut endpoint.inbox))
            .unwrap_or_default()
    }

    fn disconnect(&self, id: EndpointId) {
        self.state.lock().endpoints.remove(&id);
    }
}

type HandlerMap = HashMap<String, Vec<(SubscriptionId, RemoteHandler)>>;

/// One runtime's connection to a [`BroadcastHub`]
pub struct HubTransport {
    id: EndpointId,
    hub: BroadcastHub,
    handlers: Rc<RefCell<HandlerMap>>,
}

impl HubTransport {
    pub fn id(&self) -> EndpointId {
        self.id
    }

    /// Number of channels with at least one handler
    pub fn channel_count(&self) -> usize {
        self.handlers.borrow().len()
    }
}

impl Transport for HubTransport {
    fn publish(&self, channel: &str, value: &Value) -> HookResult<()> {
        let delivered = self.hub.deliver(self.id, channel, value);
        tracing::trace!(endpoint = %self.id, channel, delivered, "published");
        Ok(())
    }

    fn subscribe(&self, channel: &str, handler: RemoteHandler) -> Cleanup {
        let sub = SubscriptionId::new();
        self.handlers
            .borrow_mut()
            .entry(channel.to_string())
            .or_default()
            .push((sub, handler));
        self.hub.listen(self.id, channel);

        let handlers = Rc::downgrade(&self.handlers);
        let hub = self.hub.clone();
        let id = self.id;
        let channel = channel.to_string();
        Cleanup::new(move || {
            let Some(handlers) = handlers.upgrade() else {
                return;
            };
            let mut map = handlers.borrow_mut();
            if let Some(list) = map.get_mut(&channel) {
                list.retain(|(existing, _)| *existing != sub);
                if list.is_empty() {
                    map.remove(&channel);
                    hub.unlisten(id, &channel);
                }
            }
        })
    }

    fn close_all(&self) {
        self.handlers.borrow_mut().clear();
        self.hub.reset_endpoint(self.id);
        tracing::debug!(endpoint = %self.id, "closed all channels");
    }

    fn pump(&self) -> usize {
        let inbox = self.hub.take_inbox(self.id);
        let mut delivered = 0;
        for (channel, value) in inbox {
            let handlers: Vec<RemoteHandler> = self
                .handlers
                .borrow()
                .get(&channel)
                .map(|list| list.iter().map(|(_, handler)| Rc::clone(handler)).collect())
                .unwrap_or_default();
            for handler in handlers {
                handler(value.clone());
                delivered += 1;
            }
        }
        delivered
    }
}

impl Drop for HubTransport {
    fn drop(&mut self) {
        self.hub.disconnect(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Rc<RefCell<Vec<Value>>>, RemoteHandler) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, Rc::new(move |value: Value| sink.borrow_mut().push(value)))
    }

    #[test]
    fn test_publish_reaches_other_endpoints_only() {
        let hub = BroadcastHub::new();
        let a = hub.connect();
        let b = hub.connect();

        let (a_log, a_handler) = recorder();
        let (b_log, b_handler) = recorder();
        let _a_sub = a.subscribe("foo", a_handler);
        let _b_sub = b.subscribe("foo", b_handler);

        a.publish("foo", &json!(1)).unwrap();
        assert_eq!(a.pump(), 0);
        assert_eq!(b.pump(), 1);

        assert!(a_log.borrow().is_empty());
        assert_eq!(*b_log.borrow(), vec![json!(1)]);
    }

    #[test]
    fn test_cleanup_stops_delivery() {
        let hub = BroadcastHub::new();
        let a = hub.connect();
        let b = hub.connect();

        let (log, handler) = recorder();
        let sub = b.subscribe("foo", handler);
        sub.run();

        a.publish("foo", &json!("x")).unwrap();
        assert_eq!(b.pump(), 0);
        assert!(log.borrow().is_empty());
        assert_eq!(b.channel_count(), 0);
    }

    #[test]
    fn test_close_all_drops_inbox() {
        let hub = BroadcastHub::new();
        let a = hub.connect();
        let b = hub.connect();

        let (log, handler) = recorder();
        let _sub = b.subscribe("foo", handler);
        a.publish("foo", &json!(true)).unwrap();
        b.close_all();

        assert_eq!(b.pump(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_drop_disconnects() {
        let hub = BroadcastHub::new();
        let a = hub.connect();
        {
            let _b = hub.connect();
            assert_eq!(hub.endpoint_count(), 2);
        }
        assert_eq!(hub.endpoint_count(), 1);
        drop(a);
        assert_eq!(hub.endpoint_count(), 0);
    }
}
