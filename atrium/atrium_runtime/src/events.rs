//! Event Bus
//!
//! In-process, name-keyed publish/subscribe. Plugins publish and subscribe
//! without importing each other; the runtime reserves two event names for
//! its own protocol (see the constants below), everything else is
//! plugin-defined and schema-free.
//!
//! Delivery is best-effort and at-most-once per handler per publish: no
//! replay, no buffering. Handlers run synchronously on the publisher's
//! thread, in subscription order.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, warn};

use atrium_core::{EventError, PluginId, SubscriptionId};

/// Event a plugin publishes to persist new state.
///
/// Payload shape: `{"pluginId": "<id>", "state": <opaque blob>}`.
pub const STATE_CHANGE_EVENT: &str = "plugin:stateChange";

/// Internal cleanup event published when a plugin is unregistered, so zone
/// managers unmount its slot and release its resources.
///
/// Payload shape: `{"pluginId": "<id>"}`.
pub const UNREGISTERED_EVENT: &str = "plugin:unregistered";

/// Per-plugin restore event name, carrying the last-saved state as payload.
pub fn restore_event(id: &PluginId) -> String {
    format!("{}:restore", id)
}

/// Handler signature. Payload arrives by reference; an `Err` is logged as a
/// non-fatal handler error and never reaches the publisher.
pub type EventHandler = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

struct HandlerEntry {
    id: SubscriptionId,
    handler: EventHandler,
}

#[derive(Default)]
struct Handlers {
    by_event: HashMap<String, Vec<HandlerEntry>>,
}

/// Decoupled pub/sub channel keyed by event name.
///
/// Cloning is cheap and shares the underlying handler map, so one bus can be
/// handed to every component of a runtime.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<RwLock<Handlers>>,
}

impl EventBus {
    /// Create a new event bus with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `event`.
    ///
    /// Multiple handlers per name are allowed and fire in subscription
    /// order. The returned token removes exactly this handler; releasing it
    /// twice is a no-op.
    pub fn subscribe(
        &self,
        event: &str,
        handler: impl Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let id = SubscriptionId::new();
        let mut inner = self.inner.write();
        inner
            .by_event
            .entry(event.to_string())
            .or_default()
            .push(HandlerEntry {
                id,
                handler: Arc::new(handler),
            });

        SubscriptionToken {
            bus: Arc::downgrade(&self.inner),
            event: event.to_string(),
            id,
        }
    }

    /// Invoke every handler currently subscribed for `event`, in
    /// subscription order, on the caller's thread. Returns the number of
    /// handlers invoked.
    ///
    /// A failing handler is logged and does not stop the remaining handlers.
    /// Handlers registered while a publish is in flight only see later
    /// publications.
    pub fn publish(&self, event: &str, payload: &Value) -> usize {
        // Snapshot under the read lock so concurrent subscription changes
        // never corrupt this iteration; handlers run outside the lock.
        let snapshot: Vec<EventHandler> = {
            let inner = self.inner.read();
            match inner.by_event.get(event) {
                Some(entries) => entries.iter().map(|e| e.handler.clone()).collect(),
                None => return 0,
            }
        };

        let mut invoked = 0;
        for handler in snapshot {
            invoked += 1;
            if let Err(cause) = handler(payload) {
                let err = EventError::Handler {
                    event: event.to_string(),
                    cause: cause.to_string(),
                };
                warn!("Event handler failed: {}", err);
            }
        }
        invoked
    }

    /// Drop all handlers for one event name.
    pub fn clear(&self, event: &str) {
        self.inner.write().by_event.remove(event);
    }

    /// Drop every handler for every event name. Used at full teardown.
    pub fn clear_all(&self) {
        self.inner.write().by_event.clear();
        debug!("Cleared all event handlers");
    }

    /// Number of active subscriptions across all event names.
    pub fn subscription_count(&self) -> usize {
        self.inner.read().by_event.values().map(Vec::len).sum()
    }
}

/// Capability returned by [`EventBus::subscribe`].
///
/// Owned by the subscriber; releasing it removes exactly that handler.
pub struct SubscriptionToken {
    bus: Weak<RwLock<Handlers>>,
    event: String,
    id: SubscriptionId,
}

impl SubscriptionToken {
    /// Remove the handler this token was issued for. Idempotent.
    pub fn unsubscribe(&self) {
        let Some(bus) = self.bus.upgrade() else {
            return;
        };
        let mut inner = bus.write();
        if let Some(entries) = inner.by_event.get_mut(&self.event) {
            entries.retain(|entry| entry.id != self.id);
            if entries.is_empty() {
                inner.by_event.remove(&self.event);
            }
        }
    }

    /// The event name this token subscribes to.
    pub fn event(&self) -> &str {
        &self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_publish_invokes_handler_exactly_once() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        let _token = bus.subscribe("ping", move |payload| {
            seen_clone.lock().push(payload.clone());
            Ok(())
        });

        let invoked = bus.publish("ping", &json!({"n": 1}));
        assert_eq!(invoked, 1);
        assert_eq!(seen.lock().as_slice(), &[json!({"n": 1})]);
    }

    #[test]
    fn test_handlers_fire_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order_clone = Arc::clone(&order);
            // Dropping the token does not unsubscribe; release is explicit.
            let _ = bus.subscribe("ping", move |_| {
                order_clone.lock().push(label);
                Ok(())
            });
        }

        bus.publish("ping", &Value::Null);
        assert_eq!(order.lock().as_slice(), &["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery_and_is_idempotent() {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));

        let count_clone = Arc::clone(&count);
        let token = bus.subscribe("ping", move |_| {
            *count_clone.lock() += 1;
            Ok(())
        });

        bus.publish("ping", &Value::Null);
        token.unsubscribe();
        token.unsubscribe();
        bus.publish("ping", &Value::Null);

        assert_eq!(*count.lock(), 1);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[test]
    fn test_failing_handler_does_not_stop_later_handlers() {
        let bus = EventBus::new();
        let reached = Arc::new(Mutex::new(false));

        let _a = bus.subscribe("ping", |_| anyhow::bail!("broken handler"));
        let reached_clone = Arc::clone(&reached);
        let _b = bus.subscribe("ping", move |_| {
            *reached_clone.lock() = true;
            Ok(())
        });

        let invoked = bus.publish("ping", &Value::Null);
        assert_eq!(invoked, 2);
        assert!(*reached.lock());
    }

    #[test]
    fn test_handler_registered_mid_publish_misses_that_publication() {
        let bus = EventBus::new();
        let late_calls = Arc::new(Mutex::new(0));

        let bus_clone = bus.clone();
        let late_calls_clone = Arc::clone(&late_calls);
        let _a = bus.subscribe("ping", move |_| {
            let late_calls_inner = Arc::clone(&late_calls_clone);
            let _ = bus_clone.subscribe("ping", move |_| {
                *late_calls_inner.lock() += 1;
                Ok(())
            });
            Ok(())
        });

        bus.publish("ping", &Value::Null);
        assert_eq!(*late_calls.lock(), 0);

        // The late handler sees the next publication.
        bus.publish("ping", &Value::Null);
        assert_eq!(*late_calls.lock(), 1);
    }

    #[test]
    fn test_clear_and_clear_all() {
        let bus = EventBus::new();
        let _ = bus.subscribe("a", |_| Ok(()));
        let _ = bus.subscribe("a", |_| Ok(()));
        let _ = bus.subscribe("b", |_| Ok(()));
        assert_eq!(bus.subscription_count(), 3);

        bus.clear("a");
        assert_eq!(bus.subscription_count(), 1);
        assert_eq!(bus.publish("a", &Value::Null), 0);

        bus.clear_all();
        assert_eq!(bus.subscription_count(), 0);
        assert_eq!(bus.publish("b", &Value::Null), 0);
    }

    #[test]
    fn test_payload_mutation_is_not_isolated_between_handlers() {
        // Handlers share the payload by reference; observation order is the
        // subscription order.
        let bus = EventBus::new();
        let observed = Arc::new(Mutex::new(Vec::new()));

        let observed_clone = Arc::clone(&observed);
        let _a = bus.subscribe("ping", move |payload| {
            observed_clone.lock().push(payload["n"].clone());
            Ok(())
        });

        bus.publish("ping", &json!({"n": 7}));
        assert_eq!(observed.lock().as_slice(), &[json!(7)]);
    }
}
