//! Status event broadcasting
//!
//! Every evaluation cycle emits structured events at each meaningful step so
//! observers can follow the engine's reasoning live. Publishing is
//! fire-and-forget over a `tokio::sync::broadcast` channel: the engine never
//! blocks on subscriber presence and never awaits delivery.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::broadcast;

/// Buffered events per subscriber before lagged receivers start dropping
const CHANNEL_CAPACITY: usize = 256;

/// Event category for observer-side filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Cycle,
    Signal,
    Position,
    Trade,
    Risk,
    Error,
}

/// Structured status event streamed to observers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub message: String,
    pub category: EventCategory,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Free-form detail fields (signal summary, balances, order ids, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, Value>,
}

impl StatusEvent {
    pub fn new(category: EventCategory, message: impl Into<String>) -> Self {
        StatusEvent {
            message: message.into(),
            category,
            timestamp: Utc::now().timestamp_millis(),
            fields: BTreeMap::new(),
        }
    }

    /// Attach a detail field
    pub fn with(mut self, key: &str, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.fields.insert(key.to_string(), v);
        }
        self
    }
}

/// Fan-out bus for status events
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        EventBus { sender }
    }

    /// Publish an event to all current subscribers
    ///
    /// A send error only means nobody is listening right now; that is not a
    /// failure of the publisher.
    pub fn publish(&self, event: StatusEvent) {
        tracing::debug!(category = ?event.category, "{}", event.message);
        let _ = self.sender.send(event);
    }

    /// Subscribe to the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
