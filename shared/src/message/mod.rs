//! Live channel protocol
//!
//! Frames exchanged between the order hub and dashboard sessions over the
//! realtime WebSocket. Each frame is one JSON text message:
//!
//! ```json
//! { "event": "order:created", "data": { "order": { ... } } }
//! { "event": "order:updated", "data": { "order": { ... } } }
//! { "event": "ping" }
//! ```

use serde::{Deserialize, Serialize};

pub mod payload;
pub use payload::*;

/// Event name for a newly placed order
pub const EVENT_ORDER_CREATED: &str = "order:created";
/// Event name for a changed order
pub const EVENT_ORDER_UPDATED: &str = "order:updated";

/// One live channel frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum LiveFrame {
    #[serde(rename = "order:created")]
    OrderCreated(OrderPayload),

    #[serde(rename = "order:updated")]
    OrderUpdated(OrderPayload),

    /// Keepalive probe
    #[serde(rename = "ping")]
    Ping,

    /// Keepalive answer
    #[serde(rename = "pong")]
    Pong,
}

impl LiveFrame {
    pub fn created(order: crate::order::Order) -> Self {
        Self::OrderCreated(OrderPayload { order })
    }

    pub fn updated(order: crate::order::Order) -> Self {
        Self::OrderUpdated(OrderPayload { order })
    }

    /// Wire event name
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::OrderCreated(_) => EVENT_ORDER_CREATED,
            Self::OrderUpdated(_) => EVENT_ORDER_UPDATED,
            Self::Ping => "ping",
            Self::Pong => "pong",
        }
    }

    /// Serialize to a text frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse a text frame
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
