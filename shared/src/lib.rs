//! Shared types for StoreDesk
//!
//! Types used by both the dashboard client and the order hub: the order
//! schema and its status policy, the live channel protocol, and the REST
//! response envelope.

pub mod message;
pub mod order;
pub mod response;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use message::{
    CreateOrderRequest, LiveFrame, NewLineItem, OrderListQuery, OrderPayload, StatusUpdateRequest,
};
pub use order::{Order, OrderKey, OrderStatus};
pub use response::ApiResponse;
