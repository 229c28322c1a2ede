//! Order module
//!
//! - [`status`]: the order status state machine (legal transitions, terminal states)
//! - [`types`]: the validated order schema exchanged with the backend
//! - [`key`]: the identity a caller holds when asking for one order

pub mod key;
pub mod status;
pub mod types;

// Re-exports
pub use key::OrderKey;
pub use status::{
    OrderStatus, UnknownStatus, is_valid_transition, next_statuses, next_statuses_raw,
};
pub use types::*;
