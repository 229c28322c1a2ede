//! Orders
//!
//! - **repository**: in-memory store keyed by id, with an order-number index
//! - **service**: placement and the authoritative status state machine
//!
//! ```text
//! REST handler → OrderService → OrderRepository
//!                     ↓
//!                 LiveHub ──► live WS sessions
//! ```

pub mod repository;
pub mod service;

pub use repository::OrderRepository;
pub use service::OrderService;
