//! Desk Client - order desk for the admin dashboard
//!
//! Fetches orders from the order hub, keeps a view's order list current from
//! the live channel, and drives status transitions.

pub mod config;
pub mod desk;
pub mod error;
pub mod http;
pub mod live;
pub mod store;
pub mod transition;

pub use config::ClientConfig;
pub use desk::{DeskError, DeskNotice, LiveSubscription, OrderDesk};
pub use error::{ClientError, ClientResult};
pub use http::{HttpOrderApi, OrderApi};
pub use live::{LiveConfig, LiveConnectionManager, LiveEvent, LiveStatus};
pub use store::{OrderStore, ReconcileOutcome};
pub use transition::{
    StatusTransitionController, TransitionAvailability, TransitionDraft, TransitionError,
};

// Re-export shared types for convenience
pub use shared::message::OrderListQuery;
pub use shared::order::{Order, OrderKey, OrderStatus};
