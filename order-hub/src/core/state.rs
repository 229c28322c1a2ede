//! 服务器状态 - 所有 handler 共享
//!
//! Cheap to clone: every field is reference counted.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::Config;
use crate::live::LiveHub;
use crate::orders::{OrderRepository, OrderService};

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub orders: OrderService,
    pub live: LiveHub,
    /// Cancelled on shutdown; live sessions close when it fires
    pub shutdown: CancellationToken,
}

impl ServerState {
    pub fn new(config: Config) -> Self {
        let live = LiveHub::new(config.live_buffer);
        let orders = OrderService::new(OrderRepository::new(), live.clone());
        Self {
            config: Arc::new(config),
            orders,
            live,
            shutdown: CancellationToken::new(),
        }
    }

    /// Whether `token` may open a live session
    ///
    /// Without a configured access token any non-empty token is accepted.
    pub fn accepts_live_token(&self, token: &str) -> bool {
        match &self.config.live_access_token {
            Some(expected) => expected == token,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_token_check() {
        let mut config = Config::with_overrides(0);
        config.live_access_token = None;
        let open = ServerState::new(config.clone());
        assert!(open.accepts_live_token("anything"));

        let locked = ServerState::new(config.with_live_access_token("s3cret"));
        assert!(locked.accepts_live_token("s3cret"));
        assert!(!locked.accepts_live_token("guess"));
    }
}
