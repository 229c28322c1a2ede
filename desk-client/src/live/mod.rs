// desk-client/src/live/mod.rs
// 实时通道 - 配置、状态和错误类型

mod connection;
mod manager;
mod transport;

pub use connection::LiveConnection;
pub use manager::LiveConnectionManager;
pub use transport::{
    LiveConnector, LiveTransport, MemoryConnector, MemoryTransport, WsConnector, WsTransport,
};

use std::time::Duration;

use shared::order::Order;
use thiserror::Error;

/// Live channel configuration
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// First reconnect delay
    pub reconnect_delay: Duration,
    /// Backoff ceiling
    pub max_reconnect_delay: Duration,
    /// Reconnect attempts before giving up (0 disables automatic reconnect)
    pub max_reconnect_attempts: u32,
    /// Keepalive ping interval (0 disables)
    pub heartbeat_interval: Duration,
    /// Grace after a missed interval before the link counts as dead
    pub heartbeat_timeout: Duration,
    /// Capacity of the per-connection event fan-out
    pub event_buffer: usize,
}

impl Default for LiveConfig {
    /// 局域网优化配置
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_secs(10),
            max_reconnect_attempts: 20,
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_timeout: Duration::from_secs(5),
            event_buffer: 256,
        }
    }
}

impl LiveConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 局域网配置 (默认)
    pub fn lan() -> Self {
        Self::default()
    }

    /// 广域网/互联网配置
    ///
    /// Tolerates slow links: longer backoff ceiling, sparser keepalive.
    pub fn wan() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(60),
            max_reconnect_attempts: 20,
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            event_buffer: 256,
        }
    }

    pub fn with_reconnect_delay(mut self, delay: Duration, max: Duration) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnect_delay = max;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// 设置心跳间隔 (0 表示禁用)
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// 设置心跳超时
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based), doubling up to the ceiling
    pub fn backoff(&self, attempt: u32) -> Duration {
        let mut delay = self.reconnect_delay;
        for _ in 1..attempt {
            delay = (delay * 2).min(self.max_reconnect_delay);
            if delay == self.max_reconnect_delay {
                break;
            }
        }
        delay.min(self.max_reconnect_delay)
    }
}

/// Connection state as observed by views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveStatus {
    Connecting,
    Connected,
    /// Link lost, retrying
    Reconnecting { attempt: u32 },
    /// Retries exhausted; stays here until the next explicit connect
    Degraded,
    Disconnected,
}

impl LiveStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Order event delivered to listeners
#[derive(Debug, Clone, PartialEq)]
pub enum LiveEvent {
    Created(Order),
    Updated(Order),
}

impl LiveEvent {
    pub fn order(&self) -> &Order {
        match self {
            Self::Created(order) | Self::Updated(order) => order,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            Self::Created(order) | Self::Updated(order) => order,
        }
    }
}

/// Live channel errors
#[derive(Debug, Error)]
pub enum LiveError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    Closed,
}
