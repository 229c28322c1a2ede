//! LiveHub - 订单事件实时分发
//!
//! ```text
//! OrderService (create / change_status)
//!       │ LiveFrame::OrderCreated / OrderUpdated
//!       ▼
//! LiveHub ── broadcast ──► live WS session × N ──► dashboards
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use shared::message::LiveFrame;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Broadcast channel 容量 - 足以缓冲连接时突发
pub const BROADCAST_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct LiveHub {
    tx: broadcast::Sender<LiveFrame>,
    sessions: Arc<AtomicUsize>,
}

impl LiveHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            sessions: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fan a frame out to every session; returns how many received it
    pub fn publish(&self, frame: LiveFrame) -> usize {
        let event = frame.event_name();
        // 无订阅者时 send 返回 Err，安全忽略
        match self.tx.send(frame) {
            Ok(receivers) => {
                tracing::debug!(event, receivers, "Live frame published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveFrame> {
        self.tx.subscribe()
    }

    /// Register a session; the count drops when the guard does
    pub fn open_session(&self) -> SessionGuard {
        let id = Uuid::new_v4();
        let count = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(session_id = %id, sessions = count, "Live session opened");
        SessionGuard {
            id,
            sessions: self.sessions.clone(),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

impl Default for LiveHub {
    fn default() -> Self {
        Self::new(BROADCAST_CAPACITY)
    }
}

pub struct SessionGuard {
    id: Uuid,
    sessions: Arc<AtomicUsize>,
}

impl SessionGuard {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let count = self.sessions.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        tracing::info!(session_id = %self.id, sessions = count, "Live session closed");
    }
}
