use std::sync::Arc;

use tokio::sync::{Mutex, watch};

use super::{LiveConfig, LiveConnection, LiveConnector, LiveStatus};

/// Owns the one live connection of a client process
///
/// Construct once and share (`Arc`) between views. Views attach and detach
/// listeners; the connection itself outlives them.
#[derive(Debug)]
pub struct LiveConnectionManager {
    connector: Arc<dyn LiveConnector>,
    config: LiveConfig,
    current: Mutex<Option<Arc<LiveConnection>>>,
}

impl LiveConnectionManager {
    pub fn new(connector: impl LiveConnector + 'static, config: LiveConfig) -> Self {
        Self {
            connector: Arc::new(connector),
            config,
            current: Mutex::new(None),
        }
    }

    /// Get the connection for `credential`, opening it if needed.
    ///
    /// - same credential, connection usable: the held connection, no new socket
    /// - different credential: old connection torn down, new one opened
    /// - held connection degraded or shut down: re-established
    pub async fn connect(&self, credential: &str) -> Arc<LiveConnection> {
        let mut current = self.current.lock().await;

        if let Some(conn) = current.as_ref() {
            if conn.credential() == credential && conn.is_active() {
                tracing::debug!("Reusing live connection");
                return conn.clone();
            }
            if conn.credential() != credential {
                tracing::info!("Live credential changed, replacing connection");
            } else {
                tracing::info!(status = ?conn.status(), "Re-establishing live connection");
            }
            conn.shutdown();
        }

        let conn =
            LiveConnection::establish(self.connector.clone(), credential, self.config.clone()).await;
        *current = Some(conn.clone());
        conn
    }

    /// Tear the connection down (logout)
    pub async fn disconnect(&self) {
        if let Some(conn) = self.current.lock().await.take() {
            conn.shutdown();
        }
    }

    /// The held connection, if any
    pub async fn current(&self) -> Option<Arc<LiveConnection>> {
        self.current.lock().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|conn| conn.is_connected())
    }

    pub async fn status(&self) -> LiveStatus {
        self.current
            .lock()
            .await
            .as_ref()
            .map_or(LiveStatus::Disconnected, |conn| conn.status())
    }

    /// Status watch of the held connection
    pub async fn status_watch(&self) -> Option<watch::Receiver<LiveStatus>> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|conn| conn.status_watch())
    }
}
