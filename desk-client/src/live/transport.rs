use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use reqwest::Url;
use shared::message::LiveFrame;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::LiveError;

/// One established live link carrying JSON text frames
#[async_trait]
pub trait LiveTransport: Send + fmt::Debug {
    /// Next text frame; `Ok(None)` once the peer has closed
    async fn recv_text(&mut self) -> Result<Option<String>, LiveError>;
    async fn send_text(&mut self, text: String) -> Result<(), LiveError>;
    async fn close(&mut self) -> Result<(), LiveError>;
}

/// Opens live links for a credential
#[async_trait]
pub trait LiveConnector: Send + Sync + fmt::Debug {
    async fn connect(&self, credential: &str) -> Result<Box<dyn LiveTransport>, LiveError>;
}

// ==================== WebSocket ====================

/// WebSocket connector: `GET {url}?token=<credential>`
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn request_url(&self, credential: &str) -> Result<Url, LiveError> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| LiveError::Connection(format!("Invalid live URL {}: {}", self.url, e)))?;
        url.query_pairs_mut().append_pair("token", credential);
        Ok(url)
    }
}

#[async_trait]
impl LiveConnector for WsConnector {
    async fn connect(&self, credential: &str) -> Result<Box<dyn LiveTransport>, LiveError> {
        let url = self.request_url(credential)?;

        let (stream, response) = tokio::time::timeout(self.connect_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| LiveError::Connection("Connect timed out".into()))?
            .map_err(|e| LiveError::Connection(e.to_string()))?;

        tracing::debug!(url = %self.url, status = %response.status(), "Live WebSocket established");
        Ok(Box::new(WsTransport { stream }))
    }
}

/// tokio-tungstenite transport
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl fmt::Debug for WsTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WsTransport").finish_non_exhaustive()
    }
}

#[async_trait]
impl LiveTransport for WsTransport {
    async fn recv_text(&mut self) -> Result<Option<String>, LiveError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "Live WebSocket closed by server");
                    return Ok(None);
                }
                // Protocol-level ping/pong is answered by tungstenite
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(LiveError::Connection(e.to_string())),
                None => return Ok(None),
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), LiveError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| LiveError::Connection(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), LiveError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| LiveError::Connection(e.to_string()))
    }
}

// ==================== In-process ====================

#[derive(Debug)]
struct MemoryHub {
    /// Frames FROM the hub side
    frames: broadcast::Sender<String>,
    /// Frames TO the hub side
    inbound: broadcast::Sender<String>,
    /// Bumped to sever every open link
    generation: watch::Sender<u64>,
    accepting: AtomicBool,
    attempts: Mutex<Vec<String>>,
    opened: AtomicUsize,
}

/// In-process connector over broadcast channels
///
/// The handle doubles as the hub side: publish frames, refuse connects,
/// sever open links.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    hub: Arc<MemoryHub>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        let (frames, _) = broadcast::channel(256);
        let (inbound, _) = broadcast::channel(64);
        let (generation, _) = watch::channel(0);
        Self {
            hub: Arc::new(MemoryHub {
                frames,
                inbound,
                generation,
                accepting: AtomicBool::new(true),
                attempts: Mutex::new(Vec::new()),
                opened: AtomicUsize::new(0),
            }),
        }
    }

    /// Send a frame to every open link; returns how many links received it
    pub fn publish(&self, frame: &LiveFrame) -> Result<usize, LiveError> {
        let text = frame
            .to_json()
            .map_err(|e| LiveError::InvalidFrame(e.to_string()))?;
        Ok(self.publish_raw(text))
    }

    /// Send raw text as-is (malformed payloads included)
    pub fn publish_raw(&self, text: impl Into<String>) -> usize {
        self.hub.frames.send(text.into()).unwrap_or(0)
    }

    /// Refuse (`false`) or accept (`true`) new connects
    pub fn set_accepting(&self, accepting: bool) {
        self.hub.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Sever every open link with a transport error
    pub fn drop_connections(&self) {
        self.hub.generation.send_modify(|g| *g += 1);
    }

    /// Credentials of every connect attempt, refused ones included
    pub fn attempts(&self) -> Vec<String> {
        self.hub.attempts.lock().clone()
    }

    /// Number of links actually opened
    pub fn opened(&self) -> usize {
        self.hub.opened.load(Ordering::SeqCst)
    }

    /// Frames sent by clients
    pub fn subscribe_inbound(&self) -> broadcast::Receiver<String> {
        self.hub.inbound.subscribe()
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveConnector for MemoryConnector {
    async fn connect(&self, credential: &str) -> Result<Box<dyn LiveTransport>, LiveError> {
        self.hub.attempts.lock().push(credential.to_string());
        if !self.hub.accepting.load(Ordering::SeqCst) {
            return Err(LiveError::Connection("Memory hub refused connection".into()));
        }
        self.hub.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryTransport {
            rx: self.hub.frames.subscribe(),
            tx: self.hub.inbound.clone(),
            severed: self.hub.generation.subscribe(),
        }))
    }
}

/// In-process transport
#[derive(Debug)]
pub struct MemoryTransport {
    rx: broadcast::Receiver<String>,
    tx: broadcast::Sender<String>,
    severed: watch::Receiver<u64>,
}

#[async_trait]
impl LiveTransport for MemoryTransport {
    async fn recv_text(&mut self) -> Result<Option<String>, LiveError> {
        loop {
            tokio::select! {
                changed = self.severed.changed() => {
                    return match changed {
                        Ok(()) => Err(LiveError::Connection("Memory link severed".into())),
                        Err(_) => Ok(None),
                    };
                }
                msg = self.rx.recv() => match msg {
                    Ok(text) => return Ok(Some(text)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Memory transport lagged");
                    }
                    Err(RecvError::Closed) => return Ok(None),
                },
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), LiveError> {
        // No listener on the hub side is not an error
        let _ = self.tx.send(text);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LiveError> {
        Ok(())
    }
}
