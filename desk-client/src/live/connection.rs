use std::sync::Arc;

use shared::message::LiveFrame;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{LiveConfig, LiveConnector, LiveError, LiveEvent, LiveStatus, LiveTransport};

/// One live connection for one credential
///
/// A background task owns the transport: it decodes frames, validates the
/// order payloads and fans [`LiveEvent`]s out to every subscriber. Lost links
/// are retried with exponential backoff; once the attempts are used up the
/// status settles on [`LiveStatus::Degraded`].
#[derive(Debug)]
pub struct LiveConnection {
    shared: Arc<ConnectionShared>,
    shutdown: CancellationToken,
}

#[derive(Debug)]
struct ConnectionShared {
    credential: String,
    events: broadcast::Sender<LiveEvent>,
    status: watch::Sender<LiveStatus>,
}

impl LiveConnection {
    /// Make the first attempt inline, then hand the link to the background task.
    ///
    /// A failed first attempt is not an error: the task keeps retrying and the
    /// outcome is visible through [`LiveConnection::status_watch`].
    pub(crate) async fn establish(
        connector: Arc<dyn LiveConnector>,
        credential: &str,
        config: LiveConfig,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        let (status, _) = watch::channel(LiveStatus::Connecting);
        let shared = Arc::new(ConnectionShared {
            credential: credential.to_string(),
            events,
            status,
        });
        let shutdown = CancellationToken::new();

        let first = match connector.connect(credential).await {
            Ok(link) => {
                tracing::info!("Live channel connected");
                shared.set_status(LiveStatus::Connected);
                Some(link)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Live channel connect failed");
                shared.set_status(if config.max_reconnect_attempts > 0 {
                    LiveStatus::Reconnecting { attempt: 1 }
                } else {
                    LiveStatus::Degraded
                });
                None
            }
        };

        tokio::spawn(run(
            shared.clone(),
            connector,
            config,
            first,
            shutdown.clone(),
        ));

        Arc::new(Self { shared, shutdown })
    }

    pub fn credential(&self) -> &str {
        &self.shared.credential
    }

    pub fn status(&self) -> LiveStatus {
        *self.shared.status.borrow()
    }

    /// Watch status changes (connected, reconnecting, degraded)
    pub fn status_watch(&self) -> watch::Receiver<LiveStatus> {
        self.shared.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    pub fn is_degraded(&self) -> bool {
        self.status() == LiveStatus::Degraded
    }

    /// Still usable: not shut down and not given up
    pub fn is_active(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.is_degraded()
    }

    /// Attach a listener
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.shared.events.subscribe()
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.shared.events.receiver_count()
    }

    /// Stop the background task and close the link
    pub fn shutdown(&self) {
        if !self.shutdown.is_cancelled() {
            tracing::info!("Live channel shutting down");
            self.shutdown.cancel();
            self.shared.set_status(LiveStatus::Disconnected);
        }
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl ConnectionShared {
    /// Watchers only wake on an actual change
    fn set_status(&self, status: LiveStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            tracing::debug!(previous = ?*current, current = ?status, "Live status changed");
            *current = status;
            true
        });
    }

    /// Read until the link fails. `Ok` only when shutdown was requested.
    async fn pump(
        &self,
        link: &mut dyn LiveTransport,
        config: &LiveConfig,
        shutdown: &CancellationToken,
    ) -> Result<(), LiveError> {
        let heartbeat = !config.heartbeat_interval.is_zero();
        let mut ticker = tokio::time::interval(if heartbeat {
            config.heartbeat_interval
        } else {
            std::time::Duration::from_secs(3600)
        });
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        // 任何入站帧 (含 pong) 都证明链路存活
        let silence_limit = config.heartbeat_interval + config.heartbeat_timeout;
        let mut last_seen = Instant::now();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = ticker.tick(), if heartbeat => {
                    if last_seen.elapsed() > silence_limit {
                        tracing::warn!(
                            silent_ms = last_seen.elapsed().as_millis() as u64,
                            "Live heartbeat timed out"
                        );
                        return Err(LiveError::Connection("heartbeat timeout".into()));
                    }
                    let ping = LiveFrame::Ping
                        .to_json()
                        .map_err(|e| LiveError::InvalidFrame(e.to_string()))?;
                    link.send_text(ping).await?;
                }
                text = link.recv_text() => match text? {
                    Some(text) => {
                        last_seen = Instant::now();
                        self.dispatch(&text);
                    }
                    None => return Err(LiveError::Closed),
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        let frame = match LiveFrame::from_json(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed live frame");
                return;
            }
        };

        let event = match frame {
            LiveFrame::OrderCreated(payload) => LiveEvent::Created(payload.order),
            LiveFrame::OrderUpdated(payload) => LiveEvent::Updated(payload.order),
            LiveFrame::Ping | LiveFrame::Pong => {
                tracing::trace!("Live keepalive");
                return;
            }
        };

        if let Err(e) = event.order().validate() {
            tracing::warn!(error = %e, "Dropping invalid order payload");
            return;
        }

        tracing::debug!(order_id = %event.order().id, status = %event.order().status, "Live order event");
        if self.events.send(event).is_err() {
            tracing::debug!("No live listeners attached");
        }
    }

    /// Retry with backoff. `None` when given up or shut down.
    async fn reconnect(
        &self,
        connector: &dyn LiveConnector,
        config: &LiveConfig,
        shutdown: &CancellationToken,
    ) -> Option<Box<dyn LiveTransport>> {
        for attempt in 1..=config.max_reconnect_attempts {
            self.set_status(LiveStatus::Reconnecting { attempt });
            let delay = config.backoff(attempt);

            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = tokio::time::sleep(delay) => {}
            }

            let result = tokio::select! {
                _ = shutdown.cancelled() => return None,
                result = connector.connect(&self.credential) => result,
            };
            match result {
                Ok(link) => {
                    tracing::info!(attempt, "Live channel re-established");
                    return Some(link);
                }
                Err(e) => {
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Live reconnect failed");
                }
            }
        }

        tracing::error!(
            attempts = config.max_reconnect_attempts,
            "Live channel degraded, reconnect attempts exhausted"
        );
        self.set_status(LiveStatus::Degraded);
        None
    }
}

async fn run(
    shared: Arc<ConnectionShared>,
    connector: Arc<dyn LiveConnector>,
    config: LiveConfig,
    mut link: Option<Box<dyn LiveTransport>>,
    shutdown: CancellationToken,
) {
    loop {
        if let Some(mut current) = link.take() {
            shared.set_status(LiveStatus::Connected);
            match shared.pump(current.as_mut(), &config, &shutdown).await {
                Ok(()) => {
                    if let Err(e) = current.close().await {
                        tracing::debug!(error = %e, "Live close failed");
                    }
                    break;
                }
                Err(e) => tracing::warn!(error = %e, "Live link lost"),
            }
        }

        match shared.reconnect(connector.as_ref(), &config, &shutdown).await {
            Some(next) => link = Some(next),
            None => break,
        }
    }

    if shutdown.is_cancelled() {
        shared.set_status(LiveStatus::Disconnected);
    }
    tracing::debug!("Live connection task finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::MemoryConnector;
    use chrono::Utc;
    use shared::order::{Order, OrderStatus};
    use std::time::Duration;

    fn fast_config() -> LiveConfig {
        LiveConfig::new()
            .with_reconnect_delay(Duration::from_millis(5), Duration::from_millis(20))
            .with_max_reconnect_attempts(3)
            .with_heartbeat_interval(Duration::ZERO)
    }

    async fn wait_for_status(conn: &LiveConnection, wanted: LiveStatus) {
        let mut watch = conn.status_watch();
        tokio::time::timeout(Duration::from_secs(2), watch.wait_for(|s| *s == wanted))
            .await
            .expect("status not reached")
            .unwrap();
    }

    #[tokio::test]
    async fn test_events_fan_out() {
        let hub = MemoryConnector::new();
        let conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", fast_config()).await;
        assert!(conn.is_connected());

        let mut first = conn.subscribe();
        let mut second = conn.subscribe();
        hub.publish(&LiveFrame::created(Order::new("X1", Utc::now())))
            .unwrap();

        for rx in [&mut first, &mut second] {
            let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(matches!(event, LiveEvent::Created(ref o) if o.id == "X1"));
        }
    }

    #[tokio::test]
    async fn test_malformed_frames_are_dropped() {
        let hub = MemoryConnector::new();
        let conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", fast_config()).await;
        let mut rx = conn.subscribe();

        hub.publish_raw("not json");
        hub.publish_raw(r#"{"event":"order:updated","data":{"order":{"id":"X1","status":"teleported","createdAt":"2024-01-01T00:00:00Z"}}}"#);
        hub.publish_raw(r#"{"event":"order:updated","data":{"order":{"id":"","status":"pending","createdAt":"2024-01-01T00:00:00Z"}}}"#);
        let mut good = Order::new("X2", Utc::now());
        good.status = OrderStatus::Confirmed;
        hub.publish(&LiveFrame::updated(good)).unwrap();

        let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.order().id, "X2");
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_reconnects_after_link_loss() {
        let hub = MemoryConnector::new();
        let conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", fast_config()).await;

        hub.drop_connections();
        // Severed, then re-established on the first retry
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.opened() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        wait_for_status(&conn, LiveStatus::Connected).await;
    }

    #[tokio::test]
    async fn test_degrades_after_bounded_retries() {
        let hub = MemoryConnector::new();
        hub.set_accepting(false);
        let conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", fast_config()).await;
        assert_eq!(conn.status(), LiveStatus::Reconnecting { attempt: 1 });

        wait_for_status(&conn, LiveStatus::Degraded).await;
        // Initial attempt plus three retries, then nothing more
        assert_eq!(hub.attempts().len(), 4);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(hub.attempts().len(), 4);
        assert!(!conn.is_active());
    }

    #[tokio::test]
    async fn test_heartbeat_sends_ping() {
        let hub = MemoryConnector::new();
        let mut inbound = hub.subscribe_inbound();
        let config = fast_config().with_heartbeat_interval(Duration::from_millis(10));
        let _conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", config).await;

        let text = tokio::time::timeout(Duration::from_secs(1), inbound.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(LiveFrame::from_json(&text).unwrap(), LiveFrame::Ping);
    }

    #[tokio::test]
    async fn test_unchanged_status_does_not_wake_watchers() {
        let hub = MemoryConnector::new();
        let conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", fast_config()).await;
        let watch = conn.status_watch();

        // The background task asserts Connected again once it owns the link
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!watch.has_changed().unwrap());
        assert_eq!(conn.status(), LiveStatus::Connected);
    }

    #[tokio::test]
    async fn test_silent_peer_trips_heartbeat_timeout() {
        let hub = MemoryConnector::new();
        let config = fast_config()
            .with_heartbeat_interval(Duration::from_millis(10))
            .with_heartbeat_timeout(Duration::from_millis(20));
        let _conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", config).await;
        assert_eq!(hub.opened(), 1);

        // Nobody answers the pings: the link is abandoned and dialled again
        tokio::time::timeout(Duration::from_secs(2), async {
            while hub.opened() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("silent link was never replaced");
    }

    #[tokio::test]
    async fn test_answered_pings_keep_link() {
        let hub = MemoryConnector::new();
        let mut inbound = hub.subscribe_inbound();
        let responder = hub.clone();
        tokio::spawn(async move {
            while let Ok(text) = inbound.recv().await {
                if LiveFrame::from_json(&text).ok() == Some(LiveFrame::Ping) {
                    let _ = responder.publish(&LiveFrame::Pong);
                }
            }
        });

        let config = fast_config()
            .with_heartbeat_interval(Duration::from_millis(10))
            .with_heartbeat_timeout(Duration::from_millis(40));
        let conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", config).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hub.opened(), 1);
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let hub = MemoryConnector::new();
        let conn = LiveConnection::establish(Arc::new(hub.clone()), "tok", fast_config()).await;
        conn.shutdown();
        assert_eq!(conn.status(), LiveStatus::Disconnected);

        hub.drop_connections();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(hub.opened(), 1);
        assert_eq!(conn.status(), LiveStatus::Disconnected);
    }
}
