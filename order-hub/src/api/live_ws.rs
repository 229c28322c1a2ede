//! Live WebSocket endpoint - 订单事件实时推送
//!
//! GET /api/live?token=<TOKEN>
//! Auth: 令牌通过 query parameter 传递（浏览器 WebSocket 不支持自定义 headers）
//!
//! 协议:
//! - Hub → Dashboard: `order:created`, `order:updated`, `pong`
//! - Dashboard → Hub: `ping`

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use shared::message::LiveFrame;
use tokio::sync::broadcast;
use tokio::time::Duration;

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct LiveQuery {
    #[serde(default)]
    token: String,
}

/// GET /api/live?token=<TOKEN>
pub async fn handle_live_ws(
    State(state): State<ServerState>,
    Query(query): Query<LiveQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> AppResult<Response> {
    // 先验证令牌，再检查升级请求
    if query.token.trim().is_empty() {
        return Err(AppError::Unauthorized);
    }
    if !state.accepts_live_token(&query.token) {
        tracing::debug!("Live WS rejected: token mismatch");
        return Err(AppError::InvalidToken);
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };
    Ok(ws.on_upgrade(move |socket| live_session(socket, state)))
}

async fn live_session(socket: WebSocket, state: ServerState) {
    let (mut sink, mut stream) = socket.split();
    // 先订阅再计数：session_count 可见时已能收到事件
    let mut hub_rx = state.live.subscribe();
    let session = state.live.open_session();

    let mut ping_interval =
        tokio::time::interval(Duration::from_secs(state.config.live_ping_secs.max(1)));
    ping_interval.tick().await; // skip immediate

    loop {
        tokio::select! {
            _ = state.shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            _ = ping_interval.tick() => {
                if sink.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }

            event = hub_rx.recv() => {
                match event {
                    Ok(frame) => {
                        if send_frame(&mut sink, &frame).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // 客户端通过 ResyncRecommended 自行重新拉取
                        tracing::warn!(session_id = %session.id(), lagged = n, "Live session lagged, frames skipped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => match LiveFrame::from_json(text.as_str()) {
                        Ok(LiveFrame::Ping) => {
                            if send_frame(&mut sink, &LiveFrame::Pong).await.is_err() {
                                break;
                            }
                        }
                        Ok(other) => {
                            tracing::debug!(event = other.event_name(), "Ignoring frame from dashboard");
                        }
                        Err(e) => tracing::debug!(error = %e, "Unparseable frame from dashboard"),
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }
}

async fn send_frame<S>(sink: &mut S, frame: &LiveFrame) -> Result<(), ()>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = frame.to_json().map_err(|e| {
        tracing::error!(error = %e, "Failed to serialize live frame");
    })?;
    sink.send(Message::Text(json.into())).await.map_err(|_| ())
}
