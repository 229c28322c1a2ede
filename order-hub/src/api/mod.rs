//! API 路由模块
//!
//! - [`orders`] - 订单查询、下单、状态变更
//! - [`live_ws`] - 实时订单事件 WebSocket
//! - `/health` - 健康检查

pub mod live_ws;
pub mod orders;

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// 健康检查响应
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    orders: usize,
    live_sessions: usize,
}

async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        orders: state.orders.repository().len(),
        live_sessions: state.live.session_count(),
    })
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(orders::router())
        .route("/api/live", get(live_ws::handle_live_ws))
        .route("/health", get(health))
}

/// Build the application served over HTTP and used by oneshot tests
pub fn build_app(state: ServerState) -> Router {
    build_router()
        // CORS - the dashboard is served from another origin
        .layer(CorsLayer::permissive())
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
