//! Order API Module
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/orders | GET | 订单列表 (`?status=&limit=`) |
//! | /api/orders | POST | 下单 |
//! | /api/orders/{id} | GET | 按 id 查询 |
//! | /api/orders/number/{number} | GET | 按订单号查询 |
//! | /api/orders/{id}/status | PATCH | 状态变更 |

mod handler;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/number/{number}", get(handler::get_by_number))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", patch(handler::update_status))
}
