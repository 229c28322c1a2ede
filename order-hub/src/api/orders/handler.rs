//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use shared::message::{CreateOrderRequest, OrderListQuery, StatusUpdateRequest};
use shared::{ApiResponse, Order};

use crate::core::ServerState;
use crate::utils::{AppResult, ok};

/// List orders, newest first
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<Vec<Order>>>> {
    let limit = state.config.list_limit(query.limit);
    Ok(ok(state.orders.list(&query, limit)))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    state.orders.get(&id).map(ok)
}

/// Get order by its human-facing number
pub async fn get_by_number(
    State(state): State<ServerState>,
    Path(number): Path<String>,
) -> AppResult<Json<ApiResponse<Order>>> {
    state.orders.get_by_number(&number).map(ok)
}

/// Place an order
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Order>>)> {
    let order = state.orders.create(payload)?;
    Ok((StatusCode::CREATED, ok(order)))
}

/// Change order status
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<StatusUpdateRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    state.orders.change_status(&id, payload).map(ok)
}
