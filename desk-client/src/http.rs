// desk-client/src/http.rs
// REST 客户端 - 订单接口

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::ApiResponse;
use shared::message::{OrderListQuery, StatusUpdateRequest};
use shared::order::{Order, OrderKey, decode_order};

use crate::{ClientConfig, ClientError, ClientResult};

/// Order endpoints the dashboard consumes
///
/// Every order returned has passed [`Order::validate`].
#[async_trait]
pub trait OrderApi: Send + Sync {
    /// `GET /api/orders`
    async fn list_orders(&self, query: &OrderListQuery) -> ClientResult<Vec<Order>>;

    /// `GET /api/orders/{id}` or `GET /api/orders/number/{number}`
    async fn get_order(&self, key: &OrderKey) -> ClientResult<Order>;

    /// `PATCH /api/orders/{id}/status`, returns the authoritative order
    async fn update_status(&self, id: &str, request: &StatusUpdateRequest) -> ClientResult<Order>;
}

/// reqwest-backed [`OrderApi`]
#[derive(Debug, Clone)]
pub struct HttpOrderApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl HttpOrderApi {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| ClientError::Config(format!("{}: {}", config.base_url, e)))?;
        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// 获取基础 URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL; each segment is percent-encoded
    fn endpoint(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::Config(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, mut req: RequestBuilder) -> ClientResult<T> {
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let response = req.send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_message(status, &text);
            return match status {
                StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
                StatusCode::NOT_FOUND => Err(ClientError::NotFound(message)),
                _ => Err(ClientError::Api {
                    status: status.as_u16(),
                    message,
                }),
            };
        }

        let body: ApiResponse<T> = serde_json::from_str(&text)
            .map_err(|e| ClientError::InvalidResponse(format!("Bad envelope: {}", e)))?;
        if !body.success {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: body.error.unwrap_or_else(|| "Unknown error".into()),
            });
        }
        body.data
            .ok_or_else(|| ClientError::InvalidResponse("Missing data".into()))
    }
}

/// Message of an error response.
///
/// Only the hub's own envelope is trusted to carry user-facing text; any
/// other body (proxy pages, framework rejections) collapses to the status.
fn error_message(status: StatusCode, text: &str) -> String {
    match serde_json::from_str::<ApiResponse<Value>>(text)
        .ok()
        .and_then(|body| body.error)
    {
        Some(message) => message,
        None => {
            if !text.trim().is_empty() {
                tracing::debug!(%status, body = %text, "Non-envelope error body");
            }
            format!(
                "Request failed: {}",
                status.canonical_reason().unwrap_or("unknown error")
            )
        }
    }
}

fn decode(value: Value) -> ClientResult<Order> {
    decode_order(value).map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

#[async_trait]
impl OrderApi for HttpOrderApi {
    async fn list_orders(&self, query: &OrderListQuery) -> ClientResult<Vec<Order>> {
        let url = self.endpoint(&["api", "orders"])?;
        let raw: Vec<Value> = self.send(self.client.get(url).query(query)).await?;

        // One bad record must not blank the whole list
        let total = raw.len();
        let orders: Vec<Order> = raw
            .into_iter()
            .filter_map(|value| match decode(value) {
                Ok(order) => Some(order),
                Err(e) => {
                    tracing::warn!(error = %e, "Skipping malformed order in list response");
                    None
                }
            })
            .collect();
        tracing::debug!(total, accepted = orders.len(), "Fetched order list");
        Ok(orders)
    }

    async fn get_order(&self, key: &OrderKey) -> ClientResult<Order> {
        let url = match key {
            OrderKey::Id(id) => self.endpoint(&["api", "orders", id.as_str()])?,
            OrderKey::Number(number) => self.endpoint(&["api", "orders", "number", number.as_str()])?,
        };
        let order = decode(self.send(self.client.get(url)).await?)?;

        let matches = match key {
            OrderKey::Id(id) => &order.id == id,
            OrderKey::Number(number) => order.order_number.as_deref() == Some(number.as_str()),
        };
        if !matches {
            return Err(ClientError::InvalidResponse(format!(
                "Asked for {}, server returned order {}",
                key, order.id
            )));
        }
        Ok(order)
    }

    async fn update_status(&self, id: &str, request: &StatusUpdateRequest) -> ClientResult<Order> {
        let url = self.endpoint(&["api", "orders", id, "status"])?;
        let order = decode(self.send(self.client.patch(url).json(request)).await?)?;
        if order.id != id {
            return Err(ClientError::InvalidResponse(format!(
                "Updated order {}, server returned order {}",
                id, order.id
            )));
        }
        Ok(order)
    }
}
