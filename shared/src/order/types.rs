//! Order schema
//!
//! One validated shape for every order that crosses the API boundary
//! (list fetch, detail fetch, status mutation response, live payload).
//! Decode with serde, then call [`Order::validate`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::status::OrderStatus;

// ============================================================================
// Order
// ============================================================================

/// Order record as served by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Canonical identity, the only reconciliation key
    pub id: String,
    /// Human-facing number (e.g. `ORD-20240101-0001`), display only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    pub status: OrderStatus,
    /// Customer snapshot taken at checkout
    #[serde(default)]
    pub customer: CustomerSnapshot,
    #[serde(default)]
    pub items: Vec<LineItem>,
    #[serde(default)]
    pub pricing: Pricing,
    #[serde(default)]
    pub payment_info: PaymentInfo,
    #[serde(default)]
    pub shipping_address: ShippingAddress,
    /// Accepted transitions, oldest first (written by the backend)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub status_history: Vec<StatusChange>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a pending order with empty sub-records
    pub fn new(id: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            order_number: None,
            status: OrderStatus::Pending,
            customer: CustomerSnapshot::default(),
            items: Vec::new(),
            pricing: Pricing::default(),
            payment_info: PaymentInfo::default(),
            shipping_address: ShippingAddress::default(),
            status_history: Vec::new(),
            created_at,
            updated_at: None,
        }
    }

    /// Check the invariants serde cannot express
    pub fn validate(&self) -> Result<(), OrderSchemaError> {
        if self.id.trim().is_empty() {
            return Err(OrderSchemaError::MissingId);
        }
        if let Some(number) = &self.order_number
            && number.trim().is_empty()
        {
            return Err(OrderSchemaError::EmptyOrderNumber {
                id: self.id.clone(),
            });
        }
        if let Some(position) = self.items.iter().position(|item| item.quantity == 0) {
            return Err(OrderSchemaError::ZeroQuantity {
                id: self.id.clone(),
                position,
            });
        }
        Ok(())
    }

    /// Label for lists and logs: the order number when present, else the id
    pub fn display_label(&self) -> &str {
        self.order_number.as_deref().unwrap_or(&self.id)
    }

    /// Server-computed amount due
    pub fn final_amount(&self) -> Decimal {
        self.pricing.final_amount
    }

    /// Number of units across all line items
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// Payload failed schema validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderSchemaError {
    #[error("Order payload has no id")]
    MissingId,

    #[error("Order {id} has an empty order number")]
    EmptyOrderNumber { id: String },

    #[error("Order {id} has a line item with zero quantity at position {position}")]
    ZeroQuantity { id: String, position: usize },

    #[error("Malformed order payload: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for OrderSchemaError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Decode and validate one order from a JSON value
pub fn decode_order(value: serde_json::Value) -> Result<Order, OrderSchemaError> {
    let order: Order = serde_json::from_value(value)?;
    order.validate()?;
    Ok(order)
}

// ============================================================================
// Sub-records
// ============================================================================

/// Denormalized customer snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CustomerSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// Order line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Product reference (id)
    pub product: String,
    /// Product name snapshot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// Computed by the backend (unit_price * quantity)
    pub line_total: Decimal,
}

/// Order pricing, always server-computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Pricing {
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub shipping: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub final_amount: Decimal,
}

/// Payment method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    #[default]
    Cod,
    Card,
    Upi,
    Netbanking,
    Wallet,
}

/// Payment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

/// Payment details with external gateway references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

/// Shipping address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    #[serde(default)]
    pub line1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub country: String,
}

/// One accepted status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}
