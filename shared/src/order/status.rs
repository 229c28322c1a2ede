//! Order status state machine
//!
//! ```text
//! pending ─► confirmed ─► processing ─► packed ─► shipped ─► delivered ─► returned
//!    │           │             │           │          │
//!    └───────────┴─────────────┴───────────┴──────────┴──► cancelled
//! ```
//!
//! `cancelled`, `returned` and `refunded` are terminal. The table is shared by
//! the dashboard (local validation before any remote call) and the order hub
//! (authoritative re-validation).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
}

const FROM_PENDING: &[OrderStatus] = &[OrderStatus::Confirmed, OrderStatus::Cancelled];
const FROM_CONFIRMED: &[OrderStatus] = &[OrderStatus::Processing, OrderStatus::Cancelled];
const FROM_PROCESSING: &[OrderStatus] = &[OrderStatus::Packed, OrderStatus::Cancelled];
const FROM_PACKED: &[OrderStatus] = &[OrderStatus::Shipped, OrderStatus::Cancelled];
const FROM_SHIPPED: &[OrderStatus] = &[OrderStatus::Delivered, OrderStatus::Cancelled];
const FROM_DELIVERED: &[OrderStatus] = &[OrderStatus::Returned];
const TERMINAL: &[OrderStatus] = &[];

impl OrderStatus {
    /// Every defined status, in lifecycle order
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Packed,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Returned,
        OrderStatus::Refunded,
    ];

    /// Wire name (lowercase)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
            Self::Refunded => "refunded",
        }
    }

    /// Outbound edges of this status. Empty means terminal.
    pub fn next_statuses(self) -> &'static [OrderStatus] {
        match self {
            Self::Pending => FROM_PENDING,
            Self::Confirmed => FROM_CONFIRMED,
            Self::Processing => FROM_PROCESSING,
            Self::Packed => FROM_PACKED,
            Self::Shipped => FROM_SHIPPED,
            Self::Delivered => FROM_DELIVERED,
            Self::Cancelled | Self::Returned | Self::Refunded => TERMINAL,
        }
    }

    /// Whether `to` is a legal next status. A self-transition never is.
    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        self.next_statuses().contains(&to)
    }

    /// Whether no further transition is possible
    pub fn is_terminal(self) -> bool {
        self.next_statuses().is_empty()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status string outside the defined state set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Outbound edges of `current`
pub fn next_statuses(current: OrderStatus) -> &'static [OrderStatus] {
    current.next_statuses()
}

/// `to ∈ next_statuses(from)`
pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
    from.can_transition_to(to)
}

/// Outbound edges for a raw status string.
///
/// Unrecognized input has no valid outbound transition.
pub fn next_statuses_raw(current: &str) -> &'static [OrderStatus] {
    current
        .parse::<OrderStatus>()
        .map(OrderStatus::next_statuses)
        .unwrap_or(TERMINAL)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EDGES: &[(OrderStatus, OrderStatus)] = &[
        (OrderStatus::Pending, OrderStatus::Confirmed),
        (OrderStatus::Pending, OrderStatus::Cancelled),
        (OrderStatus::Confirmed, OrderStatus::Processing),
        (OrderStatus::Confirmed, OrderStatus::Cancelled),
        (OrderStatus::Processing, OrderStatus::Packed),
        (OrderStatus::Processing, OrderStatus::Cancelled),
        (OrderStatus::Packed, OrderStatus::Shipped),
        (OrderStatus::Packed, OrderStatus::Cancelled),
        (OrderStatus::Shipped, OrderStatus::Delivered),
        (OrderStatus::Shipped, OrderStatus::Cancelled),
        (OrderStatus::Delivered, OrderStatus::Returned),
    ];

    #[test]
    fn test_only_table_edges_are_valid() {
        for from in OrderStatus::ALL {
            for to in OrderStatus::ALL {
                let expected = EDGES.contains(&(from, to));
                assert_eq!(
                    is_valid_transition(from, to),
                    expected,
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_self_transition_is_never_valid() {
        for status in OrderStatus::ALL {
            assert!(!is_valid_transition(status, status));
        }
    }

    #[test]
    fn test_terminal_set() {
        let terminal: Vec<OrderStatus> = OrderStatus::ALL
            .into_iter()
            .filter(|s| next_statuses(*s).is_empty())
            .collect();
        assert_eq!(
            terminal,
            vec![
                OrderStatus::Cancelled,
                OrderStatus::Returned,
                OrderStatus::Refunded
            ]
        );
        assert!(OrderStatus::Refunded.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
    }

    #[test]
    fn test_unknown_status_fails_safe() {
        assert!(next_statuses_raw("on_hold").is_empty());
        assert!(next_statuses_raw("").is_empty());
        assert!(next_statuses_raw("PENDING").is_empty());
        assert_eq!(
            next_statuses_raw("pending"),
            &[OrderStatus::Confirmed, OrderStatus::Cancelled]
        );
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("shipped".parse::<OrderStatus>(), Ok(OrderStatus::Shipped));
        assert_eq!(
            "lost".parse::<OrderStatus>(),
            Err(UnknownStatus("lost".to_string()))
        );
        assert_eq!(OrderStatus::Packed.to_string(), "packed");
    }

    #[test]
    fn test_serde_uses_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        let parsed: OrderStatus = serde_json::from_str("\"delivered\"").unwrap();
        assert_eq!(parsed, OrderStatus::Delivered);
        assert!(serde_json::from_str::<OrderStatus>("\"archived\"").is_err());
    }
}
