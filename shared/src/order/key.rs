//! Order identity as held by a caller

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which identity a caller holds for an order.
///
/// The kind is always stated by the caller; a string is never sniffed for
/// its shape to decide between id and number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum OrderKey {
    /// Canonical identity (reconciliation key)
    Id(String),
    /// Human-facing order number
    Number(String),
}

impl OrderKey {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id(id.into())
    }

    pub fn number(number: impl Into<String>) -> Self {
        Self::Number(number.into())
    }

    /// Raw value regardless of kind
    pub fn value(&self) -> &str {
        match self {
            Self::Id(v) | Self::Number(v) => v,
        }
    }

    /// Canonical id, if that is what the caller holds
    pub fn as_id(&self) -> Option<&str> {
        match self {
            Self::Id(v) => Some(v),
            Self::Number(_) => None,
        }
    }
}

impl fmt::Display for OrderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(v) => write!(f, "id:{}", v),
            Self::Number(v) => write!(f, "number:{}", v),
        }
    }
}
