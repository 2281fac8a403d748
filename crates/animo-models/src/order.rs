//! Orders: one customer session grouping uploads and jobs.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::IdParseError;

/// Default locale for new orders.
pub const DEFAULT_LOCALE: &str = "de";

/// Status written when an order is created.
pub const ORDER_STATUS_CREATED: &str = "created";

/// Unique identifier for an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generate a new random order ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse and normalize a UUID string.
    pub fn parse(s: &str) -> Result<Self, IdParseError> {
        Uuid::parse_str(s.trim())
            .map(|u| Self(u.to_string()))
            .map_err(|_| IdParseError {
                kind: "order",
                value: s.to_string(),
            })
    }

    /// Create from an existing string without validation.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A persisted order row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Order {
    pub id: OrderId,
    #[serde(default)]
    pub email: Option<String>,
    pub locale: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, JsonSchema)]
pub struct NewOrder {
    /// Contact email; validated only when present
    #[validate(email)]
    #[serde(default)]
    pub email: Option<String>,

    #[validate(length(min = 2, max = 16))]
    #[serde(default)]
    pub locale: Option<String>,
}

impl NewOrder {
    /// Build the row to insert, applying defaults.
    pub fn into_order(self) -> Order {
        Order {
            id: OrderId::new(),
            email: self.email.map(|e| e.trim().to_string()).filter(|e| !e.is_empty()),
            locale: self
                .locale
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOCALE.to_string()),
            status: ORDER_STATUS_CREATED.to_string(),
            created_at: Utc::now(),
        }
    }
}
