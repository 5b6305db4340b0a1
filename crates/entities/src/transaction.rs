//! Stock transaction entity definitions.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Goods received; stock increases.
    In,
    /// Goods issued; stock decreases.
    Out,
}

impl TransactionKind {
    /// Returns the string representation used on the wire and in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::In => "in",
            TransactionKind::Out => "out",
        }
    }

    /// Signed change in stock caused by moving `quantity` units this way.
    pub fn effect(&self, quantity: i64) -> i64 {
        match self {
            TransactionKind::In => quantity,
            TransactionKind::Out => -quantity,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(TransactionKind::In),
            "out" => Ok(TransactionKind::Out),
            other => Err(format!("invalid transaction type: {other}")),
        }
    }
}

/// A single stock movement against one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier.
    pub id: Uuid,
    /// Product whose stock moved.
    pub product_id: Uuid,
    /// Direction of the movement.
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Units moved; always positive.
    pub quantity: i64,
    /// When the movement happened.
    pub date: DateTime<Utc>,
}

impl Transaction {
    /// Creates a new transaction dated now.
    pub fn new(product_id: Uuid, kind: TransactionKind, quantity: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            product_id,
            kind,
            quantity,
            date: Utc::now(),
        }
    }

    /// Overrides the transaction date.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date;
        self
    }

    /// Signed change this transaction applies to its product's stock.
    pub fn stock_effect(&self) -> i64 {
        self.kind.effect(self.quantity)
    }
}
