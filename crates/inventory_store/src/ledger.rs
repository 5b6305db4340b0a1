//! Stock ledger rules.
//!
//! Every transaction operation is reduced to a list of [`StockAdjustment`]s.
//! A store settles the whole list inside one atomic unit: either every
//! adjustment lands, or none does and the first violation is reported. No
//! adjustment may leave a product with negative stock.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use entities::{Product, Transaction, TransactionKind};
use thiserror::Error;
use uuid::Uuid;

use crate::{StoreError, StoreResult};

/// Why an adjustment was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// An outgoing movement asked for more units than are in stock.
    InsufficientStock,
    /// Undoing an earlier incoming movement would go below zero because
    /// those units have since left stock.
    InvalidReversal,
    /// The resulting stock level does not fit in an `i64`.
    CapacityExceeded,
}

/// A refused stock adjustment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.describe())]
pub struct StockViolation {
    /// Product whose stock would go negative.
    pub product_id: Uuid,
    /// Why the adjustment was refused.
    pub kind: ViolationKind,
    /// Units in stock before the adjustment.
    pub available: i64,
    /// Units the adjustment tried to remove (or add, for
    /// [`ViolationKind::CapacityExceeded`]).
    pub requested: i64,
}

impl StockViolation {
    fn describe(&self) -> String {
        match self.kind {
            ViolationKind::InsufficientStock => format!(
                "Insufficient stock for product {}: {} available, {} requested",
                self.product_id, self.available, self.requested
            ),
            ViolationKind::InvalidReversal => format!(
                "Reversing would leave product {} with negative stock ({} available, {} to remove)",
                self.product_id, self.available, self.requested
            ),
            ViolationKind::CapacityExceeded => format!(
                "Stock for product {} would exceed the largest storable quantity ({} available, {} to add)",
                self.product_id, self.available, self.requested
            ),
        }
    }
}

/// A signed change to one product's stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockAdjustment {
    /// Product to adjust.
    pub product_id: Uuid,
    /// Signed change in units.
    pub delta: i64,
    /// Reported if the change would go below zero.
    pub on_violation: ViolationKind,
}

impl StockAdjustment {
    /// Applies the adjustment to `current`, refusing negative or overflowing
    /// results.
    pub fn apply(&self, current: i64) -> Result<i64, StockViolation> {
        let Some(next) = current.checked_add(self.delta) else {
            return Err(StockViolation {
                product_id: self.product_id,
                kind: ViolationKind::CapacityExceeded,
                available: current,
                requested: self.delta,
            });
        };
        if next < 0 {
            return Err(StockViolation {
                product_id: self.product_id,
                kind: self.on_violation,
                available: current,
                requested: self.delta.saturating_neg(),
            });
        }
        Ok(next)
    }
}

/// New field values for an existing transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionAmendment {
    /// Transaction to amend.
    pub transaction_id: Uuid,
    /// Product the transaction should apply to.
    pub product_id: Uuid,
    /// New direction.
    pub kind: TransactionKind,
    /// New positive quantity.
    pub quantity: i64,
    /// New date; `None` keeps the current one.
    pub date: Option<DateTime<Utc>>,
}

impl TransactionAmendment {
    /// Returns the transaction as it reads after the amendment.
    pub fn applied_to(&self, current: &Transaction) -> Transaction {
        Transaction {
            id: current.id,
            product_id: self.product_id,
            kind: self.kind,
            quantity: self.quantity,
            date: self.date.unwrap_or(current.date),
        }
    }
}

/// Result of a settled ledger operation.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerReceipt {
    /// The transaction as recorded, amended, or (for reversals) removed.
    pub transaction: Transaction,
    /// Every product whose stock changed, with its new quantity.
    pub products: Vec<Product>,
}

impl LedgerReceipt {
    /// Returns the product with the given ID from the receipt.
    pub fn product(&self, product_id: Uuid) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }
}

/// Adjustments for recording a new transaction.
pub fn plan_record(transaction: &Transaction) -> Vec<StockAdjustment> {
    vec![StockAdjustment {
        product_id: transaction.product_id,
        delta: transaction.stock_effect(),
        on_violation: ViolationKind::InsufficientStock,
    }]
}

/// Adjustments for amending `current` into `amended`.
///
/// The old effect is undone on the original product and the new effect is
/// applied to the (possibly different) target product. When both are the
/// same product the two steps collapse into one net adjustment, so only the
/// final stock level has to be non-negative. A net change too large for an
/// `i64` is planned as the two separate steps instead.
pub fn plan_amend(current: &Transaction, amended: &Transaction) -> Vec<StockAdjustment> {
    let same_product = current.product_id == amended.product_id;
    if let Some(delta) = amended
        .stock_effect()
        .checked_sub(current.stock_effect())
        .filter(|_| same_product)
    {
        if delta == 0 {
            return Vec::new();
        }
        let on_violation = match amended.kind {
            TransactionKind::Out => ViolationKind::InsufficientStock,
            TransactionKind::In => ViolationKind::InvalidReversal,
        };
        return vec![StockAdjustment {
            product_id: current.product_id,
            delta,
            on_violation,
        }];
    }

    vec![
        StockAdjustment {
            product_id: current.product_id,
            delta: -current.stock_effect(),
            on_violation: ViolationKind::InvalidReversal,
        },
        StockAdjustment {
            product_id: amended.product_id,
            delta: amended.stock_effect(),
            on_violation: ViolationKind::InsufficientStock,
        },
    ]
}

/// Adjustments for reversing (deleting) a transaction.
pub fn plan_reverse(transaction: &Transaction) -> Vec<StockAdjustment> {
    vec![StockAdjustment {
        product_id: transaction.product_id,
        delta: -transaction.stock_effect(),
        on_violation: ViolationKind::InvalidReversal,
    }]
}

/// Settles `adjustments` against current stock levels without writing.
///
/// `quantity_of` looks up a product's stored quantity. Adjustments to the
/// same product compose in order. Returns the final quantity per product,
/// in first-touched order.
pub fn settle<F>(adjustments: &[StockAdjustment], mut quantity_of: F) -> StoreResult<Vec<(Uuid, i64)>>
where
    F: FnMut(Uuid) -> Option<i64>,
{
    let mut order = Vec::new();
    let mut running: HashMap<Uuid, i64> = HashMap::new();

    for adjustment in adjustments {
        let current = match running.get(&adjustment.product_id) {
            Some(quantity) => *quantity,
            None => {
                let stored = quantity_of(adjustment.product_id)
                    .ok_or_else(|| StoreError::not_found("Product", adjustment.product_id))?;
                order.push(adjustment.product_id);
                stored
            }
        };
        let next = adjustment.apply(current)?;
        running.insert(adjustment.product_id, next);
    }

    Ok(order
        .into_iter()
        .map(|id| (id, running[&id]))
        .collect())
}
