//! Stock ledger service.
//!
//! Validates ledger requests at the boundary and hands them to the store,
//! which settles the stock adjustments and the transaction write atomically.
//! Nothing here touches stock before the store has accepted the whole
//! operation.

use chrono::{DateTime, Utc};
use entities::{Transaction, TransactionKind};
use inventory_store::{InventoryStore, LedgerReceipt, TransactionAmendment};
use uuid::Uuid;

use crate::error::{ServerError, ServerResult};
use crate::services::validation::MAX_QUANTITY;

/// Records, amends and reverses stock transactions.
pub struct InventoryLedger<'a, S> {
    store: &'a S,
}

impl<'a, S: InventoryStore> InventoryLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Records a movement and adjusts the product's stock.
    pub async fn record(
        &self,
        product_id: Uuid,
        kind: TransactionKind,
        quantity: i64,
        date: Option<DateTime<Utc>>,
    ) -> ServerResult<LedgerReceipt> {
        validate_quantity(quantity)?;

        let mut transaction = Transaction::new(product_id, kind, quantity);
        if let Some(date) = date {
            transaction = transaction.with_date(date);
        }

        let receipt = self
            .store
            .record_transaction(transaction)
            .await
            .inspect_err(|e| {
                tracing::info!(product_id = %product_id, kind = %kind, quantity, error = %e, "Transaction rejected");
            })?;

        tracing::info!(
            transaction_id = %receipt.transaction.id,
            product_id = %product_id,
            kind = %kind,
            quantity,
            "Transaction recorded"
        );
        Ok(receipt)
    }

    /// Rewrites a transaction, undoing its old effect and applying the new
    /// one. `product_id` defaults to the transaction's current product.
    pub async fn amend(
        &self,
        transaction_id: Uuid,
        product_id: Option<Uuid>,
        kind: TransactionKind,
        quantity: i64,
        date: Option<DateTime<Utc>>,
    ) -> ServerResult<LedgerReceipt> {
        validate_quantity(quantity)?;

        let current = self
            .store
            .get_transaction(transaction_id)
            .await?
            .ok_or_else(|| ServerError::NotFound("Transaction not found".to_string()))?;

        let amendment = TransactionAmendment {
            transaction_id,
            product_id: product_id.unwrap_or(current.product_id),
            kind,
            quantity,
            date,
        };

        let receipt = self
            .store
            .amend_transaction(amendment)
            .await
            .inspect_err(|e| {
                tracing::info!(transaction_id = %transaction_id, error = %e, "Amendment rejected");
            })?;

        tracing::info!(
            transaction_id = %transaction_id,
            from_product = %current.product_id,
            to_product = %receipt.transaction.product_id,
            kind = %kind,
            quantity,
            "Transaction amended"
        );
        Ok(receipt)
    }

    /// Undoes a transaction's stock effect and deletes it.
    pub async fn reverse(&self, transaction_id: Uuid) -> ServerResult<LedgerReceipt> {
        let receipt = self
            .store
            .reverse_transaction(transaction_id)
            .await
            .inspect_err(|e| {
                tracing::info!(transaction_id = %transaction_id, error = %e, "Reversal rejected");
            })?;

        tracing::info!(
            transaction_id = %transaction_id,
            product_id = %receipt.transaction.product_id,
            "Transaction reversed"
        );
        Ok(receipt)
    }
}

fn validate_quantity(quantity: i64) -> ServerResult<()> {
    if quantity <= 0 {
        return Err(ServerError::InvalidRequest(
            "Quantity must be a positive integer".to_string(),
        ));
    }
    if quantity > MAX_QUANTITY {
        return Err(ServerError::InvalidRequest(format!(
            "Quantity must not exceed {MAX_QUANTITY}"
        )));
    }
    Ok(())
}
