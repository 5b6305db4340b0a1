//! Stock transaction API endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*, StockLevel};
use axum::{Json, extract::State};
use inventory_store::{InventoryStore, LedgerReceipt, TransactionFilter};

use crate::error::{ApiJson, ServerError, ServerResult};
use crate::services::InventoryLedger;
use crate::services::validation::parse_or_default;
use crate::state::AppState;

fn ledger_response(receipt: LedgerReceipt) -> LedgerResponse {
    LedgerResponse {
        stock: receipt.products.iter().map(StockLevel::from).collect(),
        transaction: receipt.transaction,
    }
}

/// Records a stock movement.
pub async fn record_transaction<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<RecordTransactionRequest>,
) -> ServerResult<Json<LedgerResponse>> {
    let receipt = InventoryLedger::new(&state.store)
        .record(request.product_id, request.kind, request.quantity, request.date)
        .await?;

    Ok(Json(ledger_response(receipt)))
}

/// Amends a recorded movement.
pub async fn amend_transaction<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<AmendTransactionRequest>,
) -> ServerResult<Json<LedgerResponse>> {
    let receipt = InventoryLedger::new(&state.store)
        .amend(
            request.transaction_id,
            request.product_id,
            request.kind,
            request.quantity,
            request.date,
        )
        .await?;

    Ok(Json(ledger_response(receipt)))
}

/// Reverses and deletes a movement.
pub async fn reverse_transaction<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<ReverseTransactionRequest>,
) -> ServerResult<Json<LedgerResponse>> {
    let receipt = InventoryLedger::new(&state.store)
        .reverse(request.transaction_id)
        .await?;

    Ok(Json(ledger_response(receipt)))
}

/// Gets a transaction by ID.
pub async fn get_transaction<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<GetTransactionRequest>,
) -> ServerResult<Json<TransactionResponse>> {
    let transaction = state
        .store
        .get_transaction(request.transaction_id)
        .await?
        .ok_or_else(|| ServerError::NotFound("Transaction not found".to_string()))?;

    Ok(Json(TransactionResponse { transaction }))
}

/// Lists transactions, optionally for one product.
pub async fn list_transactions<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<ListTransactionsRequest>,
) -> ServerResult<Json<ListTransactionsResponse>> {
    let filter = TransactionFilter {
        product_id: request.product_id,
        sort: parse_or_default(request.sort_by.as_deref())?,
        order: parse_or_default(request.order.as_deref())?,
    };
    let transactions = state.store.list_transactions(filter).await?;

    Ok(Json(ListTransactionsResponse { transactions }))
}
