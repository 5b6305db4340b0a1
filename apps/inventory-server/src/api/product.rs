//! Product API endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*};
use axum::{Json, extract::State};
use inventory_store::{InventoryStore, ProductFilter};

use crate::error::{ApiJson, ServerResult};
use crate::services::CatalogGraph;
use crate::services::catalog::ProductDraft;
use crate::services::validation::parse_or_default;
use crate::state::AppState;

/// Creates a product.
pub async fn create_product<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<CreateProductRequest>,
) -> ServerResult<Json<ProductResponse>> {
    let draft = ProductDraft {
        name: request.name,
        description: request.description,
        price: request.price,
        category_id: request.category_id,
    };
    let product = CatalogGraph::new(&state.store)
        .create_product(draft, request.quantity)
        .await?;

    Ok(Json(ProductResponse { product }))
}

/// Gets a product by ID.
pub async fn get_product<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<GetProductRequest>,
) -> ServerResult<Json<ProductResponse>> {
    let product = CatalogGraph::new(&state.store)
        .product(request.product_id)
        .await?;

    Ok(Json(ProductResponse { product }))
}

/// Lists products, optionally within one category.
pub async fn list_products<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<ListProductsRequest>,
) -> ServerResult<Json<ListProductsResponse>> {
    let filter = ProductFilter {
        category_id: request.category_id,
        sort: parse_or_default(request.sort_by.as_deref())?,
        order: parse_or_default(request.order.as_deref())?,
    };
    let products = CatalogGraph::new(&state.store).products(filter).await?;

    Ok(Json(ListProductsResponse { products }))
}

/// Updates a product's name, description, price and category.
pub async fn update_product<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<UpdateProductRequest>,
) -> ServerResult<Json<ProductResponse>> {
    let draft = ProductDraft {
        name: request.name,
        description: request.description,
        price: request.price,
        category_id: request.category_id,
    };
    let product = CatalogGraph::new(&state.store)
        .update_product(request.product_id, draft)
        .await?;

    Ok(Json(ProductResponse { product }))
}

/// Deletes a product without transactions.
pub async fn delete_product<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<DeleteProductRequest>,
) -> ServerResult<Json<DeletedResponse>> {
    CatalogGraph::new(&state.store)
        .delete_product(request.product_id)
        .await?;

    Ok(Json(DeletedResponse { deleted: true }))
}
