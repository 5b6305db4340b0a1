//! Category API endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*};
use axum::{Json, extract::State};
use inventory_store::InventoryStore;

use crate::error::{ApiJson, ServerResult};
use crate::services::CatalogGraph;
use crate::state::AppState;

/// Creates a category.
pub async fn create_category<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<CreateCategoryRequest>,
) -> ServerResult<Json<CategoryResponse>> {
    let category = CatalogGraph::new(&state.store)
        .create_category(&request.name, request.description)
        .await?;

    Ok(Json(CategoryResponse { category }))
}

/// Gets a category by ID.
pub async fn get_category<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<GetCategoryRequest>,
) -> ServerResult<Json<CategoryResponse>> {
    let category = CatalogGraph::new(&state.store)
        .category(request.category_id)
        .await?;

    Ok(Json(CategoryResponse { category }))
}

/// Lists categories.
pub async fn list_categories<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(_request): ApiJson<ListCategoriesRequest>,
) -> ServerResult<Json<ListCategoriesResponse>> {
    let categories = CatalogGraph::new(&state.store).categories().await?;

    Ok(Json(ListCategoriesResponse { categories }))
}

/// Updates a category.
pub async fn update_category<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<UpdateCategoryRequest>,
) -> ServerResult<Json<CategoryResponse>> {
    let category = CatalogGraph::new(&state.store)
        .update_category(request.category_id, &request.name, request.description)
        .await?;

    Ok(Json(CategoryResponse { category }))
}

/// Deletes a category no product belongs to.
pub async fn delete_category<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<DeleteCategoryRequest>,
) -> ServerResult<Json<DeletedResponse>> {
    CatalogGraph::new(&state.store)
        .delete_category(request.category_id)
        .await?;

    Ok(Json(DeletedResponse { deleted: true }))
}

/// Puts a product in a category.
pub async fn attach_product<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<CategoryProductRequest>,
) -> ServerResult<Json<ProductResponse>> {
    let product = CatalogGraph::new(&state.store)
        .attach_product(request.category_id, request.product_id)
        .await?;

    Ok(Json(ProductResponse { product }))
}

/// Takes a product out of a category.
pub async fn detach_product<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<CategoryProductRequest>,
) -> ServerResult<Json<ProductResponse>> {
    let product = CatalogGraph::new(&state.store)
        .detach_product(request.category_id, request.product_id)
        .await?;

    Ok(Json(ProductResponse { product }))
}
