//! Activity log API endpoints.

use std::sync::Arc;

use api_protocol::{requests::*, responses::*};
use axum::{Json, extract::State};
use inventory_store::{ActivityFilter, InventoryStore};

use crate::error::{ApiJson, ServerResult};
use crate::state::AppState;

/// Page size when the request does not set one.
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 50;

/// Largest page a single request may ask for.
pub const MAX_ACTIVITY_LIMIT: u32 = 500;

/// Lists activity entries, newest first.
pub async fn list_activities<S: InventoryStore>(
    State(state): State<Arc<AppState<S>>>,
    ApiJson(request): ApiJson<ListActivitiesRequest>,
) -> ServerResult<Json<ListActivitiesResponse>> {
    let filter = ActivityFilter {
        limit: Some(
            request
                .limit
                .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
                .min(MAX_ACTIVITY_LIMIT),
        ),
        offset: request.offset,
    };
    let (activities, total) = state.store.list_activities(filter).await?;

    Ok(Json(ListActivitiesResponse {
        activities,
        total_count: total,
    }))
}
