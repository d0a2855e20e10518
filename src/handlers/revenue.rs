//! Revenue scoring endpoint

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::error::ApiError;
use crate::revenue::RevenueScore;
use crate::server::AppState;

/// Revenue aggregate, global EPC baseline and hide decision for one listing.
///
/// Unknown listings score as zero rather than 404, matching how the engine
/// treats missing aggregate rows.
#[utoipa::path(
    get,
    path = "/revenue/{entity_id}",
    params(
        ("entity_id" = String, Path, description = "Listing identifier")
    ),
    responses(
        (status = 200, description = "Revenue score", body = RevenueScore),
        (status = 400, description = "Blank entity id", body = ApiError)
    ),
    tag = "revenue"
)]
pub async fn get_revenue_score(
    State(state): State<AppState>,
    Path(entity_id): Path<String>,
) -> Result<Json<RevenueScore>, ApiError> {
    let entity_id = entity_id.trim();
    if entity_id.is_empty() {
        return Err(ApiError::bad_request("entity id must not be blank")
            .with_details(serde_json::json!({ "field": "entityId" })));
    }

    Ok(Json(state.revenue.score(entity_id).await))
}
