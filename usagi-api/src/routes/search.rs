use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::ApiError;
use crate::{
    app_state::AppState,
    auth::CurrentUser,
    domain::models::{ConceptId, Filter, FilterOptions, ScoredMatch},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/get_term_search_results", post(get_term_search_results))
        .route("/get_filters", get(get_filters))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TermSearchRequest {
    #[serde(default)]
    filters: Filter,
    #[serde(default)]
    term: String,
    #[serde(default)]
    source_auto_assigned_concept_ids: Vec<ConceptId>,
}

#[instrument(name = "POST /api/get_term_search_results", skip(app_state, _user))]
async fn get_term_search_results(
    State(app_state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<TermSearchRequest>,
) -> Result<Json<Vec<ScoredMatch>>, ApiError> {
    let matches = app_state
        .mapping_service()
        .search_concepts(
            &request.filters,
            &request.term,
            &request.source_auto_assigned_concept_ids,
        )
        .await?;

    Ok(Json(matches))
}

#[instrument(name = "GET /api/get_filters", skip(app_state, _user))]
async fn get_filters(
    State(app_state): State<AppState>,
    _user: CurrentUser,
) -> Result<Json<FilterOptions>, ApiError> {
    let options = app_state.mapping_service().filter_options().await?;
    Ok(Json(options))
}
