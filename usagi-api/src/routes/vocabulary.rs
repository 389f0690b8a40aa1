use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::{
    mapping::{CancelResponse, JobStarted},
    ApiError,
};
use crate::{
    app_state::AppState,
    auth::CurrentUser,
    domain::{jobs::Job, search::IndexStatus},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/load_vocabulary", post(load_vocabulary))
        .route("/load_vocabulary/status", get(load_vocabulary_status))
        .route("/cancel_load_vocabulary_task", post(cancel_load_vocabulary))
        .route("/solr_import_status", get(solr_import_status))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadVocabularyRequest {
    vocabulary_id: String,
}

#[instrument(name = "POST /api/load_vocabulary", skip(app_state))]
async fn load_vocabulary(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<LoadVocabularyRequest>,
) -> Result<Json<JobStarted>, ApiError> {
    let job_id = app_state
        .mapping_service()
        .start_vocabulary_load(user, &request.vocabulary_id)?;
    Ok(Json(JobStarted { job_id }))
}

#[instrument(name = "GET /api/load_vocabulary/status", skip(app_state))]
async fn load_vocabulary_status(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Job>, ApiError> {
    app_state
        .mapping_service()
        .vocabulary_load_status(user)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no vocabulary load for user"))
}

#[instrument(name = "POST /api/cancel_load_vocabulary_task", skip(app_state))]
async fn cancel_load_vocabulary(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<CancelResponse> {
    let cancelled = app_state.mapping_service().cancel_vocabulary_load(user);
    Json(CancelResponse { cancelled })
}

#[instrument(name = "GET /api/solr_import_status", skip(app_state))]
async fn solr_import_status(
    State(app_state): State<AppState>,
) -> Result<Json<IndexStatus>, ApiError> {
    let status = app_state.mapping_service().index_status().await?;
    Ok(Json(status))
}
