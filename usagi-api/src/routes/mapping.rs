use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ApiError;
use crate::{
    app_state::AppState,
    auth::CurrentUser,
    domain::{
        jobs::{Job, MappingJob},
        models::{ColumnRoles, Filter, JobId, MappingResult, SavedMapping, SavedVocabulary, SourceCode},
    },
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/import_source_codes", post(import_source_codes))
        .route("/import_source_codes/status", get(mapping_status))
        .route("/cancel_concept_mapping_task", post(cancel_mapping))
        .route(
            "/get_import_source_codes_results",
            get(get_import_source_codes_results),
        )
        .route("/save_mapped_codes", post(save_mapped_codes))
        .route("/get_vocabulary", get(get_vocabulary))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImportSourceCodesRequest {
    params: ColumnRoles,
    codes: Vec<SourceCode>,
    #[serde(default)]
    filters: Filter,
    #[serde(default)]
    auto_assign: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobStarted {
    pub job_id: JobId,
}

#[derive(Debug, Serialize)]
pub(crate) struct CancelResponse {
    pub cancelled: bool,
}

#[instrument(name = "POST /api/import_source_codes", skip(app_state, request), fields(codes = request.codes.len()))]
async fn import_source_codes(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<ImportSourceCodesRequest>,
) -> Result<Json<JobStarted>, ApiError> {
    let job = MappingJob {
        source_codes: request.codes,
        filters: request.filters,
        column_roles: request.params,
        auto_assign: request.auto_assign,
    };

    let job_id = app_state.mapping_service().start_mapping(user, job)?;
    Ok(Json(JobStarted { job_id }))
}

#[instrument(name = "GET /api/import_source_codes/status", skip(app_state))]
async fn mapping_status(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Job>, ApiError> {
    app_state
        .mapping_service()
        .mapping_status(user)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("no mapping job for user"))
}

#[instrument(name = "POST /api/cancel_concept_mapping_task", skip(app_state))]
async fn cancel_mapping(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<CancelResponse> {
    let cancelled = app_state.mapping_service().cancel_mapping(user);
    Json(CancelResponse { cancelled })
}

#[instrument(name = "GET /api/get_import_source_codes_results", skip(app_state))]
async fn get_import_source_codes_results(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<SavedMapping>, ApiError> {
    let saved = app_state.mapping_service().saved_mapping_results(user).await?;
    Ok(Json(saved))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveMappedCodesRequest {
    name: String,
    codes: Vec<SourceCode>,
    code_mappings: Vec<MappingResult>,
    #[serde(default)]
    mapping_params: ColumnRoles,
    #[serde(default)]
    filters: Filter,
}

#[instrument(name = "POST /api/save_mapped_codes", skip(app_state, request), fields(name = %request.name))]
async fn save_mapped_codes(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SaveMappedCodesRequest>,
) -> Result<StatusCode, ApiError> {
    let vocabulary = SavedVocabulary {
        name: request.name,
        source_codes: request.codes,
        mappings: request.code_mappings,
        filters: request.filters,
        column_roles: request.mapping_params,
    };

    app_state
        .mapping_service()
        .save_mapped_codes(user, vocabulary)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct VocabularyName {
    name: String,
}

/// Restore a saved vocabulary as the current mapping session.
#[instrument(name = "GET /api/get_vocabulary", skip(app_state))]
async fn get_vocabulary(
    State(app_state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(VocabularyName { name }): Query<VocabularyName>,
) -> Result<Json<SavedMapping>, ApiError> {
    let restored = app_state
        .mapping_service()
        .load_saved_vocabulary(user, &name)
        .await?;
    Ok(Json(restored))
}
