//! Route handler functions for all API endpoints.
//!
//! Each handler extracts path, query, or body data via axum extractors,
//! interacts with AppState services, and returns JSON responses.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use protea_chat::{FollowupResponse, QueryRequest, QueryResponse};
use protea_core::types::{ProteinProfile, ProteinRecord, ProteinSummary};

use crate::error::ApiError;
use crate::state::AppState;

const PROTEIN_NOT_FOUND: &str = "Protein not found";

// =============================================================================
// Query parameter and response types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub skip: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub protein_count: u64,
    pub llm_configured: bool,
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::UnprocessableEntity(rejection.body_text()))
}

// =============================================================================
// Service endpoints
// =============================================================================

/// GET / - greeting.
pub async fn root() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Hello World".to_string(),
    })
}

/// GET /health - health check.
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let protein_count = state.proteins.count()?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        protein_count,
        llm_configured: state.llm_configured,
    }))
}

// =============================================================================
// Protein endpoints
// =============================================================================

/// GET /proteins/{entry} - full stored record.
pub async fn read_protein(
    State(state): State<AppState>,
    Path(entry): Path<String>,
) -> Result<Json<ProteinRecord>, ApiError> {
    state
        .proteins
        .find_by_entry(&entry)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(PROTEIN_NOT_FOUND.to_string()))
}

/// GET /get_protein_data/{entry} - processed profile.
pub async fn get_protein_data(
    State(state): State<AppState>,
    Path(entry): Path<String>,
) -> Result<Json<ProteinProfile>, ApiError> {
    state
        .proteins
        .find_by_entry(&entry)?
        .map(|record| Json(record.profile()))
        .ok_or_else(|| ApiError::NotFound(PROTEIN_NOT_FOUND.to_string()))
}

/// POST /proteins/ - create a protein.
///
/// Any store failure is reported as 400 without the underlying cause.
pub async fn create_protein(
    State(state): State<AppState>,
    body: Result<Json<ProteinRecord>, JsonRejection>,
) -> Result<Json<ProteinRecord>, ApiError> {
    let record = json_body(body)?;

    match state.proteins.create(&record) {
        Ok(created) => {
            tracing::info!(entry = %created.entry, "Protein created");
            Ok(Json(created))
        }
        Err(e) => {
            tracing::warn!(entry = %record.entry, error = %e, "Failed to create protein");
            Err(ApiError::BadRequest("Error creating protein".to_string()))
        }
    }
}

/// GET /proteins/ - paginated listing.
pub async fn list_proteins(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProteinSummary>>, ApiError> {
    let storage = &state.config.storage;
    let skip = params.skip.unwrap_or(0);
    let limit = params
        .limit
        .unwrap_or(storage.default_page_limit)
        .min(storage.max_page_limit);

    Ok(Json(state.proteins.list(skip, limit)?))
}

/// PUT /proteins/{entry} - update the mutable columns.
pub async fn update_protein(
    State(state): State<AppState>,
    Path(entry): Path<String>,
    body: Result<Json<ProteinRecord>, JsonRejection>,
) -> Result<Json<ProteinRecord>, ApiError> {
    let record = json_body(body)?;
    if record.entry != entry {
        tracing::debug!(path = %entry, body = %record.entry, "Body entry ignored on update");
    }

    match state.proteins.update(&entry, &record) {
        Ok(updated) => Ok(Json(updated)),
        Err(protea_core::ProteaError::NotFound(_)) => {
            Err(ApiError::NotFound(PROTEIN_NOT_FOUND.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// DELETE /proteins/{entry}.
pub async fn delete_protein(
    State(state): State<AppState>,
    Path(entry): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    match state.proteins.delete(&entry) {
        Ok(()) => {
            tracing::info!(entry = %entry, "Protein deleted");
            Ok(Json(MessageResponse {
                message: "Protein deleted successfully".to_string(),
            }))
        }
        Err(protea_core::ProteaError::NotFound(_)) => {
            Err(ApiError::NotFound(PROTEIN_NOT_FOUND.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

// =============================================================================
// Chat endpoints
// =============================================================================

/// POST /query/ - dispatch one chat turn.
pub async fn query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request = json_body(body)?;
    let response = state.dispatcher.handle(&request).await?;
    Ok(Json(response))
}

/// POST /query_followup/ - follow-up suggestions (always empty).
pub async fn query_followup(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<FollowupResponse>, ApiError> {
    let request = json_body(body)?;
    Ok(Json(state.dispatcher.followup(&request)))
}

// =============================================================================
// Fallbacks and middleware
// =============================================================================

/// Unmatched paths.
pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}

/// Answer every OPTIONS request with 200 and the CORS headers.
pub async fn options_middleware(req: Request, next: Next) -> Response {
    if req.method() != Method::OPTIONS {
        return next.run(req).await;
    }

    let mut resp = StatusCode::OK.into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    resp
}
