//! API request handlers

use axum::http::StatusCode;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::models::{
    DirectionDetail, DirectionSummary, GenerateDirectionRequest, GenerateDirectionResponse,
    IntroListResponse, SmartSearchRequest, SmartSearchResponse,
};
use crate::direction::DirectionGenerator;
use crate::error::{ErrorKind, PipelineError, StoreError};
use crate::models::{IngestRequest, IntroRecord};
use crate::processing::IngestionPipeline;
use crate::search::RelevanceSearchEngine;
use crate::store::{IntroStore, ListQuery, StoreStats};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: IngestionPipeline,
    pub store: Arc<dyn IntroStore>,
    pub search: RelevanceSearchEngine,
    pub directions: DirectionGenerator,
    /// Bounds concurrent pipeline invocations
    pub ingest_permits: Arc<Semaphore>,
    pub expose_internal_errors: bool,
}

/// Error carried to the HTTP layer as status plus caller-facing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Map a pipeline failure. Tool, provider and storage details are only
    /// shown when `expose_internal` is set.
    pub fn from_pipeline(err: &PipelineError, expose_internal: bool) -> Self {
        let status = match err.kind() {
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::SourceFetch => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Analysis => StatusCode::BAD_GATEWAY,
            ErrorKind::Persistence => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if expose_internal {
            err.to_string()
        } else {
            err.user_message()
        };
        Self { status, message }
    }

    fn from_store(err: StoreError, expose_internal: bool) -> Self {
        Self::from_pipeline(&PipelineError::from(err), expose_internal)
    }
}

/// Handle health check requests
pub async fn health_check() -> Value {
    serde_json::json!({
        "status": "healthy",
        "service": "intro-analyzer",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })
}

/// Run one ingestion, waiting for a free pipeline slot first
pub async fn create_intro(state: &AppState, request: IngestRequest) -> Result<IntroRecord, ApiError> {
    let _permit = state
        .ingest_permits
        .acquire()
        .await
        .map_err(|_| ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down"))?;

    state
        .pipeline
        .ingest(request)
        .await
        .map_err(|e| ApiError::from_pipeline(&e, state.expose_internal_errors))
}

pub async fn list_intros(state: &AppState, query: &ListQuery) -> Result<IntroListResponse, ApiError> {
    let page = state
        .store
        .list(query)
        .await
        .map_err(|e| ApiError::from_store(e, state.expose_internal_errors))?;

    Ok(IntroListResponse {
        total_pages: page.total.div_ceil(page.limit),
        intros: page.items,
        total: page.total,
        page: page.page,
        limit: page.limit,
    })
}

pub async fn get_intro(state: &AppState, id: u64) -> Result<IntroRecord, ApiError> {
    state
        .store
        .get(id)
        .await
        .map_err(|e| ApiError::from_store(e, state.expose_internal_errors))?
        .ok_or_else(|| ApiError::not_found("Intro not found"))
}

pub async fn delete_intro(state: &AppState, id: u64) -> Result<(), ApiError> {
    let deleted = state
        .store
        .delete(id)
        .await
        .map_err(|e| ApiError::from_store(e, state.expose_internal_errors))?;
    if deleted {
        Ok(())
    } else {
        Err(ApiError::not_found("Intro not found"))
    }
}

pub async fn stats(state: &AppState) -> Result<StoreStats, ApiError> {
    state
        .store
        .stats()
        .await
        .map_err(|e| ApiError::from_store(e, state.expose_internal_errors))
}

pub async fn smart_search(state: &AppState, request: SmartSearchRequest) -> Result<SmartSearchResponse, ApiError> {
    let query = request
        .query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::bad_request("Search query is required"))?;

    let corpus = state
        .store
        .all()
        .await
        .map_err(|e| ApiError::from_store(e, state.expose_internal_errors))?;

    let results = state.search.search(
        &query,
        &corpus,
        request.user_context.as_deref(),
        &request.filters,
    );
    info!("🔍 Smart search \"{}\": {} result(s)", query, results.len());

    Ok(SmartSearchResponse {
        query,
        count: results.len(),
        results,
    })
}

pub async fn suggestions(state: &AppState, partial: &str) -> Result<Vec<String>, ApiError> {
    let partial = partial.trim();
    if partial.chars().count() < 2 {
        return Ok(Vec::new());
    }

    let corpus = state
        .store
        .all()
        .await
        .map_err(|e| ApiError::from_store(e, state.expose_internal_errors))?;
    Ok(state.search.suggest(partial, &corpus))
}

pub async fn generate_direction(
    state: &AppState,
    request: GenerateDirectionRequest,
) -> Result<GenerateDirectionResponse, ApiError> {
    let (record, elapsed) = state
        .directions
        .generate_for_ids(
            state.store.as_ref(),
            &request.selected_intro_ids,
            &request.user_description,
            request.preferences,
        )
        .await
        .map_err(|e| {
            warn!("Visual direction generation failed: {}", e);
            ApiError::from_pipeline(&e, state.expose_internal_errors)
        })?;

    Ok(GenerateDirectionResponse {
        vd_id: record.id,
        generation_time: (elapsed * 10.0).round() / 10.0,
        visual_direction: record.direction.generated,
    })
}

pub async fn list_directions(state: &AppState) -> Result<Vec<DirectionSummary>, ApiError> {
    let records = state
        .store
        .list_directions()
        .await
        .map_err(|e| ApiError::from_store(e, state.expose_internal_errors))?;
    Ok(records.iter().map(DirectionSummary::from).collect())
}

pub async fn get_direction(state: &AppState, id: u64) -> Result<DirectionDetail, ApiError> {
    let expose = state.expose_internal_errors;
    let vd = state
        .store
        .get_direction(id)
        .await
        .map_err(|e| ApiError::from_store(e, expose))?
        .ok_or_else(|| ApiError::not_found("Visual Direction not found"))?;

    let mut selected_intros = Vec::with_capacity(vd.direction.selected_intro_ids.len());
    for &intro_id in &vd.direction.selected_intro_ids {
        if let Some(intro) = state
            .store
            .get(intro_id)
            .await
            .map_err(|e| ApiError::from_store(e, expose))?
        {
            selected_intros.push(intro);
        }
    }

    Ok(DirectionDetail { vd, selected_intros })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AcquisitionError, AnalysisError, ValidationError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (PipelineError::from(ValidationError::InvalidUrl), StatusCode::BAD_REQUEST),
            (PipelineError::from(AcquisitionError::Unavailable), StatusCode::UNPROCESSABLE_ENTITY),
            (PipelineError::from(AnalysisError::QuotaExceeded), StatusCode::BAD_GATEWAY),
            (
                PipelineError::from(StoreError::NotFound(7)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from_pipeline(&err, false).status, status);
        }
    }

    #[test]
    fn test_internal_details_hidden_by_default() {
        let err = PipelineError::from(StoreError::NotFound(7));
        assert_eq!(ApiError::from_pipeline(&err, false).message, "Internal server error");
        assert!(ApiError::from_pipeline(&err, true).message.contains('7'));

        let err = PipelineError::from(AcquisitionError::Unknown(
            "yt-dlp exited with exit status: 1: /srv/app/temp/abc.mp4".to_string(),
        ));
        let hidden = ApiError::from_pipeline(&err, false);
        assert_eq!(hidden.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(hidden.message, "Download failed");
        assert!(ApiError::from_pipeline(&err, true).message.contains("/srv/app/temp"));
    }
}
