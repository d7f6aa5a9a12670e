//! HTTP server implementation for the API

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers::{self, ApiError, AppState};
use super::models::{ApiResponse, GenerateDirectionRequest, SmartSearchRequest, SuggestionQuery};
use crate::models::IngestRequest;
use crate::store::ListQuery;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ApiResponse::error(self.message))).into_response()
    }
}

fn ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(data) => ok(data),
        Err(e) => e.into_response(),
    }
}

/// Build the router with all routes and middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/intros", get(list_intros_handler).post(create_intro_handler))
        .route("/api/intros/:id", get(get_intro_handler).delete(delete_intro_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/search/smart", axum::routing::post(smart_search_handler))
        .route("/api/search/suggestions", get(suggestions_handler))
        .route(
            "/api/generate-vd",
            get(list_directions_handler).post(generate_direction_handler),
        )
        .route("/api/generate-vd/:id", get(get_direction_handler))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

/// Bind and serve until the process exits
pub async fn start_http_server(state: AppState, host: &str, port: u16) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    info!("🌐 API server listening on http://{}:{}", host, port);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(handlers::health_check().await)
}

async fn create_intro_handler(
    State(state): State<AppState>,
    payload: Result<Json<IngestRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ApiError::bad_request(format!("Missing required fields: {}", rejection.body_text()))
                .into_response()
        }
    };

    match handlers::create_intro(&state, request).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(ApiResponse::with_message(record, "Intro analyzed and saved successfully")),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn list_intros_handler(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    respond(handlers::list_intros(&state, &query).await)
}

async fn get_intro_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    respond(handlers::get_intro(&state, id).await)
}

async fn delete_intro_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    match handlers::delete_intro(&state, id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::message("Intro deleted successfully")),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn stats_handler(State(state): State<AppState>) -> Response {
    respond(handlers::stats(&state).await)
}

async fn smart_search_handler(
    State(state): State<AppState>,
    payload: Result<Json<SmartSearchRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => respond(handlers::smart_search(&state, request).await),
        Err(rejection) => ApiError::bad_request(rejection.body_text()).into_response(),
    }
}

async fn suggestions_handler(State(state): State<AppState>, Query(query): Query<SuggestionQuery>) -> Response {
    respond(handlers::suggestions(&state, &query.q).await)
}

async fn generate_direction_handler(
    State(state): State<AppState>,
    payload: Result<Json<GenerateDirectionRequest>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(request)) => match handlers::generate_direction(&state, request).await {
            Ok(data) => ok_with_message(data, "Visual Direction generated successfully"),
            Err(e) => e.into_response(),
        },
        Err(rejection) => ApiError::bad_request(rejection.body_text()).into_response(),
    }
}

async fn list_directions_handler(State(state): State<AppState>) -> Response {
    respond(handlers::list_directions(&state).await)
}

async fn get_direction_handler(State(state): State<AppState>, Path(id): Path<u64>) -> Response {
    respond(handlers::get_direction(&state, id).await)
}

async fn not_found_handler() -> Response {
    ApiError::not_found("Route not found").into_response()
}

fn ok_with_message<T: Serialize>(data: T, message: &str) -> Response {
    (StatusCode::OK, Json(ApiResponse::with_message(data, message))).into_response()
}
