//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Every handler
//! drives the shared [`keun_core::MappingSession`]; automap triggers hand the
//! batch to a background task and return immediately.

use super::{
    AppState,
    types::{
        AutomapPageRequest, AutomapResponse, AutomapRowRequest, CustomMapRequest, DeleteResponse,
        DetailsRequest, ErrorResponse, ExportResponse, HealthResponse, LoadRowsRequest,
        LoadRowsResponse, MapRequest, MapResponse, ReviewResponse, RowsQuery, RowsResponse,
        SettingsRequest, StatusResponse, UserRequest,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use keun_core::{KeunError, Pagination, RowIndex};

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

/// Session status counters.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    let response = StatusResponse::from_status(session.status(), session.table().is_disabled());
    (StatusCode::OK, Json(response))
}

// =============================================================================
// DATASET
// =============================================================================

/// Load a dataset, replacing the current one.
pub async fn load_rows_handler(
    State(state): State<AppState>,
    Json(request): Json<LoadRowsRequest>,
) -> Response {
    if request.rows.iter().any(|row| row.source_code.is_empty()) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("every row needs a sourceCode")),
        )
            .into_response();
    }

    let mut session = state.session.write().await;
    let loaded = request.rows.len();
    session.load_rows(request.rows);
    tracing::info!(rows = loaded, "dataset loaded");
    (StatusCode::OK, Json(LoadRowsResponse { loaded })).into_response()
}

/// One page of rows. Moves the session's page window when `page`/`size` are
/// given, so a following page automap covers what the caller just saw.
pub async fn rows_handler(
    State(state): State<AppState>,
    Query(query): Query<RowsQuery>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    let current = session.table().pagination();
    session.table_mut().set_pagination(Pagination {
        current_page: query.page.unwrap_or(current.current_page).max(1),
        rows_per_page: query.size.unwrap_or(current.rows_per_page).max(1),
    });

    let page = session.table().page_rows();
    Json(RowsResponse {
        indices: page.indices.iter().map(|index| index.0).collect(),
        rows: page.rows,
        total: session.table().row_count(),
    })
}

/// Export the full dataset and the custom-concept table.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    Json(ExportResponse {
        rows: session.table().export_rows(),
        custom_concepts: session.custom().export_rows(),
    })
}

// =============================================================================
// SESSION CONFIGURATION
// =============================================================================

/// Set the active reviewer.
pub async fn set_user_handler(
    State(state): State<AppState>,
    Json(user): Json<UserRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    session.set_user(Some(user));
    StatusCode::NO_CONTENT
}

/// Replace the session settings.
pub async fn set_settings_handler(
    State(state): State<AppState>,
    Json(settings): Json<SettingsRequest>,
) -> impl IntoResponse {
    let mut session = state.session.write().await;
    session.set_settings(settings);
    StatusCode::NO_CONTENT
}

// =============================================================================
// MAPPING
// =============================================================================

/// Map a candidate concept onto a row.
pub async fn map_handler(
    State(state): State<AppState>,
    Json(request): Json<MapRequest>,
) -> Response {
    let mut session = state.session.write().await;
    let result = session.map_concept(
        &request.concept,
        RowIndex(request.row_index),
        request.equivalence,
        request.action,
        request.custom,
        Utc::now(),
    );
    map_result_response(result)
}

/// Author a custom concept for a row and map it.
pub async fn map_custom_handler(
    State(state): State<AppState>,
    Json(request): Json<CustomMapRequest>,
) -> Response {
    let mut session = state.session.write().await;
    let result = session.map_custom_concept(
        &request.concept,
        RowIndex(request.row_index),
        request.equivalence,
        request.action,
        Utc::now(),
    );
    map_result_response(result)
}

fn map_result_response(result: Result<keun_core::MappingOutcome, KeunError>) -> Response {
    match result {
        Ok(outcome) => (StatusCode::OK, Json(MapResponse::from(outcome))).into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(error)),
        )
            .into_response(),
    }
}

// =============================================================================
// REVIEW
// =============================================================================

/// Approve a row (two-person rule).
pub async fn approve_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Response {
    let mut session = state.session.write().await;
    review_response(session.approve_row(RowIndex(index), Utc::now()))
}

/// Flag a row for discussion.
pub async fn flag_handler(State(state): State<AppState>, Path(index): Path<usize>) -> Response {
    let mut session = state.session.write().await;
    review_response(session.flag_row(RowIndex(index), Utc::now()))
}

/// Reject a row.
pub async fn unapprove_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Response {
    let mut session = state.session.write().await;
    review_response(session.unapprove_row(RowIndex(index), Utc::now()))
}

/// Update the reviewer-facing details on a row.
pub async fn details_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
    Json(request): Json<DetailsRequest>,
) -> Response {
    let mut session = state.session.write().await;
    review_response(session.update_mapping_details(
        RowIndex(index),
        request.comment,
        request.assigned_reviewer,
    ))
}

fn review_response(result: Result<keun_core::ReviewOutcome, KeunError>) -> Response {
    match result {
        Ok(outcome) => (StatusCode::OK, Json(ReviewResponse::from(outcome))).into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(error)),
        )
            .into_response(),
    }
}

// =============================================================================
// REMOVAL
// =============================================================================

/// Delete the mapping carried by a row (reset-or-remove semantics).
pub async fn delete_row_handler(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> Response {
    let mut session = state.session.write().await;
    match session.delete_row(RowIndex(index)) {
        Ok(outcome) => (StatusCode::OK, Json(DeleteResponse::from(outcome))).into_response(),
        Err(error) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(error)),
        )
            .into_response(),
    }
}

// =============================================================================
// AUTOMAPPING
// =============================================================================

/// Start a page automap batch in the background.
pub async fn automap_page_handler(
    State(state): State<AppState>,
    Json(request): Json<AutomapPageRequest>,
) -> Response {
    let Some(mapper) = state.automapper.clone() else {
        return automap_unconfigured();
    };
    tokio::spawn(async move {
        if let Err(error) = mapper.run_page(request.domain).await {
            tracing::warn!(%error, "page automap batch failed");
        }
    });
    (StatusCode::ACCEPTED, Json(AutomapResponse { started: true })).into_response()
}

/// Start a single-row automap in the background.
pub async fn automap_row_handler(
    State(state): State<AppState>,
    Json(request): Json<AutomapRowRequest>,
) -> Response {
    let Some(mapper) = state.automapper.clone() else {
        return automap_unconfigured();
    };
    tokio::spawn(async move {
        if let Err(error) = mapper
            .run_row(RowIndex(request.row_index), request.domain)
            .await
        {
            tracing::warn!(%error, "row automap failed");
        }
    });
    (StatusCode::ACCEPTED, Json(AutomapResponse { started: true })).into_response()
}

/// Abort the in-flight automap batch.
pub async fn automap_abort_handler(State(state): State<AppState>) -> Response {
    let Some(mapper) = state.automapper.clone() else {
        return automap_unconfigured();
    };
    mapper.abort().await;
    (StatusCode::OK, Json(AutomapResponse { started: false })).into_response()
}

fn automap_unconfigured() -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ErrorResponse::new(
            "automapping unavailable: KEUN_ATHENA_URL is not configured",
        )),
    )
        .into_response()
}
