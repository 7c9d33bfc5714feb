//! # Keun HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Session counters
//! - `POST /rows` - Load a dataset
//! - `GET /rows` - Page of rows (`?page=&size=`)
//! - `GET /export` - Full dataset export
//! - `PUT /user` - Set the active reviewer
//! - `PUT /settings` - Replace session settings
//! - `POST /map` - Map a concept onto a row
//! - `POST /custom` - Author and map a custom concept
//! - `POST /rows/{index}/approve|flag|unapprove` - Review transitions
//! - `POST /rows/{index}/details` - Comment / assigned reviewer
//! - `DELETE /rows/{index}` - Delete a mapping
//! - `POST /automap` - Automap the current page (background)
//! - `POST /automap/row` - Automap one row (background)
//! - `POST /automap/abort` - Cancel the in-flight batch
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `KEUN_CORS_ORIGINS`: Comma-separated allowed origins, or "*" (default: localhost only)
//! - `KEUN_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `KEUN_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
pub mod types;

pub use auth::api_key_from_env;
pub use middleware::{create_rate_limiter, rate_limit_from_env};

use crate::automap::{AnyTranslator, AthenaClient, AutoMapper};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use keun_core::{KeunError, MappingSession};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// The automapper variant the server runs: real Athena search plus the
/// configured translator.
pub type ServiceAutoMapper = AutoMapper<AthenaClient, AnyTranslator>;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the mapping session and the optional automapper.
#[derive(Clone)]
pub struct AppState {
    /// The session all handlers drive.
    pub session: Arc<RwLock<MappingSession>>,
    /// Present only when a concept search endpoint is configured.
    pub automapper: Option<ServiceAutoMapper>,
}

impl AppState {
    /// State without automapping (no search endpoint configured).
    #[must_use]
    pub fn new(session: MappingSession) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            automapper: None,
        }
    }

    /// State with automapping over the same shared session.
    #[must_use]
    pub fn with_search(session: MappingSession, search: AthenaClient, translator: AnyTranslator) -> Self {
        let session = Arc::new(RwLock::new(session));
        let automapper = AutoMapper::new(Arc::clone(&session), search, translator);
        Self {
            session,
            automapper: Some(automapper),
        }
    }

    /// Build from the environment: automapping is enabled when
    /// `KEUN_ATHENA_URL` is set.
    #[must_use]
    pub fn from_env(session: MappingSession) -> Self {
        match AthenaClient::from_env() {
            Some(search) => Self::with_search(session, search, AnyTranslator::from_env()),
            None => {
                tracing::warn!(
                    "KEUN_ATHENA_URL not set - automapping endpoints will answer 503"
                );
                Self::new(session)
            }
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `KEUN_CORS_ORIGINS`.
///
/// The default is restrictive (localhost only); `*` must be opted into
/// explicitly.
fn build_cors_layer() -> CorsLayer {
    match std::env::var("KEUN_CORS_ORIGINS").ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins - do not use in production");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();
            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origin in KEUN_CORS_ORIGINS, using localhost only");
                localhost_cors()
            } else {
                cors_for(allowed)
            }
        }
        None => localhost_cors(),
    }
}

fn localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|origin| origin.parse().ok())
    .collect();
    cors_for(origins)
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): CORS, tracing, rate limiting (if
/// enabled), API key authentication (if configured).
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route(
            "/rows",
            get(handlers::rows_handler).post(handlers::load_rows_handler),
        )
        .route("/export", get(handlers::export_handler))
        .route("/user", put(handlers::set_user_handler))
        .route("/settings", put(handlers::set_settings_handler))
        .route("/map", post(handlers::map_handler))
        .route("/custom", post(handlers::map_custom_handler))
        .route("/rows/{index}/approve", post(handlers::approve_handler))
        .route("/rows/{index}/flag", post(handlers::flag_handler))
        .route("/rows/{index}/unapprove", post(handlers::unapprove_handler))
        .route("/rows/{index}/details", post(handlers::details_handler))
        .route("/rows/{index}", delete(handlers::delete_row_handler))
        .route("/automap", post(handlers::automap_page_handler))
        .route("/automap/row", post(handlers::automap_row_handler))
        .route("/automap/abort", post(handlers::automap_abort_handler));

    if api_key_from_env().is_some() {
        tracing::info!("API key authentication enabled");
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    } else {
        tracing::warn!(
            "API key authentication DISABLED - set KEUN_API_KEY to require Bearer tokens"
        );
    }

    let rate_limit = rate_limit_from_env();
    if rate_limit > 0 {
        tracing::info!(rate_limit, "rate limiting enabled");
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(rate_limit),
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), KeunError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| KeunError::Io(format!("bind failed: {e}")))?;

    tracing::info!("Keun HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| KeunError::Io(format!("server error: {e}")))
}
