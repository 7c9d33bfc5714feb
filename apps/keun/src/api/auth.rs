//! # Authentication Module
//!
//! API key authentication for the Keun HTTP API.
//!
//! If `KEUN_API_KEY` is set, every endpoint except `/health` requires
//! `Authorization: Bearer <key>`. Keys are compared in constant time.

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Environment variable holding the expected API key.
pub const API_KEY_ENV: &str = "KEUN_API_KEY";

// =============================================================================
// API KEY AUTHENTICATION
// =============================================================================

/// Get the configured API key, if any. Empty values disable authentication.
#[must_use]
pub fn api_key_from_env() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|key| !key.is_empty())
}

/// Constant-time key comparison.
///
/// On a length mismatch the expected key is still compared against itself so
/// the timing profile does not depend on where the mismatch occurred.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// API key middleware. Installed only when a key is configured.
pub async fn api_key_auth_middleware(
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let Some(expected) = api_key_from_env() else {
        return Ok(next.run(request).await);
    };

    // Load balancers probe /health without credentials.
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.strip_prefix("Bearer ").unwrap_or(value));

    match provided {
        Some(key) if keys_match(key.as_bytes(), expected.as_bytes()) => {
            Ok(next.run(request).await)
        }
        Some(_) => {
            tracing::warn!(event = "auth_failure", reason = "invalid_api_key");
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
        None => {
            tracing::warn!(event = "auth_failure", reason = "missing_authorization_header");
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
