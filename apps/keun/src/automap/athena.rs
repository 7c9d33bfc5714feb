//! # Athena Search Client
//!
//! HTTP client for the Athena-style concept search endpoint. The automapper
//! only ever wants the single top standard-concept hit, so the client pins
//! `page=1&pageSize=1&standardConcept=Standard` on every request.

use super::ConceptSearch;
use keun_core::{AthenaConcept, KeunError};
use serde::Deserialize;
use std::future::Future;

/// Environment variable naming the concept search endpoint.
pub const ATHENA_URL_ENV: &str = "KEUN_ATHENA_URL";

// =============================================================================
// CLIENT
// =============================================================================

/// Client for the concept search endpoint.
#[derive(Debug, Clone)]
pub struct AthenaClient {
    http: reqwest::Client,
    base_url: String,
}

impl AthenaClient {
    /// Create a client for the given endpoint URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Create a client from `KEUN_ATHENA_URL`, if set and non-empty.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(ATHENA_URL_ENV)
            .ok()
            .filter(|url| !url.is_empty())
            .map(Self::new)
    }
}

/// Wire shape of the search response.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    content: Vec<AthenaConcept>,
}

impl ConceptSearch for AthenaClient {
    fn first_standard_match(
        &self,
        query: &str,
        domain: Option<&str>,
    ) -> impl Future<Output = Result<Option<AthenaConcept>, KeunError>> + Send {
        let request = {
            let mut request = self.http.get(&self.base_url).query(&[
                ("page", "1"),
                ("pageSize", "1"),
                ("standardConcept", "Standard"),
                ("query", query),
            ]);
            if let Some(domain) = domain {
                request = request.query(&[("domain", domain)]);
            }
            request
        };

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| KeunError::Search(e.to_string()))?;
            if !response.status().is_success() {
                return Err(KeunError::Search(format!(
                    "concept search returned {}",
                    response.status()
                )));
            }
            let body: SearchResponse = response
                .json()
                .await
                .map_err(|e| KeunError::Search(e.to_string()))?;
            Ok(body.content.into_iter().next())
        }
    }
}
