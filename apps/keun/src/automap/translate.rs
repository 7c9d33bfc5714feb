//! # Translators
//!
//! Source descriptions are written in the local language; the concept search
//! only understands English. The translator contract: text in a language
//! that is empty or already English passes through unchanged.

use super::Translate;
use keun_core::KeunError;
use serde::Deserialize;
use std::future::Future;

/// Environment variable naming the translation endpoint.
pub const TRANSLATOR_URL_ENV: &str = "KEUN_TRANSLATOR_URL";

/// Is this language tag already English (or absent)?
fn passes_through(language: &str) -> bool {
    language.is_empty() || language.eq_ignore_ascii_case("en")
}

// =============================================================================
// IDENTITY TRANSLATOR
// =============================================================================

/// No-op translator used when no translation endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTranslator;

impl Translate for IdentityTranslator {
    fn translate(
        &self,
        text: &str,
        _language: &str,
    ) -> impl Future<Output = Result<String, KeunError>> + Send {
        let text = text.to_string();
        async move { Ok(text) }
    }
}

// =============================================================================
// HTTP TRANSLATOR
// =============================================================================

/// Client for a LibreTranslate-compatible translation endpoint.
#[derive(Debug, Clone)]
pub struct HttpTranslator {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTranslator {
    /// Create a client for the given endpoint URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

/// Wire shape of the translation response.
#[derive(Debug, Deserialize)]
struct TranslationResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl Translate for HttpTranslator {
    fn translate(
        &self,
        text: &str,
        language: &str,
    ) -> impl Future<Output = Result<String, KeunError>> + Send {
        let passthrough = passes_through(language);
        let text = text.to_string();
        let request = self.http.post(&self.base_url).json(&serde_json::json!({
            "q": text,
            "source": language,
            "target": "en",
            "format": "text",
        }));

        async move {
            if passthrough {
                return Ok(text);
            }
            let response = request
                .send()
                .await
                .map_err(|e| KeunError::Translation(e.to_string()))?;
            if !response.status().is_success() {
                return Err(KeunError::Translation(format!(
                    "translator returned {}",
                    response.status()
                )));
            }
            let body: TranslationResponse = response
                .json()
                .await
                .map_err(|e| KeunError::Translation(e.to_string()))?;
            Ok(body.translated_text)
        }
    }
}

// =============================================================================
// CONFIG-SELECTED TRANSLATOR
// =============================================================================

/// The translator selected by configuration: HTTP when `KEUN_TRANSLATOR_URL`
/// is set, identity otherwise.
#[derive(Debug, Clone)]
pub enum AnyTranslator {
    Identity(IdentityTranslator),
    Http(HttpTranslator),
}

impl AnyTranslator {
    /// Build from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(TRANSLATOR_URL_ENV) {
            Ok(url) if !url.is_empty() => Self::Http(HttpTranslator::new(url)),
            _ => Self::Identity(IdentityTranslator),
        }
    }
}

impl Translate for AnyTranslator {
    fn translate(
        &self,
        text: &str,
        language: &str,
    ) -> impl Future<Output = Result<String, KeunError>> + Send {
        let inner = self.clone();
        let text = text.to_string();
        let language = language.to_string();
        async move {
            match inner {
                Self::Identity(t) => t.translate(&text, &language).await,
                Self::Http(t) => t.translate(&text, &language).await,
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
