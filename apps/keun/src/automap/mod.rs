//! # AutoMapper Service
//!
//! Batch automapping: for unmapped rows, translate the source description to
//! English, ask the Athena concept search for the single best standard match,
//! and record it through the mapping policy as an UNMAPPED suggestion.
//!
//! ## Batches and cancellation
//!
//! Two entry points exist: [`AutoMapper::run_page`] (every unmapped row on
//! the current page) and [`AutoMapper::run_row`] (one row). Starting either
//! cancels the in-flight batch — one live [`CancellationToken`] at a time,
//! replaced per invocation. Cancellation is cooperative: the token is checked
//! between steps, an in-flight lookup is allowed to finish and its result is
//! discarded, and already-applied rows stay applied.
//!
//! A page batch disables table interaction for its duration, but only if the
//! table was not already disabled by someone else; a row batch never touches
//! the flag.
//!
//! A failing row is logged and skipped — one bad lookup must not starve the
//! rest of the page.

pub mod athena;
pub mod translate;

pub use athena::AthenaClient;
pub use translate::{AnyTranslator, HttpTranslator, IdentityTranslator};

use chrono::Utc;
use keun_core::{
    AthenaConcept, Equivalence, KeunError, MappingOutcome, MappingSession, MappingStatus,
    RowIndex, UsagiRow,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

// =============================================================================
// COLLABORATOR TRAITS
// =============================================================================

/// Concept search: the single best standard match for a query.
pub trait ConceptSearch: Send + Sync + 'static {
    /// Look up the top standard-concept hit, optionally domain-filtered.
    fn first_standard_match(
        &self,
        query: &str,
        domain: Option<&str>,
    ) -> impl Future<Output = Result<Option<AthenaConcept>, KeunError>> + Send;
}

/// Translation of source descriptions into English.
pub trait Translate: Send + Sync + 'static {
    /// Translate `text` from `language` to English. Implementations pass the
    /// text through unchanged when `language` is empty or already English.
    fn translate(
        &self,
        text: &str,
        language: &str,
    ) -> impl Future<Output = Result<String, KeunError>> + Send;
}

// =============================================================================
// BATCH STATE
// =============================================================================

/// Shared batch bookkeeping: the live token, a generation counter to tell a
/// superseded batch from the current one, and whether this subsystem raised
/// the table's disabled flag.
#[derive(Debug)]
struct BatchState {
    token: CancellationToken,
    generation: u64,
    disabled_by_us: bool,
}

impl Default for BatchState {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            generation: 0,
            disabled_by_us: false,
        }
    }
}

// =============================================================================
// AUTOMAPPER
// =============================================================================

/// The automapping service over one shared session.
pub struct AutoMapper<S, T> {
    session: Arc<RwLock<MappingSession>>,
    search: Arc<S>,
    translator: Arc<T>,
    state: Arc<Mutex<BatchState>>,
}

impl<S, T> Clone for AutoMapper<S, T> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            search: Arc::clone(&self.search),
            translator: Arc::clone(&self.translator),
            state: Arc::clone(&self.state),
        }
    }
}

impl<S: ConceptSearch, T: Translate> AutoMapper<S, T> {
    /// Create a service over a shared session.
    pub fn new(session: Arc<RwLock<MappingSession>>, search: S, translator: T) -> Self {
        Self {
            session,
            search: Arc::new(search),
            translator: Arc::new(translator),
            state: Arc::new(Mutex::new(BatchState::default())),
        }
    }

    /// Automap every unmapped row on the current page.
    ///
    /// Honors the `autoMap` setting. Supersedes any in-flight batch.
    pub async fn run_page(&self, domain: Option<String>) -> Result<(), KeunError> {
        let auto_map = { self.session.read().await.settings().auto_map };
        if !auto_map {
            return Ok(());
        }

        let (token, generation) = self.begin_batch();

        let page = {
            let mut session = self.session.write().await;
            let page = session.table().page_rows();
            if !page.is_empty() && !session.table().is_disabled() {
                session.table_mut().set_disabled(true);
                self.state.lock().unwrap_or_else(|e| e.into_inner()).disabled_by_us = true;
            }
            page
        };

        // Sequential on purpose: one lookup at a time, abandoned at the first
        // cancelled check.
        for (position, row) in page.rows.iter().enumerate() {
            if token.is_cancelled() {
                break;
            }
            if row.concept_id.is_some()
                || row.source_auto_assigned_concept_ids.is_some()
                || row.concept_name.is_some()
            {
                continue;
            }
            let row_index = page.indices[position];
            if let Err(error) = self.map_one(row, row_index, domain.as_deref(), &token).await {
                tracing::warn!(row = row_index.0, %error, "automapping row failed, continuing");
            }
        }

        self.finish_batch(generation).await;
        Ok(())
    }

    /// Automap a single row, regardless of page. Never disables the table.
    pub async fn run_row(&self, index: RowIndex, domain: Option<String>) -> Result<(), KeunError> {
        let (token, generation) = self.begin_batch();

        let row = { self.session.read().await.table().get_row(index) };
        let Some(row) = row else {
            self.finish_batch(generation).await;
            return Ok(());
        };

        let result = self.map_one(&row, index, domain.as_deref(), &token).await;
        self.finish_batch(generation).await;
        result
    }

    /// Cancel the in-flight batch and restore table interaction if this
    /// subsystem had disabled it.
    pub async fn abort(&self) {
        let was_disabled = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state.token.cancel();
            std::mem::take(&mut state.disabled_by_us)
        };
        if was_disabled {
            self.session.write().await.table_mut().set_disabled(false);
        }
    }

    // -------------------------------------------------------------------------
    // INTERNALS
    // -------------------------------------------------------------------------

    /// Supersede the previous batch: cancel its token, issue a fresh one.
    fn begin_batch(&self) -> (CancellationToken, u64) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.token.cancel();
        state.token = CancellationToken::new();
        state.generation = state.generation.saturating_add(1);
        (state.token.clone(), state.generation)
    }

    /// Re-enable the table at batch end, unless a newer batch took over.
    async fn finish_batch(&self, generation: u64) {
        let should_enable = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.generation == generation && state.disabled_by_us {
                state.disabled_by_us = false;
                true
            } else {
                false
            }
        };
        if should_enable {
            self.session.write().await.table_mut().set_disabled(false);
        }
    }

    /// The per-row pipeline: translate, search, map, stamp the filter used.
    async fn map_one(
        &self,
        row: &UsagiRow,
        index: RowIndex,
        domain: Option<&str>,
        token: &CancellationToken,
    ) -> Result<(), KeunError> {
        if token.is_cancelled() || row.source_name.is_empty() {
            return Ok(());
        }

        let language = { self.session.read().await.settings().language.clone() };
        let filter = self.translator.translate(&row.source_name, &language).await?;
        if token.is_cancelled() || filter.is_empty() {
            return Ok(());
        }

        let Some(concept) = self.search.first_standard_match(&filter, domain).await? else {
            return Ok(());
        };
        // A lookup finishing after an abort is discarded, not applied.
        if token.is_cancelled() {
            return Ok(());
        }

        let mut session = self.session.write().await;
        let outcome = session.map_concept(
            &concept,
            index,
            Equivalence::Equal,
            MappingStatus::Unmapped,
            false,
            Utc::now(),
        )?;
        if let MappingOutcome::Applied { row_index, .. } = outcome {
            session.set_last_athena_filter(row_index, Some(filter))?;
        }
        Ok(())
    }
}
