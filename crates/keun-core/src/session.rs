//! # Mapping Session
//!
//! The dependency-injection container for the engine: one session owns the
//! working table, the custom-concept table, the mapped index, the settings,
//! and the active user, and exposes the whole operation surface the
//! application drives.
//!
//! The session is deliberately clock-free: every stamping operation takes
//! `now` from the caller, which keeps the engine deterministic and tests
//! exact.

use crate::custom::CustomTable;
use crate::mapping::{MappingOutcome, MappingPolicy, MappingRequest};
use crate::removal::{RemovalOutcome, RowRemoval};
use crate::review::{ReviewOutcome, RowReview};
use crate::table::WorkTable;
use crate::{
    AthenaConcept, CustomConcept, CustomConceptDraft, Equivalence, KeunError, MappedIndex,
    MappingStatus, RowIndex, Settings, User, UsagiRow,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

// =============================================================================
// STATUS SNAPSHOT
// =============================================================================

/// Counters summarizing the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub row_count: usize,
    pub custom_concept_count: usize,
    pub mapped_source_count: usize,
    pub mapped_entry_count: usize,
}

// =============================================================================
// MAPPING SESSION
// =============================================================================

/// One curation session over an imported dataset.
#[derive(Debug, Clone, Default)]
pub struct MappingSession {
    table: WorkTable,
    custom: CustomTable,
    index: MappedIndex,
    settings: Settings,
    user: Option<User>,
}

impl MappingSession {
    /// Create an empty session with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty session with the given settings.
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    // -------------------------------------------------------------------------
    // DATASET
    // -------------------------------------------------------------------------

    /// Replace the dataset.
    ///
    /// The mapped index is rebuilt from the loaded rows so that a re-opened
    /// dataset satisfies the index invariant from the first duplicate check.
    pub fn load_rows(&mut self, rows: Vec<UsagiRow>) {
        self.table.load_rows(rows);
        self.index.reset();
        for (_, row) in self.table.iter() {
            if let Some(key) = row.concept_key() {
                let status = row.mapping_status.unwrap_or(MappingStatus::Unapproved);
                self.index.put(&row.source_code, key, status);
            }
        }
    }

    // -------------------------------------------------------------------------
    // COLLABORATOR ACCESS
    // -------------------------------------------------------------------------

    /// The working table.
    #[must_use]
    pub fn table(&self) -> &WorkTable {
        &self.table
    }

    /// Mutable working table, for pagination and the interaction flag.
    pub fn table_mut(&mut self) -> &mut WorkTable {
        &mut self.table
    }

    /// The custom-concept table.
    #[must_use]
    pub fn custom(&self) -> &CustomTable {
        &self.custom
    }

    /// The mapped-concepts index.
    #[must_use]
    pub fn index(&self) -> &MappedIndex {
        &self.index
    }

    /// The session settings.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Replace the session settings.
    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    /// The active user, if authenticated.
    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Set or clear the active user.
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }

    /// Counters for status reporting.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            row_count: self.table.row_count(),
            custom_concept_count: self.custom.row_count(),
            mapped_source_count: self.index.source_count(),
            mapped_entry_count: self.index.entry_count(),
        }
    }

    // -------------------------------------------------------------------------
    // MAPPING OPERATIONS
    // -------------------------------------------------------------------------

    /// Map a candidate concept onto a row under the configured mode.
    pub fn map_concept(
        &mut self,
        concept: &AthenaConcept,
        row_index: RowIndex,
        equivalence: Equivalence,
        status: MappingStatus,
        custom: bool,
        now: DateTime<Utc>,
    ) -> Result<MappingOutcome, KeunError> {
        let request = MappingRequest {
            concept,
            row_index,
            equivalence,
            status,
            custom,
        };
        MappingPolicy::map_row(
            &mut self.table,
            &mut self.index,
            self.settings.mapping_mode(),
            self.user.as_ref(),
            &request,
            now,
        )
    }

    /// Author a custom concept for a row and map it.
    ///
    /// The concept is stored in the custom table first, then mapped through
    /// the regular policy with the `custom-<name>` index key.
    pub fn map_custom_concept(
        &mut self,
        draft: &CustomConceptDraft,
        row_index: RowIndex,
        equivalence: Equivalence,
        status: MappingStatus,
        now: DateTime<Utc>,
    ) -> Result<MappingOutcome, KeunError> {
        if self.user.as_ref().and_then(|u| u.name.as_deref()).is_none() {
            return Ok(MappingOutcome::Skipped);
        }
        let Some(row) = self.table.get_row(row_index) else {
            return Ok(MappingOutcome::Skipped);
        };
        if row.source_code.is_empty() {
            return Ok(MappingOutcome::Skipped);
        }

        let concept = CustomConcept::from_draft(draft, &row.source_code, now.date_naive());
        self.custom.insert_row(concept.clone())?;
        let candidate = concept.to_athena();
        self.map_concept(&candidate, row_index, equivalence, status, true, now)
    }

    /// Stamp the Athena filter string an automapping run used for a row.
    pub fn set_last_athena_filter(
        &mut self,
        row_index: RowIndex,
        filter: Option<String>,
    ) -> Result<(), KeunError> {
        self.table.update_with(row_index, |row| {
            row.last_athena_filter = filter;
        })
    }

    // -------------------------------------------------------------------------
    // REVIEW OPERATIONS
    // -------------------------------------------------------------------------

    /// Approve the row (two-person rule; see [`RowReview::approve`]).
    pub fn approve_row(
        &mut self,
        row_index: RowIndex,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        RowReview::approve(&mut self.table, row_index, self.user.as_ref(), now)
    }

    /// Flag the row for discussion.
    pub fn flag_row(
        &mut self,
        row_index: RowIndex,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        RowReview::flag(&mut self.table, row_index, self.user.as_ref(), now)
    }

    /// Reject the row.
    pub fn unapprove_row(
        &mut self,
        row_index: RowIndex,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        RowReview::unapprove(&mut self.table, row_index, self.user.as_ref(), now)
    }

    /// Directly approve a mapped row from the concept detail view.
    pub fn approve_mapping(
        &mut self,
        row_index: RowIndex,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        RowReview::approve_mapping(
            &mut self.table,
            &mut self.index,
            row_index,
            self.user.as_ref(),
            now,
        )
    }

    /// Update the reviewer-facing details on a row.
    pub fn update_mapping_details(
        &mut self,
        row_index: RowIndex,
        comment: Option<String>,
        assigned_reviewer: Option<String>,
    ) -> Result<ReviewOutcome, KeunError> {
        RowReview::update_details(&mut self.table, row_index, comment, assigned_reviewer)
    }

    // -------------------------------------------------------------------------
    // REMOVAL
    // -------------------------------------------------------------------------

    /// Delete the mapping carried by a row (reset-or-remove semantics).
    pub fn delete_row(&mut self, row_index: RowIndex) -> Result<RemovalOutcome, KeunError> {
        RowRemoval::delete_row(
            &mut self.table,
            &mut self.custom,
            &mut self.index,
            row_index,
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
