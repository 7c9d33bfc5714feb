//! # Custom Concept Table
//!
//! Store for user-authored vocabulary entries. A custom concept is created
//! when a source code has no acceptable match in the standard vocabulary,
//! then mapped like any Athena candidate via [`CustomConcept::to_athena`].
//!
//! Entries are immutable once created; the only mutation is deletion, driven
//! by row removal when no working-table row references the concept anymore.

use crate::{ConceptId, CustomConcept, CustomConceptDraft, KeunError, RowIndex};
use chrono::NaiveDate;
use std::collections::BTreeMap;

// =============================================================================
// CUSTOM TABLE
// =============================================================================

/// The custom-concept table, indexed like the working table.
#[derive(Debug, Clone, Default)]
pub struct CustomTable {
    rows: BTreeMap<RowIndex, CustomConcept>,
    next_index: usize,
}

impl CustomTable {
    /// Create a new empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of custom concepts.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when no custom concept exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a snapshot of the concept at `index`.
    #[must_use]
    pub fn get_row(&self, index: RowIndex) -> Option<CustomConcept> {
        self.rows.get(&index).cloned()
    }

    /// Append a concept, returning its stable index.
    pub fn insert_row(&mut self, concept: CustomConcept) -> Result<RowIndex, KeunError> {
        let index = RowIndex(self.next_index);
        self.next_index = self.next_index.saturating_add(1);
        self.rows.insert(index, concept);
        Ok(index)
    }

    /// Delete the concept at `index`. Deleting an absent entry is a no-op.
    pub fn delete_row(&mut self, index: RowIndex) -> Result<(), KeunError> {
        self.rows.remove(&index);
        Ok(())
    }

    /// Find the first concept matching the identity a mapped row carries.
    ///
    /// Identity is the tuple a Usagi row records about its concept:
    /// name, domain, vocabulary, and class.
    #[must_use]
    pub fn find_by_identity(
        &self,
        concept_name: &str,
        domain_id: &str,
        vocabulary_id: &str,
        concept_class_id: &str,
    ) -> Option<RowIndex> {
        self.rows.iter().find_map(|(index, concept)| {
            let matches = concept.concept_name == concept_name
                && concept.domain_id == domain_id
                && concept.vocabulary_id == vocabulary_id
                && concept.concept_class_id == concept_class_id;
            matches.then_some(*index)
        })
    }

    /// Snapshot of all concepts in index order, for export.
    #[must_use]
    pub fn export_rows(&self) -> Vec<CustomConcept> {
        self.rows.values().cloned().collect()
    }
}

// =============================================================================
// DRAFT EXPANSION
// =============================================================================

impl CustomConcept {
    /// Expand a user draft into a full concept for the origin row.
    ///
    /// The id stays [`ConceptId::UNPERSISTED`] until an upstream vocabulary
    /// assigns one; the concept code records the origin source code; the
    /// validity window runs from `today` to the 2099-12-31 sentinel.
    #[must_use]
    pub fn from_draft(draft: &CustomConceptDraft, source_code: &str, today: NaiveDate) -> Self {
        Self {
            concept_id: ConceptId::UNPERSISTED,
            concept_name: draft.concept_name.clone(),
            domain_id: draft.domain_id.clone(),
            vocabulary_id: draft.vocabulary_id.clone(),
            concept_class_id: draft.concept_class_id.clone(),
            standard_concept: None,
            concept_code: source_code.to_string(),
            valid_start_date: today,
            valid_end_date: Self::valid_end_sentinel(),
            invalid_reason: None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
