//! # Mapped Concepts Index
//!
//! The denormalized `sourceCode -> ConceptKey -> MappingStatus` bibliography.
//! This is the single source of truth for "is this (sourceCode, concept)
//! pair already recorded with status X" — the mapping policy consults it
//! before every write, and every operation updates it BEFORE committing the
//! corresponding working-table change.
//!
//! Invariant: an entry exists for `(sourceCode, key)` if and only if some
//! working-table row with that source code currently carries that concept.

use crate::{ConceptKey, MappingMode, MappingStatus};
use std::collections::BTreeMap;

// =============================================================================
// MAPPED INDEX
// =============================================================================

/// The mapped-concepts bibliography.
#[derive(Debug, Clone, Default)]
pub struct MappedIndex {
    entries: BTreeMap<String, BTreeMap<ConceptKey, MappingStatus>>,
}

impl MappedIndex {
    /// Create a new empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded concepts for a source code. Empty map if none.
    #[must_use]
    pub fn get(&self, source_code: &str) -> BTreeMap<ConceptKey, MappingStatus> {
        self.entries.get(source_code).cloned().unwrap_or_default()
    }

    /// The recorded status of one (sourceCode, concept) pair.
    #[must_use]
    pub fn status_of(&self, source_code: &str, key: &ConceptKey) -> Option<MappingStatus> {
        self.entries.get(source_code)?.get(key).copied()
    }

    /// Record a concept under the discipline of the given mapping mode.
    ///
    /// Single mode keeps at most one live key per source code: a conflicting
    /// key is evicted before the new one is inserted. Multiple mode
    /// accumulates keys; re-recording a key overwrites its status in place.
    pub fn record(
        &mut self,
        mode: MappingMode,
        source_code: &str,
        key: ConceptKey,
        status: MappingStatus,
    ) {
        let concepts = self.entries.entry(source_code.to_string()).or_default();
        if mode == MappingMode::Single {
            concepts.retain(|existing, _| *existing == key);
        }
        concepts.insert(key, status);
    }

    /// Record a concept with accumulate semantics regardless of mode.
    ///
    /// Used by the direct approve path, which never evicts.
    pub fn put(&mut self, source_code: &str, key: ConceptKey, status: MappingStatus) {
        self.record(MappingMode::Multiple, source_code, key, status);
    }

    /// Remove one (sourceCode, concept) entry. Absent entries are a no-op.
    pub fn remove(&mut self, source_code: &str, key: &ConceptKey) {
        if let Some(concepts) = self.entries.get_mut(source_code) {
            concepts.remove(key);
            if concepts.is_empty() {
                self.entries.remove(source_code);
            }
        }
    }

    /// Clear the index entirely. Called at dataset-load time.
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    /// Number of source codes with at least one recorded concept.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.entries.len()
    }

    /// Total number of (sourceCode, concept) entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }

    /// True when nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
