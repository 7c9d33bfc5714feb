//! # Core Type Definitions
//!
//! This module contains all core types for the Keun mapping engine:
//! - Table and vocabulary identifiers (`RowIndex`, `ConceptId`, `ConceptKey`)
//! - The Usagi working-table row (`UsagiRow`)
//! - Candidate and custom vocabulary concepts (`AthenaConcept`, `CustomConcept`)
//! - Review vocabulary (`MappingStatus`, `Equivalence`, `MappingMode`)
//! - Collaborator values (`User`, `Settings`)
//! - Error types (`KeunError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Implement `Ord` where they key a `BTreeMap`
//! - Carry caller-supplied timestamps; the engine never reads a clock
//! - Serialize under the column names of the Usagi/OMOP file formats

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// TABLE & VOCABULARY IDENTIFIERS
// =============================================================================

/// Stable position of a row in the working table.
/// Indices are assigned once and never reused after a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RowIndex(pub usize);

/// Numeric identifier of a standard vocabulary concept.
/// Custom concepts carry `ConceptId::UNPERSISTED` until persisted upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConceptId(pub i64);

impl ConceptId {
    /// Placeholder id of a custom concept that has not been persisted.
    pub const UNPERSISTED: Self = Self(0);

    /// Get the raw id value.
    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }
}

/// Key of a mapped-concepts index entry.
///
/// Standard concepts are keyed by their numeric id; user-authored concepts
/// have no stable id yet and are keyed by name under a `custom-` prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConceptKey {
    /// A standard vocabulary concept, keyed by id.
    Athena(ConceptId),
    /// A user-authored concept, keyed by its name.
    Custom(String),
}

impl ConceptKey {
    /// Build the index key for a mapping candidate.
    #[must_use]
    pub fn for_concept(concept: &AthenaConcept, custom: bool) -> Self {
        if custom {
            Self::Custom(concept.name.clone())
        } else {
            Self::Athena(concept.id)
        }
    }
}

impl std::fmt::Display for ConceptKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Athena(id) => write!(f, "{}", id.value()),
            Self::Custom(name) => write!(f, "custom-{name}"),
        }
    }
}

// =============================================================================
// REVIEW VOCABULARY
// =============================================================================

/// Review status of a row, also the action vocabulary of the mapped index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MappingStatus {
    /// Reviewed and rejected, or explicitly reset.
    #[serde(rename = "UNAPPROVED")]
    Unapproved,
    /// Mapped and signed off by one author; awaits a second reviewer.
    #[serde(rename = "SEMI-APPROVED")]
    SemiApproved,
    /// Signed off by a second, distinct reviewer.
    #[serde(rename = "APPROVED")]
    Approved,
    /// Marked for discussion.
    #[serde(rename = "FLAGGED")]
    Flagged,
    /// A concept was found (automapping) but nobody reviewed it yet.
    #[serde(rename = "UNMAPPED")]
    Unmapped,
}

impl MappingStatus {
    /// Get the status as its column string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unapproved => "UNAPPROVED",
            Self::SemiApproved => "SEMI-APPROVED",
            Self::Approved => "APPROVED",
            Self::Flagged => "FLAGGED",
            Self::Unmapped => "UNMAPPED",
        }
    }
}

impl std::fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OMOP equivalence classification of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Equivalence {
    Equal,
    Equivalent,
    Wider,
    Narrower,
    Inexact,
    Unmatched,
    Unreviewed,
}

impl Equivalence {
    /// Get the equivalence as its column string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "EQUAL",
            Self::Equivalent => "EQUIVALENT",
            Self::Wider => "WIDER",
            Self::Narrower => "NARROWER",
            Self::Inexact => "INEXACT",
            Self::Unmatched => "UNMATCHED",
            Self::Unreviewed => "UNREVIEWED",
        }
    }
}

/// Policy toggle: may one source code carry several concurrently mapped
/// concepts?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MappingMode {
    /// At most one live mapping per source code; a new mapping evicts the old.
    Single,
    /// Mappings accumulate; one row per (source code, concept) pair.
    Multiple,
}

// =============================================================================
// USAGI ROW
// =============================================================================

/// One row of the working table: a source code and its current mapping state.
///
/// Rows are not unique per source code — with multiple mapping enabled every
/// additional concept mapped to a source code gets its own row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UsagiRow {
    // Source columns, set at import and never touched by the engine.
    pub source_code: String,
    pub source_name: String,
    pub source_frequency: Option<i64>,

    // Mapped-concept columns. All null while the row is unmapped.
    pub concept_id: Option<ConceptId>,
    pub concept_name: Option<String>,
    pub domain_id: Option<String>,
    pub vocabulary_id: Option<String>,
    pub class_name: Option<String>,
    /// Concept ids suggested by the source system, promoted on first approval.
    pub source_auto_assigned_concept_ids: Option<String>,

    // Review columns.
    pub equivalence: Option<Equivalence>,
    pub mapping_status: Option<MappingStatus>,
    pub status_set_by: Option<String>,
    pub status_set_on: Option<DateTime<Utc>>,
    pub created_by: Option<String>,
    pub created_on: Option<DateTime<Utc>>,
    pub match_score: Option<f64>,
    pub mapping_type: Option<String>,
    pub comment: Option<String>,
    pub assigned_reviewer: Option<String>,

    // Audit columns, exported under their ADD_INFO prefix.
    #[serde(rename = "ADD_INFO:approvedBy")]
    pub approved_by: Option<String>,
    #[serde(rename = "ADD_INFO:approvedOn")]
    pub approved_on: Option<DateTime<Utc>>,
    #[serde(rename = "ADD_INFO:numberOfConcepts")]
    pub number_of_concepts: Option<u32>,
    #[serde(rename = "ADD_INFO:customConcept")]
    pub custom_concept: Option<bool>,
    #[serde(rename = "ADD_INFO:lastAthenaFilter")]
    pub last_athena_filter: Option<String>,
}

impl UsagiRow {
    /// Create a fresh, unmapped row for an imported source code.
    #[must_use]
    pub fn from_source(
        source_code: impl Into<String>,
        source_name: impl Into<String>,
        source_frequency: Option<i64>,
    ) -> Self {
        Self {
            source_code: source_code.into(),
            source_name: source_name.into(),
            source_frequency,
            ..Self::default()
        }
    }

    /// Does this row currently carry a mapped concept?
    ///
    /// A custom concept counts once its name is filled in; a standard concept
    /// counts once the id is set.
    #[must_use]
    pub fn has_mapped_concept(&self) -> bool {
        if self.custom_concept == Some(true) {
            self.concept_name.is_some()
        } else {
            self.concept_id.is_some()
        }
    }

    /// The index key of the concept this row carries, if any.
    #[must_use]
    pub fn concept_key(&self) -> Option<ConceptKey> {
        if self.custom_concept == Some(true) {
            self.concept_name.clone().map(ConceptKey::Custom)
        } else {
            self.concept_id.map(ConceptKey::Athena)
        }
    }
}

// =============================================================================
// CANDIDATE CONCEPT (ATHENA SHAPE)
// =============================================================================

/// A candidate target concept, in the shape the Athena concept search returns.
///
/// Custom concepts are transformed into this shape before mapping, so the
/// policy engine only ever sees one candidate representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AthenaConcept {
    pub id: ConceptId,
    pub name: String,
    pub domain: String,
    pub vocabulary: String,
    pub class_name: String,
    #[serde(default)]
    pub standard_concept: Option<String>,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub invalid_reason: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

// =============================================================================
// CUSTOM CONCEPT
// =============================================================================

/// A user-authored vocabulary entry, stored under the OMOP concept columns.
///
/// Created when a source code has no acceptable match in the standard
/// vocabulary. Never mutated after creation; deleted when the last row
/// referencing it loses its mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomConcept {
    pub concept_id: ConceptId,
    pub concept_name: String,
    pub domain_id: String,
    pub vocabulary_id: String,
    pub concept_class_id: String,
    pub standard_concept: Option<String>,
    /// The source code of the row the concept was authored for.
    pub concept_code: String,
    pub valid_start_date: NaiveDate,
    pub valid_end_date: NaiveDate,
    pub invalid_reason: Option<String>,
}

impl CustomConcept {
    /// The open-ended validity sentinel used for user-authored concepts.
    #[must_use]
    pub fn valid_end_sentinel() -> NaiveDate {
        NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or(NaiveDate::MAX)
    }

    /// Transform into the candidate shape the mapping policy consumes.
    #[must_use]
    pub fn to_athena(&self) -> AthenaConcept {
        AthenaConcept {
            id: self.concept_id,
            name: self.concept_name.clone(),
            domain: self.domain_id.clone(),
            vocabulary: self.vocabulary_id.clone(),
            class_name: self.concept_class_id.clone(),
            standard_concept: self.standard_concept.clone(),
            code: self.concept_code.clone(),
            invalid_reason: self.invalid_reason.clone(),
            score: None,
        }
    }
}

/// The fields a user fills in when authoring a custom concept.
/// The engine supplies the rest (id, code, validity window).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomConceptDraft {
    pub concept_name: String,
    pub concept_class_id: String,
    pub domain_id: String,
    pub vocabulary_id: String,
}

// =============================================================================
// COLLABORATOR VALUES
// =============================================================================

/// The authenticated reviewer acting on the table.
///
/// Every state-changing operation is a no-op without a named user.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct User {
    pub uid: Option<String>,
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl User {
    /// Create a named user.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            uid: None,
            name: Some(name.into()),
            roles: Vec::new(),
        }
    }
}

/// Session settings consumed by the engine.
///
/// Toggling `map_to_multiple_concepts` changes which policy handles the next
/// mapping; it never rewrites already-stored data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub map_to_multiple_concepts: bool,
    pub auto_map: bool,
    pub language: String,
}

impl Settings {
    /// The policy variant the current settings select.
    #[must_use]
    pub const fn mapping_mode(&self) -> MappingMode {
        if self.map_to_multiple_concepts {
            MappingMode::Multiple
        } else {
            MappingMode::Single
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            map_to_multiple_concepts: false,
            auto_map: true,
            language: "en".to_string(),
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors of the mapping engine and its application layer.
///
/// Precondition failures (missing source code, unauthenticated user) are NOT
/// errors — operations report them as skipped outcomes, keeping interactive
/// editing fail-quiet.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum KeunError {
    /// The addressed row does not exist in the working table.
    #[error("Row not found: {0:?}")]
    RowNotFound(RowIndex),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// The concept search endpoint failed.
    #[error("Concept search failed: {0}")]
    Search(String),

    /// The translation service failed.
    #[error("Translation failed: {0}")]
    Translation(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concept_key_display_matches_index_encoding() {
        assert_eq!(ConceptKey::Athena(ConceptId(4329847)).to_string(), "4329847");
        assert_eq!(
            ConceptKey::Custom("Chest pain at rest".to_string()).to_string(),
            "custom-Chest pain at rest"
        );
    }

    #[test]
    fn mapping_status_serializes_to_column_strings() {
        let json = serde_json::to_string(&MappingStatus::SemiApproved).expect("serialize");
        assert_eq!(json, "\"SEMI-APPROVED\"");
        let back: MappingStatus = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, MappingStatus::SemiApproved);
    }

    #[test]
    fn usagi_row_round_trips_add_info_columns() {
        let mut row = UsagiRow::from_source("C1", "chest pain", Some(12));
        row.number_of_concepts = Some(2);
        row.custom_concept = Some(false);

        let json = serde_json::to_string(&row).expect("serialize");
        assert!(json.contains("\"ADD_INFO:numberOfConcepts\":2"));

        let back: UsagiRow = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, row);
    }

    #[test]
    fn fresh_row_has_no_mapped_concept() {
        let row = UsagiRow::from_source("C1", "chest pain", None);
        assert!(!row.has_mapped_concept());
        assert_eq!(row.concept_key(), None);
    }

    #[test]
    fn custom_row_counts_as_mapped_once_named() {
        let mut row = UsagiRow::from_source("C1", "chest pain", None);
        row.custom_concept = Some(true);
        assert!(!row.has_mapped_concept());

        row.concept_name = Some("Chest pain at rest".to_string());
        assert!(row.has_mapped_concept());
        assert_eq!(
            row.concept_key(),
            Some(ConceptKey::Custom("Chest pain at rest".to_string()))
        );
    }

    #[test]
    fn settings_select_the_mapping_mode() {
        let mut settings = Settings::default();
        assert_eq!(settings.mapping_mode(), MappingMode::Single);
        settings.map_to_multiple_concepts = true;
        assert_eq!(settings.mapping_mode(), MappingMode::Multiple);
    }

    #[test]
    fn custom_concept_transforms_to_candidate_shape() {
        let concept = CustomConcept {
            concept_id: ConceptId::UNPERSISTED,
            concept_name: "Chest pain at rest".to_string(),
            domain_id: "Condition".to_string(),
            vocabulary_id: "KeunCustom".to_string(),
            concept_class_id: "Clinical Finding".to_string(),
            standard_concept: None,
            concept_code: "C1".to_string(),
            valid_start_date: NaiveDate::from_ymd_opt(2026, 8, 7).expect("date"),
            valid_end_date: CustomConcept::valid_end_sentinel(),
            invalid_reason: None,
        };

        let candidate = concept.to_athena();
        assert_eq!(candidate.id, ConceptId::UNPERSISTED);
        assert_eq!(candidate.domain, "Condition");
        assert_eq!(candidate.class_name, "Clinical Finding");
        assert_eq!(candidate.code, "C1");
    }
}
