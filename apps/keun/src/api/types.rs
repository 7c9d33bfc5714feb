//! # API Request/Response Types
//!
//! Wire types for the Keun HTTP API. Engine types (`UsagiRow`,
//! `AthenaConcept`, ...) serialize under their own column names; the
//! envelope fields here are plain snake_case.

use keun_core::{
    AthenaConcept, CustomConceptDraft, Equivalence, MappingOutcome, MappingStatus,
    RemovalOutcome, ReviewOutcome, SessionStatus, Settings, User, UsagiRow,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// HEALTH & STATUS
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Session status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub row_count: usize,
    pub custom_concept_count: usize,
    pub mapped_source_count: usize,
    pub mapped_entry_count: usize,
    pub table_disabled: bool,
}

impl StatusResponse {
    /// Build from the engine's counters.
    #[must_use]
    pub fn from_status(status: SessionStatus, table_disabled: bool) -> Self {
        Self {
            row_count: status.row_count,
            custom_concept_count: status.custom_concept_count,
            mapped_source_count: status.mapped_source_count,
            mapped_entry_count: status.mapped_entry_count,
            table_disabled,
        }
    }
}

// =============================================================================
// DATASET
// =============================================================================

/// Load a dataset into the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRowsRequest {
    pub rows: Vec<UsagiRow>,
}

/// Result of a dataset load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRowsResponse {
    pub loaded: usize,
}

/// Page query for row listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RowsQuery {
    pub page: Option<usize>,
    pub size: Option<usize>,
}

/// One page of rows with their stable indices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowsResponse {
    pub indices: Vec<usize>,
    pub rows: Vec<UsagiRow>,
    pub total: usize,
}

/// Full dataset export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub rows: Vec<UsagiRow>,
    pub custom_concepts: Vec<keun_core::CustomConcept>,
}

// =============================================================================
// MAPPING
// =============================================================================

/// Map a candidate concept onto a row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapRequest {
    pub row_index: usize,
    pub concept: AthenaConcept,
    #[serde(default = "default_equivalence")]
    pub equivalence: Equivalence,
    #[serde(default = "default_action")]
    pub action: MappingStatus,
    #[serde(default)]
    pub custom: bool,
}

fn default_equivalence() -> Equivalence {
    Equivalence::Equal
}

fn default_action() -> MappingStatus {
    MappingStatus::SemiApproved
}

/// Author a custom concept for a row and map it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomMapRequest {
    pub row_index: usize,
    pub concept: CustomConceptDraft,
    #[serde(default = "default_equivalence")]
    pub equivalence: Equivalence,
    #[serde(default = "default_action")]
    pub action: MappingStatus,
}

/// Result of a mapping operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapResponse {
    pub outcome: String,
    pub row_index: Option<usize>,
    pub inserted: Option<bool>,
}

impl From<MappingOutcome> for MapResponse {
    fn from(outcome: MappingOutcome) -> Self {
        match outcome {
            MappingOutcome::Applied { row_index, inserted } => Self {
                outcome: "applied".to_string(),
                row_index: Some(row_index.0),
                inserted: Some(inserted),
            },
            MappingOutcome::Unchanged => Self {
                outcome: "unchanged".to_string(),
                row_index: None,
                inserted: None,
            },
            MappingOutcome::Skipped => Self {
                outcome: "skipped".to_string(),
                row_index: None,
                inserted: None,
            },
        }
    }
}

// =============================================================================
// REVIEW & REMOVAL
// =============================================================================

/// Result of a review transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub updated: bool,
}

impl From<ReviewOutcome> for ReviewResponse {
    fn from(outcome: ReviewOutcome) -> Self {
        Self {
            updated: outcome == ReviewOutcome::Updated,
        }
    }
}

/// Reviewer-facing mapping details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailsRequest {
    pub comment: Option<String>,
    pub assigned_reviewer: Option<String>,
}

/// Result of a row delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub outcome: String,
}

impl From<RemovalOutcome> for DeleteResponse {
    fn from(outcome: RemovalOutcome) -> Self {
        let outcome = match outcome {
            RemovalOutcome::Reset => "reset",
            RemovalOutcome::Deleted => "deleted",
            RemovalOutcome::Skipped => "skipped",
        };
        Self {
            outcome: outcome.to_string(),
        }
    }
}

// =============================================================================
// SESSION CONFIGURATION
// =============================================================================

/// Set the active reviewer.
pub type UserRequest = User;

/// Replace the session settings.
pub type SettingsRequest = Settings;

// =============================================================================
// AUTOMAPPING
// =============================================================================

/// Start a page automap batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutomapPageRequest {
    pub domain: Option<String>,
}

/// Start a single-row automap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomapRowRequest {
    pub row_index: usize,
    pub domain: Option<String>,
}

/// Acknowledgement of an automap trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomapResponse {
    pub started: bool,
}

// =============================================================================
// ERRORS
// =============================================================================

/// Error envelope for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    /// Build from any displayable error.
    #[must_use]
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}
