//! # keun-core
//!
//! The deterministic mapping engine for Keun - THE LOGIC.
//!
//! Keun curates mappings between locally-sourced clinical codes and standard
//! OMOP/Athena vocabulary concepts. This crate keeps three views of the same
//! row-oriented dataset consistent:
//! - the Usagi working table of source codes and their mapping status
//! - the denormalized mapped-concepts index used for duplicate/conflict checks
//! - the custom-concept table of user-authored vocabulary entries
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where mapping state lives (stateful)
//! - Has NO async, NO network dependencies (pure Rust)
//! - Never reads a clock; callers inject user, settings, and timestamps
//! - Uses `BTreeMap` collections for deterministic ordering
//!
//! Network lookups (concept search, translation) and scheduling live in the
//! application binary, which drives this engine through [`MappingSession`].

// =============================================================================
// MODULES
// =============================================================================

pub mod custom;
pub mod index;
pub mod mapping;
pub mod removal;
pub mod review;
pub mod session;
pub mod table;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AthenaConcept, ConceptId, ConceptKey, CustomConcept, CustomConceptDraft, Equivalence,
    KeunError, MappingMode, MappingStatus, RowIndex, Settings, UsagiRow, User,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use custom::CustomTable;
pub use index::MappedIndex;
pub use mapping::{MappingOutcome, MappingPolicy, MappingRequest};
pub use removal::{RemovalOutcome, RowRemoval};
pub use review::{ReviewOutcome, RowReview};
pub use session::{MappingSession, SessionStatus};
pub use table::{Pagination, QueryResult, WorkTable};
