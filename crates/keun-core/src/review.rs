//! # Row Review
//!
//! User-driven status transitions on a single working-table row:
//! approve, flag, and unapprove, plus the direct approve from the concept
//! detail view and mapping-detail updates.
//!
//! Approval is a two-person rule: the author who set SEMI-APPROVED cannot
//! promote their own row; a second, distinct reviewer moves it to APPROVED.
//! Once fully approved, further approvals are no-ops.
//!
//! Every transition is fail-quiet: no authenticated user, no such row, or no
//! transition to make all report [`ReviewOutcome::Unchanged`].

use crate::table::WorkTable;
use crate::{ConceptId, KeunError, MappedIndex, MappingStatus, RowIndex, User, UsagiRow};
use chrono::{DateTime, Utc};

// =============================================================================
// OUTCOME
// =============================================================================

/// What a review transition did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The row was rewritten.
    Updated,
    /// No transition applied; nothing written.
    Unchanged,
}

// =============================================================================
// ROW REVIEW
// =============================================================================

/// Stateless review engine over the working table.
pub struct RowReview;

impl RowReview {
    /// Approve a row.
    ///
    /// - unset/UNAPPROVED/FLAGGED/UNMAPPED -> SEMI-APPROVED, promoting a
    ///   source-auto-assigned concept id if the row has none
    /// - SEMI-APPROVED by someone else -> APPROVED with approver audit
    /// - SEMI-APPROVED by the same author, or already APPROVED -> no-op
    pub fn approve(
        table: &mut WorkTable,
        row_index: RowIndex,
        user: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        let Some(reviewer) = user.and_then(|u| u.name.clone()) else {
            return Ok(ReviewOutcome::Unchanged);
        };
        let Some(row) = table.get_row(row_index) else {
            return Ok(ReviewOutcome::Unchanged);
        };

        let semi = row.mapping_status == Some(MappingStatus::SemiApproved);
        let full = row.mapping_status == Some(MappingStatus::Approved);
        let same_author = row.status_set_by.as_deref() == Some(reviewer.as_str());

        if same_author && (semi || full) {
            return Ok(ReviewOutcome::Unchanged);
        }
        if semi {
            table.update_with(row_index, |row| {
                row.approved_by = Some(reviewer.clone());
                row.approved_on = Some(now);
                row.mapping_status = Some(MappingStatus::Approved);
            })?;
            return Ok(ReviewOutcome::Updated);
        }
        if !full {
            let concept_id = row.concept_id.or_else(|| Self::auto_assigned_id(&row));
            table.update_with(row_index, |row| {
                row.status_set_by = Some(reviewer.clone());
                row.status_set_on = Some(now);
                row.mapping_status = Some(MappingStatus::SemiApproved);
                row.concept_id = concept_id;
            })?;
            return Ok(ReviewOutcome::Updated);
        }
        // Fully approved by someone else: approval is terminal.
        Ok(ReviewOutcome::Unchanged)
    }

    /// Flag a row for discussion. Already-flagged rows are left alone.
    pub fn flag(
        table: &mut WorkTable,
        row_index: RowIndex,
        user: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        Self::set_status(table, row_index, user, now, MappingStatus::Flagged)
    }

    /// Reject a row. Already-unapproved rows are left alone.
    pub fn unapprove(
        table: &mut WorkTable,
        row_index: RowIndex,
        user: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        Self::set_status(table, row_index, user, now, MappingStatus::Unapproved)
    }

    /// Directly approve a mapped row from the concept detail view.
    ///
    /// Skipped for rows pending second review (SEMI-APPROVED). Records the
    /// row's concept as APPROVED in the mapped index before the row commit.
    pub fn approve_mapping(
        table: &mut WorkTable,
        index: &mut MappedIndex,
        row_index: RowIndex,
        user: Option<&User>,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, KeunError> {
        let Some(reviewer) = user.and_then(|u| u.name.clone()) else {
            return Ok(ReviewOutcome::Unchanged);
        };
        let Some(row) = table.get_row(row_index) else {
            return Ok(ReviewOutcome::Unchanged);
        };
        if row.source_code.is_empty()
            || row.mapping_status == Some(MappingStatus::SemiApproved)
        {
            return Ok(ReviewOutcome::Unchanged);
        }

        if let Some(key) = row.concept_key() {
            index.put(&row.source_code, key, MappingStatus::Approved);
        }
        table.update_with(row_index, |row| {
            row.status_set_by = Some(reviewer.clone());
            row.status_set_on = Some(now);
            row.mapping_status = Some(MappingStatus::Approved);
        })?;
        Ok(ReviewOutcome::Updated)
    }

    /// Update the reviewer-facing mapping details on a row.
    pub fn update_details(
        table: &mut WorkTable,
        row_index: RowIndex,
        comment: Option<String>,
        assigned_reviewer: Option<String>,
    ) -> Result<ReviewOutcome, KeunError> {
        if table.get_row(row_index).is_none() {
            return Ok(ReviewOutcome::Unchanged);
        }
        table.update_with(row_index, |row| {
            row.comment = comment;
            row.assigned_reviewer = assigned_reviewer;
        })?;
        Ok(ReviewOutcome::Updated)
    }

    // -------------------------------------------------------------------------
    // HELPERS
    // -------------------------------------------------------------------------

    fn set_status(
        table: &mut WorkTable,
        row_index: RowIndex,
        user: Option<&User>,
        now: DateTime<Utc>,
        status: MappingStatus,
    ) -> Result<ReviewOutcome, KeunError> {
        let Some(reviewer) = user.and_then(|u| u.name.clone()) else {
            return Ok(ReviewOutcome::Unchanged);
        };
        let Some(row) = table.get_row(row_index) else {
            return Ok(ReviewOutcome::Unchanged);
        };
        if row.mapping_status == Some(status) {
            return Ok(ReviewOutcome::Unchanged);
        }
        table.update_with(row_index, |row| {
            row.status_set_by = Some(reviewer.clone());
            row.status_set_on = Some(now);
            row.mapping_status = Some(status);
        })?;
        Ok(ReviewOutcome::Updated)
    }

    /// First numeric id in the source system's auto-assigned concept list.
    fn auto_assigned_id(row: &UsagiRow) -> Option<ConceptId> {
        let raw = row.source_auto_assigned_concept_ids.as_deref()?;
        raw.split(|c: char| !c.is_ascii_digit())
            .find(|token| !token.is_empty())
            .and_then(|token| token.parse::<i64>().ok())
            .map(ConceptId)
    }
}

// =============================================================================
// TESTS
// =============================================================================
