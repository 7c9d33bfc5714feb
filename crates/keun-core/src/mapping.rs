//! # Mapping Policy
//!
//! The central state machine of the engine: given a candidate concept and a
//! working-table row, decide which row(s) to create or rewrite and which
//! mapped-index entries to record.
//!
//! Two policies exist, selected by [`MappingMode`]:
//! - **Single**: a source code has at most one live mapping. Mapping always
//!   overwrites the acted-on row; the index evicts a conflicting key.
//! - **Multiple**: mappings accumulate, one row per (source code, concept)
//!   pair. The first concept for a source code reuses the base row, a known
//!   concept is rewritten in place, and a brand-new concept inserts a row
//!   seeded from the base row. After a write, `ADD_INFO:numberOfConcepts` is
//!   broadcast to every row of the source code.
//!
//! Every path records the index entry BEFORE committing the table write, so
//! duplicate checks made between the two always see the newer state.
//!
//! Preconditions fail quiet: a missing row, an empty source code, or an
//! unauthenticated user produce [`MappingOutcome::Skipped`], never an error.

use crate::table::WorkTable;
use crate::{
    AthenaConcept, ConceptKey, Equivalence, KeunError, MappedIndex, MappingMode, MappingStatus,
    RowIndex, User, UsagiRow,
};
use chrono::{DateTime, Utc};

// =============================================================================
// REQUEST & OUTCOME
// =============================================================================

/// One mapping request: candidate concept, target row, review metadata.
#[derive(Debug, Clone)]
pub struct MappingRequest<'a> {
    /// The candidate concept (an Athena hit, or a transformed custom concept).
    pub concept: &'a AthenaConcept,
    /// The row the user acted on.
    pub row_index: RowIndex,
    /// Equivalence classification chosen for the mapping.
    pub equivalence: Equivalence,
    /// The status the mapping carries afterwards (SEMI-APPROVED on a manual
    /// map, UNMAPPED on an automapped suggestion, ...).
    pub status: MappingStatus,
    /// Whether the candidate is a user-authored concept (changes the index
    /// key to `custom-<name>`).
    pub custom: bool,
}

/// What a mapping operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingOutcome {
    /// A row was rewritten or inserted.
    Applied {
        row_index: RowIndex,
        inserted: bool,
    },
    /// Exact repeat of an already-recorded mapping; nothing written.
    Unchanged,
    /// A precondition failed; nothing written.
    Skipped,
}

// =============================================================================
// MAPPING POLICY
// =============================================================================

/// Stateless policy engine over the working table and the mapped index.
pub struct MappingPolicy;

impl MappingPolicy {
    /// Map a candidate concept onto a row under the given mode.
    pub fn map_row(
        table: &mut WorkTable,
        index: &mut MappedIndex,
        mode: MappingMode,
        user: Option<&User>,
        request: &MappingRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<MappingOutcome, KeunError> {
        let Some(author) = user.and_then(|u| u.name.clone()) else {
            return Ok(MappingOutcome::Skipped);
        };
        match mode {
            MappingMode::Single => {
                Self::apply_single(table, index, mode, &author, request, request.row_index, now)
            }
            MappingMode::Multiple => {
                Self::map_multiple(table, index, &author, request, now)
            }
        }
    }

    // -------------------------------------------------------------------------
    // SINGLE MAPPING
    // -------------------------------------------------------------------------

    /// The single-row procedure: record the index entry, then merge the
    /// candidate into the row at `target` and commit. Never inserts.
    ///
    /// `discipline` is the configured mode, not the code path — when Multiple
    /// mode delegates here (base-row reuse, UNMAPPED overwrite), the index
    /// write must accumulate instead of evicting.
    fn apply_single(
        table: &mut WorkTable,
        index: &mut MappedIndex,
        discipline: MappingMode,
        author: &str,
        request: &MappingRequest<'_>,
        target: RowIndex,
        now: DateTime<Utc>,
    ) -> Result<MappingOutcome, KeunError> {
        let Some(base) = table.get_row(target) else {
            return Ok(MappingOutcome::Skipped);
        };
        if base.source_code.is_empty() {
            return Ok(MappingOutcome::Skipped);
        }

        let key = ConceptKey::for_concept(request.concept, request.custom);
        index.record(discipline, &base.source_code, key.clone(), request.status);

        // Overwriting a row with a different concept leaves the old key
        // dangling unless another row of the source code still carries it.
        // Single discipline already evicted it above.
        if discipline == MappingMode::Multiple {
            if let Some(old_key) = base.concept_key() {
                if old_key != key {
                    let carriers = table.query(|row| {
                        row.source_code == base.source_code
                            && row.concept_key().as_ref() == Some(&old_key)
                    });
                    let other_carrier = carriers.indices.iter().any(|i| *i != target);
                    if !other_carrier {
                        index.remove(&base.source_code, &old_key);
                    }
                }
            }
        }

        let merged = Self::merged_row(&base, request, author, now, 1);
        table.set_row(target, merged)?;
        Ok(MappingOutcome::Applied {
            row_index: target,
            inserted: false,
        })
    }

    // -------------------------------------------------------------------------
    // MULTIPLE MAPPING
    // -------------------------------------------------------------------------

    fn map_multiple(
        table: &mut WorkTable,
        index: &mut MappedIndex,
        author: &str,
        request: &MappingRequest<'_>,
        now: DateTime<Utc>,
    ) -> Result<MappingOutcome, KeunError> {
        let Some(row) = table.get_row(request.row_index) else {
            return Ok(MappingOutcome::Skipped);
        };
        if row.source_code.is_empty() {
            return Ok(MappingOutcome::Skipped);
        }

        let source_code = row.source_code.clone();
        let key = ConceptKey::for_concept(request.concept, request.custom);

        // Exact repeat of a recorded mapping is idempotent.
        let recorded = index.status_of(&source_code, &key);
        if recorded == Some(request.status) {
            return Ok(MappingOutcome::Unchanged);
        }
        let newly_mapped = recorded.is_none();

        let mapped = table.rows_with_source_code(&source_code);
        if mapped.is_empty() {
            // The row vanished between the lookup and the query; nothing to do.
            return Ok(MappingOutcome::Skipped);
        }

        // The base row takes the first concept in place of an insert.
        if !mapped.rows[0].has_mapped_concept() {
            return Self::apply_single(
                table,
                index,
                MappingMode::Multiple,
                author,
                request,
                mapped.indices[0],
                now,
            );
        }

        let count = mapped.len() as u32;
        let broadcast = if newly_mapped { count + 1 } else { count };

        // Re-mapping a concept this source code already carries: rewrite that
        // row in place. The merged row takes count + 1; the broadcast below
        // settles every row at the recorded formula.
        let known = mapped.rows.iter().position(|candidate| {
            candidate.concept_id == Some(request.concept.id)
                && candidate.concept_name.as_deref() == Some(request.concept.name.as_str())
        });
        if let Some(position) = known {
            let target = mapped.indices[position];
            index.record(MappingMode::Multiple, &source_code, key.clone(), request.status);
            if let Some(old_key) = mapped.rows[position].concept_key() {
                if old_key != key {
                    let carriers = table.query(|candidate| {
                        candidate.source_code == source_code
                            && candidate.concept_key().as_ref() == Some(&old_key)
                    });
                    if !carriers.indices.iter().any(|i| *i != target) {
                        index.remove(&source_code, &old_key);
                    }
                }
            }
            let merged = Self::merged_row(&mapped.rows[position], request, author, now, count + 1);
            table.set_row(target, merged)?;
            Self::broadcast_number_of_concepts(table, &source_code, broadcast)?;
            return Ok(MappingOutcome::Applied {
                row_index: target,
                inserted: false,
            });
        }

        // A manual mapping replaces an automapped suggestion in place. The
        // suggestion's concept is gone afterwards, so the settled count is
        // recomputed from the rows that still carry one.
        if row.mapping_status == Some(MappingStatus::Unmapped) {
            let outcome = Self::apply_single(
                table,
                index,
                MappingMode::Multiple,
                author,
                request,
                request.row_index,
                now,
            )?;
            if matches!(outcome, MappingOutcome::Applied { .. }) {
                let carrying = table
                    .query(|candidate| {
                        candidate.source_code == source_code && candidate.has_mapped_concept()
                    })
                    .len() as u32;
                Self::broadcast_number_of_concepts(table, &source_code, carrying)?;
            }
            return Ok(outcome);
        }

        // Brand-new concept for this source code: insert a row seeded from
        // the base row.
        index.record(MappingMode::Multiple, &source_code, key, request.status);
        let merged = Self::merged_row(&mapped.rows[0], request, author, now, count + 1);
        let new_index = table.insert_row(merged)?;
        Self::broadcast_number_of_concepts(table, &source_code, broadcast)?;
        Ok(MappingOutcome::Applied {
            row_index: new_index,
            inserted: true,
        })
    }

    // -------------------------------------------------------------------------
    // MERGE PROCEDURE
    // -------------------------------------------------------------------------

    /// Build the mapped row: the base row overlaid with the candidate's
    /// concept columns and fresh review metadata.
    ///
    /// `createdBy`/`createdOn` are stamped only on first mapping; a re-mapped
    /// row keeps its original creator.
    fn merged_row(
        base: &UsagiRow,
        request: &MappingRequest<'_>,
        author: &str,
        now: DateTime<Utc>,
        number_of_concepts: u32,
    ) -> UsagiRow {
        let concept = request.concept;
        let mut row = base.clone();

        row.concept_id = Some(concept.id);
        row.concept_name = Some(concept.name.clone());
        row.domain_id = Some(concept.domain.clone());
        row.vocabulary_id = Some(concept.vocabulary.clone());
        row.class_name = Some(concept.class_name.clone());

        row.mapping_status = Some(request.status);
        row.status_set_by = Some(author.to_string());
        row.status_set_on = Some(now);
        if row.created_by.is_none() {
            row.created_by = Some(author.to_string());
            row.created_on = Some(now);
        }
        row.equivalence = Some(request.equivalence);
        row.match_score = Some(0.0);
        row.mapping_type = None;
        row.last_athena_filter = None;
        row.number_of_concepts = Some(number_of_concepts);
        row.custom_concept = Some(request.custom);
        row.approved_by = None;
        row.approved_on = None;

        row
    }

    /// Write `ADD_INFO:numberOfConcepts` to every row of a source code.
    fn broadcast_number_of_concepts(
        table: &mut WorkTable,
        source_code: &str,
        number_of_concepts: u32,
    ) -> Result<(), KeunError> {
        let indices = table.rows_with_source_code(source_code).indices;
        for index in indices {
            table.update_with(index, |row| {
                row.number_of_concepts = Some(number_of_concepts);
            })?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
