//! # Row Removal
//!
//! Deleting a mapping is the most delicate reconciliation path: it has to
//! keep the one-row-per-source-code base case alive, settle the concept
//! counts of the surviving rows, and clean up the custom-concept table and
//! the mapped index.
//!
//! The rule: a source code's LAST row is never deleted — it is reset in
//! place to the freshly-imported state. Only when at least two rows share
//! the source code is the acted-on row actually removed.

use crate::custom::CustomTable;
use crate::table::WorkTable;
use crate::{KeunError, MappedIndex, RowIndex, UsagiRow};

// =============================================================================
// OUTCOME
// =============================================================================

/// What a delete operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalOutcome {
    /// The row was the last one for its source code and was reset in place.
    Reset,
    /// The row was removed; surviving rows were renumbered.
    Deleted,
    /// The row does not exist; nothing written.
    Skipped,
}

// =============================================================================
// ROW REMOVAL
// =============================================================================

/// Stateless removal engine over the three stores.
pub struct RowRemoval;

impl RowRemoval {
    /// Delete the mapping carried by the row at `row_index`.
    pub fn delete_row(
        table: &mut WorkTable,
        custom: &mut CustomTable,
        index: &mut MappedIndex,
        row_index: RowIndex,
    ) -> Result<RemovalOutcome, KeunError> {
        let Some(row) = table.get_row(row_index) else {
            return Ok(RemovalOutcome::Skipped);
        };

        if row.custom_concept == Some(true) {
            Self::delete_custom_concept(table, custom, &row, row_index)?;
        }

        let shared = table.rows_with_source_code(&row.source_code);
        let concept_key = row.concept_key();

        let outcome = if shared.len() < 2 {
            // Last row of the source code: reset to the imported state.
            table.update_with(row_index, |slot| {
                *slot = UsagiRow::from_source(
                    slot.source_code.clone(),
                    slot.source_name.clone(),
                    slot.source_frequency,
                );
            })?;
            RemovalOutcome::Reset
        } else {
            table.delete_row(row_index)?;
            let survivors = table.rows_with_source_code(&row.source_code).indices;
            let count = (shared.len() - 1) as u32;
            for survivor in survivors {
                table.update_with(survivor, |slot| {
                    slot.number_of_concepts = Some(count);
                })?;
            }
            RemovalOutcome::Deleted
        };

        if let Some(key) = concept_key {
            index.remove(&row.source_code, &key);
        }
        Ok(outcome)
    }

    /// Remove the custom concept a deleted row was mapped to, unless another
    /// row still references it.
    fn delete_custom_concept(
        table: &WorkTable,
        custom: &mut CustomTable,
        row: &UsagiRow,
        row_index: RowIndex,
    ) -> Result<(), KeunError> {
        let (Some(name), Some(domain), Some(vocabulary), Some(class)) = (
            row.concept_name.as_deref(),
            row.domain_id.as_deref(),
            row.vocabulary_id.as_deref(),
            row.class_name.as_deref(),
        ) else {
            return Ok(());
        };

        let references = table.query(|candidate| {
            candidate.custom_concept == Some(true)
                && candidate.concept_name.as_deref() == Some(name)
        });
        if references.indices.iter().any(|i| *i != row_index) {
            return Ok(());
        }

        if let Some(concept_index) = custom.find_by_identity(name, domain, vocabulary, class) {
            custom.delete_row(concept_index)?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{MappingPolicy, MappingRequest};
    use crate::{
        AthenaConcept, ConceptId, ConceptKey, CustomConcept, CustomConceptDraft, Equivalence,
        MappingMode, MappingStatus, User,
    };
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 7, 11, 0, 0).single().expect("timestamp")
    }

    fn concept(id: i64, name: &str) -> AthenaConcept {
        AthenaConcept {
            id: ConceptId(id),
            name: name.to_string(),
            domain: "Condition".to_string(),
            vocabulary: "SNOMED".to_string(),
            class_name: "Clinical Finding".to_string(),
            standard_concept: Some("Standard".to_string()),
            code: format!("code-{id}"),
            invalid_reason: None,
            score: None,
        }
    }

    fn map(
        table: &mut WorkTable,
        index: &mut MappedIndex,
        mode: MappingMode,
        target: &AthenaConcept,
        row_index: RowIndex,
        custom: bool,
    ) {
        let user = User::named("Alice");
        let request = MappingRequest {
            concept: target,
            row_index,
            equivalence: Equivalence::Equal,
            status: MappingStatus::SemiApproved,
            custom,
        };
        MappingPolicy::map_row(table, index, mode, Some(&user), &request, now()).expect("map");
    }

    fn fixture() -> (WorkTable, CustomTable, MappedIndex) {
        let mut table = WorkTable::new();
        table.load_rows(vec![UsagiRow::from_source("S1", "chest pain", Some(3))]);
        (table, CustomTable::new(), MappedIndex::new())
    }

    #[test]
    fn deleting_a_missing_row_is_skipped() {
        let (mut table, mut custom, mut index) = fixture();
        let outcome = RowRemoval::delete_row(&mut table, &mut custom, &mut index, RowIndex(9))
            .expect("delete");
        assert_eq!(outcome, RemovalOutcome::Skipped);
    }

    #[test]
    fn sole_mapping_resets_the_row_in_place() {
        let (mut table, mut custom, mut index) = fixture();
        let target = concept(10, "Concept A");
        map(&mut table, &mut index, MappingMode::Single, &target, RowIndex(0), false);

        let outcome = RowRemoval::delete_row(&mut table, &mut custom, &mut index, RowIndex(0))
            .expect("delete");

        assert_eq!(outcome, RemovalOutcome::Reset);
        assert_eq!(table.row_count(), 1);
        let row = table.get_row(RowIndex(0)).expect("row");
        assert_eq!(row.source_code, "S1");
        assert_eq!(row.source_name, "chest pain");
        assert_eq!(row.source_frequency, Some(3));
        assert_eq!(row.concept_id, None);
        assert_eq!(row.concept_name, None);
        assert_eq!(row.mapping_status, None);
        assert_eq!(row.source_auto_assigned_concept_ids, None);
        assert!(index.is_empty());
    }

    #[test]
    fn one_of_two_mappings_deletes_the_row_and_settles_counts() {
        let (mut table, mut custom, mut index) = fixture();
        let first = concept(10, "Concept A");
        let second = concept(20, "Concept B");
        map(&mut table, &mut index, MappingMode::Multiple, &first, RowIndex(0), false);
        map(&mut table, &mut index, MappingMode::Multiple, &second, RowIndex(0), false);
        assert_eq!(table.row_count(), 2);

        let outcome = RowRemoval::delete_row(&mut table, &mut custom, &mut index, RowIndex(1))
            .expect("delete");

        assert_eq!(outcome, RemovalOutcome::Deleted);
        assert_eq!(table.row_count(), 1);
        let survivor = table.get_row(RowIndex(0)).expect("row");
        assert_eq!(survivor.concept_id, Some(ConceptId(10)));
        assert_eq!(survivor.number_of_concepts, Some(1));

        assert_eq!(index.status_of("S1", &ConceptKey::Athena(ConceptId(20))), None);
        assert_eq!(
            index.status_of("S1", &ConceptKey::Athena(ConceptId(10))),
            Some(MappingStatus::SemiApproved)
        );
    }

    #[test]
    fn deleting_a_custom_row_removes_the_custom_concept() {
        let (mut table, mut custom, mut index) = fixture();
        let draft = CustomConceptDraft {
            concept_name: "Chest pain at rest".to_string(),
            concept_class_id: "Clinical Finding".to_string(),
            domain_id: "Condition".to_string(),
            vocabulary_id: "KeunCustom".to_string(),
        };
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).expect("date");
        let entry = CustomConcept::from_draft(&draft, "S1", today);
        custom.insert_row(entry.clone()).expect("insert");
        map(&mut table, &mut index, MappingMode::Single, &entry.to_athena(), RowIndex(0), true);

        let outcome = RowRemoval::delete_row(&mut table, &mut custom, &mut index, RowIndex(0))
            .expect("delete");

        assert_eq!(outcome, RemovalOutcome::Reset);
        assert!(custom.is_empty());
        assert_eq!(
            index.status_of("S1", &ConceptKey::Custom("Chest pain at rest".to_string())),
            None
        );
    }

    #[test]
    fn custom_concept_survives_while_another_row_references_it() {
        let (mut table, mut custom, mut index) = fixture();
        table.insert_row(UsagiRow::from_source("S2", "rest pain", None)).expect("insert");

        let draft = CustomConceptDraft {
            concept_name: "Chest pain at rest".to_string(),
            concept_class_id: "Clinical Finding".to_string(),
            domain_id: "Condition".to_string(),
            vocabulary_id: "KeunCustom".to_string(),
        };
        let today = NaiveDate::from_ymd_opt(2026, 8, 7).expect("date");
        let entry = CustomConcept::from_draft(&draft, "S1", today);
        custom.insert_row(entry.clone()).expect("insert");

        // Both source codes map to the same custom concept.
        map(&mut table, &mut index, MappingMode::Single, &entry.to_athena(), RowIndex(0), true);
        map(&mut table, &mut index, MappingMode::Single, &entry.to_athena(), RowIndex(1), true);

        RowRemoval::delete_row(&mut table, &mut custom, &mut index, RowIndex(0))
            .expect("delete");

        assert_eq!(custom.row_count(), 1);
        // S2 still carries its mapping and index entry.
        assert_eq!(
            index.status_of("S2", &ConceptKey::Custom("Chest pain at rest".to_string())),
            Some(MappingStatus::SemiApproved)
        );
    }
}
