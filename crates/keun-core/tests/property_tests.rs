//! # Property-Based Tests
//!
//! Proptest invariants for the reconciliation engine.
//!
//! These pin the engine's consistency guarantees under arbitrary operation
//! sequences: mode discipline, idempotence, the concept-count invariant, and
//! the one-row-per-source-code base case.

use chrono::{DateTime, TimeZone, Utc};
use keun_core::{
    AthenaConcept, ConceptId, Equivalence, MappingSession, MappingStatus, RowIndex, Settings,
    User, UsagiRow,
};
use proptest::collection::vec;
use proptest::prelude::*;

// =============================================================================
// GENERATORS & HELPERS
// =============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 7, 15, 0, 0).single().expect("timestamp")
}

fn concept(id: i64) -> AthenaConcept {
    AthenaConcept {
        id: ConceptId(id),
        name: format!("Concept {id}"),
        domain: "Condition".to_string(),
        vocabulary: "SNOMED".to_string(),
        class_name: "Clinical Finding".to_string(),
        standard_concept: Some("Standard".to_string()),
        code: format!("code-{id}"),
        invalid_reason: None,
        score: None,
    }
}

fn status_from(tag: u8) -> MappingStatus {
    match tag % 5 {
        0 => MappingStatus::SemiApproved,
        1 => MappingStatus::Approved,
        2 => MappingStatus::Flagged,
        3 => MappingStatus::Unapproved,
        _ => MappingStatus::Unmapped,
    }
}

fn session(multiple: bool) -> MappingSession {
    let mut session = MappingSession::with_settings(Settings {
        map_to_multiple_concepts: multiple,
        ..Settings::default()
    });
    session.load_rows(vec![UsagiRow::from_source("S1", "source one", None)]);
    session.set_user(Some(User::named("Alice")));
    session
}

fn map(session: &mut MappingSession, id: i64, status: MappingStatus) {
    session
        .map_concept(
            &concept(id),
            RowIndex(0),
            Equivalence::Equal,
            status,
            false,
            now(),
        )
        .expect("map");
}

// =============================================================================
// PROPERTY TESTS
// =============================================================================

proptest! {
    /// Single mode: any mapping sequence leaves exactly one row and at most
    /// one index entry for the source code.
    #[test]
    fn single_mode_never_grows_the_table(ops in vec((1i64..20, 0u8..5), 1..25)) {
        let mut session = session(false);

        for (id, tag) in ops {
            map(&mut session, id, status_from(tag));
        }

        prop_assert_eq!(session.table().row_count(), 1);
        prop_assert!(session.index().get("S1").len() <= 1);
    }

    /// Multiple mode: every row of a source code always carries
    /// numberOfConcepts equal to the number of rows sharing the code.
    #[test]
    fn concept_count_matches_row_count(ops in vec((1i64..8, 0u8..5), 1..30)) {
        let mut session = session(true);

        for (id, tag) in ops {
            map(&mut session, id, status_from(tag));
        }

        let rows = session.table().rows_with_source_code("S1");
        for row in &rows.rows {
            prop_assert_eq!(row.number_of_concepts, Some(rows.rows.len() as u32));
        }
    }

    /// Multiple mode: the index holds exactly the concepts the rows carry.
    #[test]
    fn index_mirrors_the_mapped_rows(ops in vec((1i64..8, 0u8..5), 1..30)) {
        let mut session = session(true);

        for (id, tag) in ops {
            map(&mut session, id, status_from(tag));
        }

        let rows = session.table().rows_with_source_code("S1");
        let carried: std::collections::BTreeSet<_> =
            rows.rows.iter().filter_map(|row| row.concept_key()).collect();
        let recorded: std::collections::BTreeSet<_> =
            session.index().get("S1").into_keys().collect();
        prop_assert_eq!(carried, recorded);
    }

    /// Repeating every operation immediately is invisible in both modes.
    #[test]
    fn exact_repeat_is_idempotent(multiple in any::<bool>(), ops in vec((1i64..8, 0u8..5), 1..20)) {
        let mut once = session(multiple);
        let mut doubled = session(multiple);

        for (id, tag) in &ops {
            map(&mut once, *id, status_from(*tag));
            map(&mut doubled, *id, status_from(*tag));
            map(&mut doubled, *id, status_from(*tag));
        }

        prop_assert_eq!(once.table().export_rows(), doubled.table().export_rows());
        prop_assert_eq!(once.index().get("S1"), doubled.index().get("S1"));
    }

    /// Identical operation sequences produce identical sessions.
    #[test]
    fn engine_is_deterministic(multiple in any::<bool>(), ops in vec((1i64..10, 0u8..5), 0..25)) {
        let mut left = session(multiple);
        let mut right = session(multiple);

        for (id, tag) in &ops {
            map(&mut left, *id, status_from(*tag));
            map(&mut right, *id, status_from(*tag));
        }

        prop_assert_eq!(left.table().export_rows(), right.table().export_rows());
        prop_assert_eq!(left.index().get("S1"), right.index().get("S1"));
    }

    /// Deletes never remove the last row of a source code.
    #[test]
    fn source_code_always_keeps_a_row(
        ops in vec((1i64..6, 0u8..5), 1..15),
        deletes in vec(0usize..20, 1..15)
    ) {
        let mut session = session(true);

        for (id, tag) in ops {
            map(&mut session, id, status_from(tag));
        }
        for index in deletes {
            session.delete_row(RowIndex(index)).expect("delete");
        }

        prop_assert!(!session.table().rows_with_source_code("S1").is_empty());
    }
}
