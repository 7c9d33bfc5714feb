//! Integration tests for the full curation flow over a session.
//!
//! These walk the engine the way the application does: import, map (manually
//! or from an automapped suggestion), review with two users, and delete.

use chrono::{DateTime, TimeZone, Utc};
use keun_core::{
    AthenaConcept, ConceptId, ConceptKey, Equivalence, MappingSession, MappingStatus,
    RemovalOutcome, RowIndex, Settings, User, UsagiRow,
};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 7, 14, 0, 0).single().expect("timestamp")
}

fn concept(id: i64, name: &str, domain: &str) -> AthenaConcept {
    AthenaConcept {
        id: ConceptId(id),
        name: name.to_string(),
        domain: domain.to_string(),
        vocabulary: "SNOMED".to_string(),
        class_name: "Clinical Finding".to_string(),
        standard_concept: Some("Standard".to_string()),
        code: format!("code-{id}"),
        invalid_reason: None,
        score: None,
    }
}

fn session_with(codes: &[(&str, &str)]) -> MappingSession {
    let mut session = MappingSession::new();
    session.load_rows(
        codes
            .iter()
            .map(|(code, name)| UsagiRow::from_source(*code, *name, None))
            .collect(),
    );
    session
}

// =============================================================================
// THE CANONICAL SCENARIO
// =============================================================================

/// Import -> automapped suggestion -> semi-approval -> full approval.
#[test]
fn suggestion_then_two_person_approval() {
    let mut session = session_with(&[("C1", "chest pain")]);
    session.set_user(Some(User::named("Alice")));

    // The automapper found a match and records it as an unreviewed suggestion.
    let suggestion = concept(42, "Chest pain", "Condition");
    session
        .map_concept(
            &suggestion,
            RowIndex(0),
            Equivalence::Equal,
            MappingStatus::Unmapped,
            false,
            now(),
        )
        .expect("map");

    let row = session.table().get_row(RowIndex(0)).expect("row");
    assert_eq!(row.concept_id, Some(ConceptId(42)));
    assert_eq!(row.concept_name.as_deref(), Some("Chest pain"));
    assert_eq!(row.domain_id.as_deref(), Some("Condition"));
    assert_eq!(row.mapping_status, Some(MappingStatus::Unmapped));
    assert_eq!(row.number_of_concepts, Some(1));

    // Alice signs off once.
    session.approve_row(RowIndex(0), now()).expect("approve");
    let row = session.table().get_row(RowIndex(0)).expect("row");
    assert_eq!(row.mapping_status, Some(MappingStatus::SemiApproved));
    assert_eq!(row.status_set_by.as_deref(), Some("Alice"));

    // Alice cannot approve her own sign-off.
    session.approve_row(RowIndex(0), now()).expect("approve");
    let row = session.table().get_row(RowIndex(0)).expect("row");
    assert_eq!(row.mapping_status, Some(MappingStatus::SemiApproved));

    // Bob completes the two-person rule.
    session.set_user(Some(User::named("Bob")));
    session.approve_row(RowIndex(0), now()).expect("approve");
    let row = session.table().get_row(RowIndex(0)).expect("row");
    assert_eq!(row.mapping_status, Some(MappingStatus::Approved));
    assert_eq!(row.approved_by.as_deref(), Some("Bob"));
}

// =============================================================================
// MODE PROPERTIES
// =============================================================================

/// Single mode: remapping a source code evicts the previous concept everywhere.
#[test]
fn single_mode_keeps_one_mapping_per_source_code() {
    let mut session = session_with(&[("S1", "pain")]);
    session.set_user(Some(User::named("Alice")));

    for (id, name) in [(10, "Concept A"), (20, "Concept B")] {
        session
            .map_concept(
                &concept(id, name, "Condition"),
                RowIndex(0),
                Equivalence::Equal,
                MappingStatus::SemiApproved,
                false,
                now(),
            )
            .expect("map");
    }

    assert_eq!(session.table().row_count(), 1);
    let concepts = session.index().get("S1");
    assert_eq!(concepts.len(), 1);
    assert!(concepts.contains_key(&ConceptKey::Athena(ConceptId(20))));
}

/// Multiple mode: concepts accumulate with settled counts on every row.
#[test]
fn multiple_mode_accumulates_concepts() {
    let mut session = MappingSession::with_settings(Settings {
        map_to_multiple_concepts: true,
        ..Settings::default()
    });
    session.load_rows(vec![UsagiRow::from_source("S1", "pain", None)]);
    session.set_user(Some(User::named("Alice")));

    for (id, name) in [(10, "Concept A"), (20, "Concept B")] {
        session
            .map_concept(
                &concept(id, name, "Condition"),
                RowIndex(0),
                Equivalence::Equal,
                MappingStatus::SemiApproved,
                false,
                now(),
            )
            .expect("map");
    }

    assert_eq!(session.table().row_count(), 2);
    assert_eq!(session.index().get("S1").len(), 2);
    for (_, row) in session.table().iter() {
        assert_eq!(row.number_of_concepts, Some(2));
    }
}

/// Repeating the exact same mapping changes nothing.
#[test]
fn exact_repeat_leaves_stores_unchanged() {
    let mut session = MappingSession::with_settings(Settings {
        map_to_multiple_concepts: true,
        ..Settings::default()
    });
    session.load_rows(vec![UsagiRow::from_source("S1", "pain", None)]);
    session.set_user(Some(User::named("Alice")));

    let target = concept(10, "Concept A", "Condition");
    for _ in 0..2 {
        session
            .map_concept(
                &target,
                RowIndex(0),
                Equivalence::Equal,
                MappingStatus::SemiApproved,
                false,
                now(),
            )
            .expect("map");
    }

    assert_eq!(session.table().row_count(), 1);
    assert_eq!(session.index().entry_count(), 1);
}

// =============================================================================
// DELETE SEMANTICS
// =============================================================================

/// Deleting the sole mapping resets the row; deleting one of two removes it.
#[test]
fn delete_resets_or_removes_depending_on_concept_count() {
    let mut session = MappingSession::with_settings(Settings {
        map_to_multiple_concepts: true,
        ..Settings::default()
    });
    session.load_rows(vec![UsagiRow::from_source("S1", "pain", None)]);
    session.set_user(Some(User::named("Alice")));

    let first = concept(10, "Concept A", "Condition");
    let second = concept(20, "Concept B", "Condition");
    for target in [&first, &second] {
        session
            .map_concept(
                target,
                RowIndex(0),
                Equivalence::Equal,
                MappingStatus::SemiApproved,
                false,
                now(),
            )
            .expect("map");
    }

    // Two concepts: deleting one removes its row and decrements the count.
    let outcome = session.delete_row(RowIndex(1)).expect("delete");
    assert_eq!(outcome, RemovalOutcome::Deleted);
    assert_eq!(session.table().row_count(), 1);
    let survivor = session.table().get_row(RowIndex(0)).expect("row");
    assert_eq!(survivor.number_of_concepts, Some(1));

    // One concept left: deleting it resets the row in place.
    let outcome = session.delete_row(RowIndex(0)).expect("delete");
    assert_eq!(outcome, RemovalOutcome::Reset);
    assert_eq!(session.table().row_count(), 1);
    let reset = session.table().get_row(RowIndex(0)).expect("row");
    assert_eq!(reset.source_code, "S1");
    assert_eq!(reset.concept_id, None);
    assert!(session.index().is_empty());
}

// =============================================================================
// DATASET RELOAD
// =============================================================================

/// Loading a new dataset discards the previous index state entirely.
#[test]
fn reload_replaces_index_state() {
    let mut session = session_with(&[("S1", "pain")]);
    session.set_user(Some(User::named("Alice")));
    session
        .map_concept(
            &concept(10, "Concept A", "Condition"),
            RowIndex(0),
            Equivalence::Equal,
            MappingStatus::SemiApproved,
            false,
            now(),
        )
        .expect("map");
    assert_eq!(session.index().entry_count(), 1);

    session.load_rows(vec![UsagiRow::from_source("T1", "other", None)]);
    assert!(session.index().is_empty());
    assert_eq!(session.table().row_count(), 1);
}
