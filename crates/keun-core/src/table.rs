//! # Working Table
//!
//! The in-memory Usagi working table: every imported source code starts as
//! one row here, and mapping/review operations rewrite rows in place.
//!
//! Rows are addressed by a stable [`RowIndex`]. Indices are handed out
//! monotonically and never reused, so a delete leaves every other row
//! addressable — the reconciliation engine depends on that stability when it
//! broadcasts updates to all rows sharing a source code.
//!
//! Storage uses `BTreeMap` for deterministic iteration order.

use crate::{KeunError, RowIndex, UsagiRow};
use std::collections::BTreeMap;

// =============================================================================
// QUERY RESULT
// =============================================================================

/// Result of a predicate query: matching indices and row snapshots, aligned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub indices: Vec<RowIndex>,
    pub rows: Vec<UsagiRow>,
}

impl QueryResult {
    /// Number of matched rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// True when nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

// =============================================================================
// PAGINATION
// =============================================================================

/// Page window over the table, in row positions (not indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-based page number.
    pub current_page: usize,
    pub rows_per_page: usize,
}

impl Pagination {
    /// Positions covered by the page: `[start, end)`.
    #[must_use]
    pub const fn window(&self) -> (usize, usize) {
        let page = if self.current_page > 0 {
            self.current_page - 1
        } else {
            0
        };
        let start = page * self.rows_per_page;
        (start, start + self.rows_per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            current_page: 1,
            rows_per_page: 20,
        }
    }
}

// =============================================================================
// WORK TABLE
// =============================================================================

/// The Usagi working table.
///
/// Reads return plain values — a lookup miss is a zero-result, not an error.
/// Mutations return `Result` and fail only on a missing commit target.
#[derive(Debug, Clone, Default)]
pub struct WorkTable {
    /// Row storage: RowIndex -> UsagiRow
    rows: BTreeMap<RowIndex, UsagiRow>,

    /// Next index to hand out. Never decremented.
    next_index: usize,

    /// Current page window.
    pagination: Pagination,

    /// Interaction flag raised while a batch owns the table.
    disabled: bool,
}

impl WorkTable {
    /// Create a new empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the dataset with freshly imported rows.
    ///
    /// Indices restart at zero and the page window resets to the first page.
    pub fn load_rows(&mut self, rows: Vec<UsagiRow>) {
        self.rows = rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| (RowIndex(i), row))
            .collect();
        self.next_index = self.rows.len();
        self.pagination.current_page = 1;
    }

    /// Number of rows currently in the table.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get a snapshot of the row at `index`.
    #[must_use]
    pub fn get_row(&self, index: RowIndex) -> Option<UsagiRow> {
        self.rows.get(&index).cloned()
    }

    /// Overwrite the row at `index`.
    pub fn set_row(&mut self, index: RowIndex, row: UsagiRow) -> Result<(), KeunError> {
        match self.rows.get_mut(&index) {
            Some(slot) => {
                *slot = row;
                Ok(())
            }
            None => Err(KeunError::RowNotFound(index)),
        }
    }

    /// Apply an in-place update to the row at `index`.
    pub fn update_with(
        &mut self,
        index: RowIndex,
        update: impl FnOnce(&mut UsagiRow),
    ) -> Result<(), KeunError> {
        match self.rows.get_mut(&index) {
            Some(row) => {
                update(row);
                Ok(())
            }
            None => Err(KeunError::RowNotFound(index)),
        }
    }

    /// Append a row, returning its new stable index.
    pub fn insert_row(&mut self, row: UsagiRow) -> Result<RowIndex, KeunError> {
        let index = RowIndex(self.next_index);
        self.next_index = self.next_index.saturating_add(1);
        self.rows.insert(index, row);
        Ok(index)
    }

    /// Delete the row at `index`. Deleting an absent row is a no-op.
    pub fn delete_row(&mut self, index: RowIndex) -> Result<(), KeunError> {
        self.rows.remove(&index);
        Ok(())
    }

    /// Run a predicate query over all rows in index order.
    #[must_use]
    pub fn query(&self, predicate: impl Fn(&UsagiRow) -> bool) -> QueryResult {
        let mut result = QueryResult::default();
        for (index, row) in &self.rows {
            if predicate(row) {
                result.indices.push(*index);
                result.rows.push(row.clone());
            }
        }
        result
    }

    /// All rows sharing a source code, in index order.
    #[must_use]
    pub fn rows_with_source_code(&self, source_code: &str) -> QueryResult {
        self.query(|row| row.source_code == source_code)
    }

    /// Iterate all rows in index order.
    pub fn iter(&self) -> impl Iterator<Item = (RowIndex, &UsagiRow)> {
        self.rows.iter().map(|(index, row)| (*index, row))
    }

    /// Snapshot of all rows in index order, for export.
    #[must_use]
    pub fn export_rows(&self) -> Vec<UsagiRow> {
        self.rows.values().cloned().collect()
    }

    /// Get the current page window.
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        self.pagination
    }

    /// Set the current page window.
    pub fn set_pagination(&mut self, pagination: Pagination) {
        self.pagination = pagination;
    }

    /// Rows on the current page, by position in index order.
    #[must_use]
    pub fn page_rows(&self) -> QueryResult {
        let (start, end) = self.pagination.window();
        let mut result = QueryResult::default();
        for (position, (index, row)) in self.rows.iter().enumerate() {
            if position >= end {
                break;
            }
            if position >= start {
                result.indices.push(*index);
                result.rows.push(row.clone());
            }
        }
        result
    }

    /// Raise or clear the interaction flag.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Is table interaction currently disabled?
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(codes: &[&str]) -> WorkTable {
        let mut table = WorkTable::new();
        table.load_rows(
            codes
                .iter()
                .map(|code| UsagiRow::from_source(*code, format!("name {code}"), None))
                .collect(),
        );
        table
    }

    #[test]
    fn load_assigns_sequential_indices() {
        let table = table_with(&["A", "B", "C"]);
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.get_row(RowIndex(1)).map(|r| r.source_code), Some("B".to_string()));
    }

    #[test]
    fn indices_stay_stable_after_delete() {
        let mut table = table_with(&["A", "B", "C"]);
        table.delete_row(RowIndex(1)).expect("delete");

        assert_eq!(table.row_count(), 2);
        assert!(table.get_row(RowIndex(1)).is_none());
        assert_eq!(table.get_row(RowIndex(2)).map(|r| r.source_code), Some("C".to_string()));

        // A new insert must not reuse the freed index.
        let index = table
            .insert_row(UsagiRow::from_source("D", "name D", None))
            .expect("insert");
        assert_eq!(index, RowIndex(3));
    }

    #[test]
    fn set_row_rejects_missing_index() {
        let mut table = table_with(&["A"]);
        let row = UsagiRow::from_source("Z", "name Z", None);
        assert_eq!(
            table.set_row(RowIndex(9), row),
            Err(KeunError::RowNotFound(RowIndex(9)))
        );
    }

    #[test]
    fn query_returns_aligned_indices_and_rows() {
        let mut table = table_with(&["A", "B", "A"]);
        table
            .update_with(RowIndex(2), |row| row.comment = Some("second A".to_string()))
            .expect("update");

        let result = table.rows_with_source_code("A");
        assert_eq!(result.indices, vec![RowIndex(0), RowIndex(2)]);
        assert_eq!(result.rows[1].comment.as_deref(), Some("second A"));
    }

    #[test]
    fn page_window_covers_positions_not_indices() {
        let mut table = table_with(&["A", "B", "C", "D", "E"]);
        // Drop the first row so positions and indices diverge.
        table.delete_row(RowIndex(0)).expect("delete");
        table.set_pagination(Pagination {
            current_page: 1,
            rows_per_page: 2,
        });

        let page = table.page_rows();
        assert_eq!(page.indices, vec![RowIndex(1), RowIndex(2)]);

        table.set_pagination(Pagination {
            current_page: 2,
            rows_per_page: 2,
        });
        let page = table.page_rows();
        assert_eq!(page.indices, vec![RowIndex(3), RowIndex(4)]);
    }

    #[test]
    fn load_resets_to_first_page() {
        let mut table = table_with(&["A", "B", "C"]);
        table.set_pagination(Pagination {
            current_page: 2,
            rows_per_page: 1,
        });
        table.load_rows(vec![UsagiRow::from_source("Z", "name Z", None)]);
        assert_eq!(table.pagination().current_page, 1);
    }
}
