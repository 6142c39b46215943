//! The ordered row collection and its linear-scan operations
//!
//! `RowSet` has no locking of its own; `RowStore` keeps it behind a mutex and
//! calls these methods while holding the guard. Every keyed operation scans
//! from the front comparing `row[col]` with an exact string.
//!
//! A row shorter than `col + 1` fields stops the scan with
//! `ColumnOutOfRange`. Single-row operations only see rows scanned before
//! the first match; bulk operations validate every row before changing
//! anything, so a failed call never leaves a partial mutation behind.

use crate::error::{StoreError, StoreResult};
use crate::format::Row;

/// In-memory rows in insertion order (until a delete swaps one in).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    /// Create an empty row set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from rows loaded out of a snapshot.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Borrow all rows in current order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn field(row: &Row, row_index: usize, col: usize) -> StoreResult<&str> {
        row.get(col).map(String::as_str).ok_or(StoreError::ColumnOutOfRange {
            column: col,
            row_len: row.len(),
            row_index,
        })
    }

    /// Index of the first row with `row[col] == id`.
    fn position(&self, col: usize, id: &str) -> StoreResult<Option<usize>> {
        for (i, row) in self.rows.iter().enumerate() {
            if Self::field(row, i, col)? == id {
                return Ok(Some(i));
            }
        }
        Ok(None)
    }

    /// Ascending indices of every row with `row[col] == value`.
    fn positions(&self, col: usize, value: &str) -> StoreResult<Vec<usize>> {
        let mut hits = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            if Self::field(row, i, col)? == value {
                hits.push(i);
            }
        }
        Ok(hits)
    }

    fn not_found(col: usize, value: &str) -> StoreError {
        StoreError::ValueNotFound { column: col, value: value.to_string() }
    }

    /// First row whose `col` field equals `id`.
    pub fn select(&self, col: usize, id: &str) -> StoreResult<Option<&Row>> {
        Ok(self.position(col, id)?.map(|i| &self.rows[i]))
    }

    /// Every row whose `col` field equals `value`, in current order.
    pub fn select_all(&self, col: usize, value: &str) -> StoreResult<Vec<&Row>> {
        Ok(self.positions(col, value)?.into_iter().map(|i| &self.rows[i]).collect())
    }

    /// Append a row. Duplicate keys are allowed.
    pub fn insert(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Append a batch of rows in order.
    pub fn insert_all(&mut self, rows: Vec<Row>) {
        self.rows.extend(rows);
    }

    /// Replace the first row whose `col` field equals `id`.
    pub fn update(&mut self, col: usize, id: &str, new_row: Row) -> StoreResult<()> {
        let i = self.position(col, id)?.ok_or_else(|| Self::not_found(col, id))?;
        self.rows[i] = new_row;
        Ok(())
    }

    /// Replace every matching row with a copy of `new_row`. Returns the count.
    ///
    /// All matches collapse to the same replacement; there is no per-row
    /// transformation.
    pub fn update_all(&mut self, col: usize, value: &str, new_row: Row) -> StoreResult<usize> {
        let hits = self.positions(col, value)?;
        if hits.is_empty() {
            return Err(Self::not_found(col, value));
        }
        for &i in &hits {
            self.rows[i] = new_row.clone();
        }
        Ok(hits.len())
    }

    /// Remove the first matching row and return it.
    ///
    /// Uses `swap_remove`: the last row moves into the vacated slot, so order
    /// is not preserved.
    pub fn delete(&mut self, col: usize, id: &str) -> StoreResult<Row> {
        let i = self.position(col, id)?.ok_or_else(|| Self::not_found(col, id))?;
        Ok(self.rows.swap_remove(i))
    }

    /// Remove every matching row. Returns the count.
    ///
    /// Removes from the back toward the front so each `swap_remove` only ever
    /// pulls in a row that has already been checked.
    pub fn delete_all(&mut self, col: usize, value: &str) -> StoreResult<usize> {
        let hits = self.positions(col, value)?;
        if hits.is_empty() {
            return Err(Self::not_found(col, value));
        }
        for &i in hits.iter().rev() {
            self.rows.swap_remove(i);
        }
        Ok(hits.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> RowSet {
        RowSet::from_rows(vec![
            row(&["a", "b", "c"]),
            row(&["a", "d", "e"]),
            row(&["f", "g", "h"]),
        ])
    }

    #[test]
    fn test_select_first_match() {
        let set = sample();
        assert_eq!(set.select(0, "a").unwrap(), Some(&row(&["a", "b", "c"])));
        assert_eq!(set.select(1, "g").unwrap(), Some(&row(&["f", "g", "h"])));
        assert_eq!(set.select(0, "zzz").unwrap(), None);
    }

    #[test]
    fn test_select_all_in_order() {
        let set = sample();
        let hits = set.select_all(0, "a").unwrap();
        assert_eq!(hits, vec![&row(&["a", "b", "c"]), &row(&["a", "d", "e"])]);
        assert!(set.select_all(2, "nope").unwrap().is_empty());
    }

    #[test]
    fn test_column_out_of_range() {
        let set = RowSet::from_rows(vec![row(&["x", "y"]), row(&["id", "z"])]);
        match set.select(5, "id") {
            Err(StoreError::ColumnOutOfRange { column, row_len, row_index }) => {
                assert_eq!((column, row_len, row_index), (5, 2, 0));
            }
            other => panic!("Expected ColumnOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_short_row_after_match_is_not_scanned() {
        let set = RowSet::from_rows(vec![row(&["k", "1"]), row(&["k"])]);
        assert_eq!(set.select(1, "1").unwrap(), Some(&row(&["k", "1"])));
        // Bulk scans visit every row
        assert!(matches!(
            set.select_all(1, "1"),
            Err(StoreError::ColumnOutOfRange { row_index: 1, .. })
        ));
    }

    #[test]
    fn test_update_first_only() {
        let mut set = sample();
        set.update(0, "a", row(&["a", "x", "c"])).unwrap();
        assert_eq!(set.rows()[0], row(&["a", "x", "c"]));
        assert_eq!(set.rows()[1], row(&["a", "d", "e"]));

        assert!(matches!(
            set.update(0, "missing", row(&["m"])),
            Err(StoreError::ValueNotFound { column: 0, .. })
        ));
    }

    #[test]
    fn test_update_all_collapses_to_one_row() {
        let mut set = sample();
        assert_eq!(set.update_all(0, "a", row(&["a", "same", "row"])).unwrap(), 2);
        assert_eq!(set.rows()[0], row(&["a", "same", "row"]));
        assert_eq!(set.rows()[1], row(&["a", "same", "row"]));
        assert_eq!(set.rows()[2], row(&["f", "g", "h"]));

        assert!(matches!(set.update_all(0, "q", row(&[])), Err(StoreError::ValueNotFound { .. })));
    }

    #[test]
    fn test_update_all_short_row_leaves_set_untouched() {
        let mut set = RowSet::from_rows(vec![row(&["a", "1"]), row(&["a"])]);
        let before = set.clone();
        assert!(set.update_all(1, "1", row(&["b", "2"])).is_err());
        assert_eq!(set, before);
    }

    #[test]
    fn test_delete_all_short_row_leaves_set_untouched() {
        let mut set = RowSet::from_rows(vec![row(&["a", "1"]), row(&["a"])]);
        let before = set.clone();
        assert!(matches!(
            set.delete_all(1, "1"),
            Err(StoreError::ColumnOutOfRange { column: 1, row_len: 1, row_index: 1 })
        ));
        assert_eq!(set, before);
    }

    #[test]
    fn test_delete_swaps_last_into_slot() {
        let mut set = RowSet::from_rows(vec![
            row(&["1"]),
            row(&["2"]),
            row(&["3"]),
            row(&["4"]),
        ]);
        assert_eq!(set.delete(0, "2").unwrap(), row(&["2"]));
        assert_eq!(set.rows(), &[row(&["1"]), row(&["4"]), row(&["3"])]);
        assert_eq!(set.select(0, "2").unwrap(), None);
    }

    #[test]
    fn test_delete_not_found() {
        let mut set = sample();
        assert!(matches!(set.delete(1, "nope"), Err(StoreError::ValueNotFound { .. })));
        assert_eq!(set, sample());
    }

    #[test]
    fn test_delete_all_removes_exact_matches() {
        let mut set = RowSet::from_rows(vec![
            row(&["a", "1"]),
            row(&["b", "2"]),
            row(&["a", "3"]),
            row(&["c", "4"]),
            row(&["a", "5"]),
        ]);
        assert_eq!(set.delete_all(0, "a").unwrap(), 3);
        assert_eq!(set.len(), 2);
        assert!(set.rows().contains(&row(&["b", "2"])));
        assert!(set.rows().contains(&row(&["c", "4"])));
        assert!(set.select(0, "a").unwrap().is_none());

        assert!(matches!(set.delete_all(0, "a"), Err(StoreError::ValueNotFound { .. })));
    }

    #[test]
    fn test_delete_all_adjacent_at_end() {
        let mut set = RowSet::from_rows(vec![row(&["k"]), row(&["x"]), row(&["x"])]);
        assert_eq!(set.delete_all(0, "x").unwrap(), 2);
        assert_eq!(set.rows(), &[row(&["k"])]);
    }

    #[test]
    fn test_scenario_update_then_delete() {
        let mut set = RowSet::new();
        set.insert(row(&["a", "b", "c"]));
        set.insert(row(&["a", "d", "e"]));
        assert_eq!(set.select_all(0, "a").unwrap().len(), 2);

        set.update(1, "b", row(&["a", "x", "c"])).unwrap();
        set.delete(1, "x").unwrap();
        assert_eq!(set.rows(), &[row(&["a", "d", "e"])]);
    }

    #[test]
    fn test_insert_all_keeps_order() {
        let mut set = RowSet::new();
        set.insert(row(&["0"]));
        set.insert_all(vec![row(&["1"]), row(&["2"])]);
        assert_eq!(set.rows(), &[row(&["0"]), row(&["1"]), row(&["2"])]);
    }
}
