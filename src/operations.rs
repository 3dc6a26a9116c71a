//! Backend-agnostic spreadsheet operations and the sink contract that consumes them.

use crate::error::Result;
use crate::models::CellValue;
use std::collections::BTreeMap;

/// Cell rectangle, zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub first_row: u32,
    pub first_column: u16,
    pub rows: u32,
    pub columns: u16,
}

impl Rect {
    /// Rectangle anchored at A1 that spans every cell of `rows`.
    pub fn covering(rows: &[Vec<CellValue>]) -> Self {
        Self {
            first_row: 0,
            first_column: 0,
            rows: rows.len() as u32,
            columns: rows.iter().map(Vec::len).max().unwrap_or(0) as u16,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.columns == 0
    }

    pub fn contains(&self, row: u32, column: u16) -> bool {
        row >= self.first_row
            && row < self.first_row + self.rows
            && column >= self.first_column
            && column < self.first_column + self.columns
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    AddSheet { title: String, sheet_id: i64 },
    ClearSheet { sheet_id: i64 },
    DeleteSheet { sheet_id: i64 },
    /// Rows written from A1; the first row is the header.
    WriteRows { sheet_id: i64, rows: Vec<Vec<CellValue>> },
    ApplyBorder { sheet_id: i64, rect: Rect },
    ResizeColumns { sheet_id: i64 },
    /// Merges `row_count` cells of `column` downwards from `start_row`.
    MergeRun { sheet_id: i64, start_row: u32, row_count: u32, column: u16 },
    UnmergeAll { sheet_id: i64 },
}

impl Operation {
    pub fn sheet_id(&self) -> i64 {
        match self {
            Operation::AddSheet { sheet_id, .. }
            | Operation::ClearSheet { sheet_id }
            | Operation::DeleteSheet { sheet_id }
            | Operation::WriteRows { sheet_id, .. }
            | Operation::ApplyBorder { sheet_id, .. }
            | Operation::ResizeColumns { sheet_id }
            | Operation::MergeRun { sheet_id, .. }
            | Operation::UnmergeAll { sheet_id } => *sheet_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetEntry {
    pub sheet_id: i64,
    /// Set once the current run keeps the sheet.
    pub reused: bool,
    /// The sheet held merged cells when the inventory was read.
    pub merged: bool,
}

/// Sheets of a backend keyed by their (case-sensitive) title.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SheetInventory {
    entries: BTreeMap<String, SheetEntry>,
}

impl SheetInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, title: &str, sheet_id: i64, merged: bool) {
        self.entries.insert(
            title.to_string(),
            SheetEntry {
                sheet_id,
                reused: false,
                merged,
            },
        );
    }

    pub fn get(&self, title: &str) -> Option<&SheetEntry> {
        self.entries.get(title)
    }

    pub fn mark_reused(&mut self, title: &str) {
        if let Some(entry) = self.entries.get_mut(title) {
            entry.reused = true;
        }
    }

    /// First id above every id present, 0 for an empty inventory.
    pub fn next_id(&self) -> i64 {
        self.entries
            .values()
            .map(|entry| entry.sheet_id + 1)
            .max()
            .unwrap_or(0)
    }

    /// Ids of the sheets the run did not keep, ascending.
    pub fn stale_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .entries
            .values()
            .filter(|entry| !entry.reused)
            .map(|entry| entry.sheet_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A tabular backend the synchronizer drives.
pub trait TabularSink {
    fn name(&self) -> &str;

    /// Longest sheet title the backend accepts, in characters.
    fn max_title_len(&self) -> usize;

    /// Current sheets of the backend. Read once per run.
    fn inventory(&mut self) -> Result<SheetInventory>;

    /// Applies the whole operation log, in order.
    fn apply(&mut self, operations: Vec<Operation>) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_id_is_above_maximum() {
        let mut inventory = SheetInventory::new();
        assert_eq!(inventory.next_id(), 0);

        inventory.insert("Summary", 0, true);
        inventory.insert("Toyota Camry", 17, false);
        inventory.insert("BMW X5", 4, false);

        assert_eq!(inventory.next_id(), 18);
    }

    #[test]
    fn test_stale_ids_skip_reused_sheets() {
        let mut inventory = SheetInventory::new();
        inventory.insert("Summary", 0, false);
        inventory.insert("Old", 9, false);
        inventory.insert("Older", 3, false);
        inventory.mark_reused("Summary");

        assert_eq!(inventory.stale_ids(), vec![3, 9]);
        assert!(inventory.get("Summary").map(|e| e.reused).unwrap_or(false));
    }

    #[test]
    fn test_rect_covering_rows() {
        let rows = vec![
            vec![CellValue::from("a"), CellValue::from("b"), CellValue::from("c")],
            vec![CellValue::Number(1)],
        ];
        let rect = Rect::covering(&rows);

        assert_eq!((rect.rows, rect.columns), (2, 3));
        assert!(rect.contains(1, 2));
        assert!(!rect.contains(2, 0));
        assert!(Rect::covering(&[]).is_empty());
    }
}
