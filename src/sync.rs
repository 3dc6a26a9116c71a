//! Reconciles the sheets a run wants to publish with the sheets a backend already has,
//! producing one ordered operation log.

use crate::error::Result;
use crate::models::CellValue;
use crate::operations::{Operation, Rect, SheetInventory, TabularSink};
use crate::{debug_println, warn_eprintln};
use std::collections::HashSet;

pub const SUMMARY_SHEET: &str = "Summary";

/// Summary columns collapsed into merged cells, in processing order (brand, model).
pub const SUMMARY_MERGE_COLUMNS: [u16; 2] = [0, 1];

const LONG_MARKER: &str = "Рестайлинг";
const SHORT_MARKER: &str = "Рест";

/// Characters no workbook accepts in a sheet title.
const FORBIDDEN_TITLE_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// One named table: the first row is the header.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    pub title: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl SheetData {
    pub fn new(title: impl Into<String>, header: &[&str]) -> Self {
        Self {
            title: title.into(),
            rows: vec![header.iter().map(|name| CellValue::Text(name.to_string())).collect()],
        }
    }

    pub fn push_row(&mut self, row: Vec<CellValue>) {
        self.rows.push(row);
    }

    pub fn data_rows(&self) -> usize {
        self.rows.len().saturating_sub(1)
    }
}

/// Maps a logical title onto the title used on a backend with `max_len` characters.
/// Deterministic and idempotent, so the same vehicle lands on the same sheet every run.
pub fn shorten_title(title: &str, max_len: usize) -> String {
    let mut shortened: String = title
        .chars()
        .map(|c| if FORBIDDEN_TITLE_CHARS.contains(&c) { '-' } else { c })
        .collect();

    if shortened.chars().count() > max_len {
        shortened = shortened.replace(LONG_MARKER, SHORT_MARKER);
    }
    if shortened.chars().count() > max_len {
        shortened = shortened.chars().take(max_len).collect::<String>().trim_end().to_string();
    }
    shortened
}

/// Shortens `title` and, if the result is already in `taken`, appends ` (2)`, ` (3)`, ...
/// keeping the whole title within `max_len`. The chosen title is added to `taken`.
pub fn unique_title(title: &str, max_len: usize, taken: &mut HashSet<String>) -> String {
    let mut candidate = shorten_title(title, max_len);
    let mut counter = 2;
    while taken.contains(&candidate) {
        let suffix = format!(" ({})", counter);
        let head = shorten_title(title, max_len.saturating_sub(suffix.chars().count()));
        candidate = format!("{}{}", head, suffix);
        counter += 1;
    }
    taken.insert(candidate.clone());
    candidate
}

/// Merge operations for every run of equal, non-empty values in `column`.
/// Row 0 is the header and never takes part in a run.
pub fn merge_runs(sheet_id: i64, rows: &[Vec<CellValue>], column: u16) -> Vec<Operation> {
    let mut operations = Vec::new();
    let mut run_start = 1;
    let mut run_value: Option<&CellValue> = None;

    let mut close_run = |start: usize, end: usize, value: Option<&CellValue>| {
        if value.is_some() && end - start >= 2 {
            operations.push(Operation::MergeRun {
                sheet_id,
                start_row: start as u32,
                row_count: (end - start) as u32,
                column,
            });
        }
    };

    for (index, row) in rows.iter().enumerate().skip(1) {
        let value = row.get(column as usize).filter(|value| !value.is_empty());
        if value.is_some() && value == run_value {
            continue;
        }
        close_run(run_start, index, run_value);
        run_start = index;
        run_value = value;
    }
    close_run(run_start, rows.len().max(1), run_value);

    operations
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub cleared: usize,
    pub deleted: usize,
    pub merged: usize,
    pub operations: usize,
}

impl SyncReport {
    pub fn from_operations(operations: &[Operation]) -> Self {
        let mut report = SyncReport {
            operations: operations.len(),
            ..Default::default()
        };
        for operation in operations {
            match operation {
                Operation::AddSheet { .. } => report.added += 1,
                Operation::ClearSheet { .. } => report.cleared += 1,
                Operation::DeleteSheet { .. } => report.deleted += 1,
                Operation::MergeRun { .. } => report.merged += 1,
                _ => {}
            }
        }
        report
    }
}

pub struct ReportSynchronizer {
    max_title_len: usize,
    merge_columns: Vec<u16>,
}

impl ReportSynchronizer {
    pub fn new(max_title_len: usize) -> Self {
        Self {
            max_title_len,
            merge_columns: SUMMARY_MERGE_COLUMNS.to_vec(),
        }
    }

    pub fn for_sink<S: TabularSink + ?Sized>(sink: &S) -> Self {
        Self::new(sink.max_title_len())
    }

    /// Adds or recycles the sheet behind `title` and returns its id.
    fn claim(&self, inventory: &mut SheetInventory, title: &str, log: &mut Vec<Operation>) -> i64 {
        let sheet_id = match inventory.get(title) {
            Some(entry) => {
                if entry.merged {
                    log.push(Operation::UnmergeAll {
                        sheet_id: entry.sheet_id,
                    });
                }
                log.push(Operation::ClearSheet {
                    sheet_id: entry.sheet_id,
                });
                entry.sheet_id
            }
            None => {
                let sheet_id = inventory.next_id();
                log.push(Operation::AddSheet {
                    title: title.to_string(),
                    sheet_id,
                });
                inventory.insert(title, sheet_id, false);
                sheet_id
            }
        };
        inventory.mark_reused(title);
        sheet_id
    }

    fn write_table(sheet_id: i64, rows: &[Vec<CellValue>], log: &mut Vec<Operation>) {
        log.push(Operation::WriteRows {
            sheet_id,
            rows: rows.to_vec(),
        });
        let rect = Rect::covering(rows);
        if !rect.is_empty() {
            log.push(Operation::ApplyBorder { sheet_id, rect });
        }
        log.push(Operation::ResizeColumns { sheet_id });
    }

    /// Computes the operation log and updates `inventory` to the post-run state.
    ///
    /// Order: summary sheet claimed, each vehicle sheet claimed and written, summary
    /// written and merged, then stale sheets deleted.
    pub fn plan(&self, inventory: &mut SheetInventory, summary: &SheetData, sheets: &[SheetData]) -> Vec<Operation> {
        let mut log = Vec::new();
        let mut claimed = HashSet::new();

        let summary_title = unique_title(&summary.title, self.max_title_len, &mut claimed);
        let summary_id = self.claim(inventory, &summary_title, &mut log);

        for sheet in sheets {
            let title = unique_title(&sheet.title, self.max_title_len, &mut claimed);
            if title != shorten_title(&sheet.title, self.max_title_len) {
                warn_eprintln!("Sheet title of {} is already taken, using {}", sheet.title, title);
            }
            let sheet_id = self.claim(inventory, &title, &mut log);
            debug_println!("Sheet {} -> id {}", title, sheet_id);
            Self::write_table(sheet_id, &sheet.rows, &mut log);
        }

        Self::write_table(summary_id, &summary.rows, &mut log);
        for column in &self.merge_columns {
            log.extend(merge_runs(summary_id, &summary.rows, *column));
        }

        for sheet_id in inventory.stale_ids() {
            log.push(Operation::DeleteSheet { sheet_id });
        }

        log
    }

    /// Reads the sink inventory, plans and hands the log to the sink in one go.
    pub fn synchronize<S: TabularSink + ?Sized>(
        &self,
        sink: &mut S,
        summary: &SheetData,
        sheets: &[SheetData],
    ) -> Result<SyncReport> {
        let mut inventory = sink.inventory()?;
        debug_println!("{} has {} sheets", sink.name(), inventory.len());

        let operations = self.plan(&mut inventory, summary, sheets);
        let report = SyncReport::from_operations(&operations);
        sink.apply(operations)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn column(values: &[&str]) -> Vec<Vec<CellValue>> {
        let mut rows = vec![vec![CellValue::from("Brand")]];
        rows.extend(values.iter().map(|value| vec![CellValue::from(*value)]));
        rows
    }

    fn runs(operations: &[Operation]) -> Vec<(u32, u32)> {
        operations
            .iter()
            .filter_map(|operation| match operation {
                Operation::MergeRun {
                    start_row, row_count, ..
                } => Some((*start_row, *row_count)),
                _ => None,
            })
            .collect()
    }

    fn sheet(title: &str) -> SheetData {
        let mut data = SheetData::new(title, &["Price", "Year"]);
        data.push_row(vec![CellValue::Number(1000), CellValue::Number(2015)]);
        data
    }

    #[test]
    fn test_merge_runs_suppress_single_rows() {
        let operations = merge_runs(7, &column(&["A", "A", "A", "B", "B", "C"]), 0);

        assert_eq!(runs(&operations), vec![(1, 3), (4, 2)]);
        assert!(operations.iter().all(|operation| operation.sheet_id() == 7));
    }

    #[test]
    fn test_merge_run_reaching_last_row_is_closed() {
        assert_eq!(runs(&merge_runs(0, &column(&["A", "B", "B"]), 0)), vec![(2, 2)]);
        assert_eq!(runs(&merge_runs(0, &column(&["A", "A"]), 0)), vec![(1, 2)]);
    }

    #[test]
    fn test_merge_runs_single_row_and_header_only() {
        assert!(merge_runs(0, &column(&["A"]), 0).is_empty());
        assert!(merge_runs(0, &column(&[]), 0).is_empty());
        assert!(merge_runs(0, &[], 0).is_empty());
    }

    #[test]
    fn test_empty_cells_never_merge() {
        assert_eq!(runs(&merge_runs(0, &column(&["", "", "A", "A", ""]), 0)), vec![(3, 2)]);
    }

    #[test]
    fn test_shorten_title_is_idempotent() {
        let long = "Mercedes-Benz E-Класс W213 Рестайлинг";
        let once = shorten_title(long, 31);

        assert_eq!(once, "Mercedes-Benz E-Класс W213 Рест");
        assert_eq!(shorten_title(&once, 31), once);

        let longer = "Volkswagen Passat Variant B8 Рестайлинг Alltrack";
        let once = shorten_title(longer, 31);
        assert!(once.chars().count() <= 31);
        assert_eq!(shorten_title(&once, 31), once);
    }

    #[test]
    fn test_unique_title_appends_counter_within_limit() {
        let mut taken = HashSet::from([SUMMARY_SHEET.to_string()]);
        let long = "Mercedes-Benz E-Класс W213 Универсал";

        let first = unique_title(long, 31, &mut taken);
        let second = unique_title(long, 31, &mut taken);
        let third = unique_title(long, 31, &mut taken);

        assert_eq!(first, "Mercedes-Benz E-Класс W213 Унив");
        assert_eq!(second, "Mercedes-Benz E-Класс W213 (2)");
        assert_eq!(third, "Mercedes-Benz E-Класс W213 (3)");
        assert_eq!(shorten_title(&second, 31), second);
        assert_eq!(unique_title(SUMMARY_SHEET, 31, &mut taken), "Summary (2)");
    }

    #[test]
    fn test_short_titles_keep_marker() {
        assert_eq!(shorten_title("BMW X5 E70 Рестайлинг", 31), "BMW X5 E70 Рестайлинг");
        assert_eq!(shorten_title("Tesla Model S/X", 31), "Tesla Model S-X");
    }

    #[test]
    fn test_stale_sheet_is_deleted_after_additions() {
        let mut inventory = SheetInventory::new();
        inventory.insert("X", 0, false);

        let summary = SheetData::new(SUMMARY_SHEET, &["Brand"]);
        let log = ReportSynchronizer::new(31).plan(&mut inventory, &summary, &[sheet("Y")]);

        let added_y: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, Operation::AddSheet { title, .. } if title == "Y"))
            .map(|(index, _)| index)
            .collect();
        let deleted: Vec<usize> = log
            .iter()
            .enumerate()
            .filter(|(_, op)| matches!(op, Operation::DeleteSheet { sheet_id: 0 }))
            .map(|(index, _)| index)
            .collect();

        assert_eq!(added_y.len(), 1);
        assert_eq!(deleted.len(), 1);
        let last_claim = log
            .iter()
            .rposition(|op| matches!(op, Operation::AddSheet { .. } | Operation::ClearSheet { .. }))
            .unwrap();
        assert!(last_claim < deleted[0]);
        assert_eq!(log.last(), Some(&Operation::DeleteSheet { sheet_id: 0 }));
    }

    #[test]
    fn test_existing_sheets_are_cleared_and_new_ids_are_monotonic() {
        let mut inventory = SheetInventory::new();
        inventory.insert(SUMMARY_SHEET, 0, true);
        inventory.insert("Toyota Camry", 5, false);

        let summary = SheetData::new(SUMMARY_SHEET, &["Brand"]);
        let log = ReportSynchronizer::new(100).plan(
            &mut inventory,
            &summary,
            &[sheet("Toyota Camry"), sheet("Toyota Corolla"), sheet("Toyota RAV4")],
        );

        let claims: Vec<&Operation> = log
            .iter()
            .filter(|op| {
                matches!(
                    op,
                    Operation::AddSheet { .. } | Operation::ClearSheet { .. } | Operation::UnmergeAll { .. }
                )
            })
            .collect();
        assert_eq!(
            claims,
            vec![
                &Operation::UnmergeAll { sheet_id: 0 },
                &Operation::ClearSheet { sheet_id: 0 },
                &Operation::ClearSheet { sheet_id: 5 },
                &Operation::AddSheet {
                    title: "Toyota Corolla".to_string(),
                    sheet_id: 6
                },
                &Operation::AddSheet {
                    title: "Toyota RAV4".to_string(),
                    sheet_id: 7
                },
            ]
        );
        assert!(!log.iter().any(|op| matches!(op, Operation::DeleteSheet { .. })));
        assert!(inventory.stale_ids().is_empty());
    }

    #[test]
    fn test_vehicle_sheet_gets_write_border_resize() {
        let mut inventory = SheetInventory::new();
        let summary = SheetData::new(SUMMARY_SHEET, &["Brand"]);
        let camry = sheet("Toyota Camry");

        let log = ReportSynchronizer::new(31).plan(&mut inventory, &summary, &[camry.clone()]);

        assert_eq!(
            &log[1..5],
            &[
                Operation::AddSheet {
                    title: "Toyota Camry".to_string(),
                    sheet_id: 1
                },
                Operation::WriteRows {
                    sheet_id: 1,
                    rows: camry.rows.clone()
                },
                Operation::ApplyBorder {
                    sheet_id: 1,
                    rect: Rect {
                        first_row: 0,
                        first_column: 0,
                        rows: 2,
                        columns: 2
                    }
                },
                Operation::ResizeColumns { sheet_id: 1 },
            ]
        );
    }

    #[test]
    fn test_colliding_titles_get_distinct_sheets() {
        let mut inventory = SheetInventory::new();
        let summary = SheetData::new(SUMMARY_SHEET, &["Brand"]);
        let a = sheet("Mercedes-Benz E-Класс W213 Универсал A");
        let b = sheet("Mercedes-Benz E-Класс W213 Универсал B");

        let log = ReportSynchronizer::new(31).plan(&mut inventory, &summary, &[a, b]);

        let added: Vec<&str> = log
            .iter()
            .filter_map(|op| match op {
                Operation::AddSheet { title, .. } => Some(title.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            added,
            vec!["Summary", "Mercedes-Benz E-Класс W213 Унив", "Mercedes-Benz E-Класс W213 (2)"]
        );
        assert_eq!(inventory.len(), 3);
    }

    #[test]
    fn test_summary_merges_brand_before_model() {
        let mut summary = SheetData::new(SUMMARY_SHEET, &["Brand", "Model"]);
        for (brand, model) in [("BMW", "X5"), ("BMW", "X5"), ("Toyota", "Camry"), ("Toyota", "Corolla")] {
            summary.push_row(vec![CellValue::from(brand), CellValue::from(model)]);
        }
        let mut inventory = SheetInventory::new();

        let log = ReportSynchronizer::new(31).plan(&mut inventory, &summary, &[]);

        let merges: Vec<&Operation> = log
            .iter()
            .filter(|op| matches!(op, Operation::MergeRun { .. }))
            .collect();
        assert_eq!(
            merges,
            vec![
                &Operation::MergeRun {
                    sheet_id: 0,
                    start_row: 1,
                    row_count: 2,
                    column: 0
                },
                &Operation::MergeRun {
                    sheet_id: 0,
                    start_row: 3,
                    row_count: 2,
                    column: 0
                },
                &Operation::MergeRun {
                    sheet_id: 0,
                    start_row: 1,
                    row_count: 2,
                    column: 1
                },
            ]
        );
    }
}
