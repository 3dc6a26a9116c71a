//! Local workbook sink. Operations are applied to an in-memory document which is
//! written out as `.xlsx` at the end of the run.

use crate::debug_println;
use crate::error::{CarsError, Result};
use crate::models::{link_caption, CellValue};
use crate::operations::{Operation, Rect, SheetInventory, TabularSink};
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Url, Workbook};
use std::collections::BTreeMap;
use std::path::Path;

/// Sheet title limit of the xlsx format.
pub const XLSX_MAX_TITLE_LEN: usize = 31;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSheet {
    pub sheet_id: i64,
    pub title: String,
    pub cells: BTreeMap<(u32, u16), CellValue>,
    pub merges: Vec<Rect>,
    pub border: Option<Rect>,
    pub autofit: bool,
}

impl LocalSheet {
    pub fn cell(&self, row: u32, column: u16) -> Option<&CellValue> {
        self.cells.get(&(row, column))
    }

    pub fn row_count(&self) -> u32 {
        self.cells.keys().map(|(row, _)| row + 1).max().unwrap_or(0)
    }
}

fn overlaps(a: &Rect, b: &Rect) -> bool {
    a.first_row < b.first_row + b.rows
        && b.first_row < a.first_row + a.rows
        && a.first_column < b.first_column + b.columns
        && b.first_column < a.first_column + a.columns
}

#[derive(Debug, Clone, Default)]
pub struct LocalWorkbook {
    sheets: Vec<LocalSheet>,
}

impl LocalWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sheets(&self) -> &[LocalSheet] {
        &self.sheets
    }

    pub fn sheet(&self, title: &str) -> Option<&LocalSheet> {
        self.sheets.iter().find(|sheet| sheet.title == title)
    }

    fn sheet_mut(&mut self, sheet_id: i64) -> Result<&mut LocalSheet> {
        self.sheets
            .iter_mut()
            .find(|sheet| sheet.sheet_id == sheet_id)
            .ok_or(CarsError::UnknownSheet(sheet_id))
    }

    pub fn apply_operation(&mut self, operation: Operation) -> Result<()> {
        match operation {
            Operation::AddSheet { title, sheet_id } => {
                if self
                    .sheets
                    .iter()
                    .any(|sheet| sheet.sheet_id == sheet_id || sheet.title == title)
                {
                    return Err(CarsError::DuplicateSheet(title));
                }
                self.sheets.push(LocalSheet {
                    sheet_id,
                    title,
                    ..Default::default()
                });
            }
            Operation::ClearSheet { sheet_id } => {
                let sheet = self.sheet_mut(sheet_id)?;
                sheet.cells.clear();
                sheet.border = None;
                sheet.autofit = false;
            }
            Operation::DeleteSheet { sheet_id } => {
                let index = self
                    .sheets
                    .iter()
                    .position(|sheet| sheet.sheet_id == sheet_id)
                    .ok_or(CarsError::UnknownSheet(sheet_id))?;
                self.sheets.remove(index);
            }
            Operation::WriteRows { sheet_id, rows } => {
                let sheet = self.sheet_mut(sheet_id)?;
                for (row_index, row) in rows.into_iter().enumerate() {
                    for (column_index, value) in row.into_iter().enumerate() {
                        sheet.cells.insert((row_index as u32, column_index as u16), value);
                    }
                }
            }
            Operation::ApplyBorder { sheet_id, rect } => {
                self.sheet_mut(sheet_id)?.border = Some(rect);
            }
            Operation::ResizeColumns { sheet_id } => {
                self.sheet_mut(sheet_id)?.autofit = true;
            }
            Operation::MergeRun {
                sheet_id,
                start_row,
                row_count,
                column,
            } => {
                let sheet = self.sheet_mut(sheet_id)?;
                let merge = Rect {
                    first_row: start_row,
                    first_column: column,
                    rows: row_count,
                    columns: 1,
                };
                if sheet.merges.iter().any(|existing| overlaps(existing, &merge)) {
                    return Err(CarsError::OverlappingMerge(sheet_id));
                }
                sheet.merges.push(merge);
            }
            Operation::UnmergeAll { sheet_id } => {
                self.sheet_mut(sheet_id)?.merges.clear();
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let body = Format::new()
            .set_align(FormatAlign::Left)
            .set_align(FormatAlign::VerticalCenter);

        let mut workbook = Workbook::new();
        for sheet in &self.sheets {
            let format_for = |row: u32, column: u16| {
                let format = if row == 0 { header.clone() } else { body.clone() };
                match sheet.border {
                    Some(border) if border.contains(row, column) => format.set_border(FormatBorder::Thin),
                    _ => format,
                }
            };

            let worksheet = workbook.add_worksheet();
            worksheet.set_name(sheet.title.as_str())?;

            for (&(row, column), value) in &sheet.cells {
                let format = format_for(row, column);
                match value {
                    CellValue::Text(text) => {
                        worksheet.write_string_with_format(row, column, text.as_str(), &format)?;
                    }
                    CellValue::Number(number) => {
                        worksheet.write_number_with_format(row, column, *number as f64, &format)?;
                    }
                    CellValue::Link(url) => {
                        let link = Url::new(url.as_str()).set_text(link_caption(url));
                        worksheet.write_url_with_format(row, column, link, &format)?;
                    }
                }
            }

            // Single-cell merges are invalid in xlsx.
            for merge in sheet.merges.iter().filter(|merge| merge.rows >= 2) {
                let text = sheet
                    .cell(merge.first_row, merge.first_column)
                    .map(CellValue::display)
                    .unwrap_or_default();
                worksheet.merge_range(
                    merge.first_row,
                    merge.first_column,
                    merge.first_row + merge.rows - 1,
                    merge.first_column,
                    &text,
                    &format_for(merge.first_row, merge.first_column),
                )?;
            }

            if sheet.autofit {
                worksheet.autofit();
            }
        }

        workbook.save(path)?;
        debug_println!("Saved {} sheets to {}", self.sheets.len(), path.display());
        Ok(())
    }
}

impl TabularSink for LocalWorkbook {
    fn name(&self) -> &str {
        "xlsx workbook"
    }

    fn max_title_len(&self) -> usize {
        XLSX_MAX_TITLE_LEN
    }

    fn inventory(&mut self) -> Result<SheetInventory> {
        let mut inventory = SheetInventory::new();
        for sheet in &self.sheets {
            inventory.insert(&sheet.title, sheet.sheet_id, !sheet.merges.is_empty());
        }
        Ok(inventory)
    }

    fn apply(&mut self, operations: Vec<Operation>) -> Result<()> {
        for operation in operations {
            self.apply_operation(operation)?;
        }
        Ok(())
    }
}
