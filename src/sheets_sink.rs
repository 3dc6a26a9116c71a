//! Google Sheets sink: the operation log becomes one `spreadsheets.batchUpdate` call.
//!
//! A rejected batch may leave the spreadsheet partially updated; nothing is rolled back.

use crate::auth::SheetsCredentials;
use crate::debug_println;
use crate::error::{CarsError, Result};
use crate::models::{link_caption, CellValue};
use crate::operations::{Operation, SheetInventory, TabularSink};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Sheet title limit of Google Sheets.
pub const SHEETS_MAX_TITLE_LEN: usize = 100;

const INVENTORY_FIELDS: &str = "sheets(properties(sheetId,title),merges)";

#[derive(Debug, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetResource>,
}

#[derive(Debug, Deserialize)]
struct SheetResource {
    properties: SheetProperties,
    #[serde(default)]
    merges: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SheetProperties {
    #[serde(default)]
    sheet_id: i64,
    title: String,
}

/// Inventory from a `spreadsheets.get` response.
pub fn parse_inventory(body: &str) -> Result<SheetInventory> {
    let response: SpreadsheetResponse = serde_json::from_str(body)?;
    let mut inventory = SheetInventory::new();
    for sheet in response.sheets {
        inventory.insert(&sheet.properties.title, sheet.properties.sheet_id, !sheet.merges.is_empty());
    }
    Ok(inventory)
}

fn cell_data(value: &CellValue, is_header: bool) -> Value {
    let user_entered_value = match value {
        CellValue::Text(text) => json!({"stringValue": text}),
        CellValue::Number(number) => json!({"numberValue": number}),
        CellValue::Link(url) => json!({
            "formulaValue": format!(
                "=HYPERLINK(\"{}\", \"{}\")",
                url.replace('"', "\"\""),
                link_caption(url).replace('"', "\"\"")
            )
        }),
    };
    let format = if is_header {
        json!({"horizontalAlignment": "CENTER", "verticalAlignment": "MIDDLE", "textFormat": {"bold": true}})
    } else {
        json!({"horizontalAlignment": "LEFT", "verticalAlignment": "MIDDLE", "textFormat": {"bold": false}})
    };

    json!({"userEnteredValue": user_entered_value, "userEnteredFormat": format})
}

/// The `batchUpdate` request object for one operation.
pub fn operation_request(operation: &Operation) -> Value {
    match operation {
        Operation::AddSheet { title, sheet_id } => json!({
            "addSheet": {"properties": {"title": title, "sheetId": sheet_id}}
        }),
        Operation::DeleteSheet { sheet_id } => json!({
            "deleteSheet": {"sheetId": sheet_id}
        }),
        Operation::ClearSheet { sheet_id } => json!({
            "updateCells": {"rows": [], "fields": "*", "range": {"sheetId": sheet_id}}
        }),
        Operation::WriteRows { sheet_id, rows } => {
            let rows: Vec<Value> = rows
                .iter()
                .enumerate()
                .map(|(index, row)| {
                    let values: Vec<Value> = row.iter().map(|value| cell_data(value, index == 0)).collect();
                    json!({"values": values})
                })
                .collect();
            json!({
                "updateCells": {
                    "rows": rows,
                    "fields": "*",
                    "start": {"sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0}
                }
            })
        }
        Operation::ApplyBorder { sheet_id, rect } => {
            let solid = json!({"style": "SOLID"});
            json!({
                "updateBorders": {
                    "range": {
                        "sheetId": sheet_id,
                        "startRowIndex": rect.first_row,
                        "endRowIndex": rect.first_row + rect.rows,
                        "startColumnIndex": rect.first_column,
                        "endColumnIndex": rect.first_column + rect.columns
                    },
                    "top": solid,
                    "bottom": solid,
                    "left": solid,
                    "right": solid,
                    "innerHorizontal": solid,
                    "innerVertical": solid
                }
            })
        }
        Operation::ResizeColumns { sheet_id } => json!({
            "autoResizeDimensions": {"dimensions": {"sheetId": sheet_id, "dimension": "COLUMNS"}}
        }),
        Operation::MergeRun {
            sheet_id,
            start_row,
            row_count,
            column,
        } => json!({
            "mergeCells": {
                "range": {
                    "sheetId": sheet_id,
                    "startRowIndex": start_row,
                    "endRowIndex": start_row + row_count,
                    "startColumnIndex": column,
                    "endColumnIndex": column + 1
                },
                "mergeType": "MERGE_ALL"
            }
        }),
        Operation::UnmergeAll { sheet_id } => json!({
            "unmergeCells": {"range": {"sheetId": sheet_id}}
        }),
    }
}

pub fn batch_update_body(operations: &[Operation]) -> Value {
    let requests: Vec<Value> = operations.iter().map(operation_request).collect();
    json!({"requests": requests, "includeSpreadsheetInResponse": false})
}

pub struct GoogleSheetsSink {
    client: Client,
    credentials: SheetsCredentials,
    /// Obtained on first use, so a long collection does not outlive it.
    access_token: Option<String>,
    spreadsheet_id: String,
    base_url: String,
}

impl GoogleSheetsSink {
    pub fn new(credentials: SheetsCredentials, spreadsheet_id: &str) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(60)).build()?;

        Ok(Self {
            client,
            credentials,
            access_token: None,
            spreadsheet_id: spreadsheet_id.to_string(),
            base_url: SHEETS_API_BASE.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn auth_header(&mut self) -> Result<String> {
        if self.access_token.is_none() {
            self.access_token = Some(self.credentials.access_token()?);
        }
        Ok(format!("Bearer {}", self.access_token.as_deref().unwrap_or_default()))
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/{}", self.base_url, urlencoding::encode(&self.spreadsheet_id))
    }

    fn check(response: reqwest::blocking::Response) -> Result<String> {
        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            let reason = if body.trim().is_empty() {
                status.canonical_reason().unwrap_or("Unknown").to_string()
            } else {
                body
            };
            return Err(CarsError::SinkRejected {
                status: status.as_u16(),
                reason,
            });
        }
        Ok(body)
    }
}

impl TabularSink for GoogleSheetsSink {
    fn name(&self) -> &str {
        "Google spreadsheet"
    }

    fn max_title_len(&self) -> usize {
        SHEETS_MAX_TITLE_LEN
    }

    fn inventory(&mut self) -> Result<SheetInventory> {
        let auth_header = self.auth_header()?;
        let response = self
            .client
            .get(self.spreadsheet_url())
            .query(&[("fields", INVENTORY_FIELDS)])
            .header("Authorization", auth_header)
            .send()?;
        parse_inventory(&Self::check(response)?)
    }

    fn apply(&mut self, operations: Vec<Operation>) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        debug_println!("Submitting {} operations to spreadsheet {}", operations.len(), self.spreadsheet_id);

        let auth_header = self.auth_header()?;
        let response = self
            .client
            .post(format!("{}:batchUpdate", self.spreadsheet_url()))
            .header("Authorization", auth_header)
            .json(&batch_update_body(&operations))
            .send()?;
        Self::check(response)?;
        Ok(())
    }
}
