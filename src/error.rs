//! Error types shared by the resolver, the fetcher and the report sinks.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CarsError {
    #[error("Brand {name} not found. Must be one of {known:?}.")]
    UnknownVendor { name: String, known: Vec<String> },

    #[error("Model {name} not found. Must be one of {known:?}.")]
    UnknownModel { name: String, known: Vec<String> },

    #[error("Generation {name} not found. Must be one of {known:?}.")]
    UnknownGeneration { name: String, known: Vec<String> },

    #[error("Body type {name} not found. Must be one of {known:?}.")]
    UnknownBodyType { name: String, known: Vec<String> },

    /// A metadata lookup (landing page, models, generations) got a non-success status.
    #[error("Metadata request failed: {status}, {reason}")]
    BackendUnavailable { status: u16, reason: String },

    /// A listing page request got a non-success status.
    #[error("Request error: {status}, {reason}")]
    RequestFailed { status: u16, reason: String },

    #[error("Unexpected API response: {0}")]
    UnexpectedResponse(String),

    #[error("Sheet with id {0} does not exist")]
    UnknownSheet(i64),

    #[error("Sheet {0} already exists")]
    DuplicateSheet(String),

    #[error("Merge range overlaps an existing merge on sheet {0}")]
    OverlappingMerge(i64),

    #[error("Google authentication failed: {0}")]
    Auth(String),

    #[error("Spreadsheet API rejected the request: {status}, {reason}")]
    SinkRejected { status: u16, reason: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CarsError {
    /// Whether the error only concerns one vehicle, so the batch may continue with the rest.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            CarsError::UnknownVendor { .. }
                | CarsError::UnknownModel { .. }
                | CarsError::UnknownGeneration { .. }
                | CarsError::UnknownBodyType { .. }
                | CarsError::BackendUnavailable { .. }
                | CarsError::RequestFailed { .. }
                | CarsError::UnexpectedResponse(_)
                | CarsError::Http(_)
                | CarsError::Json(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CarsError>;
