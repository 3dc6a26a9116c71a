use std::collections::BTreeSet;
use std::fmt;

use clap::ValueEnum;

/// Body type label used when an advert does not carry the `body_type` property.
pub const NO_BODY_TYPE: &str = "-";

pub const LISTING_COLUMNS: [&str; 5] = ["Price", "Year", "Link", "Days on sale", "Body type"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// Whole USD amount.
    pub price: i64,
    pub year: i32,
    pub url: String,
    pub days_on_sale: i64,
    pub body_type: String,
}

impl Listing {
    pub fn to_row(&self) -> Vec<CellValue> {
        vec![
            CellValue::Number(self.price),
            CellValue::Number(self.year as i64),
            CellValue::from(self.url.as_str()),
            CellValue::Number(self.days_on_sale),
            CellValue::Text(self.body_type.clone()),
        ]
    }
}

/// One sheet's worth of listings: a vehicle plus optional generation and body types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct VehicleQuery {
    pub brand: String,
    pub model: String,
    /// Empty means every generation.
    pub generation: String,
    /// Empty means every body type.
    pub body_types: BTreeSet<String>,
}

impl VehicleQuery {
    pub fn new(brand: &str, model: &str, generation: &str) -> Self {
        Self {
            brand: brand.to_string(),
            model: model.to_string(),
            generation: generation.to_string(),
            body_types: BTreeSet::new(),
        }
    }

    pub fn with_body_types<I, S>(mut self, body_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body_types = body_types.into_iter().map(Into::into).collect();
        self
    }

    pub fn generation(&self) -> Option<&str> {
        if self.generation.trim().is_empty() {
            None
        } else {
            Some(&self.generation)
        }
    }

    /// Untruncated sheet title, e.g. `Toyota Camry XV70 Рестайлинг`.
    pub fn sheet_title(&self) -> String {
        let mut title = format!("{} {}", self.brand, self.model);
        if let Some(generation) = self.generation() {
            title.push(' ');
            title.push_str(&generation.replace("· ", ""));
        }
        title
    }
}

impl fmt::Display for VehicleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.brand, self.model)?;
        if let Some(generation) = self.generation() {
            write!(f, " {}", generation)?;
        }
        if !self.body_types.is_empty() {
            let body_types: Vec<&str> = self.body_types.iter().map(String::as_str).collect();
            write!(f, " [{}]", body_types.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentifiers {
    pub vendor_id: i64,
    pub model_id: i64,
    pub generation_id: Option<i64>,
    pub body_type_ids: BTreeSet<i64>,
}

/// A single spreadsheet cell as written by the sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Number(i64),
    /// Rendered as a hyperlink whose caption is the last path segment.
    Link(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Text(text) if text.is_empty())
    }

    /// Visible text of the cell.
    pub fn display(&self) -> String {
        match self {
            CellValue::Text(text) => text.clone(),
            CellValue::Number(number) => number.to_string(),
            CellValue::Link(url) => link_caption(url).to_string(),
        }
    }
}

pub fn link_caption(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        if value.starts_with("https://") || value.starts_with("http://") {
            CellValue::Link(value.to_string())
        } else {
            CellValue::Text(value.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::from(value.as_str())
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as i64)
    }
}

/// Row order of a vehicle sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListingOrder {
    /// Newest year first, then shortest time on sale.
    Recency,
    /// Shortest time on sale first, then oldest year.
    DaysOnSale,
}

impl ListingOrder {
    pub fn sort(&self, listings: &mut [Listing]) {
        match self {
            ListingOrder::Recency => {
                listings.sort_by(|a, b| b.year.cmp(&a.year).then(a.days_on_sale.cmp(&b.days_on_sale)))
            }
            ListingOrder::DaysOnSale => {
                listings.sort_by(|a, b| a.days_on_sale.cmp(&b.days_on_sale).then(a.year.cmp(&b.year)))
            }
        }
    }
}
