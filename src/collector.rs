use crate::api::Transport;
use crate::config::{ApiConfig, AppConfig};
use crate::error::Result;
use crate::fetcher::ListingFetcher;
use crate::models::{CellValue, Listing, ListingOrder, VehicleQuery, LISTING_COLUMNS};
use crate::operations::TabularSink;
use crate::resolver::MetadataResolver;
use crate::sync::{shorten_title, unique_title, ReportSynchronizer, SheetData, SyncReport, SUMMARY_SHEET};
use crate::tui::CollectionTUI;
use crate::{debug_eprintln, warn_eprintln};
use std::collections::HashSet;

pub const SUMMARY_COLUMNS: [&str; 7] = [
    "Brand",
    "Model",
    "Generation",
    "Year from",
    "Year to",
    "Min price",
    "Max price",
];

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleListings {
    pub query: VehicleQuery,
    pub listings: Vec<Listing>,
}

/// Summary and per-vehicle tables of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub summary: SheetData,
    pub sheets: Vec<SheetData>,
}

/// Resolves and fetches every query. A vehicle failing with a per-vehicle error is
/// reported and skipped; anything else aborts the run.
pub fn collect_listings<T: Transport + ?Sized>(
    transport: &T,
    api: &ApiConfig,
    queries: &[VehicleQuery],
    tui: &mut CollectionTUI,
) -> Result<Vec<VehicleListings>> {
    let mut resolver = MetadataResolver::new(transport, api);
    let fetcher = ListingFetcher::new(transport, api);
    let mut collected = Vec::new();

    for query in queries {
        tui.start_vehicle(&query.to_string())?;

        match fetch_vehicle(&mut resolver, &fetcher, query, tui) {
            Ok(listings) => {
                tui.complete_vehicle(listings.len())?;
                collected.push(VehicleListings {
                    query: query.clone(),
                    listings,
                });
            }
            Err(e) if e.is_skippable() => {
                debug_eprintln!("Skipping {}: {:?}", query, e);
                tui.skip_vehicle(&e.to_string())?;
            }
            Err(e) => return Err(e),
        }
    }

    Ok(collected)
}

fn fetch_vehicle<T: Transport + ?Sized>(
    resolver: &mut MetadataResolver<'_, T>,
    fetcher: &ListingFetcher<'_, T>,
    query: &VehicleQuery,
    tui: &mut CollectionTUI,
) -> Result<Vec<Listing>> {
    let ids = resolver.resolve(query)?;
    let mut listings = Vec::new();
    for page in fetcher.pages(&ids) {
        let page = page?;
        listings.extend(page.listings);
        tui.update_pages(page.page, page.page_count, listings.len())?;
    }
    Ok(listings)
}

fn sheet_title(query: &VehicleQuery, max_title_len: usize, taken: &mut HashSet<String>) -> String {
    let mut title = query.sheet_title();
    if taken.contains(&shorten_title(&title, max_title_len)) && !query.body_types.is_empty() {
        let body_types: Vec<&str> = query.body_types.iter().map(String::as_str).collect();
        title = format!("{} {}", title, body_types.join(" "));
    }
    unique_title(&title, max_title_len, taken)
}

fn summary_row(query: &VehicleQuery, listings: &[Listing]) -> Option<Vec<CellValue>> {
    let min_year = listings.iter().map(|l| l.year).min()?;
    let max_year = listings.iter().map(|l| l.year).max()?;
    let min_price = listings.iter().map(|l| l.price).min()?;
    let max_price = listings.iter().map(|l| l.price).max()?;

    Some(vec![
        CellValue::Text(query.brand.clone()),
        CellValue::Text(query.model.clone()),
        CellValue::Text(query.generation.clone()),
        CellValue::from(min_year),
        CellValue::from(max_year),
        CellValue::from(min_price),
        CellValue::from(max_price),
    ])
}

/// Builds the tables. Vehicles without listings get neither a sheet nor a summary row;
/// summary rows are ordered by brand, model and generation so equal values are contiguous.
/// Sheet titles are made unique within `max_title_len`: a vehicle whose title is taken
/// gets its body types appended, then a counter.
pub fn build_report(vehicles: &[VehicleListings], order: ListingOrder, max_title_len: usize) -> Report {
    let mut vehicles: Vec<&VehicleListings> = vehicles.iter().filter(|v| !v.listings.is_empty()).collect();
    vehicles.sort_by(|a, b| a.query.cmp(&b.query));

    let mut taken = HashSet::from([shorten_title(SUMMARY_SHEET, max_title_len)]);
    let mut summary = SheetData::new(SUMMARY_SHEET, &SUMMARY_COLUMNS);
    let mut sheets = Vec::new();

    for vehicle in vehicles {
        let mut listings = vehicle.listings.clone();
        order.sort(&mut listings);

        let mut sheet = SheetData::new(sheet_title(&vehicle.query, max_title_len, &mut taken), &LISTING_COLUMNS);
        for listing in &listings {
            sheet.push_row(listing.to_row());
        }
        sheets.push(sheet);

        if let Some(row) = summary_row(&vehicle.query, &listings) {
            summary.push_row(row);
        }
    }

    Report { summary, sheets }
}

/// Full run: collect every configured car and publish the report through `sink`.
/// Failing to apply the report is fatal.
pub fn run_collection<T, S>(
    transport: &T,
    config: &AppConfig,
    sink: &mut S,
    order: ListingOrder,
    tui: &mut CollectionTUI,
) -> Result<SyncReport>
where
    T: Transport + ?Sized,
    S: TabularSink + ?Sized,
{
    let queries = config.queries();
    if queries.is_empty() {
        warn_eprintln!("No cars configured");
    }

    tui.start_run()?;
    let vehicles = collect_listings(transport, &config.api, &queries, tui)?;
    let report = build_report(&vehicles, order, sink.max_title_len());

    let synchronizer = ReportSynchronizer::for_sink(sink);
    let sync_report = synchronizer.synchronize(sink, &report.summary, &report.sheets)?;
    tui.show_sync(sink.name(), &sync_report)?;
    tui.show_final_summary()?;

    Ok(sync_report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NO_BODY_TYPE;
    use crate::sync::merge_runs;
    use crate::operations::Operation;
    use pretty_assertions::assert_eq;

    fn listing(price: i64, year: i32, days_on_sale: i64) -> Listing {
        Listing {
            price,
            year,
            url: format!("https://cars.av.by/x/{}", price),
            days_on_sale,
            body_type: NO_BODY_TYPE.to_string(),
        }
    }

    fn vehicle(brand: &str, model: &str, listings: Vec<Listing>) -> VehicleListings {
        VehicleListings {
            query: VehicleQuery::new(brand, model, ""),
            listings,
        }
    }

    #[test]
    fn test_summary_rows_aggregate_ranges() {
        let report = build_report(
            &[vehicle(
                "Toyota",
                "Camry",
                vec![listing(15000, 2016, 3), listing(21000, 2019, 8), listing(9000, 2012, 1)],
            )],
            ListingOrder::Recency,
            31,
        );

        assert_eq!(
            report.summary.rows[1],
            vec![
                CellValue::from("Toyota"),
                CellValue::from("Camry"),
                CellValue::from(""),
                CellValue::Number(2012),
                CellValue::Number(2019),
                CellValue::Number(9000),
                CellValue::Number(21000),
            ]
        );
        let years: Vec<CellValue> = report.sheets[0].rows[1..].iter().map(|row| row[1].clone()).collect();
        assert_eq!(
            years,
            vec![CellValue::Number(2019), CellValue::Number(2016), CellValue::Number(2012)]
        );
    }

    #[test]
    fn test_vehicles_without_listings_are_left_out() {
        let report = build_report(
            &[
                vehicle("Toyota", "Camry", vec![listing(1, 2010, 1)]),
                vehicle("Toyota", "Supra", Vec::new()),
            ],
            ListingOrder::DaysOnSale,
            31,
        );

        assert_eq!(report.sheets.len(), 1);
        assert_eq!(report.summary.data_rows(), 1);
    }

    #[test]
    fn test_same_brand_rows_become_one_merge_run() {
        let report = build_report(
            &[
                vehicle("Toyota", "Corolla", vec![listing(2, 2011, 1)]),
                vehicle("Toyota", "Camry", vec![listing(1, 2010, 1)]),
            ],
            ListingOrder::Recency,
            31,
        );

        let models: Vec<String> = report.sheets.iter().map(|s| s.title.clone()).collect();
        assert_eq!(models, vec!["Toyota Camry", "Toyota Corolla"]);
        assert_eq!(
            merge_runs(0, &report.summary.rows, 0),
            vec![Operation::MergeRun {
                sheet_id: 0,
                start_row: 1,
                row_count: 2,
                column: 0
            }]
        );
        assert!(merge_runs(0, &report.summary.rows, 1).is_empty());
    }

    #[test]
    fn test_body_type_variants_get_their_own_sheets() {
        let octavia = |body_type: &str, price| VehicleListings {
            query: VehicleQuery::new("Skoda", "Octavia", "").with_body_types([body_type]),
            listings: vec![listing(price, 2018, 5)],
        };
        let report = build_report(
            &[octavia("Универсал", 14000), octavia("Лифтбек", 12000)],
            ListingOrder::Recency,
            31,
        );

        let titles: Vec<&str> = report.sheets.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Skoda Octavia", "Skoda Octavia Универсал"]);
        assert_eq!(report.summary.data_rows(), 2);

        let mut inventory = crate::operations::SheetInventory::new();
        let log = ReportSynchronizer::new(31).plan(&mut inventory, &report.summary, &report.sheets);
        let added = log.iter().filter(|op| matches!(op, Operation::AddSheet { .. })).count();
        assert_eq!(added, 1 + report.summary.data_rows());
    }

    #[test]
    fn test_repeated_titles_get_a_counter() {
        let report = build_report(
            &[
                vehicle("Toyota", "Camry", vec![listing(1, 2010, 1)]),
                vehicle("Toyota", "Camry", vec![listing(2, 2011, 1)]),
            ],
            ListingOrder::Recency,
            31,
        );

        let titles: Vec<&str> = report.sheets.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Toyota Camry", "Toyota Camry (2)"]);
    }
}
