use anyhow::{Context, Result};
use carsheet::api::HttpTransport;
use carsheet::collector::run_collection;
use carsheet::config::AppConfig;
use carsheet::debug;
use carsheet::models::ListingOrder;
use carsheet::tui::CollectionTUI;
use carsheet::xlsx_sink::LocalWorkbook;
use chrono::Local;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Carsheet - collects car listings into an xlsx report")]
struct Args {
    /// Path to the JSON configuration with the cars to collect
    #[clap(short, long, env = "CARS_CONFIG", default_value = "config/cars.json")]
    config: PathBuf,

    /// Directory the timestamped report is written to
    #[clap(short, long, default_value = "dumps")]
    output_dir: PathBuf,

    /// Row order of the per-vehicle sheets
    #[clap(long, value_enum, default_value = "days-on-sale")]
    order: ListingOrder,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    debug::set_debug(args.debug);

    println!("Carsheet - Car Listings Collector");
    println!("=================================");

    let config = AppConfig::load(&args.config)?;
    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let mut workbook = LocalWorkbook::new();
    let mut tui = CollectionTUI::new(config.queries().len());

    run_collection(&transport, &config, &mut workbook, args.order, &mut tui)
        .context("Failed to build the report")?;

    let file_name = format!("{}.xlsx", Local::now().format("%Y-%m-%d.%H-%M-%S"));
    let path = args.output_dir.join(file_name);
    workbook
        .save(&path)
        .context(format!("Failed to save report: {}", path.display()))?;

    println!("Saved to: {}", path.display());
    Ok(())
}
