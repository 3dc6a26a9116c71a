use anyhow::{bail, ensure, Context, Result};
use carsheet::api::HttpTransport;
use carsheet::auth::SheetsCredentials;
use carsheet::collector::run_collection;
use carsheet::config::AppConfig;
use carsheet::debug;
use carsheet::models::ListingOrder;
use carsheet::sheets_sink::GoogleSheetsSink;
use carsheet::tui::CollectionTUI;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Collects car listings into a Google spreadsheet")]
struct Args {
    /// Spreadsheet to synchronize
    #[clap(short, long, env = "SPREADSHEET_ID")]
    spreadsheet_id: String,

    /// Service account key file (JSON) used to obtain access tokens
    #[clap(long, env = "GOOGLE_APPLICATION_CREDENTIALS", required_unless_present = "access_token")]
    credentials: Option<PathBuf>,

    /// OAuth 2.0 access token with the spreadsheets scope, overrides --credentials
    #[clap(short, long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Path to the JSON configuration with the cars to collect
    #[clap(short, long, env = "CARS_CONFIG", default_value = "config/cars.json")]
    config: PathBuf,

    /// Row order of the per-vehicle sheets
    #[clap(long, value_enum, default_value = "recency")]
    order: ListingOrder,

    /// Enable debug output
    #[clap(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    debug::set_debug(args.debug);

    let config = AppConfig::load(&args.config)?;
    let transport = HttpTransport::new().context("Failed to build HTTP client")?;
    let credentials = match (args.access_token, args.credentials) {
        (Some(token), _) => SheetsCredentials::AccessToken(token),
        (None, Some(key_path)) => {
            ensure!(key_path.is_file(), "Service account key not found: {}", key_path.display());
            SheetsCredentials::ServiceAccount(key_path)
        }
        (None, None) => bail!("Either --credentials or --access-token is required"),
    };
    let mut sink = GoogleSheetsSink::new(credentials, &args.spreadsheet_id)
        .context("Failed to build spreadsheet client")?;
    let mut tui = CollectionTUI::new(config.queries().len());

    // A rejected batch can leave the spreadsheet half written.
    run_collection(&transport, &config, &mut sink, args.order, &mut tui)
        .context(format!("Failed to update spreadsheet {}", args.spreadsheet_id))?;

    println!("Done");
    Ok(())
}
