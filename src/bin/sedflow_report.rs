//! Report Binary - derives and prints the sector energy/CO2 breakdown
//! for one location and year, alongside the US reference values.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin sedflow_report -- [LOCATION] [YEAR] [--json]
//! ```
//!
//! LOCATION is a state code or "US" (default), YEAR defaults to the latest
//! year both datasets fully cover.
//!
//! ## Environment Variables
//!
//! - EIA_API_KEY - API key for the EIA data service (required)
//! - EIA_SEDS_URL - energy dataset base URL (optional override)
//! - EIA_CO2_URL - CO2 dataset base URL (optional override)
//! - RUST_LOG - Logging level (optional, default: info)

use std::env;

use sedflow::{
    latest_complete_year, run_selection, Catalog, EiaClient, EiaConfig, ScopeComparison,
    SnapshotStore,
};

#[derive(Debug)]
struct ReportArgs {
    location: String,
    year: Option<i32>,
    json: bool,
}

fn parse_args() -> ReportArgs {
    let args: Vec<String> = env::args().skip(1).collect();
    let json = args.iter().any(|a| a == "--json");
    let mut positional = args.iter().filter(|a| !a.starts_with("--"));

    let location = positional
        .next()
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "US".to_string());
    let year = positional.next().and_then(|s| s.parse().ok());

    ReportArgs {
        location,
        year,
        json,
    }
}

fn print_table(view: &ScopeComparison) {
    println!(
        "Energy & CO2 in {} in {} (reference: {}):",
        view.location, view.year, view.reference_location
    );
    println!(
        "{:<38} {:>14} {:>12} {:>10}",
        "", "Energy (GWh)", "CO2 (MMT)", "% of ref"
    );

    for sector in &view.sectors {
        println!("{}", capitalize(&sector.sector.to_string()));
        let rows = [
            ("electric sector", &sector.electric),
            ("primary", &sector.primary),
            ("total", &sector.total),
        ];
        for (name, tier) in rows {
            println!(
                "  {:<36} {:>14.2} {:>12.2} {:>9}",
                name,
                tier.energy_gwh.selected,
                tier.co2_mmt.selected,
                percent_of_reference(tier.energy_gwh.selected, tier.energy_gwh.reference),
            );
        }
        for piece in &sector.pieces {
            println!(
                "    primary {:<28} {:>14.2} {:>12.2} {:>9}",
                piece.fuel,
                piece.energy_gwh.selected,
                piece.co2_mmt.selected,
                percent_of_reference(piece.energy_gwh.selected, piece.energy_gwh.reference),
            );
        }
    }
}

fn percent_of_reference(selected: f64, reference: f64) -> String {
    if reference == 0.0 {
        "-".to_string()
    } else {
        format!("{:.2}%", 100.0 * selected / reference)
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let args = parse_args();
    let config = EiaConfig::from_env()?;
    let catalog = Catalog::us_seds();
    let fetcher = EiaClient::new(config);
    let store = SnapshotStore::new();

    let year = match args.year {
        Some(year) => year,
        None => {
            log::info!("🔍 Probing datasets for the latest complete year...");
            match latest_complete_year(&fetcher, &catalog).await? {
                Some(year) => year,
                None => {
                    // fall back to a conservative lag behind the calendar
                    use chrono::Datelike;
                    let fallback = chrono::Utc::now().year() - 2;
                    log::warn!(
                        "⚠️  No year with full coverage found, falling back to {}",
                        fallback
                    );
                    fallback
                }
            }
        }
    };

    log::info!("📊 Location: {}, year: {}", args.location, year);
    run_selection(&fetcher, &catalog, &store, &args.location, year).await?;

    let view = store
        .comparison()
        .expect("both scopes committed by run_selection");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_table(&view);
    }

    Ok(())
}
