mod analytics;
mod benchmark;
mod config;
mod error;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::storage::Repository;

#[derive(Parser)]
#[command(name = "fuelwatch", about = "Fuel price scraper & dashboard data", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest fuel prices and the oil benchmark (what cron should invoke)
    Update,

    /// Ingest fuel prices only
    Fuel,

    /// Ingest the oil benchmark price only
    Benchmark,

    /// Show the cheapest current price per brand
    Lowest,

    /// Show the cheapest price per lookback window
    Periods,

    /// Compare the latest reading against the previous one and period lows
    Summary,

    /// Show the per-day min/max price series (the chart feed)
    Chart,

    /// Show database statistics
    Stats,

    /// Apply schema migrations without ingesting
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "fuelwatch=info,warn",
        1 => "fuelwatch=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Update => {
            let _t = utils::Timer::start("Scheduled update");
            let pipeline = Pipeline::new(config);

            let fuel = pipeline.ingest_fuel().await?;
            info!(
                "Fuel: {} observations inserted, {} pages failed",
                fuel.inserted, fuel.fetch_errors
            );

            let bench = pipeline.ingest_benchmark().await?;
            info!(
                "Benchmark: {} inserted, {} feed errors",
                bench.inserted, bench.fetch_errors
            );
        }

        Command::Fuel => {
            let _t = utils::Timer::start("Fuel ingest");
            let stats = Pipeline::new(config).ingest_fuel().await?;
            info!(
                "Done: {} inserted ({} extracted, {} stale, {} unparsable)",
                stats.inserted, stats.rows_extracted, stats.stale_rows, stats.parse_errors
            );
        }

        Command::Benchmark => {
            let _t = utils::Timer::start("Benchmark ingest");
            let stats = Pipeline::new(config).ingest_benchmark().await?;
            info!(
                "Done: {} inserted, {} feed errors",
                stats.inserted, stats.fetch_errors
            );
        }

        Command::Lowest => {
            let repo = Repository::open(&config.storage.db_path)?;
            let records = repo.fuel_records()?;
            let rows = analytics::lowest_current_prices(&records);

            if rows.is_empty() {
                println!("No observations yet — run `fuelwatch fuel` first.");
            } else {
                println!("Cheapest current price per brand (as of {}):", rows[0].as_of);
                for row in &rows {
                    println!(
                        "  {:<12} {:>10}   {}",
                        row.brand,
                        utils::fmt_kr(row.price),
                        row.stations.join(", ")
                    );
                }
            }
        }

        Command::Periods => {
            let repo = Repository::open(&config.storage.db_path)?;
            let records = repo.fuel_records()?;
            let rows = analytics::lowest_by_period(&records, Local::now().date_naive());

            if rows.is_empty() {
                println!("No observations yet — run `fuelwatch fuel` first.");
            }
            for row in &rows {
                println!(
                    "  {:<9} {:>10}   {} ({}, {})",
                    row.window.label(),
                    utils::fmt_kr(row.price),
                    row.station,
                    row.brand,
                    row.observed_date
                );
            }
        }

        Command::Summary => {
            let repo = Repository::open(&config.storage.db_path)?;
            let records = repo.fuel_records()?;

            match analytics::price_summary(&records, Local::now().date_naive()) {
                None => println!("No observations yet — run `fuelwatch fuel` first."),
                Some(s) => {
                    let flag = |f: Option<bool>| match f {
                        Some(true) => "yes",
                        Some(false) => "no",
                        None => "unknown",
                    };
                    println!("─────────────────────────────────");
                    println!("  fuelwatch — Price Summary");
                    println!("─────────────────────────────────");
                    println!("  Latest   : {} ({})", utils::fmt_kr(s.latest), s.latest_at);
                    println!(
                        "  Previous : {}",
                        s.previous.map(utils::fmt_kr).unwrap_or("—".into())
                    );
                    println!("  1m low   : {}", flag(s.month_low));
                    println!("  1y low   : {}", flag(s.year_low));
                    println!("─────────────────────────────────");
                }
            }
        }

        Command::Chart => {
            let repo = Repository::open(&config.storage.db_path)?;
            let records = repo.fuel_records()?;
            for r in analytics::daily_ranges(&records) {
                println!(
                    "  {}   low {:>10}   high {:>10}",
                    r.date,
                    utils::fmt_kr(r.low),
                    utils::fmt_kr(r.high)
                );
            }
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let fuel = repo.fuel_count()?;
            let bench = repo.benchmark_count()?;
            let (min, max) = repo.observed_date_range().unwrap_or((None, None));
            println!("─────────────────────────────────");
            println!("  fuelwatch — Database Stats");
            println!("─────────────────────────────────");
            println!("  Fuel rows      : {}", fuel);
            println!("  Benchmark rows : {}", bench);
            println!("  From           : {}", min.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  To             : {}", max.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
