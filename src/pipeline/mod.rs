//! Pipeline orchestrator: ties the sources → normalization → storage
//! together.
//!
//! ## Run modes
//!
//! `ingest_fuel()` — scheduled mode (cron use): sweep the listing pages,
//!   normalize to current-day observations, collapse to one per station,
//!   append the batch. Re-running the same day appends again; the store is
//!   an observation log, not a snapshot.
//!
//! `ingest_benchmark()` — fetch the latest crude quote plus exchange rate,
//!   convert, append one row. Independently schedulable; either entry point
//!   is safe to call out-of-band (e.g. at startup).
//!
//! Runs serialize on an internal gate: dedup is scoped to a single run, so
//! two overlapping sweeps would double-append.

use crate::benchmark::{BenchmarkSource, OilPriceApi};
use crate::config::AppConfig;
use crate::scraper::{cleaner, BensinpriserScraper, FuelPriceSource};
use crate::storage::Repository;
use anyhow::{Context, Result};
use chrono::Local;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Pipeline {
    config: AppConfig,
    ingest_gate: Mutex<()>,
}

impl Pipeline {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            ingest_gate: Mutex::new(()),
        }
    }

    /// Ingest fuel prices now.
    pub async fn ingest_fuel(&self) -> Result<FuelIngestStats> {
        let _run = self.ingest_gate.lock().await;

        let repo = self.open_repo()?;
        let source =
            BensinpriserScraper::new(&self.config.scraper).context("Failed to build scraper")?;
        let today = Local::now().date_naive();

        self.run_fuel(&source, &repo, today).await
    }

    /// Ingest the crude-oil benchmark price now.
    pub async fn ingest_benchmark(&self) -> Result<BenchmarkIngestStats> {
        let _run = self.ingest_gate.lock().await;

        let repo = self.open_repo()?;
        let source = OilPriceApi::new(&self.config.benchmark, &self.config.scraper)
            .context("Failed to build benchmark source")?;

        self.run_benchmark(&source, &repo).await
    }

    fn open_repo(&self) -> Result<Repository> {
        // The store is the only fatal dependency: without it there is
        // nothing to append to or read from.
        let repo = Repository::open(&self.config.storage.db_path).context("Failed to open store")?;
        if self.config.storage.run_migrations {
            repo.run_migrations()?;
        }
        Ok(repo)
    }

    async fn run_fuel(
        &self,
        source: &dyn FuelPriceSource,
        repo: &Repository,
        today: chrono::NaiveDate,
    ) -> Result<FuelIngestStats> {
        let run_id = repo.begin_ingest_run("fuel").unwrap_or(0);

        let scrape = source.fetch_raw_rows().await?;

        let mut observations = Vec::with_capacity(scrape.rows.len());
        let mut stale_rows = 0usize;
        let mut parse_errors = 0usize;

        for row in &scrape.rows {
            match cleaner::row_to_observation(row, today) {
                Ok(Some(obs)) => observations.push(obs),
                Ok(None) => stale_rows += 1,
                Err(e) => {
                    warn!("{} ({}): {}", row.station, row.brand, e);
                    parse_errors += 1;
                }
            }
        }

        let deduped = cleaner::dedupe_latest_per_station(observations);
        let inserted = repo.insert_fuel_observations(&deduped)?;

        let stats = FuelIngestStats {
            pages_fetched: scrape.pages_fetched,
            fetch_errors: scrape.fetch_errors,
            rows_extracted: scrape.rows.len(),
            rows_skipped: scrape.rows_skipped,
            stale_rows,
            parse_errors,
            inserted,
        };

        repo.finish_ingest_run(run_id, inserted, stats.error_note().as_deref())
            .ok();

        info!(
            "Fuel ingest done: {} inserted ({} extracted, {} skipped, {} stale, {} unparsable, {} pages failed)",
            stats.inserted,
            stats.rows_extracted,
            stats.rows_skipped,
            stats.stale_rows,
            stats.parse_errors,
            stats.fetch_errors,
        );
        Ok(stats)
    }

    async fn run_benchmark(
        &self,
        source: &dyn BenchmarkSource,
        repo: &Repository,
    ) -> Result<BenchmarkIngestStats> {
        let run_id = repo.begin_ingest_run("benchmark").unwrap_or(0);

        // A dead feed skips this run; the next scheduled trigger is the
        // retry mechanism.
        match source.fetch_latest().await {
            Ok(obs) => {
                repo.insert_benchmark_observation(&obs)?;
                repo.finish_ingest_run(run_id, 1, None).ok();
                info!(
                    "Benchmark ingest done: {:.4} per litre as of {}",
                    obs.price, obs.observed_at
                );
                Ok(BenchmarkIngestStats {
                    inserted: 1,
                    fetch_errors: 0,
                })
            }
            Err(e) => {
                warn!("Benchmark source skipped: {}", e);
                repo.finish_ingest_run(run_id, 0, Some(&e.to_string())).ok();
                Ok(BenchmarkIngestStats {
                    inserted: 0,
                    fetch_errors: 1,
                })
            }
        }
    }
}

// ── Stats ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct FuelIngestStats {
    pub pages_fetched: usize,
    pub fetch_errors: usize,
    pub rows_extracted: usize,
    pub rows_skipped: usize,
    pub stale_rows: usize,
    pub parse_errors: usize,
    pub inserted: usize,
}

impl FuelIngestStats {
    fn error_note(&self) -> Option<String> {
        if self.fetch_errors == 0 && self.parse_errors == 0 {
            None
        } else {
            Some(format!(
                "{} pages failed, {} rows unparsable",
                self.fetch_errors, self.parse_errors
            ))
        }
    }
}

#[derive(Debug)]
pub struct BenchmarkIngestStats {
    pub inserted: usize,
    pub fetch_errors: usize,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::models::{BenchmarkObservation, RawListingRow};
    use crate::scraper::ListingScrape;
    use async_trait::async_trait;
    use chrono::NaiveDate;

    struct FixedListing(Vec<RawListingRow>);

    #[async_trait]
    impl FuelPriceSource for FixedListing {
        async fn fetch_raw_rows(&self) -> Result<ListingScrape> {
            Ok(ListingScrape {
                rows: self.0.clone(),
                pages_fetched: 1,
                fetch_errors: 0,
                rows_skipped: 0,
            })
        }
    }

    struct DeadBenchmark;

    #[async_trait]
    impl BenchmarkSource for DeadBenchmark {
        async fn fetch_latest(&self) -> Result<BenchmarkObservation, FetchError> {
            Err(FetchError::Status {
                url: "https://feed.test".into(),
                status: 503,
            })
        }
    }

    fn row(brand: &str, station: &str, price: &str, date: &str) -> RawListingRow {
        RawListingRow {
            brand: brand.into(),
            station: station.into(),
            raw_price: price.into(),
            raw_date: date.into(),
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(AppConfig::default())
    }

    #[tokio::test]
    async fn fuel_run_normalizes_dedups_and_appends() {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();

        let source = FixedListing(vec![
            row("Shell", "StationA", "15,49 kr", "5/6"),
            row("Shell", "StationB", "15,49 kr", "5/6"),
            row("Preem", "StationC", "15,99 kr", "5/6"),
            // pagination overlap — same station twice
            row("Shell", "StationA", "15,49 kr", "5/6"),
            // stale reading from yesterday
            row("OKQ8", "StationD", "15,79 kr", "4/6"),
            // broken markup survivor
            row("Ingo", "StationE", "pris saknas", "5/6"),
        ]);

        let today = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        let stats = pipeline().run_fuel(&source, &repo, today).await.unwrap();

        assert_eq!(stats.rows_extracted, 6);
        assert_eq!(stats.stale_rows, 1);
        assert_eq!(stats.parse_errors, 1);
        assert_eq!(stats.inserted, 3);

        let records = repo.fuel_records().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.observed_date == today));
        assert!(records.iter().all(|r| r.price > 0.0));
    }

    #[tokio::test]
    async fn rerun_on_same_source_appends_duplicates() {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();

        let source = FixedListing(vec![row("Shell", "StationA", "15,49 kr", "5/6")]);
        let today = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();

        let p = pipeline();
        p.run_fuel(&source, &repo, today).await.unwrap();
        p.run_fuel(&source, &repo, today).await.unwrap();

        assert_eq!(repo.fuel_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn dead_benchmark_feed_is_skipped_not_fatal() {
        let repo = Repository::open_in_memory().unwrap();
        repo.run_migrations().unwrap();

        let stats = pipeline()
            .run_benchmark(&DeadBenchmark, &repo)
            .await
            .unwrap();

        assert_eq!(stats.inserted, 0);
        assert_eq!(stats.fetch_errors, 1);
        assert_eq!(repo.benchmark_count().unwrap(), 0);
    }
}
