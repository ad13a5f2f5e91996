use crate::models::{BenchmarkObservation, BenchmarkRecord, FuelObservation, FuelRecord};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use duckdb::{params, Connection};
use std::path::Path;
use tracing::info;

// ── Schema ────────────────────────────────────────────────────────────────────

// Both observation tables are append-only logs: only the run log is ever
// updated. Uniqueness of "latest per station" is a query-time concern.
const DDL: &str = r#"
CREATE SEQUENCE IF NOT EXISTS fuel_prices_id_seq;
CREATE TABLE IF NOT EXISTS fuel_prices (
    id              BIGINT PRIMARY KEY DEFAULT nextval('fuel_prices_id_seq'),
    brand           VARCHAR  NOT NULL,
    station         VARCHAR  NOT NULL,
    price           DOUBLE   NOT NULL,
    observed_date   DATE     NOT NULL,
    recorded_at     TIMESTAMP NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS benchmark_prices_id_seq;
CREATE TABLE IF NOT EXISTS benchmark_prices (
    id              BIGINT PRIMARY KEY DEFAULT nextval('benchmark_prices_id_seq'),
    price           DOUBLE   NOT NULL,
    observed_at     TIMESTAMP NOT NULL,
    recorded_at     TIMESTAMP NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS ingest_runs_id_seq;
CREATE TABLE IF NOT EXISTS ingest_runs (
    id              BIGINT PRIMARY KEY DEFAULT nextval('ingest_runs_id_seq'),
    kind            VARCHAR  NOT NULL,
    started_at      TIMESTAMP NOT NULL,
    finished_at     TIMESTAMP,
    status          VARCHAR  NOT NULL DEFAULT 'running',
    rows_inserted   INTEGER  DEFAULT 0,
    error_msg       VARCHAR
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_fuel_recorded  ON fuel_prices (recorded_at);
CREATE INDEX IF NOT EXISTS idx_fuel_observed  ON fuel_prices (observed_date);
CREATE INDEX IF NOT EXISTS idx_fuel_brand     ON fuel_prices (brand);
CREATE INDEX IF NOT EXISTS idx_bench_recorded ON benchmark_prices (recorded_at);
"#;

// ── Repository ────────────────────────────────────────────────────────────────

pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        self.conn.execute_batch(DDL).context("DDL failed")?;
        self.conn
            .execute_batch(INDEXES)
            .context("Index creation failed")?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Fuel observations ─────────────────────────────────────────────────────

    /// Append one ingestion batch. `recorded_at` is stamped here, once per
    /// batch, so it is monotonically non-decreasing across inserts.
    pub fn insert_fuel_observations(&self, batch: &[FuelObservation]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let recorded_at = Utc::now().naive_utc();
        let tx = self.conn.unchecked_transaction()?;

        for obs in batch {
            tx.execute(
                r#"INSERT INTO fuel_prices (brand, station, price, observed_date, recorded_at)
                   VALUES (?, ?, ?, ?, ?)"#,
                params![obs.brand, obs.station, obs.price, obs.observed_date, recorded_at],
            )
            .with_context(|| format!("insert observation {} {}", obs.brand, obs.station))?;
        }

        tx.commit()?;
        Ok(batch.len())
    }

    pub fn fuel_records(&self) -> Result<Vec<FuelRecord>> {
        self.query_fuel(
            "SELECT id, brand, station, price, observed_date, recorded_at
             FROM fuel_prices ORDER BY recorded_at, id",
            params![],
        )
    }

    pub fn fuel_records_since(&self, start: NaiveDate) -> Result<Vec<FuelRecord>> {
        self.query_fuel(
            "SELECT id, brand, station, price, observed_date, recorded_at
             FROM fuel_prices WHERE observed_date >= ? ORDER BY recorded_at, id",
            params![start],
        )
    }

    fn query_fuel(&self, sql: &str, args: &[&dyn duckdb::ToSql]) -> Result<Vec<FuelRecord>> {
        let mut stmt = self.conn.prepare(sql)?;
        let records: Vec<FuelRecord> = stmt
            .query_map(args, |r| {
                Ok(FuelRecord {
                    id: r.get(0)?,
                    brand: r.get(1)?,
                    station: r.get(2)?,
                    price: r.get(3)?,
                    observed_date: r.get(4)?,
                    recorded_at: r.get(5)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    pub fn fuel_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM fuel_prices")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    pub fn observed_date_range(&self) -> Result<(Option<NaiveDate>, Option<NaiveDate>)> {
        let mut s = self
            .conn
            .prepare("SELECT MIN(observed_date), MAX(observed_date) FROM fuel_prices")?;
        Ok(s.query_row([], |r| Ok((r.get(0)?, r.get(1)?)))?)
    }

    // ── Benchmark observations ────────────────────────────────────────────────

    pub fn insert_benchmark_observation(&self, obs: &BenchmarkObservation) -> Result<()> {
        self.conn
            .execute(
                r#"INSERT INTO benchmark_prices (price, observed_at, recorded_at)
                   VALUES (?, ?, ?)"#,
                params![obs.price, obs.observed_at, Utc::now().naive_utc()],
            )
            .context("insert benchmark observation")?;
        Ok(())
    }

    pub fn benchmark_records(&self) -> Result<Vec<BenchmarkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, price, observed_at, recorded_at
             FROM benchmark_prices ORDER BY recorded_at, id",
        )?;
        let records: Vec<BenchmarkRecord> = stmt
            .query_map([], |r| {
                Ok(BenchmarkRecord {
                    id: r.get(0)?,
                    price: r.get(1)?,
                    observed_at: r.get(2)?,
                    recorded_at: r.get(3)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(records)
    }

    pub fn benchmark_count(&self) -> Result<i64> {
        let mut s = self.conn.prepare("SELECT COUNT(*) FROM benchmark_prices")?;
        Ok(s.query_row([], |r| r.get(0))?)
    }

    // ── Ingest run log ────────────────────────────────────────────────────────

    pub fn begin_ingest_run(&self, kind: &str) -> Result<i64> {
        let id: i64 = self
            .conn
            .query_row("SELECT nextval('ingest_runs_id_seq')", [], |r| r.get(0))?;
        self.conn.execute(
            "INSERT INTO ingest_runs (id, kind, started_at, status) VALUES (?, ?, ?, 'running')",
            params![id, kind, Utc::now().naive_utc()],
        )?;
        Ok(id)
    }

    pub fn finish_ingest_run(
        &self,
        run_id: i64,
        rows_inserted: usize,
        error: Option<&str>,
    ) -> Result<()> {
        self.conn.execute(
            r#"UPDATE ingest_runs SET
               finished_at = ?, status = ?, rows_inserted = ?, error_msg = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if error.is_none() { "success" } else { "error" },
                rows_inserted as i64,
                error,
                run_id,
            ],
        )?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
