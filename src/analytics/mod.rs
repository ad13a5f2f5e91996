//! Read-path aggregations. Every function here is a pure fold over the
//! append-only observation log: slice in, fresh values out, recomputed per
//! request. Nothing is cached and nothing is mutated.

use crate::models::{DailyRange, FuelRecord, LowestPriceRow, PeriodLowest, PriceSummary, Window};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Readings land in hour-granular buckets; the newest bucket is "current".
fn hour_bucket(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

// ── Lowest current price per brand ────────────────────────────────────────────

/// Cheapest price per brand within the most recent ingestion hour.
///
/// Stations tied at a brand's minimum merge into one row, first-seen order.
/// Rows come back sorted by price ascending.
pub fn lowest_current_prices(records: &[FuelRecord]) -> Vec<LowestPriceRow> {
    let Some(current_bucket) = records.iter().map(|r| hour_bucket(r.recorded_at)).max() else {
        return Vec::new();
    };

    let current: Vec<&FuelRecord> = records
        .iter()
        .filter(|r| hour_bucket(r.recorded_at) == current_bucket)
        .collect();

    let as_of = current
        .iter()
        .map(|r| r.recorded_at)
        .max()
        .unwrap_or(current_bucket);

    let mut brand_order: Vec<&str> = Vec::new();
    let mut by_brand: HashMap<&str, Vec<&FuelRecord>> = HashMap::new();
    for r in current {
        let group = by_brand.entry(r.brand.as_str()).or_default();
        if group.is_empty() {
            brand_order.push(r.brand.as_str());
        }
        group.push(r);
    }

    let mut rows: Vec<LowestPriceRow> = Vec::with_capacity(brand_order.len());
    for brand in brand_order {
        let group = &by_brand[brand];
        let min = group.iter().map(|r| r.price).fold(f64::INFINITY, f64::min);

        let mut stations: Vec<String> = Vec::new();
        for r in group.iter().filter(|r| r.price == min) {
            if !stations.iter().any(|s| s == &r.station) {
                stations.push(r.station.clone());
            }
        }

        rows.push(LowestPriceRow {
            brand: brand.to_string(),
            price: min,
            stations,
            as_of,
        });
    }

    // Stable sort: brands tied on price keep first-seen order.
    rows.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(Ordering::Equal));
    rows
}

// ── Lowest price per lookback window ──────────────────────────────────────────

/// Global cheapest reading per lookback window, measured back from `now`.
/// A window with no matching observations emits no row.
pub fn lowest_by_period(records: &[FuelRecord], now: NaiveDate) -> Vec<PeriodLowest> {
    Window::ALL
        .iter()
        .filter_map(|window| {
            let cutoff = window.start(now);
            let best = records
                .iter()
                .filter(|r| cutoff.is_none_or(|c| r.observed_date >= c))
                .fold(None::<&FuelRecord>, |best, r| match best {
                    Some(b) if b.price <= r.price => Some(b),
                    _ => Some(r),
                });

            best.map(|r| PeriodLowest {
                window: *window,
                brand: r.brand.clone(),
                station: r.station.clone(),
                price: r.price,
                observed_date: r.observed_date,
            })
        })
        .collect()
}

// ── Daily envelope for charting ───────────────────────────────────────────────

/// Min/max price per observed day, date ascending.
pub fn daily_ranges(records: &[FuelRecord]) -> Vec<DailyRange> {
    let mut days: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for r in records {
        days.entry(r.observed_date)
            .and_modify(|(low, high)| {
                *low = low.min(r.price);
                *high = high.max(r.price);
            })
            .or_insert((r.price, r.price));
    }

    days.into_iter()
        .map(|(date, (low, high))| DailyRange { date, low, high })
        .collect()
}

// ── Latest-vs-previous summary ────────────────────────────────────────────────

/// Compare the two most recent distinct ingestion stamps and flag whether
/// the latest cheapest reading is a 1-month / 1-year low.
///
/// The flags compare against records recorded strictly before the latest
/// stamp; an empty comparison window yields `None` — unknown, never false.
pub fn price_summary(records: &[FuelRecord], now: NaiveDate) -> Option<PriceSummary> {
    let mut stamps: Vec<NaiveDateTime> = records.iter().map(|r| r.recorded_at).collect();
    stamps.sort();
    stamps.dedup();

    let latest_at = *stamps.last()?;
    let latest = min_price(records.iter().filter(|r| r.recorded_at == latest_at))?;

    let previous = stamps
        .len()
        .checked_sub(2)
        .map(|i| stamps[i])
        .and_then(|at| min_price(records.iter().filter(|r| r.recorded_at == at)));

    Some(PriceSummary {
        latest,
        latest_at,
        previous,
        month_low: window_low(records, latest, latest_at, Window::OneMonth, now),
        year_low: window_low(records, latest, latest_at, Window::OneYear, now),
    })
}

fn window_low(
    records: &[FuelRecord],
    latest: f64,
    latest_at: NaiveDateTime,
    window: Window,
    now: NaiveDate,
) -> Option<bool> {
    let cutoff = window.start(now)?;
    let prior = min_price(
        records
            .iter()
            .filter(|r| r.recorded_at < latest_at && r.observed_date >= cutoff),
    )?;
    Some(latest <= prior)
}

fn min_price<'a>(records: impl Iterator<Item = &'a FuelRecord>) -> Option<f64> {
    records
        .map(|r| r.price)
        .fold(None, |acc, p| Some(acc.map_or(p, |a: f64| a.min(p))))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
