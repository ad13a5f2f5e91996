use chrono::{Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

// ── Raw listing row ───────────────────────────────────────────────────────────

/// One data row lifted out of a listing page's price table, all four fields
/// still as the page printed them. Rows missing any field never get this far:
/// the extractor skips them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawListingRow {
    pub brand: String,
    pub station: String,
    pub raw_price: String, // e.g. "15,49 kr"
    pub raw_date: String,  // e.g. "5/6" — day/month, no year
}

// ── Fuel observation ──────────────────────────────────────────────────────────

/// A normalized pump-price reading, ready for persistence.
///
/// `recorded_at` is deliberately absent: the store stamps ingestion time
/// itself so callers cannot backdate a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FuelObservation {
    pub brand: String,
    pub station: String,
    pub price: f64,               // always > 0
    pub observed_date: NaiveDate, // date asserted by the source
}

/// A fuel observation as read back from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FuelRecord {
    pub id: i64,
    pub brand: String,
    pub station: String,
    pub price: f64,
    pub observed_date: NaiveDate,
    pub recorded_at: NaiveDateTime,
}

// ── Benchmark observation ─────────────────────────────────────────────────────

/// A crude-oil quote as the feed reports it: USD per barrel, with the feed's
/// own timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkQuote {
    pub price_usd_per_barrel: f64,
    pub quoted_at: NaiveDateTime,
}

/// The benchmark after conversion: target currency per litre.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkObservation {
    pub price: f64,
    pub observed_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BenchmarkRecord {
    pub id: i64,
    pub price: f64,
    pub observed_at: NaiveDateTime,
    pub recorded_at: NaiveDateTime,
}

// ── Derived rows (computed, never stored) ─────────────────────────────────────

/// Cheapest current price for one brand. When several stations share the
/// minimum they are all listed, first-seen order; the first entry is the
/// representative station.
#[derive(Debug, Clone, PartialEq)]
pub struct LowestPriceRow {
    pub brand: String,
    pub price: f64,
    pub stations: Vec<String>,
    pub as_of: NaiveDateTime,
}

/// Lookback windows for the minimum-price queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    OneMonth,
    ThreeMonths,
    OneYear,
    AllTime,
}

impl Window {
    pub const ALL: [Window; 4] = [
        Window::OneMonth,
        Window::ThreeMonths,
        Window::OneYear,
        Window::AllTime,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Window::OneMonth => "1 Month",
            Window::ThreeMonths => "3 Months",
            Window::OneYear => "1 Year",
            Window::AllTime => "All Time",
        }
    }

    /// Inclusive start of the window measured back from `now`.
    /// `None` means unbounded.
    pub fn start(&self, now: NaiveDate) -> Option<NaiveDate> {
        let months = match self {
            Window::OneMonth => 1,
            Window::ThreeMonths => 3,
            Window::OneYear => 12,
            Window::AllTime => return None,
        };
        Some(
            now.checked_sub_months(Months::new(months))
                .unwrap_or(NaiveDate::MIN),
        )
    }
}

/// Single cheapest reading within one lookback window.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodLowest {
    pub window: Window,
    pub brand: String,
    pub station: String,
    pub price: f64,
    pub observed_date: NaiveDate,
}

/// Per-day price envelope, the feed for the candlestick chart.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRange {
    pub date: NaiveDate,
    pub low: f64,
    pub high: f64,
}

/// Latest cheapest reading vs the previous ingestion, with period-low flags.
/// A flag is `None` when the comparison window holds no earlier data —
/// unknown, not false.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSummary {
    pub latest: f64,
    pub latest_at: NaiveDateTime,
    pub previous: Option<f64>,
    pub month_low: Option<bool>,
    pub year_low: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_start_arithmetic() {
        let now = NaiveDate::from_ymd_opt(2024, 6, 5).unwrap();
        assert_eq!(
            Window::OneMonth.start(now),
            Some(NaiveDate::from_ymd_opt(2024, 5, 5).unwrap())
        );
        assert_eq!(
            Window::OneYear.start(now),
            Some(NaiveDate::from_ymd_opt(2023, 6, 5).unwrap())
        );
        assert_eq!(Window::AllTime.start(now), None);
    }

    #[test]
    fn window_start_clamps_month_end() {
        // Mar 31 minus one month lands on Feb 29 (2024 is a leap year)
        let now = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(
            Window::OneMonth.start(now),
            Some(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
    }
}
