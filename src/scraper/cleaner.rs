use crate::error::NormalizeError;
use crate::models::{FuelObservation, RawListingRow};
use chrono::{Datelike, NaiveDate};
use std::collections::HashMap;

// ── Parsers ───────────────────────────────────────────────────────────────────

/// Parse a listed pump price: strip the currency suffix, decimal comma → dot.
/// "15,49 kr" → 15.49 | "16,09kr" → 16.09
pub fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s == "N/A" || s == "-" || s == "—" {
        return None;
    }
    let cleaned = s
        .trim_end_matches("kr")
        .trim()
        .replace(' ', "")
        .replace(',', ".");
    cleaned.parse().ok()
}

/// Parse a listed date: "d/m" with no year. Single-digit components are
/// zero-padded, the given year appended, then parsed as `%d/%m/%Y`.
/// "5/6" + 2024 → 2024-06-05
pub fn parse_listing_date(s: &str, year: i32) -> Option<NaiveDate> {
    let s = s.trim();
    let (day, month) = s.split_once('/')?;
    let padded = format!("{:0>2}/{:0>2}/{}", day.trim(), month.trim(), year);
    NaiveDate::parse_from_str(&padded, "%d/%m/%Y").ok()
}

// ── Raw row → observation ─────────────────────────────────────────────────────

/// Normalize one extracted row.
///
/// `Ok(None)` means the row is dated for a day other than `today` and is
/// excluded — only current-day readings are ingested per run. `Err` means
/// the price or date text did not parse; the caller drops the row and
/// continues.
pub fn row_to_observation(
    row: &RawListingRow,
    today: NaiveDate,
) -> Result<Option<FuelObservation>, NormalizeError> {
    let price = parse_price(&row.raw_price)
        .ok_or_else(|| NormalizeError::Price(row.raw_price.clone()))?;
    if price <= 0.0 {
        return Err(NormalizeError::Price(row.raw_price.clone()));
    }

    let observed_date = parse_listing_date(&row.raw_date, today.year())
        .ok_or_else(|| NormalizeError::Date(row.raw_date.clone()))?;

    if observed_date != today {
        return Ok(None);
    }

    Ok(Some(FuelObservation {
        brand: row.brand.trim().to_string(),
        station: row.station.trim().to_string(),
        price,
        observed_date,
    }))
}

// ── Dedup ─────────────────────────────────────────────────────────────────────

/// Collapse one run's observations to one per station.
///
/// Pagination overlap and mirrored listings repeat stations; the occurrence
/// with the latest observed date wins, ties keep the first seen. Output
/// preserves first-seen station order, so the fold is deterministic and
/// idempotent.
pub fn dedupe_latest_per_station(observations: Vec<FuelObservation>) -> Vec<FuelObservation> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<FuelObservation> = Vec::new();

    for obs in observations {
        match seen.get(&obs.station) {
            Some(&i) => {
                if obs.observed_date > out[i].observed_date {
                    out[i] = obs;
                }
            }
            None => {
                seen.insert(obs.station.clone(), out.len());
                out.push(obs);
            }
        }
    }

    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn obs(station: &str, price: f64, observed: NaiveDate) -> FuelObservation {
        FuelObservation {
            brand: "Shell".into(),
            station: station.into(),
            price,
            observed_date: observed,
        }
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("15,49 kr"), Some(15.49));
        assert_eq!(parse_price("16,09kr"), Some(16.09));
        assert_eq!(parse_price(" 15,99 kr "), Some(15.99));
        assert_eq!(parse_price("15.49"), Some(15.49));
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("N/A"), None);
        assert_eq!(parse_price("slutsåld"), None);
    }

    #[test]
    fn test_parse_listing_date_pads_single_digits() {
        assert_eq!(parse_listing_date("5/6", 2024), Some(date(2024, 6, 5)));
        assert_eq!(parse_listing_date("15/11", 2024), Some(date(2024, 11, 15)));
        assert_eq!(parse_listing_date("1/1", 2024), Some(date(2024, 1, 1)));
        assert_eq!(parse_listing_date("99/99", 2024), None);
        assert_eq!(parse_listing_date("5-6", 2024), None);
        assert_eq!(parse_listing_date("", 2024), None);
    }

    #[test]
    fn current_day_row_normalizes() {
        let row = RawListingRow {
            brand: "Shell".into(),
            station: "Shell Lindholmen".into(),
            raw_price: "15,49 kr".into(),
            raw_date: "5/6".into(),
        };
        let got = row_to_observation(&row, date(2024, 6, 5)).unwrap().unwrap();
        assert_eq!(got.price, 15.49);
        assert_eq!(got.observed_date, date(2024, 6, 5));
    }

    #[test]
    fn stale_row_is_excluded_not_an_error() {
        let row = RawListingRow {
            brand: "Shell".into(),
            station: "Shell Lindholmen".into(),
            raw_price: "15,49 kr".into(),
            raw_date: "4/6".into(),
        };
        assert_eq!(row_to_observation(&row, date(2024, 6, 5)), Ok(None));
    }

    #[test]
    fn garbage_price_is_an_error() {
        let row = RawListingRow {
            brand: "Shell".into(),
            station: "Shell Lindholmen".into(),
            raw_price: "pris saknas".into(),
            raw_date: "5/6".into(),
        };
        assert!(matches!(
            row_to_observation(&row, date(2024, 6, 5)),
            Err(NormalizeError::Price(_))
        ));
    }

    #[test]
    fn non_positive_price_is_an_error() {
        let mut row = RawListingRow {
            brand: "Shell".into(),
            station: "Shell Lindholmen".into(),
            raw_price: "0,00 kr".into(),
            raw_date: "5/6".into(),
        };
        assert!(row_to_observation(&row, date(2024, 6, 5)).is_err());

        row.raw_price = "-1,00 kr".into();
        assert!(row_to_observation(&row, date(2024, 6, 5)).is_err());
    }

    #[test]
    fn dedup_keeps_latest_observed_date() {
        let d4 = date(2024, 6, 4);
        let d5 = date(2024, 6, 5);
        let got = dedupe_latest_per_station(vec![
            obs("A", 15.49, d4),
            obs("B", 15.99, d5),
            obs("A", 15.39, d5),
        ]);
        assert_eq!(got.len(), 2);
        // A kept its first-seen position but took the newer reading
        assert_eq!(got[0].station, "A");
        assert_eq!(got[0].price, 15.39);
        assert_eq!(got[1].station, "B");
    }

    #[test]
    fn dedup_tie_keeps_first_seen() {
        let d5 = date(2024, 6, 5);
        let got = dedupe_latest_per_station(vec![obs("A", 15.49, d5), obs("A", 15.99, d5)]);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].price, 15.49);
    }

    #[test]
    fn dedup_is_idempotent() {
        let input = vec![
            obs("A", 15.49, date(2024, 6, 4)),
            obs("B", 15.99, date(2024, 6, 5)),
            obs("A", 15.39, date(2024, 6, 5)),
            obs("C", 16.09, date(2024, 6, 5)),
        ];
        let once = dedupe_latest_per_station(input);
        let twice = dedupe_latest_per_station(once.clone());
        assert_eq!(once, twice);
    }
}
