//! Crude-oil benchmark ingestion: latest Brent quote in USD per barrel,
//! converted to the target currency per litre using a freshly fetched
//! exchange rate.

use crate::config::{BenchmarkConfig, ScraperConfig};
use crate::error::FetchError;
use crate::models::{BenchmarkObservation, BenchmarkQuote};
use crate::scraper::http_client::HttpClient;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use tracing::debug;

/// Litres in one oil barrel; the feed quotes USD per barrel.
const LITRES_PER_BARREL: f64 = 158.987;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable benchmark source abstraction.
#[async_trait]
pub trait BenchmarkSource: Send + Sync {
    async fn fetch_latest(&self) -> Result<BenchmarkObservation, FetchError>;
}

// ── oilpriceapi.com source ────────────────────────────────────────────────────

pub struct OilPriceApi {
    client: HttpClient,
    config: BenchmarkConfig,
}

impl OilPriceApi {
    pub fn new(config: &BenchmarkConfig, http: &ScraperConfig) -> Result<Self> {
        Ok(Self {
            client: HttpClient::new(http)?,
            config: config.clone(),
        })
    }

    /// USD → target currency, from the exchange-rate feed's `rates` map.
    async fn fetch_usd_rate(&self) -> Result<f64, FetchError> {
        let url = &self.config.exchange_rate_url;
        let body = self.client.get_json(url, None).await?;
        rate_from_value(url, &body, &self.config.target_currency)
    }

    async fn fetch_quotes(&self) -> Result<Vec<BenchmarkQuote>, FetchError> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or(FetchError::MissingApiKey)?;

        let url = &self.config.oil_price_url;
        let body = self
            .client
            .get_json(url, Some(&format!("Token {key}")))
            .await?;
        quotes_from_value(url, &body)
    }
}

#[async_trait]
impl BenchmarkSource for OilPriceApi {
    async fn fetch_latest(&self) -> Result<BenchmarkObservation, FetchError> {
        let usd_rate = self.fetch_usd_rate().await?;
        debug!("USD→{} rate: {}", self.config.target_currency, usd_rate);

        let quotes = self.fetch_quotes().await?;
        let quote = latest_quote(quotes).ok_or_else(|| {
            FetchError::missing_field(&self.config.oil_price_url, "data.price")
        })?;

        Ok(convert_quote(&quote, usd_rate))
    }
}

// ── Pure conversion helpers ───────────────────────────────────────────────────

/// USD/barrel → target currency/litre.
pub fn convert_quote(quote: &BenchmarkQuote, usd_rate: f64) -> BenchmarkObservation {
    BenchmarkObservation {
        price: quote.price_usd_per_barrel / LITRES_PER_BARREL * usd_rate,
        observed_at: quote.quoted_at,
    }
}

/// The single most recent quote, when the feed returns several.
pub fn latest_quote(quotes: Vec<BenchmarkQuote>) -> Option<BenchmarkQuote> {
    quotes.into_iter().max_by_key(|q| q.quoted_at)
}

fn rate_from_value(url: &str, body: &Value, currency: &str) -> Result<f64, FetchError> {
    body.get("rates")
        .and_then(|r| r.get(currency))
        .and_then(Value::as_f64)
        .ok_or_else(|| FetchError::missing_field(url, &format!("rates.{currency}")))
}

/// The oil feed wraps its payload in `data`: a single quote object from the
/// `latest` endpoint, an array from the historical ones.
fn quotes_from_value(url: &str, body: &Value) -> Result<Vec<BenchmarkQuote>, FetchError> {
    let data = body
        .get("data")
        .ok_or_else(|| FetchError::missing_field(url, "data"))?;

    let items: Vec<&Value> = match data {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    let mut quotes = Vec::with_capacity(items.len());
    for item in items {
        let price = item
            .get("price")
            .and_then(Value::as_f64)
            .ok_or_else(|| FetchError::missing_field(url, "data.price"))?;
        let created_at = item
            .get("created_at")
            .and_then(Value::as_str)
            .ok_or_else(|| FetchError::missing_field(url, "data.created_at"))?;
        let quoted_at = parse_quoted_at(created_at)
            .ok_or_else(|| FetchError::body(url, format!("bad timestamp {created_at:?}")))?;

        quotes.push(BenchmarkQuote {
            price_usd_per_barrel: price,
            quoted_at,
        });
    }
    Ok(quotes)
}

fn parse_quoted_at(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn converts_barrel_usd_to_litre_target_currency() {
        let quote = BenchmarkQuote {
            price_usd_per_barrel: 1.50,
            quoted_at: ts("2024-06-05 08:00:00"),
        };
        let obs = convert_quote(&quote, 10.0);
        // 1.50 / 158.987 * 10.0
        assert!((obs.price - 0.09435).abs() < 1e-4);
        assert_eq!(obs.observed_at, quote.quoted_at);
    }

    #[test]
    fn latest_quote_keeps_max_by_date() {
        let quotes = vec![
            BenchmarkQuote {
                price_usd_per_barrel: 80.0,
                quoted_at: ts("2024-06-04 08:00:00"),
            },
            BenchmarkQuote {
                price_usd_per_barrel: 82.0,
                quoted_at: ts("2024-06-05 08:00:00"),
            },
            BenchmarkQuote {
                price_usd_per_barrel: 81.0,
                quoted_at: ts("2024-06-03 08:00:00"),
            },
        ];
        let latest = latest_quote(quotes).unwrap();
        assert_eq!(latest.price_usd_per_barrel, 82.0);
    }

    #[test]
    fn latest_quote_of_nothing_is_none() {
        assert_eq!(latest_quote(vec![]), None);
    }

    #[test]
    fn rate_lookup_reads_nested_currency() {
        let body = json!({"base": "USD", "rates": {"SEK": 10.5, "EUR": 0.92}});
        assert_eq!(rate_from_value("u", &body, "SEK").unwrap(), 10.5);
        assert!(rate_from_value("u", &body, "NOK").is_err());
    }

    #[test]
    fn quotes_accept_single_object_payload() {
        let body = json!({
            "data": {"price": 82.5, "created_at": "2024-06-05T08:00:00.000Z"}
        });
        let quotes = quotes_from_value("u", &body).unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].price_usd_per_barrel, 82.5);
    }

    #[test]
    fn quotes_accept_array_payload() {
        let body = json!({
            "data": [
                {"price": 80.0, "created_at": "2024-06-04T08:00:00Z"},
                {"price": 82.0, "created_at": "2024-06-05T08:00:00Z"}
            ]
        });
        let quotes = quotes_from_value("u", &body).unwrap();
        assert_eq!(quotes.len(), 2);
        assert_eq!(
            latest_quote(quotes).unwrap().price_usd_per_barrel,
            82.0
        );
    }

    #[test]
    fn missing_payload_fields_are_fetch_errors() {
        assert!(quotes_from_value("u", &json!({})).is_err());
        assert!(quotes_from_value("u", &json!({"data": {"price": "82"}})).is_err());
        assert!(
            quotes_from_value("u", &json!({"data": {"price": 82.0, "created_at": "junk"}}))
                .is_err()
        );
    }
}
