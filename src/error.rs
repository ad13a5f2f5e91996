use std::fmt;

/// A source fetch that did not yield a usable document.
///
/// Fetch failures are never fatal to an ingestion run: the failing source is
/// logged and skipped, the remaining sources continue.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("malformed body from {url}: {detail}")]
    Body { url: String, detail: String },

    #[error("response from {url} is missing field {field:?}")]
    MissingField { url: String, field: String },

    #[error("no API key configured (set OILPRICE_API_KEY)")]
    MissingApiKey,
}

/// A scraped row whose price or date text could not be turned into a value.
/// The row is dropped and the run continues.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("unparsable price text {0:?}")]
    Price(String),

    #[error("unparsable date text {0:?}")]
    Date(String),
}

impl FetchError {
    pub fn body(url: &str, detail: impl fmt::Display) -> Self {
        FetchError::Body {
            url: url.to_string(),
            detail: detail.to_string(),
        }
    }

    pub fn missing_field(url: &str, field: &str) -> Self {
        FetchError::MissingField {
            url: url.to_string(),
            field: field.to_string(),
        }
    }
}
