pub mod cleaner;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::models::RawListingRow;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use self::http_client::HttpClient;
use self::parsers::parse_listing_page;

// ── Source trait ──────────────────────────────────────────────────────────────

/// Swappable fuel-listing source abstraction.
#[async_trait]
pub trait FuelPriceSource: Send + Sync {
    async fn fetch_raw_rows(&self) -> Result<ListingScrape>;
}

/// Outcome of one sweep over all listing pages.
#[derive(Debug, Default)]
pub struct ListingScrape {
    pub rows: Vec<RawListingRow>,
    pub pages_fetched: usize,
    pub fetch_errors: usize,
    pub rows_skipped: usize,
}

// ── bensinpriser scraper ──────────────────────────────────────────────────────

pub struct BensinpriserScraper {
    client: HttpClient,
    base_url: String,
    pages: u32,
}

impl BensinpriserScraper {
    pub fn new(config: &ScraperConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .with_context(|| format!("Invalid listing base URL {:?}", config.base_url))?;
        Ok(Self {
            client: HttpClient::new(config)?,
            base_url: base.as_str().trim_end_matches('/').to_string(),
            pages: config.pages.max(1),
        })
    }

    /// URL for one listing page. Page 1 is the bare base URL.
    fn listing_url(&self, page: u32) -> String {
        if page <= 1 {
            self.base_url.clone()
        } else {
            format!("{}/{}", self.base_url, page)
        }
    }
}

#[async_trait]
impl FuelPriceSource for BensinpriserScraper {
    /// Sweep every configured listing page. A failed page is logged and
    /// skipped; the remaining pages still contribute rows.
    async fn fetch_raw_rows(&self) -> Result<ListingScrape> {
        let mut scrape = ListingScrape::default();

        for page in 1..=self.pages {
            let url = self.listing_url(page);
            info!("Fetching listing page {} ({})", page, url);

            let html = match self.client.get_text(&url).await {
                Ok(html) => html,
                Err(e) => {
                    warn!("Listing page {} skipped: {}", page, e);
                    scrape.fetch_errors += 1;
                    continue;
                }
            };

            let parsed = parse_listing_page(&html)
                .with_context(|| format!("Failed to parse listing page {}", page))?;

            info!(
                "  Page {}: {} rows ({} skipped)",
                page,
                parsed.rows.len(),
                parsed.skipped
            );

            scrape.pages_fetched += 1;
            scrape.rows_skipped += parsed.skipped;
            scrape.rows.extend(parsed.rows);
        }

        info!(
            "Listing sweep done: {} rows from {} pages, {} pages failed",
            scrape.rows.len(),
            scrape.pages_fetched,
            scrape.fetch_errors
        );
        Ok(scrape)
    }
}
