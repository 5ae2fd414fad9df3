use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;
use url::Url;

use crate::config::MonitorConfig;
use crate::models::Listing;
use crate::plugins::traits::ListingFetcher;
use crate::price::PriceParser;
use crate::utils::error::{AppError, Result};

static RESULT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("li.cl-static-search-result").expect("valid result selector"));
static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".title").expect("valid title selector"));
static PRICE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse(".price").expect("valid price selector"));
static LOCATION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".location").expect("valid location selector"));
static TIME_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("time[datetime]").expect("valid time selector"));

/// Fetches Craigslist "for sale" search results, one query per profile keyword.
pub struct CraigslistFetcher {
    client: Client,
    base_url: String,
    queries: Vec<String>,
    parser: PriceParser,
}

impl CraigslistFetcher {
    pub fn new(config: &MonitorConfig, queries: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let mut seen = HashSet::new();
        let queries = queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty() && seen.insert(q.to_lowercase()))
            .collect();

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            queries,
            parser: PriceParser::new(),
        })
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn search_url(&self, partition: &str, query: &str) -> Result<Url> {
        let root = self.base_url.replace("{partition}", partition);
        let mut url = Url::parse(&root)
            .and_then(|root| root.join("search/sss"))
            .map_err(|e| AppError::fetch(partition, format!("invalid search URL '{}': {}", root, e)))?;

        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("sort", "date");
        Ok(url)
    }

    /// Listings on one search results page. Entries without a title are
    /// skipped; entries without a usable price are kept unpriced.
    pub fn parse_search_page(&self, html: &str, page_url: &Url, partition: &str) -> Vec<Listing> {
        let document = Html::parse_document(html);
        document
            .select(&RESULT_SELECTOR)
            .filter_map(|element| match self.parse_result(element, page_url, partition) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    tracing::debug!(partition, error = %e, "Skipping search result");
                    None
                }
            })
            .collect()
    }

    fn parse_result(&self, element: ElementRef<'_>, page_url: &Url, partition: &str) -> Result<Listing> {
        let title = first_text(element, &TITLE_SELECTOR)
            .or_else(|| element.value().attr("title").map(collapse_whitespace))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::parse("search result without a title"))?;

        let price_text = first_text(element, &PRICE_SELECTOR);
        let price = self.parser.listing_price(price_text.as_deref(), &title);
        if price.is_none() {
            tracing::debug!(partition, title = %title, "No price on listing");
        }

        let url = element
            .select(&LINK_SELECTOR)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| page_url.join(href).ok())
            .map(String::from);

        let mut listing = Listing::new(title, price, partition)
            .with_location(first_text(element, &LOCATION_SELECTOR).unwrap_or_default());
        listing.url = url;
        listing.posted_at = element
            .select(&TIME_SELECTOR)
            .next()
            .and_then(|t| t.value().attr("datetime"))
            .map(String::from);

        Ok(listing)
    }

    async fn search(&self, partition: &str, query: &str) -> Result<Vec<Listing>> {
        let url = self.search_url(partition, query)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| AppError::fetch(partition, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::fetch(partition, format!("HTTP {} for query '{}'", status, query)));
        }

        let body = response.text().await.map_err(|e| AppError::fetch(partition, e))?;
        Ok(self.parse_search_page(&body, &url, partition))
    }
}

#[async_trait]
impl ListingFetcher for CraigslistFetcher {
    fn name(&self) -> &str {
        "craigslist"
    }

    fn requests_per_partition(&self) -> usize {
        self.queries.len().max(1)
    }

    /// Runs every query; fails only when all of them fail.
    async fn fetch_listings(&self, partition: &str) -> Result<Vec<Listing>> {
        let mut listings = Vec::new();
        let mut identities = HashSet::new();
        let mut last_error = None;
        let mut succeeded = 0usize;

        for query in &self.queries {
            match self.search(partition, query).await {
                Ok(batch) => {
                    succeeded += 1;
                    for listing in batch {
                        if identities.insert(listing.identity()) {
                            listings.push(listing);
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(partition, query = %query, error = %e, "Search query failed");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(err) if succeeded == 0 => Err(err),
            _ => Ok(listings),
        }
    }
}

fn first_text(element: ElementRef<'_>, selector: &Selector) -> Option<String> {
    element
        .select(selector)
        .next()
        .map(|node| collapse_whitespace(&node.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
