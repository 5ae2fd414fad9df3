use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One scraped marketplace post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub title: String,
    /// `None` when the price text was missing or unparseable.
    pub price: Option<Decimal>,
    pub location: String,
    pub url: Option<String>,
    pub posted_at: Option<String>,
    pub source_partition: String,
}

/// Stable identity used to suppress repeat reports of the same listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ListingId(String);

impl ListingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ListingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Listing {
    pub fn new(title: impl Into<String>, price: Option<Decimal>, partition: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            price,
            location: String::new(),
            url: None,
            posted_at: None,
            source_partition: partition.into(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_posted_at(mut self, posted_at: impl Into<String>) -> Self {
        self.posted_at = Some(posted_at.into());
        self
    }

    /// URL when present, otherwise `title|location|price`. Normalized so that
    /// whitespace and case differences between fetches do not split identities.
    pub fn identity(&self) -> ListingId {
        let raw = match self.url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.to_string(),
            _ => {
                let price = self
                    .price
                    .map(|p| p.normalize().to_string())
                    .unwrap_or_default();
                format!("{}|{}|{}", self.title.trim(), self.location.trim(), price)
            }
        };
        ListingId(raw.to_lowercase())
    }
}
