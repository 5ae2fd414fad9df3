use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A keyword with a buy ceiling and a resale estimate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingProfile {
    pub name: String,
    pub keyword: String,
    pub max_buy: Decimal,
    pub resale_avg: Decimal,
    /// Target margin as a fraction of the resale estimate.
    pub margin: f64,
}

impl PricingProfile {
    /// The search keyword defaults to the name with underscores turned into
    /// spaces, so `dexcom_g6` matches "Dexcom G6 Sensors".
    pub fn new(name: impl Into<String>, max_buy: Decimal, resale_avg: Decimal, margin: f64) -> Self {
        let name = name.into();
        let keyword = name.replace('_', " ");
        Self {
            name,
            keyword,
            max_buy,
            resale_avg,
            margin,
        }
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    /// Case-insensitive substring match. No tokenization.
    pub fn matches_title(&self, title: &str) -> bool {
        let keyword = self.keyword.trim();
        !keyword.is_empty() && title.to_lowercase().contains(&keyword.to_lowercase())
    }
}
