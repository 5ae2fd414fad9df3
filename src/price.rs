use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::utils::error::{AppError, Result};

static AMOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\$£€]?\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)").expect("valid amount regex")
});

// Titles carry plenty of bare numbers ("iPhone 15", "Pixel 8"), so only a
// `$`-prefixed amount counts there.
static DOLLAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s*(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)").expect("valid dollar regex")
});

/// Extracts currency amounts from listing text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceParser;

impl PriceParser {
    pub fn new() -> Self {
        PriceParser
    }

    /// First amount in a dedicated price field, e.g. `$1,299.99` or `28`.
    pub fn parse(&self, text: &str) -> Result<Decimal> {
        Self::extract(&AMOUNT_REGEX, text)
            .ok_or_else(|| AppError::parse(format!("no price in '{}'", text.trim())))
    }

    /// First `$` amount embedded in a title, e.g. `"Pixel 8 - $300 (Queens)"`.
    pub fn parse_from_title(&self, title: &str) -> Result<Decimal> {
        Self::extract(&DOLLAR_REGEX, title)
            .ok_or_else(|| AppError::parse(format!("no price in title '{}'", title.trim())))
    }

    /// Price field first, then the title. `None` leaves the listing unpriced,
    /// which the qualifier treats as unqualified.
    pub fn listing_price(&self, price_text: Option<&str>, title: &str) -> Option<Decimal> {
        price_text
            .and_then(|text| self.parse(text).ok())
            .or_else(|| self.parse_from_title(title).ok())
    }

    fn extract(regex: &Regex, text: &str) -> Option<Decimal> {
        let captures = regex.captures(text)?;
        let amount = captures.get(1)?.as_str().replace(',', "");
        Decimal::from_str(&amount).ok()
    }
}
