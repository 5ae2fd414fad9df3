use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::models::{Listing, ListingId, PricingProfile};

/// A listing that qualified under a profile, with computed profit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub listing: Listing,
    pub profile_name: String,
    pub keyword: String,
    pub price: Decimal,
    pub max_buy: Decimal,
    pub resale_avg: Decimal,
    pub profit: Decimal,
    /// Profit as a percentage of the resale estimate.
    pub profit_pct: f64,
    pub target_margin: f64,
}

impl Deal {
    pub fn new(listing: Listing, profile: &PricingProfile, price: Decimal) -> Self {
        let profit = profile.resale_avg - price;
        let profit_pct = if profile.resale_avg.is_zero() {
            0.0
        } else {
            (profit / profile.resale_avg * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        };

        Self {
            listing,
            profile_name: profile.name.clone(),
            keyword: profile.keyword.clone(),
            price,
            max_buy: profile.max_buy,
            resale_avg: profile.resale_avg,
            profit,
            profit_pct,
            target_margin: profile.margin,
        }
    }

    pub fn identity(&self) -> ListingId {
        self.listing.identity()
    }

    pub fn meets_target_margin(&self) -> bool {
        self.profit_pct >= self.target_margin * 100.0
    }
}
