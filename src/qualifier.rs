use rust_decimal::Decimal;

use crate::models::{Deal, Listing, PricingProfile};

/// Matches listings against pricing profiles.
#[derive(Debug, Clone)]
pub struct DealQualifier {
    profiles: Vec<PricingProfile>,
}

impl DealQualifier {
    pub fn new(mut profiles: Vec<PricingProfile>) -> Self {
        // Sorted so that profit ties resolve to the same profile every time.
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        Self { profiles }
    }

    pub fn profiles(&self) -> &[PricingProfile] {
        &self.profiles
    }

    /// Zero or one deal for the listing: among the profiles whose keyword is in
    /// the title and whose `max_buy` covers the price, the one with the highest
    /// profit wins.
    pub fn qualify(&self, listing: &Listing) -> Option<Deal> {
        let price = listing.price.filter(|p| *p > Decimal::ZERO)?;

        let best = self
            .profiles
            .iter()
            .filter(|profile| price <= profile.max_buy && profile.matches_title(&listing.title))
            .fold(None::<&PricingProfile>, |best, profile| match best {
                Some(current) if current.resale_avg >= profile.resale_avg => Some(current),
                _ => Some(profile),
            })?;

        Some(Deal::new(listing.clone(), best, price))
    }

    pub fn qualify_all(&self, listings: &[Listing]) -> Vec<Deal> {
        listings.iter().filter_map(|listing| self.qualify(listing)).collect()
    }
}
