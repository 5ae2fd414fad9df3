use async_trait::async_trait;

use crate::models::Listing;
use crate::utils::error::Result;

/// Source of raw listings for one geographic partition (a city or region
/// segment of the marketplace).
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Requests issued per `fetch_listings` call. The loop scales its
    /// per-partition deadline by this.
    fn requests_per_partition(&self) -> usize {
        1
    }

    /// Fails with `AppError::Fetch` on network or page-level parse failure.
    /// Individual malformed listings are dropped, not reported as errors.
    async fn fetch_listings(&self, partition: &str) -> Result<Vec<Listing>>;
}
