// Listing fetcher implementations
pub mod craigslist;

pub use craigslist::CraigslistFetcher;
