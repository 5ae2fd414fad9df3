// Integration tests for Marketplace Monitor
// These tests verify that all components work together correctly

pub mod poll_loop_tests;

use async_trait::async_trait;
use mockall::mock;
use marketplace_monitor::{
    config::MonitorConfig,
    plugins::traits::{ListingFetcher, Notifier},
    Deal, DealQualifier, DedupFilter, InMemorySeenStore, Listing, LoopSettings, PollLoop, PricingProfile,
    Result,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

mock! {
    pub Fetcher {}

    #[async_trait]
    impl ListingFetcher for Fetcher {
        fn name(&self) -> &str;
        async fn fetch_listings(&self, partition: &str) -> Result<Vec<Listing>>;
    }
}

mock! {
    pub Mailer {}

    #[async_trait]
    impl Notifier for Mailer {
        fn name(&self) -> &str;
        async fn send_summary(&self, deals: &[Deal]) -> Result<()>;
    }
}

/// The reference catalog entry used throughout the scenarios.
pub fn dexcom_g6() -> PricingProfile {
    PricingProfile::new("dexcom_g6", dec!(35), dec!(90), 0.60)
}

pub fn listing(title: &str, price: Decimal, partition: &str, url: &str) -> Listing {
    Listing::new(title, Some(price), partition)
        .with_location("Brooklyn")
        .with_url(url)
}

pub fn sealed_box(partition: &str) -> Listing {
    listing(
        "Dexcom G6 Sensors - Sealed Box",
        dec!(28),
        partition,
        "https://newyork.craigslist.org/brk/hab/d/dexcom-g6/7700000001.html",
    )
}

pub fn test_monitor_config(base_url: &str) -> MonitorConfig {
    MonitorConfig {
        partitions: vec!["newyork".to_string()],
        poll_interval_secs: 300,
        fetch_timeout_secs: 5,
        base_url: base_url.to_string(),
        user_agent: "MarketplaceMonitor-Test/0.1".to_string(),
    }
}

pub fn build_loop(fetcher: MockFetcher, notifier: MockMailer, partitions: &[&str]) -> PollLoop {
    PollLoop::new(
        Arc::new(fetcher),
        Arc::new(notifier),
        DealQualifier::new(vec![dexcom_g6()]),
        DedupFilter::new(InMemorySeenStore::new()),
        partitions.iter().map(|p| p.to_string()).collect(),
        LoopSettings::default(),
    )
}
