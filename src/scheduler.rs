use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

use crate::config::AppConfig;
use crate::dedup::{DedupFilter, InMemorySeenStore, SeenStore};
use crate::models::{Deal, Listing};
use crate::plugins::fetchers::CraigslistFetcher;
use crate::plugins::notifiers::EmailNotifier;
use crate::plugins::traits::{ListingFetcher, Notifier};
use crate::qualifier::DealQualifier;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LoopState {
    Idle,
    Fetching,
    Qualifying,
    Notifying,
    Sleeping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    pub poll_interval: Duration,
    pub fetch_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Counters for one fetch → qualify → dedup → notify pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub partitions_ok: usize,
    pub partitions_failed: usize,
    pub listings_fetched: usize,
    pub deals_qualified: usize,
    pub deals_new: usize,
    pub deals_reported: usize,
    pub notification_failed: bool,
    /// Shutdown arrived mid-cycle; later stages were skipped.
    pub interrupted: bool,
    pub elapsed_ms: u64,
}

/// Sequential polling loop. Owns the seen-set; nothing else mutates it.
pub struct PollLoop<S: SeenStore = InMemorySeenStore> {
    fetcher: Arc<dyn ListingFetcher>,
    notifier: Arc<dyn Notifier>,
    qualifier: DealQualifier,
    dedup: DedupFilter<S>,
    partitions: Vec<String>,
    settings: LoopSettings,
    state: LoopState,
    cycles: u64,
}

impl PollLoop<InMemorySeenStore> {
    /// Wires the Craigslist fetcher and SMTP notifier from validated config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let profiles = config.pricing_profiles();
        let queries = profiles.iter().map(|p| p.keyword.clone()).collect();

        let fetcher = CraigslistFetcher::new(&config.monitor, queries)?;
        let notifier = EmailNotifier::from_settings(&config.email)?;

        let mut store = InMemorySeenStore::new();
        if let Some(capacity) = config.dedup.capacity {
            store = store.with_capacity_limit(capacity);
        }
        if let Some(ttl) = config.dedup.ttl()? {
            store = store.with_ttl(ttl);
        }

        Ok(Self::new(
            Arc::new(fetcher),
            Arc::new(notifier),
            DealQualifier::new(profiles),
            DedupFilter::new(store),
            config.monitor.partitions.clone(),
            LoopSettings {
                poll_interval: config.monitor.poll_interval(),
                fetch_timeout: config.monitor.fetch_timeout(),
            },
        ))
    }
}

impl<S: SeenStore> PollLoop<S> {
    pub fn new(
        fetcher: Arc<dyn ListingFetcher>,
        notifier: Arc<dyn Notifier>,
        qualifier: DealQualifier,
        dedup: DedupFilter<S>,
        partitions: Vec<String>,
        settings: LoopSettings,
    ) -> Self {
        Self {
            fetcher,
            notifier,
            qualifier,
            dedup,
            partitions,
            settings,
            state: LoopState::Idle,
            cycles: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn partitions(&self) -> &[String] {
        &self.partitions
    }

    pub fn seen_count(&self) -> usize {
        self.dedup.seen_count()
    }

    /// Runs cycles until `shutdown` flips to `true` or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            partitions = ?self.partitions,
            profiles = self.qualifier.profiles().len(),
            interval_secs = self.settings.poll_interval.as_secs(),
            "🚀 Marketplace monitor started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.cycle(&mut shutdown).await;
            if report.interrupted || *shutdown.borrow() {
                break;
            }

            self.state = LoopState::Sleeping;
            tracing::info!("⏳ Next check in {}s", self.settings.poll_interval.as_secs());
            if sleep_or_shutdown(self.settings.poll_interval, &mut shutdown).await {
                break;
            }
            self.state = LoopState::Idle;
        }

        self.state = LoopState::Idle;
        tracing::info!(cycles = self.cycles, seen = self.seen_count(), "Marketplace monitor stopped");
    }

    /// One full pass. Never fails: every stage logs and absorbs its own errors.
    pub async fn run_cycle(&mut self) -> CycleReport {
        let (_keep_open, mut shutdown) = watch::channel(false);
        self.cycle(&mut shutdown).await
    }

    /// A pass that stops at the next stage boundary once shutdown is
    /// requested. An in-flight fetch is abandoned; an interrupted pass
    /// sends nothing and marks nothing seen.
    async fn cycle(&mut self, shutdown: &mut watch::Receiver<bool>) -> CycleReport {
        let start = Instant::now();
        self.cycles += 1;
        let mut report = CycleReport {
            cycle: self.cycles,
            ..Default::default()
        };

        self.state = LoopState::Fetching;
        let listings = self.fetch_all(&mut report, shutdown).await;
        if report.interrupted {
            self.state = LoopState::Idle;
            report.elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::info!(cycle = report.cycle, partitions_ok = report.partitions_ok, "🛑 Cycle interrupted by shutdown");
            return report;
        }

        self.state = LoopState::Qualifying;
        let qualified = self.qualifier.qualify_all(&listings);
        report.deals_qualified = qualified.len();
        metrics::counter!("deals_qualified_total").increment(qualified.len() as u64);

        let fresh = self.dedup.filter_new(qualified);
        report.deals_new = fresh.len();

        if !fresh.is_empty() && *shutdown.borrow() {
            report.interrupted = true;
            self.state = LoopState::Idle;
            report.elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::info!(cycle = report.cycle, deals = fresh.len(), "🛑 Shutdown requested, skipping notification");
            return report;
        }

        if !fresh.is_empty() {
            self.state = LoopState::Notifying;
            self.notify(&fresh, &mut report).await;
        }

        self.state = LoopState::Idle;
        report.elapsed_ms = start.elapsed().as_millis() as u64;

        if report.deals_reported == 0 && !report.notification_failed {
            tracing::info!("ℹ️ No new deals this cycle");
        }
        tracing::info!(
            cycle = report.cycle,
            partitions_ok = report.partitions_ok,
            partitions_failed = report.partitions_failed,
            listings = report.listings_fetched,
            qualified = report.deals_qualified,
            reported = report.deals_reported,
            elapsed_ms = report.elapsed_ms,
            "✅ Cycle complete"
        );

        report
    }

    async fn fetch_all(&self, report: &mut CycleReport, shutdown: &mut watch::Receiver<bool>) -> Vec<Listing> {
        let mut listings = Vec::new();
        let budget = self.partition_budget();

        for partition in &self.partitions {
            if *shutdown.borrow() {
                report.interrupted = true;
                break;
            }

            let fetched = tokio::select! {
                fetched = timeout(budget, self.fetcher.fetch_listings(partition)) => fetched,
                _ = shutdown_requested(shutdown) => {
                    tracing::info!(partition = %partition, "Fetch abandoned for shutdown");
                    report.interrupted = true;
                    break;
                }
            };

            match fetched {
                Ok(Ok(batch)) => {
                    tracing::debug!(partition = %partition, listings = batch.len(), "Fetched partition");
                    metrics::counter!("listings_fetched_total").increment(batch.len() as u64);
                    report.partitions_ok += 1;
                    report.listings_fetched += batch.len();
                    listings.extend(batch);
                }
                Ok(Err(e)) if e.is_fatal() => {
                    tracing::error!(partition = %partition, error = %e, "❌ Fetcher misconfigured, skipping partition");
                    metrics::counter!("fetch_failures_total").increment(1);
                    report.partitions_failed += 1;
                }
                Ok(Err(e)) => {
                    tracing::warn!(partition = %partition, error = %e, "❌ Fetch failed, skipping partition");
                    metrics::counter!("fetch_failures_total").increment(1);
                    report.partitions_failed += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        partition = %partition,
                        timeout_secs = budget.as_secs(),
                        "❌ Fetch timed out, skipping partition"
                    );
                    metrics::counter!("fetch_failures_total").increment(1);
                    report.partitions_failed += 1;
                }
            }
        }

        listings
    }

    /// `fetch_timeout` bounds a single request; a partition gets one slot per
    /// request plus one spare for connection setup and parsing.
    fn partition_budget(&self) -> Duration {
        let slots = self.fetcher.requests_per_partition().max(1).saturating_add(1);
        self.settings
            .fetch_timeout
            .saturating_mul(u32::try_from(slots).unwrap_or(u32::MAX))
    }

    async fn notify(&mut self, fresh: &[Deal], report: &mut CycleReport) {
        for deal in fresh {
            tracing::info!(
                partition = %deal.listing.source_partition,
                profile = %deal.profile_name,
                price = %deal.price,
                profit = %deal.profit,
                "✅ New deal: {}",
                deal.listing.title
            );
        }

        match self.notifier.send_summary(fresh).await {
            Ok(()) => {
                // Recorded only after delivery so a failed send is retried next cycle.
                self.dedup.mark_seen(fresh);
                report.deals_reported = fresh.len();
                metrics::counter!("deals_reported_total").increment(fresh.len() as u64);
            }
            Err(e) => {
                tracing::error!(notifier = self.notifier.name(), deals = fresh.len(), error = %e, "❌ Notification failed");
                metrics::counter!("notify_failures_total").increment(1);
                report.notification_failed = true;
            }
        }
    }
}

/// Resolves once shutdown is requested or the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Sleeps for `interval`; returns `true` if shutdown was requested first.
async fn sleep_or_shutdown(interval: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return true,
                Ok(()) => continue,
                Err(_) => return true,
            },
        }
    }
}
