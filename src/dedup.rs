use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::models::{Deal, ListingId};

/// Storage for listing identities that have already been reported.
pub trait SeenStore: Send {
    fn contains(&mut self, id: &ListingId, now: DateTime<Utc>) -> bool;
    fn insert(&mut self, id: ListingId, now: DateTime<Utc>);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-process seen-set. Unbounded unless a capacity or time-to-live is set;
/// either way nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemorySeenStore {
    entries: HashMap<ListingId, DateTime<Utc>>,
    order: VecDeque<(ListingId, DateTime<Utc>)>,
    capacity: Option<usize>,
    ttl: Option<Duration>,
}

impl InMemorySeenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity.max(1));
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    fn is_expired(&self, seen_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.ttl.is_some_and(|ttl| now - seen_at >= ttl)
    }

    /// Drops the oldest queue entry, removing it from the map only when the
    /// map still holds that exact insertion.
    fn pop_oldest(&mut self) -> bool {
        match self.order.pop_front() {
            Some((id, seen_at)) => {
                if self.entries.get(&id) == Some(&seen_at) {
                    self.entries.remove(&id);
                }
                true
            }
            None => false,
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        while let Some((_, seen_at)) = self.order.front() {
            if !self.is_expired(*seen_at, now) {
                break;
            }
            self.pop_oldest();
        }

        if let Some(capacity) = self.capacity {
            while self.entries.len() > capacity && self.pop_oldest() {}
        }
    }
}

impl SeenStore for InMemorySeenStore {
    fn contains(&mut self, id: &ListingId, now: DateTime<Utc>) -> bool {
        match self.entries.get(id) {
            Some(seen_at) if self.is_expired(*seen_at, now) => {
                self.entries.remove(id);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    fn insert(&mut self, id: ListingId, now: DateTime<Utc>) {
        self.entries.insert(id.clone(), now);
        self.order.push_back((id, now));
        self.prune(now);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Suppresses deals whose listing was already reported.
///
/// Checking and recording are separate steps: the poll loop filters before
/// notifying and only records once the notification went out.
#[derive(Debug, Default)]
pub struct DedupFilter<S: SeenStore = InMemorySeenStore> {
    store: S,
}

impl<S: SeenStore> DedupFilter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn is_new(&mut self, deal: &Deal) -> bool {
        self.is_new_at(deal, Utc::now())
    }

    pub fn is_new_at(&mut self, deal: &Deal, now: DateTime<Utc>) -> bool {
        !self.store.contains(&deal.identity(), now)
    }

    /// Deals not seen in earlier cycles, with repeats inside the batch
    /// collapsed to their first occurrence. Does not record anything.
    pub fn filter_new(&mut self, deals: Vec<Deal>) -> Vec<Deal> {
        self.filter_new_at(deals, Utc::now())
    }

    pub fn filter_new_at(&mut self, deals: Vec<Deal>, now: DateTime<Utc>) -> Vec<Deal> {
        let mut batch = HashSet::new();
        deals
            .into_iter()
            .filter(|deal| {
                let id = deal.identity();
                !self.store.contains(&id, now) && batch.insert(id)
            })
            .collect()
    }

    pub fn mark_seen(&mut self, deals: &[Deal]) {
        self.mark_seen_at(deals, Utc::now());
    }

    pub fn mark_seen_at(&mut self, deals: &[Deal], now: DateTime<Utc>) {
        for deal in deals {
            self.store.insert(deal.identity(), now);
        }
    }

    pub fn seen_count(&self) -> usize {
        self.store.len()
    }
}
