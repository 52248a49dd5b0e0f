// src/service/cache.rs

use futures::future::{BoxFuture, Shared};
use std::collections::HashMap;
use tokio::time::{Duration, Instant};

use crate::provider::AdHandle;

/// A load shared by every caller that asks for the same placement while it runs.
pub type LoadFlight = Shared<BoxFuture<'static, bool>>;

/// Load state of one placement inside one provider service.
#[derive(Default)]
pub struct PlacementCacheEntry {
    pub handle: Option<AdHandle>,
    pub available: bool,
    /// A load has been started at least once.
    pub attempted: bool,
    pub in_flight: Option<LoadFlight>,
    pub reload_scheduled: bool,
    pub last_load_started: Option<Instant>,
}

impl PlacementCacheEntry {
    pub fn load_in_progress(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Time to wait before the next load so loads stay `interval` apart.
    pub fn reload_delay(&self, interval: Duration, now: Instant) -> Duration {
        match self.last_load_started {
            Some(started) => interval.saturating_sub(now.saturating_duration_since(started)),
            None => Duration::ZERO,
        }
    }
}

/// Per-placement ad cache plus the reverse index used to route native events.
#[derive(Default)]
pub struct PlacementCache {
    entries: HashMap<String, PlacementCacheEntry>,
    owners: HashMap<AdHandle, String>,
    /// released handles whose show has not settled yet
    retired: HashMap<AdHandle, String>,
}

impl PlacementCache {
    pub fn entry(&mut self, placement_id: &str) -> &mut PlacementCacheEntry {
        self.entries.entry(placement_id.to_string()).or_default()
    }

    pub fn get(&self, placement_id: &str) -> Option<&PlacementCacheEntry> {
        self.entries.get(placement_id)
    }

    pub fn owner(&self, handle: AdHandle) -> Option<&str> {
        self.owners.get(&handle).map(String::as_str)
    }

    /// Stores a freshly loaded ad; returns a previously cached handle to destroy.
    pub fn bind(&mut self, placement_id: &str, handle: AdHandle) -> Option<AdHandle> {
        self.owners.insert(handle, placement_id.to_string());
        let entry = self.entry(placement_id);
        let previous = entry.handle.replace(handle);
        entry.available = true;
        if let Some(previous) = previous {
            self.owners.remove(&previous);
        }
        previous
    }

    /// Forgets a consumed or broken ad. Returns the placement that owned it.
    pub fn release(&mut self, handle: AdHandle) -> Option<String> {
        let placement_id = self.owners.remove(&handle)?;
        if let Some(entry) = self.entries.get_mut(&placement_id) {
            if entry.handle == Some(handle) {
                entry.handle = None;
                entry.available = false;
            }
        }
        Some(placement_id)
    }

    /// Like [`release`](Self::release), but keeps routing late callbacks of
    /// `handle` to its placement until [`forget_retired`](Self::forget_retired).
    pub fn retire(&mut self, handle: AdHandle) -> Option<String> {
        let placement_id = self.release(handle)?;
        self.retired.insert(handle, placement_id.clone());
        Some(placement_id)
    }

    pub fn retired_owner(&self, handle: AdHandle) -> Option<&str> {
        self.retired.get(&handle).map(String::as_str)
    }

    pub fn forget_retired(&mut self, handle: AdHandle) {
        self.retired.remove(&handle);
    }

    /// Empties the cache, returning every handle that was still held.
    pub fn drain_handles(&mut self) -> Vec<AdHandle> {
        self.entries.clear();
        self.retired.clear();
        self.owners.drain().map(|(handle, _)| handle).collect()
    }

    pub fn any_available<'a>(&self, mut placement_ids: impl Iterator<Item = &'a str>) -> bool {
        placement_ids.any(|id| self.entries.get(id).is_some_and(|e| e.available && e.handle.is_some()))
    }
}
