//! Results of the most recent sweeps, oldest evicted first.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uascout_common::models::application::ApplicationModel;

pub const SWEEP_CACHE_CAPACITY: usize = 10;

#[derive(Debug, Clone)]
pub struct SweepCache {
    entries: BTreeMap<DateTime<Utc>, Vec<ApplicationModel>>,
    capacity: usize,
}

impl Default for SweepCache {
    fn default() -> Self {
        Self::with_capacity(SWEEP_CACHE_CAPACITY)
    }
}

impl SweepCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn insert(&mut self, timestamp: DateTime<Utc>, results: Vec<ApplicationModel>) {
        self.entries.insert(timestamp, results);
        while self.entries.len() > self.capacity {
            self.entries.pop_first();
        }
    }

    pub fn latest(&self) -> Option<(&DateTime<Utc>, &Vec<ApplicationModel>)> {
        self.entries.last_key_value()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &BTreeMap<DateTime<Utc>, Vec<ApplicationModel>> {
        &self.entries
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
