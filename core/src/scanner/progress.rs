use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::info;
use uascout_common::utils::cancel::CancelToken;

/// Called with a counter snapshot every progress interval and once when the scan ends.
pub type ProgressCallback = Arc<dyn Fn(&ScanProgress) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub total_addresses: u64,
    pub addresses_scanned: u64,
    pub addresses_found: u64,
    pub ports_scanned: u64,
    pub endpoints_found: u64,
    pub active_probes: usize,
}

#[derive(Debug, Default)]
pub(crate) struct ScanCounters {
    total_addresses: u64,
    pub(crate) addresses_scanned: AtomicU64,
    pub(crate) addresses_found: AtomicU64,
    pub(crate) ports_scanned: AtomicU64,
    pub(crate) endpoints_found: AtomicU64,
    pub(crate) active_probes: AtomicUsize,
}

impl ScanCounters {
    pub(crate) fn new(total_addresses: u64) -> Self {
        Self {
            total_addresses,
            ..Self::default()
        }
    }

    pub(crate) fn snapshot(&self) -> ScanProgress {
        ScanProgress {
            total_addresses: self.total_addresses,
            addresses_scanned: self.addresses_scanned.load(Ordering::Relaxed),
            addresses_found: self.addresses_found.load(Ordering::Relaxed),
            ports_scanned: self.ports_scanned.load(Ordering::Relaxed),
            endpoints_found: self.endpoints_found.load(Ordering::Relaxed),
            active_probes: self.active_probes.load(Ordering::Relaxed),
        }
    }
}

pub(crate) async fn report(
    counters: Arc<ScanCounters>,
    every: Duration,
    callback: Option<ProgressCallback>,
    cancel: CancelToken,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    while cancel.run_until_cancelled(ticker.tick()).await.is_some() {
        let progress: ScanProgress = counters.snapshot();
        info!(
            "Scanned {}/{} addresses ({} reachable), {} ports, {} endpoints found, {} probes active",
            progress.addresses_scanned,
            progress.total_addresses,
            progress.addresses_found,
            progress.ports_scanned,
            progress.endpoints_found,
            progress.active_probes
        );
        if let Some(callback) = &callback {
            callback(&progress);
        }
    }
}
