//! # Scan Pipeline
//!
//! Turns address and port ranges into the list of endpoints that answered the probe.
//!
//! ```text
//! address ranges ─▶ network sweep pool ─▶ port expansion ─▶ port probe pool ─▶ collector
//!                   (connect to 4840)     (≤10k per batch)   (OPC UA hello)
//! ```
//!
//! Every arrow is a bounded channel, every stage a task, every probe unit its own task.
//! The pipeline is done when each producer has dropped its sender and each unit has exited.
//! One [`CancelToken`] stops all of it.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, info};
use uascout_common::network::port::PortRange;
use uascout_common::network::range::AddressRange;
use uascout_common::utils::cancel::CancelToken;

use crate::lock;
use crate::probe::{AsyncProbe, NullProbe, UaServerProbe};

mod pool;
mod progress;
mod stages;

use pool::{ProbeQueue, Sink, Stage};
pub use progress::{ProgressCallback, ScanProgress};
use progress::ScanCounters;

/// Upper bound of endpoints in one work item.
pub const BATCH_SIZE: usize = 10_000;
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(3);
/// Port the network sweep connects to when looking for live hosts.
pub const REACHABILITY_PORT: u16 = 4840;

const QUEUED_BATCHES: usize = 4;
const QUEUED_HOSTS: usize = 1024;

/// Builds the interrogation strategy of each port probe unit.
pub type ProbeFactory = Arc<dyn Fn() -> Box<dyn AsyncProbe> + Send + Sync>;

/// Fully resolved input of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub address_ranges: Vec<AddressRange>,
    pub port_ranges: Vec<PortRange>,
    /// Sweep for live hosts first. Without it every address goes straight to port probing.
    pub sweep_network: bool,
    pub reachability_port: u16,
    pub network_probe_timeout: Duration,
    pub port_probe_timeout: Duration,
    pub max_network_probes: usize,
    pub max_port_probes: usize,
    pub min_probe_pool: usize,
}

/// Finds endpoints speaking the expected protocol within a [`ScanRequest`].
#[async_trait]
pub trait EndpointScanner: Send + Sync {
    /// Returns the endpoints found. A cancelled scan returns what was found so far.
    async fn scan(&self, request: &ScanRequest, cancel: CancelToken) -> anyhow::Result<Vec<SocketAddr>>;
}

/// The TCP connect pipeline.
pub struct PortScanner {
    probe: ProbeFactory,
    on_progress: Option<ProgressCallback>,
    progress_interval: Duration,
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PortScanner {
    pub fn new() -> Self {
        Self {
            probe: Arc::new(|| Box::new(UaServerProbe::new())),
            on_progress: None,
            progress_interval: PROGRESS_INTERVAL,
        }
    }

    /// Replaces the OPC UA handshake run on every open port.
    pub fn with_probe(mut self, probe: ProbeFactory) -> Self {
        self.probe = probe;
        self
    }

    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.on_progress = Some(callback);
        self
    }

    pub fn progress_interval(mut self, every: Duration) -> Self {
        self.progress_interval = every;
        self
    }
}

#[async_trait]
impl EndpointScanner for PortScanner {
    async fn scan(&self, request: &ScanRequest, cancel: CancelToken) -> anyhow::Result<Vec<SocketAddr>> {
        let total_addresses: u64 = AddressRange::total_count(&request.address_ranges);
        if total_addresses == 0 || request.port_ranges.is_empty() {
            debug!("Nothing to scan");
            return Ok(Vec::new());
        }

        let counters = Arc::new(ScanCounters::new(total_addresses));
        let found: Arc<Mutex<Vec<SocketAddr>>> = Arc::new(Mutex::new(Vec::new()));
        let reporter = tokio::spawn(progress::report(
            counters.clone(),
            self.progress_interval,
            self.on_progress.clone(),
            cancel.clone(),
        ));
        let mut tasks: JoinSet<()> = JoinSet::new();
        let (hosts_tx, hosts_rx) = mpsc::channel(QUEUED_HOSTS);

        if request.sweep_network {
            let (candidates_tx, candidates_rx) = mpsc::channel(QUEUED_BATCHES);
            tasks.spawn(stages::produce_candidates(
                request.address_ranges.clone(),
                request.reachability_port,
                candidates_tx,
                cancel.clone(),
            ));
            let units: usize = (request.max_network_probes.max(1) as u64).min(total_addresses) as usize;
            let queue = Arc::new(ProbeQueue::new(
                candidates_rx,
                request.network_probe_timeout,
                units,
                request.min_probe_pool,
                Sink::Hosts(hosts_tx),
                Stage::Network,
                counters.clone(),
            ));
            let connect_only: ProbeFactory = Arc::new(|| Box::new(NullProbe));
            pool::spawn_units(&mut tasks, queue, units, &connect_only, &cancel, true);
        } else {
            tasks.spawn(stages::forward_hosts(
                request.address_ranges.clone(),
                hosts_tx,
                counters.clone(),
                cancel.clone(),
            ));
        }

        let (endpoints_tx, endpoints_rx) = mpsc::channel(QUEUED_BATCHES);
        tasks.spawn(stages::expand_ports(
            hosts_rx,
            request.port_ranges.clone(),
            endpoints_tx,
            cancel.clone(),
        ));
        let units: usize = request.max_port_probes.max(1);
        let queue = Arc::new(ProbeQueue::new(
            endpoints_rx,
            request.port_probe_timeout,
            units,
            request.min_probe_pool,
            Sink::Collector(found.clone()),
            Stage::Port,
            counters.clone(),
        ));
        pool::spawn_units(&mut tasks, queue, units, &self.probe, &cancel, false);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    reporter.abort();
                    anyhow::bail!("scan stage panicked: {e}");
                }
            }
        }
        reporter.abort();

        let progress: ScanProgress = counters.snapshot();
        if let Some(callback) = &self.on_progress {
            callback(&progress);
        }
        info!(
            "Scan {}: {} of {} addresses reachable, {} ports probed, {} endpoints found",
            if cancel.is_cancelled() { "cancelled" } else { "complete" },
            progress.addresses_found,
            progress.total_addresses,
            progress.ports_scanned,
            progress.endpoints_found
        );

        let endpoints: Vec<SocketAddr> = std::mem::take(&mut *lock(&found));
        Ok(endpoints)
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;
    use uascout_common::utils::cancel::CancelSource;

    fn request(addresses: &str, ports: Vec<PortRange>, sweep_network: bool) -> ScanRequest {
        ScanRequest {
            address_ranges: AddressRange::parse(addresses).unwrap(),
            port_ranges: ports,
            sweep_network,
            reachability_port: REACHABILITY_PORT,
            network_probe_timeout: Duration::from_millis(500),
            port_probe_timeout: Duration::from_millis(500),
            max_network_probes: 4,
            max_port_probes: 8,
            min_probe_pool: 1,
        }
    }

    fn connect_only() -> PortScanner {
        PortScanner::new().with_probe(Arc::new(|| Box::new(NullProbe)))
    }

    async fn listeners(count: usize) -> (Vec<TcpListener>, Vec<u16>) {
        let mut listeners = Vec::new();
        let mut ports = Vec::new();
        for _ in 0..count {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            ports.push(listener.local_addr().unwrap().port());
            listeners.push(listener);
        }
        (listeners, ports)
    }

    #[tokio::test]
    async fn finds_open_loopback_ports() {
        let (_listeners, open) = listeners(3).await;
        let closed = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let mut ports: Vec<PortRange> = open.iter().map(|p| PortRange::single(*p)).collect();
        ports.push(PortRange::single(closed));

        let found = connect_only()
            .scan(&request("127.0.0.1 [lo]", ports, false), CancelToken::never())
            .await
            .unwrap();

        let mut found_ports: Vec<u16> = found.iter().map(SocketAddr::port).collect();
        found_ports.sort();
        let mut expected = open.clone();
        expected.sort();
        assert_eq!(found_ports, expected);
    }

    #[tokio::test]
    async fn network_sweep_treats_refusal_as_a_live_host() {
        let (_listeners, open) = listeners(1).await;
        let mut sweep = request("127.0.0.1/32", vec![PortRange::single(open[0])], true);
        sweep.reachability_port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let found = connect_only().scan(&sweep, CancelToken::never()).await.unwrap();
        assert_eq!(found, vec![SocketAddr::from(([127, 0, 0, 1], open[0]))]);
    }

    #[tokio::test]
    async fn empty_ranges_scan_nothing() {
        let found = connect_only()
            .scan(&request("", PortRange::well_known(), true), CancelToken::never())
            .await
            .unwrap();
        assert!(found.is_empty());

        let found = connect_only()
            .scan(&request("127.0.0.1/32", Vec::new(), false), CancelToken::never())
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn cancelled_scan_returns_promptly() {
        let source = CancelSource::new();
        source.cancel();
        let started = std::time::Instant::now();
        let found = connect_only()
            .scan(&request("10.0.0.0/8", PortRange::well_known(), true), source.token())
            .await
            .unwrap();
        assert!(found.is_empty());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn final_progress_is_reported() {
        let (_listeners, open) = listeners(1).await;
        let calls = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(ScanProgress::default()));
        let (calls_ref, last_ref) = (calls.clone(), last.clone());
        let scanner = connect_only().on_progress(Arc::new(move |progress: &ScanProgress| {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            *last_ref.lock().unwrap() = *progress;
        }));

        scanner
            .scan(
                &request("127.0.0.1 [lo]", vec![PortRange::single(open[0])], false),
                CancelToken::never(),
            )
            .await
            .unwrap();

        assert!(calls.load(Ordering::SeqCst) >= 1);
        let last = *last.lock().unwrap();
        assert_eq!(last.endpoints_found, 1);
        assert_eq!(last.ports_scanned, 1);
        assert_eq!(last.active_probes, 0);
    }
}
