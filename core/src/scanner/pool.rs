//! The shared [`ProbeHost`] behind each probe pool.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::trace;
use uascout_common::utils::cancel::CancelToken;

use super::ProbeFactory;
use super::progress::ScanCounters;
use crate::lock;
use crate::probe::{Candidate, ConnectProbe, ProbeHost};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Network,
    Port,
}

/// Where confirmed endpoints go.
pub(crate) enum Sink {
    /// Reachable hosts, forwarded to port expansion.
    Hosts(mpsc::Sender<Ipv4Addr>),
    /// Final results.
    Collector(Arc<Mutex<Vec<SocketAddr>>>),
}

struct BatchSource {
    rx: mpsc::Receiver<Vec<SocketAddr>>,
    batch: std::vec::IntoIter<SocketAddr>,
}

impl BatchSource {
    async fn next(&mut self) -> Option<SocketAddr> {
        loop {
            if let Some(endpoint) = self.batch.next() {
                return Some(endpoint);
            }
            self.batch = self.rx.recv().await?.into_iter();
        }
    }
}

struct PoolState {
    /// Units that may still ask for work.
    live: usize,
    requeued: VecDeque<Candidate>,
}

pub(crate) struct ProbeQueue {
    source: tokio::sync::Mutex<BatchSource>,
    state: Mutex<PoolState>,
    timeout: Duration,
    floor: usize,
    sink: Sink,
    stage: Stage,
    counters: Arc<ScanCounters>,
}

impl ProbeQueue {
    pub(crate) fn new(
        rx: mpsc::Receiver<Vec<SocketAddr>>,
        timeout: Duration,
        units: usize,
        floor: usize,
        sink: Sink,
        stage: Stage,
        counters: Arc<ScanCounters>,
    ) -> Self {
        Self {
            source: tokio::sync::Mutex::new(BatchSource {
                rx,
                batch: Vec::new().into_iter(),
            }),
            state: Mutex::new(PoolState {
                live: units,
                requeued: VecDeque::new(),
            }),
            timeout,
            floor: floor.max(1),
            sink,
            stage,
            counters,
        }
    }
}

#[async_trait]
impl ProbeHost for ProbeQueue {
    async fn next(&self) -> Option<Candidate> {
        if let Some(candidate) = lock(&self.state).requeued.pop_front() {
            return Some(candidate);
        }

        let next: Option<SocketAddr> = self.source.lock().await.next().await;
        if let Some(endpoint) = next {
            return Some(Candidate {
                endpoint,
                timeout: self.timeout,
            });
        }

        // Exit decision and requeue check share one lock: a handed back candidate is always
        // picked up by a unit that is still live.
        let mut state = lock(&self.state);
        if let Some(candidate) = state.requeued.pop_front() {
            return Some(candidate);
        }
        state.live = state.live.saturating_sub(1);
        None
    }

    async fn on_success(&self, endpoint: SocketAddr) {
        match &self.sink {
            Sink::Hosts(tx) => {
                self.counters.addresses_found.fetch_add(1, Ordering::Relaxed);
                if let IpAddr::V4(addr) = endpoint.ip() {
                    let _ = tx.send(addr).await;
                }
            }
            Sink::Collector(found) => {
                self.counters.endpoints_found.fetch_add(1, Ordering::Relaxed);
                lock(found).push(endpoint);
            }
        }
    }

    fn on_fail(&self, endpoint: SocketAddr) {
        trace!("{:?} probe missed {endpoint}", self.stage);
    }

    fn on_complete(&self, _endpoint: SocketAddr) {
        let counter = match self.stage {
            Stage::Network => &self.counters.addresses_scanned,
            Stage::Port => &self.counters.ports_scanned,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn on_exit(&self) {
        self.counters.active_probes.fetch_sub(1, Ordering::Relaxed);
    }

    fn should_give_up(&self, candidate: &Candidate) -> bool {
        let mut state = lock(&self.state);
        if state.live <= self.floor {
            return false;
        }
        state.live -= 1;
        state.requeued.push_back(*candidate);
        true
    }
}

/// Spawns `units` probe units onto `tasks`, all pulling from `queue`.
pub(crate) fn spawn_units(
    tasks: &mut JoinSet<()>,
    queue: Arc<ProbeQueue>,
    units: usize,
    probe: &ProbeFactory,
    cancel: &CancelToken,
    reachable_on_refusal: bool,
) {
    for id in 0..units {
        queue.counters.active_probes.fetch_add(1, Ordering::Relaxed);
        let unit = ConnectProbe::new(id, queue.clone(), probe(), cancel.clone())
            .reachable_on_refusal(reachable_on_refusal);
        tasks.spawn(unit.run());
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
