//! Producer stages feeding the probe pools.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::mpsc;
use tracing::debug;
use uascout_common::network::port::PortRange;
use uascout_common::network::range::AddressRange;
use uascout_common::utils::cancel::CancelToken;

use super::BATCH_SIZE;
use super::progress::ScanCounters;

/// Pages the address ranges into batches of `address:port` candidates for the network sweep.
pub(crate) async fn produce_candidates(
    ranges: Vec<AddressRange>,
    port: u16,
    tx: mpsc::Sender<Vec<SocketAddr>>,
    cancel: CancelToken,
) {
    let mut cursor = AddressRange::cursor(&ranges);
    let mut addresses: Vec<Ipv4Addr> = Vec::with_capacity(BATCH_SIZE);
    loop {
        addresses.clear();
        if cursor.fill_next_batch(&mut addresses, BATCH_SIZE) == 0 {
            break;
        }
        let batch: Vec<SocketAddr> = addresses
            .iter()
            .map(|addr| SocketAddr::V4(SocketAddrV4::new(*addr, port)))
            .collect();
        match cancel.run_until_cancelled(tx.send(batch)).await {
            Some(Ok(())) => {}
            _ => break,
        }
    }
}

/// Hands every address straight to port expansion. Used when there is no network sweep.
pub(crate) async fn forward_hosts(
    ranges: Vec<AddressRange>,
    tx: mpsc::Sender<Ipv4Addr>,
    counters: Arc<ScanCounters>,
    cancel: CancelToken,
) {
    for addr in AddressRange::cursor(&ranges) {
        match cancel.run_until_cancelled(tx.send(addr)).await {
            Some(Ok(())) => {
                counters.addresses_scanned.fetch_add(1, Ordering::Relaxed);
                counters.addresses_found.fetch_add(1, Ordering::Relaxed);
            }
            _ => break,
        }
    }
}

/// Turns every reachable host into batches of at most [`BATCH_SIZE`] endpoints.
pub(crate) async fn expand_ports(
    mut hosts: mpsc::Receiver<Ipv4Addr>,
    ports: Vec<PortRange>,
    tx: mpsc::Sender<Vec<SocketAddr>>,
    cancel: CancelToken,
) {
    let per_host: u64 = PortRange::total_count(&ports);
    while let Some(Some(addr)) = cancel.run_until_cancelled(hosts.recv()).await {
        debug!("Probing {per_host} ports on {addr}");
        let mut cursor = PortRange::cursor(&ports);
        loop {
            let mut batch: Vec<SocketAddr> =
                Vec::with_capacity((cursor.remaining() as usize).min(BATCH_SIZE));
            let added: usize = cursor.fill_next_batch(&mut batch, BATCH_SIZE, |port| {
                SocketAddr::V4(SocketAddrV4::new(addr, port))
            });
            if added == 0 {
                break;
            }
            match cancel.run_until_cancelled(tx.send(batch)).await {
                Some(Ok(())) => {}
                _ => return,
            }
        }
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
