use std::net::SocketAddr;
use std::time::Duration;

use uascout_common::network::port::PortRange;
use uascout_common::network::range::AddressRange;
use uascout_common::utils::cancel::CancelToken;
use uascout_core::scanner::{EndpointScanner, PortScanner, ScanRequest, REACHABILITY_PORT};

use crate::support::{closed_port, serve, Reply};

fn request(ports: &[u16], sweep_network: bool) -> ScanRequest {
    ScanRequest {
        address_ranges: AddressRange::parse("127.0.0.1 [lo]").unwrap(),
        port_ranges: ports.iter().copied().map(PortRange::single).collect(),
        sweep_network,
        reachability_port: REACHABILITY_PORT,
        network_probe_timeout: Duration::from_millis(500),
        port_probe_timeout: Duration::from_millis(300),
        max_network_probes: 4,
        max_port_probes: 16,
        min_probe_pool: 1,
    }
}

fn sorted(mut endpoints: Vec<SocketAddr>) -> Vec<SocketAddr> {
    endpoints.sort();
    endpoints
}

#[tokio::test]
async fn only_opc_ua_stacks_are_reported() {
    let ack = serve(Reply::Acknowledge).await;
    let err = serve(Reply::Error).await;
    let http = serve(Reply::Http).await;
    let silent = serve(Reply::Silent).await;
    let closed = closed_port().await;

    let ports = [ack.port(), err.port(), http.port(), silent.port(), closed];
    let found = PortScanner::new()
        .scan(&request(&ports, false), CancelToken::never())
        .await
        .unwrap();

    assert_eq!(sorted(found), sorted(vec![ack, err]));
}

#[tokio::test]
async fn sweep_then_probe_finds_the_server() {
    let ack = serve(Reply::Acknowledge).await;
    let mut sweep = request(&[ack.port()], true);
    sweep.reachability_port = closed_port().await;

    let found = PortScanner::new().scan(&sweep, CancelToken::never()).await.unwrap();
    assert_eq!(found, vec![ack]);
}

#[tokio::test]
async fn server_among_many_closed_ports() {
    let ack = serve(Reply::Acknowledge).await;
    let mut ports: Vec<u16> = Vec::new();
    for _ in 0..64 {
        ports.push(closed_port().await);
    }
    ports.push(ack.port());

    let found = PortScanner::new()
        .scan(&request(&ports, false), CancelToken::never())
        .await
        .unwrap();
    assert_eq!(found, vec![ack]);
}
