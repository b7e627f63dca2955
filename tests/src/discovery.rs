use std::sync::Arc;
use std::time::Duration;

use uascout_common::models::application::ApplicationModel;
use uascout_common::models::event::DiscoveryEventModel;
use uascout_common::models::options::{DiscoveryMode, DiscoveryOptions};
use uascout_common::network::port::PortRange;
use uascout_common::network::range::AddressRange;
use uascout_common::utils::cancel::CancelToken;
use uascout_core::discovery::{Discoverer, ProbeOnlyClient, SystemInterfaces};
use uascout_core::scanner::PortScanner;

use crate::support::{closed_port, serve, RecordingEmitter, Reply};

fn loopback_options(ports: &[u16]) -> DiscoveryOptions {
    DiscoveryOptions {
        address_ranges: Some(AddressRange::parse("127.0.0.1 [lo]").unwrap()),
        port_ranges: Some(ports.iter().copied().map(PortRange::single).collect()),
        port_probe_timeout: Some(Duration::from_millis(300)),
        ..DiscoveryOptions::with_mode(DiscoveryMode::Local)
    }
}

fn discoverer(emitter: Arc<RecordingEmitter>) -> Discoverer {
    Discoverer::new(
        Arc::new(PortScanner::new()),
        Arc::new(ProbeOnlyClient),
        emitter,
        Arc::new(SystemInterfaces),
    )
    .with_initial_delay(Duration::ZERO)
}

#[tokio::test]
async fn one_pass_reports_each_server_as_an_application() {
    let first = serve(Reply::Acknowledge).await;
    let second = serve(Reply::Error).await;
    let ports = [first.port(), second.port(), closed_port().await];

    let apps: Vec<ApplicationModel> = discoverer(Arc::default())
        .run_once(&loopback_options(&ports), CancelToken::never())
        .await
        .unwrap();

    let mut urls: Vec<String> = apps
        .iter()
        .flat_map(|app| app.endpoints.iter().map(|e| e.url.clone()))
        .collect();
    urls.sort();
    let mut expected = vec![format!("opc.tcp://{first}"), format!("opc.tcp://{second}")];
    expected.sort();
    assert_eq!(urls, expected);
    assert!(apps
        .iter()
        .all(|app| app.application.host_addresses.contains("127.0.0.1")));
}

#[tokio::test]
async fn running_sweep_publishes_events_ending_in_a_terminator() {
    let server = serve(Reply::Acknowledge).await;
    let emitter = Arc::new(RecordingEmitter::default());
    let discovery = discoverer(emitter.clone()).with_options(loopback_options(&[server.port()]));

    discovery.set_mode(DiscoveryMode::Local).await;
    let published = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(batch) = emitter.batches.lock().unwrap().first().cloned() {
                return batch;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("nothing published");
    discovery.shutdown().await;

    let events: Vec<DiscoveryEventModel> = published
        .iter()
        .map(|message| serde_json::from_slice(message).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0].endpoint.as_ref().map(|e| e.url.clone()),
        Some(format!("opc.tcp://{server}"))
    );
    assert!(events[1].is_terminator());
    assert_eq!(events[1].index, 1);
    assert!(!discovery.is_running().await);
}
