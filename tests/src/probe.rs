use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use uascout_common::utils::cancel::{CancelSource, CancelToken};
use uascout_core::probe::{Candidate, ConnectProbe, ProbeHost, UaServerProbe};

use crate::support::{closed_port, serve, Reply};

#[derive(Default)]
struct ListHost {
    queue: Mutex<VecDeque<Candidate>>,
    hits: Mutex<Vec<SocketAddr>>,
    misses: Mutex<Vec<SocketAddr>>,
    exits: Mutex<usize>,
}

impl ListHost {
    fn with(endpoints: &[SocketAddr], timeout: Duration) -> Arc<Self> {
        let host = Self::default();
        host.queue.lock().unwrap().extend(
            endpoints
                .iter()
                .map(|endpoint| Candidate { endpoint: *endpoint, timeout }),
        );
        Arc::new(host)
    }
}

#[async_trait]
impl ProbeHost for ListHost {
    async fn next(&self) -> Option<Candidate> {
        self.queue.lock().unwrap().pop_front()
    }

    async fn on_success(&self, endpoint: SocketAddr) {
        self.hits.lock().unwrap().push(endpoint);
    }

    fn on_fail(&self, endpoint: SocketAddr) {
        self.misses.lock().unwrap().push(endpoint);
    }

    fn on_complete(&self, _endpoint: SocketAddr) {}

    fn on_exit(&self) {
        *self.exits.lock().unwrap() += 1;
    }

    fn should_give_up(&self, _candidate: &Candidate) -> bool {
        false
    }
}

async fn run_unit(host: Arc<ListHost>, cancel: CancelToken) {
    ConnectProbe::new(0, host, Box::new(UaServerProbe::new()), cancel)
        .run()
        .await;
}

#[tokio::test]
async fn one_unit_classifies_every_kind_of_peer() {
    let ack = serve(Reply::Acknowledge).await;
    let err = serve(Reply::Error).await;
    let http = serve(Reply::Http).await;
    let closed = SocketAddr::from(([127, 0, 0, 1], closed_port().await));

    let host = ListHost::with(&[ack, http, closed, err], Duration::from_secs(2));
    run_unit(host.clone(), CancelToken::never()).await;

    assert_eq!(*host.hits.lock().unwrap(), vec![ack, err]);
    assert_eq!(*host.misses.lock().unwrap(), vec![http, closed]);
    assert_eq!(*host.exits.lock().unwrap(), 1);
}

#[tokio::test]
async fn silent_server_fails_after_retrying_once() {
    let silent = serve(Reply::Silent).await;
    let timeout = Duration::from_millis(200);
    let host = ListHost::with(&[silent], timeout);

    let started = Instant::now();
    run_unit(host.clone(), CancelToken::never()).await;
    let elapsed = started.elapsed();

    assert_eq!(*host.misses.lock().unwrap(), vec![silent]);
    assert!(elapsed >= timeout * 2, "gave up after {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "took {elapsed:?}");
}

#[tokio::test]
async fn unroutable_address_times_out() {
    let blackhole = SocketAddr::from(([192, 0, 2, 1], 4840));
    let host = ListHost::with(&[blackhole], Duration::from_millis(300));

    let started = Instant::now();
    run_unit(host.clone(), CancelToken::never()).await;

    assert!(host.hits.lock().unwrap().is_empty());
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(*host.exits.lock().unwrap(), 1);
}

#[tokio::test]
async fn cancellation_stops_a_unit_mid_handshake() {
    let silent = serve(Reply::Silent).await;
    let host = ListHost::with(&[silent, silent, silent], Duration::from_secs(30));
    let source = CancelSource::new();

    let unit = tokio::spawn(run_unit(host.clone(), source.token()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    source.cancel();

    tokio::time::timeout(Duration::from_secs(2), unit)
        .await
        .expect("unit did not stop")
        .unwrap();
    assert!(host.hits.lock().unwrap().is_empty());
    assert_eq!(*host.exits.lock().unwrap(), 1);
}
