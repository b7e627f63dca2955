//! # Discovery Coordinator
//!
//! [`Discoverer`] owns the discovery options and the background sweep. A sweep runs one
//! discovery pass after another:
//!
//! 1. **Scan**: the [`EndpointScanner`] finds endpoints that complete the OPC UA hello.
//! 2. **Interrogate**: the [`DiscoveryClient`] describes the application behind each endpoint.
//! 3. **Record**: results are merged per application and put in the [`SweepCache`].
//! 4. **Publish**: results are flattened into events and handed to the [`EventEmitter`].
//!
//! and then idles until the next pass. Mode and configuration changes that affect what is
//! scanned stop the running sweep and start a fresh one with a copy of the new options.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uascout_common::config::DiscoveryConfigModel;
use uascout_common::error::ConfigError;
use uascout_common::models::application::{ApplicationModel, DiscoveredEndpoint};
use uascout_common::models::event::{DISCOVERY_EVENT_CONTENT_TYPE, DiscoveryEventModel};
use uascout_common::models::options::{DiscoveryMode, DiscoveryOptions, NetworkClass};
use uascout_common::network::interface::NetInterface;
use uascout_common::network::port::PortRange;
use uascout_common::network::range::AddressRange;
use uascout_common::utils::cancel::{CancelSource, CancelToken};

use crate::cache::SweepCache;
use crate::lock;
use crate::scanner::EndpointScanner;

mod providers;
mod request;

pub use providers::{ProbeOnlyClient, SystemInterfaces};
pub use request::{FAST_MIN_PREFIX, build_request, default_address_ranges, default_port_ranges};

/// Delay before the very first pass after discovery is switched on.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(5);

/// Application-layer client asked about every endpoint the scan found.
#[async_trait]
pub trait DiscoveryClient: Send + Sync {
    async fn discover(&self, url: &str, cancel: CancelToken) -> anyhow::Result<Vec<DiscoveredEndpoint>>;
}

/// Transport for published sweep results.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn send(&self, messages: Vec<Vec<u8>>, content_type: &str) -> anyhow::Result<()>;
}

/// Local interfaces used to derive default address ranges.
pub trait InterfaceSource: Send + Sync {
    fn interfaces(&self, class: NetworkClass) -> Vec<NetInterface>;
}

struct Shared {
    scanner: Arc<dyn EndpointScanner>,
    client: Arc<dyn DiscoveryClient>,
    emitter: Arc<dyn EventEmitter>,
    interfaces: Arc<dyn InterfaceSource>,
    cache: Mutex<SweepCache>,
    sweeps_started: AtomicUsize,
    passes_completed: AtomicUsize,
}

struct Sweep {
    cancel: CancelSource,
    handle: JoinHandle<()>,
}

struct State {
    options: DiscoveryOptions,
    /// Idle time between passes, read by the running sweep before every wait.
    idle: watch::Sender<Duration>,
    running: Option<Sweep>,
    started_once: bool,
}

pub struct Discoverer {
    shared: Arc<Shared>,
    state: tokio::sync::Mutex<State>,
    initial_delay: Duration,
}

impl Discoverer {
    pub fn new(
        scanner: Arc<dyn EndpointScanner>,
        client: Arc<dyn DiscoveryClient>,
        emitter: Arc<dyn EventEmitter>,
        interfaces: Arc<dyn InterfaceSource>,
    ) -> Self {
        let options = DiscoveryOptions::default();
        let (idle, _) = watch::channel(options.idle_wait());
        Self {
            shared: Arc::new(Shared {
                scanner,
                client,
                emitter,
                interfaces,
                cache: Mutex::new(SweepCache::default()),
                sweeps_started: AtomicUsize::new(0),
                passes_completed: AtomicUsize::new(0),
            }),
            state: tokio::sync::Mutex::new(State {
                options,
                idle,
                running: None,
                started_once: false,
            }),
            initial_delay: DEFAULT_INITIAL_DELAY,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the starting options. Their mode is ignored: discovery starts with [`Discoverer::set_mode`].
    pub fn with_options(mut self, mut options: DiscoveryOptions) -> Self {
        options.mode = DiscoveryMode::Off;
        let state = self.state.get_mut();
        state.idle.send_replace(options.idle_wait());
        state.options = options;
        self
    }

    /// Switches the mode, restarting the sweep if the mode changed.
    pub async fn set_mode(&self, mode: DiscoveryMode) {
        let mut state = self.state.lock().await;
        if state.options.mode == mode {
            debug!("Discovery already in {mode} mode");
            return;
        }
        info!("Discovery mode {} -> {mode}", state.options.mode);
        state.options.mode = mode;
        self.restart(&mut state).await;
    }

    /// Applies an external configuration update.
    ///
    /// A rejected update changes nothing. A new idle time reaches the running sweep without
    /// restarting it; changed ranges, timeouts or pool sizes restart it.
    pub async fn update_configuration(&self, model: &DiscoveryConfigModel) -> Result<(), ConfigError> {
        let mut state = self.state.lock().await;
        let restart: bool = state.options.apply(model)?;
        let idle: Duration = state.options.idle_wait();
        state.idle.send_replace(idle);
        if restart {
            info!("Discovery configuration changed");
            self.restart(&mut state).await;
        }
        Ok(())
    }

    /// Stops discovery. Equivalent to switching to [`DiscoveryMode::Off`].
    pub async fn shutdown(&self) {
        self.set_mode(DiscoveryMode::Off).await;
    }

    /// Runs a single discovery pass with `options`, outside of any sweep.
    ///
    /// Nothing is cached or published. A cancelled pass returns the servers found so far.
    pub async fn run_once(
        &self,
        options: &DiscoveryOptions,
        cancel: CancelToken,
    ) -> anyhow::Result<Vec<ApplicationModel>> {
        self.shared.collect(options, &cancel).await
    }

    pub async fn mode(&self) -> DiscoveryMode {
        self.state.lock().await.options.mode
    }

    pub async fn options(&self) -> DiscoveryOptions {
        self.state.lock().await.options.clone()
    }

    pub async fn is_running(&self) -> bool {
        self.state
            .lock()
            .await
            .running
            .as_ref()
            .is_some_and(|sweep| !sweep.handle.is_finished())
    }

    pub fn sweeps_started(&self) -> usize {
        self.shared.sweeps_started.load(Ordering::SeqCst)
    }

    pub fn passes_completed(&self) -> usize {
        self.shared.passes_completed.load(Ordering::SeqCst)
    }

    pub fn cache_snapshot(&self) -> BTreeMap<DateTime<Utc>, Vec<ApplicationModel>> {
        lock(&self.shared.cache).entries().clone()
    }

    pub fn last_results(&self) -> Option<Vec<ApplicationModel>> {
        lock(&self.shared.cache)
            .latest()
            .map(|(_, results)| results.clone())
    }

    async fn restart(&self, state: &mut State) {
        if let Some(sweep) = state.running.take() {
            sweep.cancel.cancel();
            if let Err(e) = sweep.handle.await {
                if e.is_panic() {
                    error!("Sweep task panicked: {e}");
                }
            }
        }
        lock(&self.shared.cache).clear();

        if state.options.mode == DiscoveryMode::Off {
            info!("Discovery stopped");
            return;
        }

        let delay: Duration = if state.started_once {
            Duration::ZERO
        } else {
            self.initial_delay
        };
        state.started_once = true;

        let cancel = CancelSource::new();
        let handle = tokio::spawn(sweep_loop(
            self.shared.clone(),
            state.options.clone(),
            state.idle.subscribe(),
            cancel.token(),
            delay,
        ));
        self.shared.sweeps_started.fetch_add(1, Ordering::SeqCst);
        info!("Discovery started in {} mode", state.options.mode);
        state.running = Some(Sweep { cancel, handle });
    }
}

async fn sweep_loop(
    shared: Arc<Shared>,
    options: DiscoveryOptions,
    mut idle: watch::Receiver<Duration>,
    cancel: CancelToken,
    delay: Duration,
) {
    if !delay.is_zero() {
        debug!("First discovery pass in {delay:?}");
        if cancel.run_until_cancelled(sleep(delay)).await.is_none() {
            return;
        }
    }

    loop {
        if let Err(e) = shared.run_pass(&options, &cancel).await {
            if cancel.is_cancelled() {
                break;
            }
            error!("Discovery pass failed: {e:#}");
        }
        if cancel.is_cancelled() {
            break;
        }

        let wait: Duration = *idle.borrow_and_update();
        debug!("Next discovery pass in {wait:?}");
        if cancel.run_until_cancelled(sleep(wait)).await.is_none() {
            break;
        }
    }
    debug!("Sweep stopped");
}

impl Shared {
    /// Scans and interrogates. Once cancelled, verified endpoints the client has not
    /// described yet are reported as bare servers.
    async fn collect(
        &self,
        options: &DiscoveryOptions,
        cancel: &CancelToken,
    ) -> anyhow::Result<Vec<ApplicationModel>> {
        let request = build_request(options, self.interfaces.as_ref());
        info!(
            "Discovery pass over {} addresses and {} ports per host",
            AddressRange::total_count(&request.address_ranges),
            PortRange::total_count(&request.port_ranges)
        );

        let endpoints: Vec<SocketAddr> = self.scanner.scan(&request, cancel.clone()).await?;
        let Interrogation {
            mut found,
            unanswered,
        } = interrogate(
            self.client.clone(),
            endpoints,
            options.max_degree_of_parallelism,
            cancel,
        )
        .await;

        if !unanswered.is_empty() {
            debug!("{} endpoints were not interrogated", unanswered.len());
            for endpoint in unanswered {
                let url: String = format!("opc.tcp://{endpoint}");
                found.extend(ProbeOnlyClient.discover(&url, CancelToken::never()).await?);
            }
        }
        Ok(ApplicationModel::merge(found))
    }

    /// One sweep pass. A cancelled pass is neither cached nor published.
    async fn run_pass(&self, options: &DiscoveryOptions, cancel: &CancelToken) -> anyhow::Result<()> {
        let started: Instant = Instant::now();
        let apps: Vec<ApplicationModel> = self.collect(options, cancel).await?;
        if cancel.is_cancelled() {
            return Ok(());
        }

        let timestamp: DateTime<Utc> = Utc::now();
        lock(&self.cache).insert(timestamp, apps.clone());

        if let Err(e) = publish(self.emitter.as_ref(), &apps, timestamp).await {
            warn!("Publishing discovery results failed: {e:#}");
        }

        self.passes_completed.fetch_add(1, Ordering::SeqCst);
        info!(
            "Discovery pass found {} applications with {} endpoints in {:.1?}",
            apps.len(),
            ApplicationModel::endpoint_count(&apps),
            started.elapsed()
        );
        Ok(())
    }
}

struct Interrogation {
    found: Vec<DiscoveredEndpoint>,
    /// Endpoints cancellation kept from being described.
    unanswered: Vec<SocketAddr>,
}

/// Asks the client about every endpoint, at most `limit` at a time.
async fn interrogate(
    client: Arc<dyn DiscoveryClient>,
    endpoints: Vec<SocketAddr>,
    limit: usize,
    cancel: &CancelToken,
) -> Interrogation {
    let permits = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks: JoinSet<(SocketAddr, Option<Vec<DiscoveredEndpoint>>)> = JoinSet::new();
    let mut unanswered: Vec<SocketAddr> = Vec::new();

    let mut pending = endpoints.into_iter();
    for endpoint in pending.by_ref() {
        let Some(Ok(permit)) = cancel
            .run_until_cancelled(permits.clone().acquire_owned())
            .await
        else {
            unanswered.push(endpoint);
            break;
        };
        let client = client.clone();
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let url: String = format!("opc.tcp://{endpoint}");
            match cancel.run_until_cancelled(client.discover(&url, cancel.clone())).await {
                Some(Ok(found)) => {
                    debug!("{url} describes {} endpoints", found.len());
                    (endpoint, Some(found))
                }
                Some(Err(e)) => {
                    warn!("Interrogating {url} failed: {e:#}");
                    (endpoint, Some(Vec::new()))
                }
                None => (endpoint, None),
            }
        });
    }

    unanswered.extend(pending);

    let mut found: Vec<DiscoveredEndpoint> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Some(items))) => found.extend(items),
            Ok((endpoint, None)) => unanswered.push(endpoint),
            Err(e) if e.is_panic() => error!("Interrogation task panicked: {e}"),
            Err(_) => {}
        }
    }
    Interrogation { found, unanswered }
}

/// Flattens `apps` into events and sends them as one batch.
pub async fn publish(
    emitter: &dyn EventEmitter,
    apps: &[ApplicationModel],
    timestamp: DateTime<Utc>,
) -> anyhow::Result<()> {
    let messages: Vec<Vec<u8>> = DiscoveryEventModel::flatten(apps, timestamp)
        .iter()
        .map(serde_json::to_vec)
        .collect::<Result<_, _>>()?;
    emitter.send(messages, DISCOVERY_EVENT_CONTENT_TYPE).await
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
    use crate::scanner::ScanRequest;
    use std::net::Ipv4Addr;
    use std::sync::atomic::AtomicBool;

    #[derive(Default)]
    struct FakeScanner {
        endpoints: Vec<SocketAddr>,
        hold: Option<Duration>,
        fail: AtomicBool,
        calls: AtomicUsize,
        requests: Mutex<Vec<ScanRequest>>,
    }

    #[async_trait]
    impl EndpointScanner for FakeScanner {
        async fn scan(&self, request: &ScanRequest, cancel: CancelToken) -> anyhow::Result<Vec<SocketAddr>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            if let Some(hold) = self.hold {
                if cancel.run_until_cancelled(sleep(hold)).await.is_none() {
                    return Ok(Vec::new());
                }
            }
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("scanner exploded");
            }
            Ok(self.endpoints.clone())
        }
    }

    #[derive(Default)]
    struct RecordingEmitter {
        fail: bool,
        batches: Mutex<Vec<(Vec<Vec<u8>>, String)>>,
    }

    #[async_trait]
    impl EventEmitter for RecordingEmitter {
        async fn send(&self, messages: Vec<Vec<u8>>, content_type: &str) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("hub unreachable");
            }
            self.batches
                .lock()
                .unwrap()
                .push((messages, content_type.to_string()));
            Ok(())
        }
    }

    struct Fixed;

    impl InterfaceSource for Fixed {
        fn interfaces(&self, _class: NetworkClass) -> Vec<NetInterface> {
            vec![NetInterface {
                name: "eth0".to_string(),
                unicast: Ipv4Addr::new(10, 0, 0, 5),
                subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: None,
                class: NetworkClass::WIRED,
            }]
        }
    }

    /// Counts how many discover calls run at once.
    #[derive(Default)]
    struct SlowClient {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl DiscoveryClient for SlowClient {
        async fn discover(&self, url: &str, cancel: CancelToken) -> anyhow::Result<Vec<DiscoveredEndpoint>> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            sleep(Duration::from_secs(1)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            ProbeOnlyClient.discover(url, cancel).await
        }
    }

    fn endpoints(count: u16) -> Vec<SocketAddr> {
        (0..count)
            .map(|i| SocketAddr::from(([10, 0, 0, 5], 4840 + i)))
            .collect()
    }

    fn discoverer(scanner: Arc<FakeScanner>, emitter: Arc<RecordingEmitter>, delay: Duration) -> Discoverer {
        Discoverer::new(scanner, Arc::new(ProbeOnlyClient), emitter, Arc::new(Fixed))
            .with_initial_delay(delay)
    }

    async fn advance(secs: u64) {
        sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn off_on_off_does_not_start_a_sweep() {
        let scanner = Arc::new(FakeScanner::default());
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::from_secs(5));

        discovery.set_mode(DiscoveryMode::Off).await;
        advance(600).await;

        assert_eq!(discovery.sweeps_started(), 0);
        assert!(!discovery.is_running().await);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn first_start_waits_for_the_initial_delay() {
        let scanner = Arc::new(FakeScanner::default());
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::from_secs(5));

        discovery.set_mode(DiscoveryMode::Scan).await;
        assert_eq!(discovery.sweeps_started(), 1);
        assert!(discovery.is_running().await);

        advance(4).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 0);
        advance(2).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);

        discovery.set_mode(DiscoveryMode::Scan).await;
        assert_eq!(discovery.sweeps_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn passes_repeat_after_the_default_idle_time() {
        let scanner = Arc::new(FakeScanner::default());
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::ZERO);

        discovery.set_mode(DiscoveryMode::Fast).await;
        advance(1).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
        advance(178).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
        advance(2).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn results_are_cached_and_published_with_a_terminator() {
        let scanner = Arc::new(FakeScanner {
            endpoints: endpoints(2),
            ..FakeScanner::default()
        });
        let emitter = Arc::new(RecordingEmitter::default());
        let discovery = discoverer(scanner, emitter.clone(), Duration::ZERO);

        discovery.set_mode(DiscoveryMode::Scan).await;
        advance(1).await;

        let batches = emitter.batches.lock().unwrap().clone();
        assert_eq!(batches.len(), 1);
        let (messages, content_type) = &batches[0];
        assert_eq!(content_type, DISCOVERY_EVENT_CONTENT_TYPE);
        assert_eq!(messages.len(), 3);

        let events: Vec<DiscoveryEventModel> = messages
            .iter()
            .map(|m| serde_json::from_slice(m).unwrap())
            .collect();
        assert!(events.iter().enumerate().all(|(i, e)| e.index == i));
        assert!(events[2].is_terminator());
        assert!(events.iter().all(|e| e.timestamp == events[0].timestamp));

        assert_eq!(discovery.cache_snapshot().len(), 1);
        assert_eq!(discovery.last_results().unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_time_change_reaches_the_running_sweep_without_restart() {
        let scanner = Arc::new(FakeScanner {
            hold: Some(Duration::from_secs(60)),
            ..FakeScanner::default()
        });
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::ZERO);

        discovery.set_mode(DiscoveryMode::Scan).await;
        advance(1).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);

        let update = DiscoveryConfigModel {
            idle_time_between_scans: Some(Duration::from_secs(300)),
            ..DiscoveryConfigModel::default()
        };
        discovery.update_configuration(&update).await.unwrap();
        assert_eq!(discovery.sweeps_started(), 1);

        advance(60).await;
        assert_eq!(discovery.passes_completed(), 1);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);

        advance(298).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
        advance(2).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn short_idle_time_waits_the_default() {
        let scanner = Arc::new(FakeScanner::default());
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::ZERO);
        let update = DiscoveryConfigModel {
            idle_time_between_scans: Some(Duration::from_secs(10)),
            ..DiscoveryConfigModel::default()
        };
        discovery.update_configuration(&update).await.unwrap();

        discovery.set_mode(DiscoveryMode::Scan).await;
        advance(1).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
        advance(60).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
        advance(120).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn range_change_restarts_immediately_and_clears_the_cache() {
        let scanner = Arc::new(FakeScanner {
            endpoints: endpoints(1),
            ..FakeScanner::default()
        });
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::from_secs(5));

        discovery.set_mode(DiscoveryMode::Fast).await;
        advance(6).await;
        assert_eq!(discovery.cache_snapshot().len(), 1);

        let update = DiscoveryConfigModel {
            address_ranges_to_scan: Some("10.1.0.0/24".to_string()),
            ..DiscoveryConfigModel::default()
        };
        discovery.update_configuration(&update).await.unwrap();
        assert_eq!(discovery.sweeps_started(), 2);
        assert!(discovery.cache_snapshot().is_empty());

        advance(1).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(discovery.cache_snapshot().len(), 1);

        let last = scanner.requests.lock().unwrap().last().cloned().unwrap();
        assert_eq!(last.address_ranges, AddressRange::parse("10.1.0.0/24").unwrap());
        assert!(last.sweep_network);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_configuration_changes_nothing() {
        let scanner = Arc::new(FakeScanner::default());
        let discovery = discoverer(scanner, Arc::default(), Duration::ZERO);
        discovery.set_mode(DiscoveryMode::Scan).await;
        let before = discovery.options().await;

        let update = DiscoveryConfigModel {
            address_ranges_to_scan: Some("0..0/88".to_string()),
            max_port_probes: Some(3),
            ..DiscoveryConfigModel::default()
        };
        assert!(discovery.update_configuration(&update).await.is_err());
        assert_eq!(discovery.options().await, before);
        assert_eq!(discovery.sweeps_started(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_sweep() {
        let scanner = Arc::new(FakeScanner {
            endpoints: endpoints(1),
            ..FakeScanner::default()
        });
        scanner.fail.store(true, Ordering::SeqCst);
        let emitter = Arc::new(RecordingEmitter {
            fail: true,
            ..RecordingEmitter::default()
        });
        let discovery = discoverer(scanner.clone(), emitter, Duration::ZERO);

        discovery.set_mode(DiscoveryMode::Scan).await;
        advance(361).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 3);
        assert_eq!(discovery.passes_completed(), 0);

        scanner.fail.store(false, Ordering::SeqCst);
        advance(180).await;
        assert_eq!(discovery.passes_completed(), 1);
        assert!(discovery.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_the_sweep() {
        let scanner = Arc::new(FakeScanner::default());
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::ZERO);

        discovery.set_mode(DiscoveryMode::Local).await;
        advance(1).await;
        discovery.shutdown().await;

        assert_eq!(discovery.mode().await, DiscoveryMode::Off);
        assert!(!discovery.is_running().await);
        assert!(discovery.cache_snapshot().is_empty());

        advance(3600).await;
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_shutdown_skips_the_initial_delay() {
        let scanner = Arc::new(FakeScanner::default());
        let discovery = discoverer(scanner.clone(), Arc::default(), Duration::from_secs(30));

        discovery.set_mode(DiscoveryMode::Scan).await;
        discovery.shutdown().await;
        discovery.set_mode(DiscoveryMode::Scan).await;
        advance(1).await;

        assert_eq!(discovery.sweeps_started(), 2);
        assert_eq!(scanner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn interrogation_respects_the_degree_of_parallelism() {
        let scanner = Arc::new(FakeScanner {
            endpoints: endpoints(5),
            ..FakeScanner::default()
        });
        let client = Arc::new(SlowClient::default());
        let discovery = Discoverer::new(scanner, client.clone(), Arc::new(RecordingEmitter::default()), Arc::new(Fixed));
        let options = DiscoveryOptions {
            max_degree_of_parallelism: 2,
            ..DiscoveryOptions::with_mode(DiscoveryMode::Fast)
        };

        let apps = discovery.run_once(&options, CancelToken::never()).await.unwrap();
        assert_eq!(apps.len(), 5);
        assert_eq!(client.peak.load(Ordering::SeqCst), 2);
    }

    /// Finds its endpoints, then fires the cancel source as if ctrl-c had been pressed.
    struct InterruptedScanner {
        endpoints: Vec<SocketAddr>,
        source: Arc<CancelSource>,
    }

    #[async_trait]
    impl EndpointScanner for InterruptedScanner {
        async fn scan(&self, _request: &ScanRequest, _cancel: CancelToken) -> anyhow::Result<Vec<SocketAddr>> {
            self.source.cancel();
            Ok(self.endpoints.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_once_keeps_the_servers_found() {
        let source = Arc::new(CancelSource::new());
        let scanner = Arc::new(InterruptedScanner {
            endpoints: endpoints(2),
            source: source.clone(),
        });
        let emitter = Arc::new(RecordingEmitter::default());
        let discovery = Discoverer::new(scanner, Arc::new(SlowClient::default()), emitter.clone(), Arc::new(Fixed));

        let apps = discovery
            .run_once(&DiscoveryOptions::with_mode(DiscoveryMode::Fast), source.token())
            .await
            .unwrap();

        assert_eq!(apps.len(), 2);
        assert_eq!(ApplicationModel::endpoint_count(&apps), 2);
        assert!(emitter.batches.lock().unwrap().is_empty());
        assert!(discovery.cache_snapshot().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_once_neither_caches_nor_publishes() {
        let scanner = Arc::new(FakeScanner {
            endpoints: endpoints(1),
            ..FakeScanner::default()
        });
        let emitter = Arc::new(RecordingEmitter::default());
        let discovery = discoverer(scanner, emitter.clone(), Duration::ZERO);

        let apps = discovery
            .run_once(&DiscoveryOptions::with_mode(DiscoveryMode::Fast), CancelToken::never())
            .await
            .unwrap();

        assert_eq!(apps.len(), 1);
        assert!(emitter.batches.lock().unwrap().is_empty());
        assert_eq!(discovery.passes_completed(), 0);
    }
}
