use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, trace, warn};
use uascout_common::utils::cancel::CancelToken;

use super::{AsyncProbe, Candidate, ProbeHost};

const BACKOFF_BASE: Duration = Duration::from_millis(50);
const BACKOFF_CAP: Duration = Duration::from_secs(5);
const MAX_EXHAUSTION_RETRIES: u32 = 10;

/// Opens the connection for a candidate.
#[async_trait]
pub(crate) trait Connect: Send + Sync {
    async fn connect(&self, endpoint: SocketAddr) -> io::Result<TcpStream>;
}

struct Tcp;

#[async_trait]
impl Connect for Tcp {
    async fn connect(&self, endpoint: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(endpoint).await
    }
}

enum Outcome {
    Success,
    Fail,
    GaveUp,
    Cancelled,
}

/// A single probe unit. Runs until the host is drained, the token fires or it gives up
/// under resource exhaustion.
pub struct ConnectProbe {
    id: usize,
    host: Arc<dyn ProbeHost>,
    probe: Box<dyn AsyncProbe>,
    cancel: CancelToken,
    reachable_on_refusal: bool,
    connector: Arc<dyn Connect>,
}

/// Runs the exit hooks exactly once, also when the unit's future is dropped mid-flight.
struct ExitGuard {
    host: Arc<dyn ProbeHost>,
    probe: Box<dyn AsyncProbe>,
    connector: Arc<dyn Connect>,
}

impl Drop for ExitGuard {
    fn drop(&mut self) {
        self.probe.dispose();
        self.host.on_exit();
    }
}

impl ConnectProbe {
    pub fn new(
        id: usize,
        host: Arc<dyn ProbeHost>,
        probe: Box<dyn AsyncProbe>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            id,
            host,
            probe,
            cancel,
            reachable_on_refusal: false,
            connector: Arc::new(Tcp),
        }
    }

    /// Counts an actively refused connection as reachable. Used when sweeping for hosts.
    pub fn reachable_on_refusal(mut self, enabled: bool) -> Self {
        self.reachable_on_refusal = enabled;
        self
    }

    #[cfg(test)]
    pub(crate) fn with_connector(mut self, connector: Arc<dyn Connect>) -> Self {
        self.connector = connector;
        self
    }

    pub async fn run(self) {
        let ConnectProbe {
            id,
            host,
            probe,
            cancel,
            reachable_on_refusal,
            connector,
        } = self;
        let mut unit = ExitGuard { host, probe, connector };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                candidate = unit.host.next() => candidate,
            };
            let Some(candidate) = next else {
                break;
            };

            let endpoint: SocketAddr = candidate.endpoint;
            match unit.attempt(id, candidate, &cancel, reachable_on_refusal).await {
                Outcome::Success => {
                    unit.host.on_success(endpoint).await;
                    unit.host.on_complete(endpoint);
                }
                Outcome::Fail => {
                    unit.host.on_fail(endpoint);
                    unit.host.on_complete(endpoint);
                }
                Outcome::GaveUp => {
                    debug!("Probe {id} leaves the pool, {endpoint} handed back");
                    break;
                }
                Outcome::Cancelled => break,
            }
        }
        trace!("Probe {id} exited");
    }
}

impl ExitGuard {
    async fn attempt(
        &mut self,
        id: usize,
        candidate: Candidate,
        cancel: &CancelToken,
        reachable_on_refusal: bool,
    ) -> Outcome {
        let endpoint: SocketAddr = candidate.endpoint;
        let mut interrogation_retried: bool = false;
        let mut exhaustion_retries: u32 = 0;

        loop {
            let deadline: Instant = Instant::now() + candidate.timeout;
            let connect = timeout_at(deadline, self.connector.connect(endpoint));
            let Some(connected) = cancel.run_until_cancelled(connect).await else {
                return Outcome::Cancelled;
            };

            let mut stream: TcpStream = match connected {
                Ok(Ok(stream)) => stream,
                Err(_elapsed) => {
                    debug!("Connect to {endpoint} timed out");
                    return Outcome::Fail;
                }
                Ok(Err(e)) if is_resource_exhaustion(&e) => {
                    warn!("Probe {id} out of sockets connecting to {endpoint}: {e}");
                    if self.host.should_give_up(&candidate) {
                        return Outcome::GaveUp;
                    }
                    exhaustion_retries += 1;
                    if exhaustion_retries > MAX_EXHAUSTION_RETRIES {
                        warn!("Giving up on {endpoint} after {MAX_EXHAUSTION_RETRIES} retries");
                        return Outcome::Fail;
                    }
                    let delay: Duration = backoff(exhaustion_retries);
                    if cancel.run_until_cancelled(sleep(delay)).await.is_none() {
                        return Outcome::Cancelled;
                    }
                    continue;
                }
                Ok(Err(e)) if reachable_on_refusal && e.kind() == io::ErrorKind::ConnectionRefused => {
                    return Outcome::Success;
                }
                Ok(Err(e)) => {
                    debug!("Connect to {endpoint} failed: {e}");
                    return Outcome::Fail;
                }
            };

            let interrogation = timeout_at(deadline, self.probe.interrogate(&mut stream, endpoint));
            let Some(result) = cancel.run_until_cancelled(interrogation).await else {
                return Outcome::Cancelled;
            };

            match result {
                Ok(Ok(true)) => return Outcome::Success,
                Ok(Ok(false)) => {
                    debug!("{endpoint} does not speak the expected protocol");
                    return Outcome::Fail;
                }
                Ok(Err(e)) => {
                    debug!("Interrogating {endpoint} failed: {e:#}");
                    return Outcome::Fail;
                }
                Err(_elapsed) => {
                    if !interrogation_retried && self.probe.reset() {
                        debug!("Interrogating {endpoint} timed out, retrying");
                        interrogation_retried = true;
                        continue;
                    }
                    debug!("Interrogating {endpoint} timed out");
                    return Outcome::Fail;
                }
            }
        }
    }
}

/// Exponential back-off with up to 25% random jitter.
fn backoff(attempt: u32) -> Duration {
    let exp: Duration = BACKOFF_BASE
        .saturating_mul(1u32 << attempt.min(16))
        .min(BACKOFF_CAP);
    let max_jitter: u64 = exp.as_millis() as u64 / 4;
    let jitter: u64 = rand::rng().random_range(0..=max_jitter);
    exp + Duration::from_millis(jitter)
}

/// Whether a connect error means the local host ran out of sockets or ephemeral ports.
#[cfg(unix)]
pub fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(code) if code == libc::ENOBUFS
            || code == libc::EMFILE
            || code == libc::ENFILE
            || code == libc::EADDRNOTAVAIL
    )
}

#[cfg(not(unix))]
pub fn is_resource_exhaustion(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::AddrNotAvailable
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
