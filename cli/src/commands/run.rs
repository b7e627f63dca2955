use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};
use uascout_common::config::DiscoveryConfigModel;
use uascout_common::models::options::{DiscoveryMode, DiscoveryOptions, NetworkClass};
use uascout_core::discovery::{Discoverer, ProbeOnlyClient, SystemInterfaces};
use uascout_core::scanner::PortScanner;

use crate::commands::RunArgs;
use crate::emitter::JsonLinesEmitter;
use crate::terminal::print;

/// Contents of the service configuration file.
///
/// `mode` and the discovery fields are picked up again whenever the file changes.
/// `networkClass`, `maxDegreeOfParallelism` and `output` are read once at startup.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfig {
    pub mode: DiscoveryMode,
    pub network_class: Option<NetworkClass>,
    pub max_degree_of_parallelism: Option<usize>,
    pub output: Option<std::path::PathBuf>,
    #[serde(flatten)]
    pub discovery: DiscoveryConfigModel,
}

/// Reads `path`. A missing file is an empty configuration.
pub fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    if !path.exists() {
        return Ok(ServiceConfig::default());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(ServiceConfig::default());
    }
    serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Feeds edits of the configuration file to a running [`Discoverer`].
struct Reloader {
    /// Last file contents acted on, rejected or not.
    seen: ServiceConfig,
    /// Discovery fields the discoverer accepted last.
    applied: DiscoveryConfigModel,
}

impl Reloader {
    fn new(config: ServiceConfig) -> Self {
        Self {
            applied: config.discovery.clone(),
            seen: config,
        }
    }

    /// Returns `false` when `next` is what was seen before.
    async fn apply(&mut self, discoverer: &Discoverer, next: ServiceConfig) -> bool {
        if next == self.seen {
            return false;
        }
        if next.discovery != self.applied {
            match discoverer.update_configuration(&next.discovery).await {
                Ok(()) => self.applied = next.discovery.clone(),
                Err(e) => warn!("Rejected configuration update: {e}"),
            }
        }
        discoverer.set_mode(next.mode).await;
        self.seen = next;
        true
    }
}

pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut current: ServiceConfig = load_config(&args.config)?;
    if let Some(mode) = args.mode {
        current.mode = mode;
    }

    let mut options = DiscoveryOptions {
        network_class: current.network_class.unwrap_or_default(),
        ..DiscoveryOptions::default()
    };
    if let Some(parallelism) = current.max_degree_of_parallelism {
        options.max_degree_of_parallelism = parallelism.max(1);
    }
    options.apply(&current.discovery)?;

    let emitter = JsonLinesEmitter::to(current.output.as_ref()).await?;
    let mut discoverer = Discoverer::new(
        Arc::new(PortScanner::new()),
        Arc::new(ProbeOnlyClient),
        Arc::new(emitter),
        Arc::new(SystemInterfaces),
    )
    .with_options(options);
    if let Some(secs) = args.initial_delay {
        discoverer = discoverer.with_initial_delay(Duration::from_secs(secs));
    }

    print::header("discovery service");
    info!("Configuration from {}", args.config.display());
    discoverer.set_mode(current.mode).await;

    let mut reload = interval(Duration::from_secs(args.reload_interval.max(1)));
    reload.set_missed_tick_behavior(MissedTickBehavior::Delay);
    reload.tick().await;
    let mut reloader = Reloader::new(current);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!("Listening for ctrl-c failed: {e}");
                }
                break;
            }
            _ = reload.tick() => {
                let mut next: ServiceConfig = match load_config(&args.config) {
                    Ok(next) => next,
                    Err(e) => {
                        warn!("Keeping the current configuration: {e:#}");
                        continue;
                    }
                };
                if let Some(mode) = args.mode {
                    next.mode = mode;
                }
                reloader.apply(&discoverer, next).await;
            }
        }
    }

    info!("Shutting down");
    discoverer.shutdown().await;
    Ok(())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
