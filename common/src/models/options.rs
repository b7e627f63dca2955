//! # Discovery Options
//!
//! [`DiscoveryOptions`] is the configuration a sweep runs with. The coordinator owns one
//! instance, hands every sweep a clone, and folds external [`DiscoveryConfigModel`] updates
//! into it with [`DiscoveryOptions::apply`].

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::DiscoveryConfigModel;
use crate::error::{ConfigError, RangeParseError};
use crate::network::port::PortRange;
use crate::network::range::AddressRange;

pub const DEFAULT_IDLE_TIME: Duration = Duration::from_secs(3 * 60);
pub const DEFAULT_MAX_DEGREE_OF_PARALLELISM: usize = 1000;
pub const DEFAULT_MAX_NETWORK_PROBES: usize = 1000;
pub const DEFAULT_NETWORK_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_MIN_PROBE_POOL: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Discovery disabled.
    #[default]
    Off,
    /// Only the addresses of the local interfaces.
    Local,
    /// Interface subnets, at most a /24 each, on well-known ports.
    Fast,
    /// Full interface subnets, well-known plus unassigned ports.
    Scan,
}

impl fmt::Display for DiscoveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscoveryMode::Off => "off",
            DiscoveryMode::Local => "local",
            DiscoveryMode::Fast => "fast",
            DiscoveryMode::Scan => "scan",
        };
        f.write_str(name)
    }
}

impl FromStr for DiscoveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(DiscoveryMode::Off),
            "local" => Ok(DiscoveryMode::Local),
            "fast" => Ok(DiscoveryMode::Fast),
            "scan" => Ok(DiscoveryMode::Scan),
            other => Err(format!("unknown discovery mode '{other}'")),
        }
    }
}

/// Set of interface kinds to derive default ranges from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkClass(u8);

impl NetworkClass {
    pub const WIRED: NetworkClass = NetworkClass(1);
    pub const WIRELESS: NetworkClass = NetworkClass(1 << 1);
    pub const TUNNEL: NetworkClass = NetworkClass(1 << 2);
    pub const LOOPBACK: NetworkClass = NetworkClass(1 << 3);
    pub const ALL: NetworkClass = NetworkClass(0b1111);

    const NAMES: [(NetworkClass, &'static str); 4] = [
        (Self::WIRED, "wired"),
        (Self::WIRELESS, "wireless"),
        (Self::TUNNEL, "tunnel"),
        (Self::LOOPBACK, "loopback"),
    ];

    pub fn contains(self, other: NetworkClass) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl Default for NetworkClass {
    fn default() -> Self {
        NetworkClass::WIRED
    }
}

impl BitOr for NetworkClass {
    type Output = NetworkClass;

    fn bitor(self, rhs: Self) -> Self::Output {
        NetworkClass(self.0 | rhs.0)
    }
}

impl fmt::Display for NetworkClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ALL {
            return f.write_str("all");
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(class, _)| self.contains(*class))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(","))
    }
}

impl FromStr for NetworkClass {
    type Err = String;

    /// Accepts `all` or a `,`/`|` separated list of `wired`, `wireless`, `tunnel`, `loopback`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut class = NetworkClass(0);
        for part in s.split([',', '|']).map(str::trim).filter(|p| !p.is_empty()) {
            let part = part.to_ascii_lowercase();
            if part == "all" {
                class = class | Self::ALL;
                continue;
            }
            let (flag, _) = Self::NAMES
                .iter()
                .find(|(_, name)| *name == part)
                .ok_or_else(|| format!("unknown network class '{part}'"))?;
            class = class | *flag;
        }
        if class.0 == 0 {
            return Err("network class must not be empty".to_string());
        }
        Ok(class)
    }
}

impl TryFrom<String> for NetworkClass {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NetworkClass> for String {
    fn from(value: NetworkClass) -> Self {
        value.to_string()
    }
}

/// Configuration snapshot of one discovery sweep.
///
/// `None` means "derive a default": ranges come from the local interfaces, durations and
/// pool sizes from the `DEFAULT_*` constants.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryOptions {
    pub mode: DiscoveryMode,
    pub max_degree_of_parallelism: usize,
    pub idle_time: Option<Duration>,
    pub address_ranges: Option<Vec<AddressRange>>,
    pub port_ranges: Option<Vec<PortRange>>,
    pub network_probe_timeout: Option<Duration>,
    pub port_probe_timeout: Option<Duration>,
    pub max_network_probes: Option<usize>,
    pub max_port_probes: Option<usize>,
    pub network_class: NetworkClass,
    /// Probe pool size below which units stop giving up on resource exhaustion.
    pub min_probe_pool: usize,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            mode: DiscoveryMode::Off,
            max_degree_of_parallelism: DEFAULT_MAX_DEGREE_OF_PARALLELISM,
            idle_time: None,
            address_ranges: None,
            port_ranges: None,
            network_probe_timeout: None,
            port_probe_timeout: None,
            max_network_probes: None,
            max_port_probes: None,
            network_class: NetworkClass::default(),
            min_probe_pool: DEFAULT_MIN_PROBE_POOL,
        }
    }
}

enum RangeUpdate<T> {
    Keep,
    Clear,
    Set(Vec<T>),
}

fn parse_update<T>(
    text: Option<&str>,
    field: &'static str,
    parse: fn(&str) -> Result<Vec<T>, RangeParseError>,
) -> Result<RangeUpdate<T>, ConfigError> {
    match text {
        None => Ok(RangeUpdate::Keep),
        Some(text) if text.trim().is_empty() => Ok(RangeUpdate::Clear),
        Some(text) => parse(text)
            .map(RangeUpdate::Set)
            .map_err(|source| ConfigError::Range { field, source }),
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

impl DiscoveryOptions {
    pub fn with_mode(mode: DiscoveryMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Wait between two sweep passes. Never shorter than [`DEFAULT_IDLE_TIME`].
    pub fn idle_wait(&self) -> Duration {
        self.idle_time.map_or(DEFAULT_IDLE_TIME, |idle| idle.max(DEFAULT_IDLE_TIME))
    }

    pub fn network_probe_timeout_or_default(&self) -> Duration {
        self.network_probe_timeout.unwrap_or(DEFAULT_NETWORK_PROBE_TIMEOUT)
    }

    pub fn port_probe_timeout_or_default(&self) -> Duration {
        self.port_probe_timeout.unwrap_or(DEFAULT_PORT_PROBE_TIMEOUT)
    }

    pub fn max_network_probes_or_default(&self) -> usize {
        self.max_network_probes.unwrap_or(DEFAULT_MAX_NETWORK_PROBES).max(1)
    }

    pub fn max_port_probes_or_default(&self) -> usize {
        self.max_port_probes
            .unwrap_or(self.max_degree_of_parallelism)
            .max(1)
    }

    /// Folds a configuration update into the options.
    ///
    /// Range text is parsed before anything is touched, so a parse error leaves the options
    /// exactly as they were. The idle time is always taken over and never asks for a restart.
    /// Returns whether a running sweep has to restart to observe the update.
    pub fn apply(&mut self, model: &DiscoveryConfigModel) -> Result<bool, ConfigError> {
        let address_ranges = parse_update(
            model.address_ranges_to_scan.as_deref(),
            "addressRangesToScan",
            AddressRange::parse,
        )?;
        let port_ranges = parse_update(
            model.port_ranges_to_scan.as_deref(),
            "portRangesToScan",
            PortRange::parse,
        )?;

        self.idle_time = model.idle_time_between_scans;

        let mut restart = false;
        match address_ranges {
            RangeUpdate::Keep => {}
            RangeUpdate::Clear => {
                self.address_ranges = None;
                restart = true;
            }
            RangeUpdate::Set(ranges) => restart |= replace(&mut self.address_ranges, Some(ranges)),
        }
        match port_ranges {
            RangeUpdate::Keep => {}
            RangeUpdate::Clear => {
                self.port_ranges = None;
                restart = true;
            }
            RangeUpdate::Set(ranges) => restart |= replace(&mut self.port_ranges, Some(ranges)),
        }

        if let Some(timeout) = model.port_probe_timeout {
            restart |= replace(&mut self.port_probe_timeout, Some(timeout));
        }
        if let Some(timeout) = model.network_probe_timeout {
            restart |= replace(&mut self.network_probe_timeout, Some(timeout));
        }
        if let Some(max) = model.max_port_probes {
            restart |= replace(&mut self.max_port_probes, Some(max));
        }
        if let Some(max) = model.max_network_probes {
            restart |= replace(&mut self.max_network_probes, Some(max));
        }
        Ok(restart)
    }

    /// The externally visible part of the options.
    pub fn to_config_model(&self) -> DiscoveryConfigModel {
        DiscoveryConfigModel {
            idle_time_between_scans: self.idle_time,
            address_ranges_to_scan: self.address_ranges.as_deref().map(AddressRange::format),
            port_ranges_to_scan: self.port_ranges.as_deref().map(PortRange::format),
            port_probe_timeout: self.port_probe_timeout,
            network_probe_timeout: self.network_probe_timeout,
            max_port_probes: self.max_port_probes,
            max_network_probes: self.max_network_probes,
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
