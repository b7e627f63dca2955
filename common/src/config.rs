//! # External Discovery Configuration
//!
//! The shape in which discovery settings arrive from outside (service file, management
//! plane). Durations travel as whole milliseconds and range lists as text.
//! Folded into [`crate::models::options::DiscoveryOptions`] by `apply`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryConfigModel {
    #[serde(default, with = "crate::utils::serde_ms", skip_serializing_if = "Option::is_none")]
    pub idle_time_between_scans: Option<Duration>,

    /// `;` separated address ranges. An empty string clears the configured ranges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_ranges_to_scan: Option<String>,

    /// `;` separated port ranges. An empty string clears the configured ranges.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_ranges_to_scan: Option<String>,

    #[serde(default, with = "crate::utils::serde_ms", skip_serializing_if = "Option::is_none")]
    pub port_probe_timeout: Option<Duration>,

    #[serde(default, with = "crate::utils::serde_ms", skip_serializing_if = "Option::is_none")]
    pub network_probe_timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_port_probes: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_network_probes: Option<usize>,
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
