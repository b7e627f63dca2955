//! Local network interface enumeration.
//!
//! Used to derive default address ranges when none are configured. Interfaces are read
//! through `pnet::datalink` and classified as wired, wireless, tunnel or loopback so that
//! discovery can be limited to a [`NetworkClass`].

use std::collections::HashMap;
use std::net::Ipv4Addr;

use pnet::datalink::NetworkInterface;
use pnet::ipnetwork::{IpNetwork, ipv4_mask_to_prefix};
use tracing::debug;
#[cfg(target_os = "linux")]
use linux_impl::{default_gateways, is_wireless};
#[cfg(target_os = "macos")]
use macos_impl::is_wireless;

use crate::models::options::NetworkClass;

/// One IPv4 address bound to a local interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub unicast: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
    pub gateway: Option<Ipv4Addr>,
    pub class: NetworkClass,
}

impl NetInterface {
    /// Prefix length of the subnet mask. A non-contiguous mask counts as a single host.
    pub fn prefix(&self) -> u8 {
        ipv4_mask_to_prefix(self.subnet_mask).unwrap_or(32)
    }
}

/// Returns every IPv4 address of every up interface whose class is part of `class`.
pub fn get_net_interfaces(class: NetworkClass) -> Vec<NetInterface> {
    let interfaces: Vec<NetworkInterface> = pnet::datalink::interfaces();
    let gateways: HashMap<String, Ipv4Addr> = default_gateways();
    let selected: Vec<NetInterface> = to_net_interfaces(&interfaces, class, is_wireless, &gateways);
    debug!(
        "{} of {} interfaces match network class {class}",
        selected.len(),
        interfaces.len()
    );
    selected
}

fn to_net_interfaces(
    interfaces: &[NetworkInterface],
    class: NetworkClass,
    is_wireless: impl Fn(&NetworkInterface) -> bool,
    gateways: &HashMap<String, Ipv4Addr>,
) -> Vec<NetInterface> {
    interfaces
        .iter()
        .filter(|interface| interface.is_up())
        .filter_map(|interface| {
            let iface_class: NetworkClass = classify(interface, &is_wireless);
            class.contains(iface_class).then_some((interface, iface_class))
        })
        .flat_map(|(interface, iface_class)| {
            interface.ips.iter().filter_map(move |ip| match ip {
                IpNetwork::V4(net) => Some(NetInterface {
                    name: interface.name.clone(),
                    unicast: net.ip(),
                    subnet_mask: net.mask(),
                    gateway: gateways.get(&interface.name).copied(),
                    class: iface_class,
                }),
                IpNetwork::V6(_) => None,
            })
        })
        .collect()
}

fn classify(
    interface: &NetworkInterface,
    is_wireless: impl Fn(&NetworkInterface) -> bool,
) -> NetworkClass {
    if interface.is_loopback() {
        return NetworkClass::LOOPBACK;
    }
    if interface.is_point_to_point() || is_tunnel_name(&interface.name) {
        return NetworkClass::TUNNEL;
    }
    if is_wireless(interface) {
        return NetworkClass::WIRELESS;
    }
    NetworkClass::WIRED
}

fn is_tunnel_name(name: &str) -> bool {
    ["tun", "tap", "wg", "ppp", "utun", "ipsec"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

/// Default gateway per interface from a `/proc/net/route` table.
///
/// Addresses in the table are hex in host byte order, which is little-endian on every
/// platform exposing the file.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_route_table(table: &str) -> HashMap<String, Ipv4Addr> {
    let mut gateways: HashMap<String, Ipv4Addr> = HashMap::new();
    for line in table.lines().skip(1) {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let [iface, destination, gateway, ..] = columns.as_slice() else {
            continue;
        };
        if *destination != "00000000" {
            continue;
        }
        let Ok(raw) = u32::from_str_radix(gateway, 16) else {
            continue;
        };
        if raw != 0 {
            gateways
                .entry(iface.to_string())
                .or_insert_with(|| Ipv4Addr::from(raw.swap_bytes()));
        }
    }
    gateways
}

#[cfg(target_os = "linux")]
mod linux_impl {
    use super::*;
    use std::path::Path;

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        Path::new(&format!("/sys/class/net/{}/wireless", interface.name)).exists()
    }

    pub fn default_gateways() -> HashMap<String, Ipv4Addr> {
        match std::fs::read_to_string("/proc/net/route") {
            Ok(table) => parse_route_table(&table),
            Err(e) => {
                debug!("No routing table: {e}");
                HashMap::new()
            }
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn default_gateways() -> HashMap<String, Ipv4Addr> {
    HashMap::new()
}

#[cfg(target_os = "macos")]
mod macos_impl {
    use super::*;
    use std::collections::HashSet;
    use std::process::Command;
    use std::sync::OnceLock;

    /// Runs `networksetup` once and caches the wireless device names.
    fn wireless_devices() -> &'static HashSet<String> {
        static WIRELESS: OnceLock<HashSet<String>> = OnceLock::new();

        WIRELESS.get_or_init(|| {
            let mut devices = HashSet::new();
            let Ok(output) = Command::new("networksetup").arg("-listallhardwareports").output()
            else {
                return devices;
            };

            let stdout = String::from_utf8_lossy(&output.stdout);
            for device in stdout.lines().filter_map(|line| line.strip_prefix("Device: ")) {
                let is_wifi = Command::new("networksetup")
                    .arg("-getairportnetwork")
                    .arg(device.trim())
                    .output()
                    .map(|out| out.status.success())
                    .unwrap_or(false);
                if is_wifi {
                    devices.insert(device.trim().to_string());
                }
            }
            devices
        })
    }

    pub fn is_wireless(interface: &NetworkInterface) -> bool {
        wireless_devices().contains(&interface.name)
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn is_wireless(_interface: &NetworkInterface) -> bool {
    false
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
