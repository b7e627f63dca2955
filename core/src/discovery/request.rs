//! Derives a [`ScanRequest`] from the options of a sweep.

use uascout_common::models::options::{DiscoveryMode, DiscoveryOptions};
use uascout_common::network::interface::NetInterface;
use uascout_common::network::port::PortRange;
use uascout_common::network::range::AddressRange;

use super::InterfaceSource;
use crate::scanner::{REACHABILITY_PORT, ScanRequest};

/// Widest subnet a `Fast` sweep covers around each interface address.
pub const FAST_MIN_PREFIX: u8 = 24;

/// Configured ranges win; missing ones are derived from the local interfaces and the mode.
/// `Local` mode never sweeps the network, every address goes straight to port probing.
pub fn build_request(options: &DiscoveryOptions, interfaces: &dyn InterfaceSource) -> ScanRequest {
    let address_ranges: Vec<AddressRange> = match &options.address_ranges {
        Some(ranges) => ranges.clone(),
        None => default_address_ranges(options.mode, &interfaces.interfaces(options.network_class)),
    };
    let port_ranges: Vec<PortRange> = options
        .port_ranges
        .clone()
        .unwrap_or_else(|| default_port_ranges(options.mode));

    ScanRequest {
        address_ranges,
        port_ranges,
        sweep_network: options.mode != DiscoveryMode::Local,
        reachability_port: REACHABILITY_PORT,
        network_probe_timeout: options.network_probe_timeout_or_default(),
        port_probe_timeout: options.port_probe_timeout_or_default(),
        max_network_probes: options.max_network_probes_or_default(),
        max_port_probes: options.max_port_probes_or_default(),
        min_probe_pool: options.min_probe_pool,
    }
}

pub fn default_address_ranges(mode: DiscoveryMode, interfaces: &[NetInterface]) -> Vec<AddressRange> {
    let ranges = interfaces.iter().map(|interface| match mode {
        DiscoveryMode::Local => AddressRange::from_interface(interface, true),
        DiscoveryMode::Fast => AddressRange::from_interface_clamped(interface, FAST_MIN_PREFIX),
        DiscoveryMode::Off | DiscoveryMode::Scan => AddressRange::from_interface(interface, false),
    });
    AddressRange::merge(ranges)
}

pub fn default_port_ranges(mode: DiscoveryMode) -> Vec<PortRange> {
    let mut ports: Vec<PortRange> = PortRange::well_known();
    if mode == DiscoveryMode::Scan {
        ports.extend(PortRange::unassigned());
    }
    ports
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
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use uascout_common::models::options::NetworkClass;

    struct Fixed(Vec<NetInterface>);

    impl InterfaceSource for Fixed {
        fn interfaces(&self, class: NetworkClass) -> Vec<NetInterface> {
            self.0.iter().filter(|i| class.contains(i.class)).cloned().collect()
        }
    }

    fn interfaces() -> Fixed {
        Fixed(vec![
            NetInterface {
                name: "eth0".to_string(),
                unicast: Ipv4Addr::new(10, 20, 30, 40),
                subnet_mask: Ipv4Addr::new(255, 255, 0, 0),
                gateway: None,
                class: NetworkClass::WIRED,
            },
            NetInterface {
                name: "wlan0".to_string(),
                unicast: Ipv4Addr::new(192, 168, 1, 5),
                subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
                gateway: None,
                class: NetworkClass::WIRELESS,
            },
        ])
    }

    #[test]
    fn local_mode_probes_interface_addresses_directly() {
        let request = build_request(&DiscoveryOptions::with_mode(DiscoveryMode::Local), &interfaces());
        assert!(!request.sweep_network);
        assert_eq!(request.address_ranges.len(), 1);
        assert_eq!(request.address_ranges[0].count(), 1);
        assert_eq!(request.address_ranges[0].low(), Ipv4Addr::new(10, 20, 30, 40));
        assert_eq!(request.port_ranges, PortRange::well_known());
    }

    #[test]
    fn fast_mode_clamps_subnets() {
        let request = build_request(&DiscoveryOptions::with_mode(DiscoveryMode::Fast), &interfaces());
        assert!(request.sweep_network);
        assert_eq!(request.address_ranges[0].low(), Ipv4Addr::new(10, 20, 30, 0));
        assert_eq!(request.address_ranges[0].count(), 256);
    }

    #[test]
    fn scan_mode_covers_subnets_and_unassigned_ports() {
        let options = DiscoveryOptions {
            network_class: NetworkClass::WIRED | NetworkClass::WIRELESS,
            ..DiscoveryOptions::with_mode(DiscoveryMode::Scan)
        };
        let request = build_request(&options, &interfaces());
        assert_eq!(AddressRange::total_count(&request.address_ranges), 65536 + 256);
        assert!(request.port_ranges.iter().any(|r| r.contains(60000)));
        assert!(request.port_ranges.iter().any(|r| r.contains(4840)));
    }

    #[test]
    fn configured_values_win() {
        let options = DiscoveryOptions {
            address_ranges: Some(AddressRange::parse("172.16.0.0/28").unwrap()),
            port_ranges: Some(vec![PortRange::single(4855)]),
            port_probe_timeout: Some(Duration::from_millis(750)),
            max_degree_of_parallelism: 42,
            ..DiscoveryOptions::with_mode(DiscoveryMode::Scan)
        };
        let request = build_request(&options, &interfaces());
        assert_eq!(request.address_ranges, AddressRange::parse("172.16.0.0/28").unwrap());
        assert_eq!(request.port_ranges, vec![PortRange::single(4855)]);
        assert_eq!(request.port_probe_timeout, Duration::from_millis(750));
        assert_eq!(request.max_port_probes, 42);
    }
}
