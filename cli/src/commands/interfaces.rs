use colored::*;
use uascout_common::models::options::{DiscoveryMode, NetworkClass};
use uascout_common::network::interface::{NetInterface, get_net_interfaces};
use uascout_common::network::range::AddressRange;
use uascout_core::discovery::default_address_ranges;

use crate::mprint;
use crate::terminal::{colors, print};

pub fn interfaces(class: NetworkClass) {
    let found: Vec<NetInterface> = get_net_interfaces(class);
    if found.is_empty() {
        print::header("no matching interfaces");
        return;
    }

    print::header("local interfaces");
    for (idx, interface) in found.iter().enumerate() {
        print::tree_head(idx, &interface.name);
        let mut details: Vec<(String, ColoredString)> = vec![
            (String::from("Class"), interface.class.to_string().normal()),
            (
                String::from("IPv4"),
                format!("{}/{}", interface.unicast, interface.prefix()).color(colors::IPV4_ADDR),
            ),
        ];
        if let Some(gateway) = interface.gateway {
            details.push((String::from("Gateway"), gateway.to_string().color(colors::IPV4_ADDR)));
        }
        print::as_tree_one_level(details);
        mprint!();
    }

    print::header("default ranges");
    for mode in [DiscoveryMode::Local, DiscoveryMode::Fast, DiscoveryMode::Scan] {
        let ranges: Vec<AddressRange> = default_address_ranges(mode, &found);
        let value: ColoredString = format!(
            "{} ({} addresses)",
            AddressRange::format(&ranges),
            AddressRange::total_count(&ranges)
        )
        .color(colors::URL);
        print::aligned_line(&mode.to_string(), value, 5);
    }
}
