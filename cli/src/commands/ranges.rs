use colored::*;
use uascout_common::network::port::PortRange;
use uascout_common::network::range::AddressRange;

use crate::commands::RangesArgs;
use crate::terminal::{colors, print};

const KEY_WIDTH: usize = 10;

pub struct RangeSummary {
    pub normalized: String,
    pub entries: usize,
    pub count: u64,
}

pub fn summarize(args: &RangesArgs) -> anyhow::Result<RangeSummary> {
    if args.ports {
        let ranges: Vec<PortRange> = PortRange::parse(&args.ranges)?;
        return Ok(RangeSummary {
            normalized: PortRange::format(&ranges),
            entries: ranges.len(),
            count: PortRange::total_count(&ranges),
        });
    }
    let ranges: Vec<AddressRange> = AddressRange::merge(AddressRange::parse(&args.ranges)?);
    Ok(RangeSummary {
        normalized: AddressRange::format(&ranges),
        entries: ranges.len(),
        count: AddressRange::total_count(&ranges),
    })
}

pub fn ranges(args: RangesArgs) -> anyhow::Result<()> {
    let summary: RangeSummary = summarize(&args)?;
    print::header(if args.ports { "port ranges" } else { "address ranges" });
    print::aligned_line("Normalized", summary.normalized.color(colors::URL), KEY_WIDTH);
    print::aligned_line("Ranges", summary.entries.to_string().normal(), KEY_WIDTH);
    print::aligned_line(
        if args.ports { "Ports" } else { "Addresses" },
        summary.count.to_string().color(colors::ACCENT),
        KEY_WIDTH,
    );
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

#[cfg(test)]
mod tests {
    use super::*;

    fn args(ranges: &str, ports: bool) -> RangesArgs {
        RangesArgs {
            ranges: ranges.to_string(),
            ports,
        }
    }

    #[test]
    fn adjacent_address_ranges_collapse() {
        let summary = summarize(&args("10.0.0.0/25, 10.0.0.128/25", false)).unwrap();
        assert_eq!(summary.normalized, "10.0.0.0/24");
        assert_eq!(summary.entries, 1);
        assert_eq!(summary.count, 256);
    }

    #[test]
    fn port_ranges_are_counted() {
        let summary = summarize(&args("4840-4843;48010", true)).unwrap();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.count, 5);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(summarize(&args("not-a-range", false)).is_err());
        assert!(summarize(&args("4840-", true)).is_err());
    }
}
