//! # IPv4 Address Range Model
//!
//! An [`AddressRange`] is a contiguous, inclusive block of IPv4 addresses kept in host-order
//! integer form, tagged with the name of the interface it was derived from.
//!
//! Text form is a `;` or `,` separated list where every entry is one of:
//! * **CIDR**: `192.168.1.0/24`
//! * **Dash range**: `10.0.0.5-10.0.0.20`
//! * **Single host**: `10.0.0.7 [eth0]` (only together with an interface tag)
//!
//! Any entry may be followed by an interface tag in brackets, e.g. `10.1.0.0/16 [eth1]`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::error::RangeParseError;
use crate::network::cursor::SpanCursor;
use crate::network::interface::NetInterface;

/// Interface tag used when the text form does not carry one.
pub const DEFAULT_NIC: &str = "custom";

/// Contiguous block of IPv4 addresses. Equality and hashing only look at the bounds.
#[derive(Debug, Clone, Eq)]
pub struct AddressRange {
    low: u32,
    high: u32,
    nic: String,
}

impl PartialEq for AddressRange {
    fn eq(&self, other: &Self) -> bool {
        self.low == other.low && self.high == other.high
    }
}

impl Hash for AddressRange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.low.hash(state);
        self.high.hash(state);
    }
}

impl AddressRange {
    /// Creates a range from two bounds. The bounds are ordered, so `low <= high` always holds.
    pub fn new(low: Ipv4Addr, high: Ipv4Addr) -> Self {
        let (a, b) = (u32::from(low), u32::from(high));
        Self::from_bounds(a.min(b), a.max(b), DEFAULT_NIC)
    }

    fn from_bounds(low: u32, high: u32, nic: &str) -> Self {
        Self {
            low,
            high,
            nic: nic.to_string(),
        }
    }

    fn from_network(network: Ipv4Network, nic: &str) -> Self {
        Self::from_bounds(u32::from(network.network()), u32::from(network.broadcast()), nic)
    }

    /// Creates the network block containing `addr` (e.g. `10.93.232.185/20` -> `10.93.224.0/20`).
    pub fn with_prefix(addr: Ipv4Addr, prefix: u8) -> Result<Self, RangeParseError> {
        let network = Ipv4Network::new(addr, prefix)
            .map_err(|e| RangeParseError::address(&format!("{addr}/{prefix}"), e.to_string()))?;
        Ok(Self::from_network(network, DEFAULT_NIC))
    }

    /// Creates the network block containing `addr` for a dotted subnet mask.
    pub fn with_mask(addr: Ipv4Addr, mask: Ipv4Addr) -> Result<Self, RangeParseError> {
        let network = Ipv4Network::with_netmask(addr, mask)
            .map_err(|e| RangeParseError::address(&format!("{addr}/{mask}"), e.to_string()))?;
        Ok(Self::from_network(network, DEFAULT_NIC))
    }

    /// Creates the range an interface can reach.
    ///
    /// With `local` set the range only holds the interface's own unicast address.
    pub fn from_interface(interface: &NetInterface, local: bool) -> Self {
        let prefix: u8 = if local { 32 } else { interface.prefix() };
        Self::interface_block(interface, prefix)
    }

    /// Like [`AddressRange::from_interface`], but never wider than `min_prefix`
    /// around the interface address.
    pub fn from_interface_clamped(interface: &NetInterface, min_prefix: u8) -> Self {
        Self::interface_block(interface, interface.prefix().max(min_prefix.min(32)))
    }

    fn interface_block(interface: &NetInterface, prefix: u8) -> Self {
        match Ipv4Network::new(interface.unicast, prefix) {
            Ok(network) => Self::from_network(network, &interface.name),
            Err(_) => {
                let addr: u32 = u32::from(interface.unicast);
                Self::from_bounds(addr, addr, &interface.name)
            }
        }
    }

    pub fn with_nic(mut self, nic: impl Into<String>) -> Self {
        self.nic = nic.into();
        self
    }

    pub fn low(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.low)
    }

    pub fn high(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.high)
    }

    pub fn nic(&self) -> &str {
        &self.nic
    }

    /// Number of addresses in the range. A `/0` holds 2^32 addresses, hence `u64`.
    pub fn count(&self) -> u64 {
        (self.high - self.low) as u64 + 1
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr: u32 = u32::from(addr);
        self.low <= addr && addr <= self.high
    }

    pub fn overlaps(&self, other: &AddressRange) -> bool {
        self.low <= other.high && other.low <= self.high
    }

    /// Sorts and coalesces overlapping or adjacent ranges into a canonical set.
    pub fn merge(ranges: impl IntoIterator<Item = AddressRange>) -> Vec<AddressRange> {
        let mut sorted: Vec<AddressRange> = ranges.into_iter().collect();
        sorted.sort_by_key(|r| (r.low, r.high));

        let mut merged: Vec<AddressRange> = Vec::with_capacity(sorted.len());
        for range in sorted {
            match merged.last_mut() {
                Some(last) if range.low <= last.high.saturating_add(1) => {
                    last.high = last.high.max(range.high);
                }
                _ => merged.push(range),
            }
        }
        merged
    }

    /// Sum of the counts of all ranges.
    pub fn total_count(ranges: &[AddressRange]) -> u64 {
        ranges.iter().map(AddressRange::count).sum()
    }

    /// Minimal decomposition into CIDR-aligned blocks, lowest block first.
    pub fn to_cidrs(&self) -> Vec<(Ipv4Addr, u8)> {
        let mut blocks = Vec::new();
        let mut start: u64 = self.low as u64;
        let end: u64 = self.high as u64;

        while start <= end {
            let mut bits: u32 = start.trailing_zeros().min(32);
            while bits > 0 && start + (1u64 << bits) - 1 > end {
                bits -= 1;
            }
            blocks.push((Ipv4Addr::from(start as u32), (32 - bits) as u8));
            start += 1u64 << bits;
        }
        blocks
    }

    /// Parses a `;`/`,` separated list. Fails as a whole on the first malformed entry.
    pub fn parse(text: &str) -> Result<Vec<AddressRange>, RangeParseError> {
        split_entries(text).map(parse_entry).collect()
    }

    pub fn try_parse(text: &str) -> Option<Vec<AddressRange>> {
        Self::parse(text).ok()
    }

    /// Canonical text form: every range as its CIDR blocks, tagged with its interface.
    pub fn format(ranges: &[AddressRange]) -> String {
        let mut entries: Vec<String> = Vec::new();
        for range in ranges {
            for (addr, prefix) in range.to_cidrs() {
                entries.push(with_tag(format!("{addr}/{prefix}"), &range.nic));
            }
        }
        entries.join(";")
    }

    /// Cursor paging through the addresses of `ranges` in order.
    pub fn cursor(ranges: &[AddressRange]) -> AddressRangeCursor {
        AddressRangeCursor::new(ranges)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body: String = match self.to_cidrs().as_slice() {
            [(addr, prefix)] => format!("{addr}/{prefix}"),
            _ => format!("{}-{}", self.low(), self.high()),
        };
        write!(f, "{}", with_tag(body, &self.nic))
    }
}

impl FromStr for AddressRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_entry(s.trim())
    }
}

/// Streaming enumeration over a list of address ranges.
#[derive(Debug, Clone)]
pub struct AddressRangeCursor {
    inner: SpanCursor,
}

impl AddressRangeCursor {
    pub fn new(ranges: &[AddressRange]) -> Self {
        let spans = ranges
            .iter()
            .map(|r| (r.low as u64, r.high as u64))
            .collect();
        Self {
            inner: SpanCursor::new(spans),
        }
    }

    /// Appends up to `max_count` addresses to `batch`; returns how many were added.
    pub fn fill_next_batch(&mut self, batch: &mut Vec<Ipv4Addr>, max_count: usize) -> usize {
        self.inner.fill(batch, max_count, |v| Ipv4Addr::from(v as u32))
    }

    pub fn remaining(&self) -> u64 {
        self.inner.remaining()
    }
}

impl Iterator for AddressRangeCursor {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next_value().map(|v| Ipv4Addr::from(v as u32))
    }
}

fn with_tag(body: String, nic: &str) -> String {
    if nic == DEFAULT_NIC || nic.is_empty() {
        body
    } else {
        format!("{body} [{nic}]")
    }
}

pub(crate) fn split_entries(text: &str) -> impl Iterator<Item = &str> {
    text.split([';', ','])
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
}

fn parse_entry(entry: &str) -> Result<AddressRange, RangeParseError> {
    let (body, nic) = split_nic(entry)?;

    let range = if let Some((addr_str, prefix_str)) = body.split_once('/') {
        let addr: Ipv4Addr = parse_addr(entry, addr_str)?;
        let prefix: u8 = prefix_str
            .trim()
            .parse::<u8>()
            .map_err(|_| RangeParseError::address(entry, format!("invalid prefix '{prefix_str}'")))?;
        let network = Ipv4Network::new(addr, prefix)
            .map_err(|e| RangeParseError::address(entry, e.to_string()))?;
        AddressRange::from_network(network, DEFAULT_NIC)
    } else if let Some((low_str, high_str)) = body.split_once('-') {
        let low: Ipv4Addr = parse_addr(entry, low_str)?;
        let high: Ipv4Addr = parse_addr(entry, high_str)?;
        if u32::from(low) > u32::from(high) {
            return Err(RangeParseError::address(entry, "range start is above range end"));
        }
        AddressRange::new(low, high)
    } else if nic.is_some() {
        let addr: Ipv4Addr = parse_addr(entry, body)?;
        AddressRange::new(addr, addr)
    } else {
        return Err(RangeParseError::address(
            entry,
            "expected a prefix length or a range end",
        ));
    };

    Ok(match nic {
        Some(nic) => range.with_nic(nic),
        None => range,
    })
}

/// Splits `body [nic]` into its parts. Anything after the closing bracket is an error.
fn split_nic(entry: &str) -> Result<(&str, Option<&str>), RangeParseError> {
    let Some(open) = entry.find('[') else {
        if entry.contains(']') {
            return Err(RangeParseError::address(entry, "unbalanced interface tag"));
        }
        return Ok((entry.trim(), None));
    };

    let rest: &str = &entry[open + 1..];
    let close: usize = rest
        .find(']')
        .ok_or_else(|| RangeParseError::address(entry, "unterminated interface tag"))?;

    let nic: &str = rest[..close].trim();
    let trailing: &str = rest[close + 1..].trim();
    if nic.is_empty() {
        return Err(RangeParseError::address(entry, "empty interface tag"));
    }
    if !trailing.is_empty() {
        return Err(RangeParseError::address(
            entry,
            format!("unexpected '{trailing}' after interface tag"),
        ));
    }
    Ok((entry[..open].trim(), Some(nic)))
}

fn parse_addr(entry: &str, text: &str) -> Result<Ipv4Addr, RangeParseError> {
    text.trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| RangeParseError::address(entry, format!("invalid address '{}'", text.trim())))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
