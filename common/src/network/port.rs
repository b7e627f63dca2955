//! # TCP Port Range Model
//!
//! Port lists use the same separators as address lists. Every entry is a single port (`4840`),
//! a bounded range (`4840-4843`) or an open-ended range using `*` (`*`, `48000-*`, `*-1024`).

use std::fmt;
use std::str::FromStr;

use crate::error::RangeParseError;
use crate::network::cursor::SpanCursor;
use crate::network::range::split_entries;

/// Contiguous, inclusive block of TCP ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRange {
    low: u16,
    high: u16,
}

impl PortRange {
    /// IANA registered OPC UA TCP ports.
    pub const OPC_UA: PortRange = PortRange::new(4840, 4843);

    /// Creates a range from two bounds; the bounds are ordered so `low <= high`.
    pub const fn new(low: u16, high: u16) -> Self {
        if low <= high {
            Self { low, high }
        } else {
            Self { low: high, high: low }
        }
    }

    pub const fn single(port: u16) -> Self {
        Self::new(port, port)
    }

    /// The whole port space, `*`.
    pub const fn all() -> Self {
        Self::new(0, u16::MAX)
    }

    /// Ports OPC UA servers listen on out of the box.
    pub fn well_known() -> Vec<PortRange> {
        vec![
            Self::OPC_UA,
            PortRange::new(48000, 48050),
            PortRange::new(48400, 48410),
            PortRange::single(49320),
            PortRange::new(51200, 51210),
            PortRange::new(52520, 52530),
            PortRange::single(53530),
            PortRange::single(62541),
        ]
    }

    /// The dynamic / unassigned port block.
    pub fn unassigned() -> Vec<PortRange> {
        vec![PortRange::new(49152, u16::MAX)]
    }

    pub fn low(&self) -> u16 {
        self.low
    }

    pub fn high(&self) -> u16 {
        self.high
    }

    /// Number of ports; `*` holds 65536.
    pub fn count(&self) -> u32 {
        (self.high - self.low) as u32 + 1
    }

    pub fn contains(&self, port: u16) -> bool {
        self.low <= port && port <= self.high
    }

    pub fn total_count(ranges: &[PortRange]) -> u64 {
        ranges.iter().map(|r| r.count() as u64).sum()
    }

    /// Parses a `;`/`,` separated list, keeping entry order. Fails as a whole on a bad entry.
    pub fn parse(text: &str) -> Result<Vec<PortRange>, RangeParseError> {
        split_entries(text).map(parse_entry).collect()
    }

    pub fn try_parse(text: &str) -> Option<Vec<PortRange>> {
        Self::parse(text).ok()
    }

    pub fn format(ranges: &[PortRange]) -> String {
        ranges
            .iter()
            .map(PortRange::to_string)
            .collect::<Vec<String>>()
            .join(";")
    }

    pub fn cursor(ranges: &[PortRange]) -> PortRangeCursor {
        PortRangeCursor::new(ranges)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.low, self.high) {
            (0, u16::MAX) => write!(f, "*"),
            (low, high) if low == high => write!(f, "{low}"),
            (low, high) => write!(f, "{low}-{high}"),
        }
    }
}

impl FromStr for PortRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_entry(s.trim())
    }
}

/// Streaming enumeration over a list of port ranges.
#[derive(Debug, Clone)]
pub struct PortRangeCursor {
    inner: SpanCursor,
}

impl PortRangeCursor {
    pub fn new(ranges: &[PortRange]) -> Self {
        let spans = ranges
            .iter()
            .map(|r| (r.low as u64, r.high as u64))
            .collect();
        Self {
            inner: SpanCursor::new(spans),
        }
    }

    /// Appends up to `max_count` ports to `batch`, mapped through `map`.
    pub fn fill_next_batch<T>(
        &mut self,
        batch: &mut Vec<T>,
        max_count: usize,
        map: impl Fn(u16) -> T,
    ) -> usize {
        self.inner.fill(batch, max_count, |v| map(v as u16))
    }

    pub fn remaining(&self) -> u64 {
        self.inner.remaining()
    }
}

impl Iterator for PortRangeCursor {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next_value().map(|v| v as u16)
    }
}

fn parse_entry(entry: &str) -> Result<PortRange, RangeParseError> {
    if entry == "*" {
        return Ok(PortRange::all());
    }

    let Some((low_str, high_str)) = entry.split_once('-') else {
        return parse_port(entry, entry, 0).map(PortRange::single);
    };

    let low: u16 = parse_port(entry, low_str, 0)?;
    let high: u16 = parse_port(entry, high_str, u16::MAX)?;
    if low > high {
        return Err(RangeParseError::port(entry, "range start is above range end"));
    }
    Ok(PortRange::new(low, high))
}

/// Parses one bound; `*` stands for `wildcard`.
fn parse_port(entry: &str, text: &str, wildcard: u16) -> Result<u16, RangeParseError> {
    match text.trim() {
        "*" => Ok(wildcard),
        port => port
            .parse::<u16>()
            .map_err(|_| RangeParseError::port(entry, format!("invalid port '{port}'"))),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_entry_order() {
        let ranges = PortRange::parse("0-100;44").unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!((ranges[0].low(), ranges[0].high()), (0, 100));
        assert_eq!(ranges[0].count(), 101);
        assert_eq!((ranges[1].low(), ranges[1].high()), (44, 44));
        assert_eq!(ranges[1].count(), 1);
    }

    #[test]
    fn parse_wildcards() {
        assert_eq!(PortRange::parse("*").unwrap(), vec![PortRange::all()]);
        assert_eq!(PortRange::all().count(), 65536);
        assert_eq!(PortRange::parse("48000-*").unwrap(), vec![PortRange::new(48000, 65535)]);
        assert_eq!(PortRange::parse("*-1024").unwrap(), vec![PortRange::new(0, 1024)]);
        assert_eq!(PortRange::parse("* - 10 , 20").unwrap().len(), 2);
    }

    #[test]
    fn reject_invalid() {
        for bad in ["65536", "10-5", "abc", "4840-", "-4840", "1-2-3", "**"] {
            assert!(PortRange::parse(bad).is_err(), "{bad} should not parse");
        }
        assert!(PortRange::parse("4840;nope").is_err());
    }

    #[test]
    fn format_round_trips() {
        let ranges = PortRange::parse("4840;48000-48050;*;49152-*").unwrap();
        let text = PortRange::format(&ranges);
        assert_eq!(text, "4840;48000-48050;*;49152-65535");
        assert_eq!(PortRange::parse(&text).unwrap(), ranges);
    }

    #[test]
    fn cursor_pages_through_ports() {
        let ranges = vec![PortRange::new(4840, 4841), PortRange::single(62541)];
        let mut cursor = PortRange::cursor(&ranges);
        let mut batch: Vec<u32> = Vec::new();
        assert_eq!(cursor.fill_next_batch(&mut batch, 2, u32::from), 2);
        assert_eq!(batch, vec![4840, 4841]);
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.next(), Some(62541));
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn well_known_set_contains_the_iana_port() {
        assert!(PortRange::well_known().iter().any(|r| r.contains(4840)));
        assert_eq!(PortRange::total_count(&PortRange::unassigned()), 16384);
    }
}
