//! Paging over a list of inclusive integer spans.
//!
//! Both [`crate::network::range::AddressRangeCursor`] and
//! [`crate::network::port::PortRangeCursor`] are thin typed wrappers around [`SpanCursor`],
//! so a `/8` can be walked batch by batch without ever being materialized.

#[derive(Debug, Clone)]
pub(crate) struct SpanCursor {
    spans: Vec<(u64, u64)>,
    index: usize,
    next: Option<u64>,
}

impl SpanCursor {
    pub(crate) fn new(spans: Vec<(u64, u64)>) -> Self {
        Self {
            spans,
            index: 0,
            next: None,
        }
    }

    /// Appends up to `max` values to `out` and returns how many were added.
    /// Zero means the cursor is exhausted (or `max` was zero).
    pub(crate) fn fill<T>(&mut self, out: &mut Vec<T>, max: usize, map: impl Fn(u64) -> T) -> usize {
        let mut added: usize = 0;
        while added < max && self.index < self.spans.len() {
            let (low, high) = self.spans[self.index];
            let start: u64 = self.next.unwrap_or(low);
            let take: u64 = ((max - added) as u64).min(high - start + 1);

            out.extend((start..start + take).map(&map));
            added += take as usize;

            if start + take > high {
                self.index += 1;
                self.next = None;
            } else {
                self.next = Some(start + take);
            }
        }
        added
    }

    pub(crate) fn next_value(&mut self) -> Option<u64> {
        let (low, high) = *self.spans.get(self.index)?;
        let value: u64 = self.next.unwrap_or(low);
        if value >= high {
            self.index += 1;
            self.next = None;
        } else {
            self.next = Some(value + 1);
        }
        Some(value)
    }

    pub(crate) fn remaining(&self) -> u64 {
        self.spans
            .iter()
            .enumerate()
            .skip(self.index)
            .map(|(idx, &(low, high))| {
                let start = if idx == self.index { self.next.unwrap_or(low) } else { low };
                high - start + 1
            })
            .sum()
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
