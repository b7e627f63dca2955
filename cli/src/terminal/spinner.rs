use std::sync::Arc;

use colored::*;
use indicatif::ProgressStyle;
use tracing::{Span, info_span};
use tracing_indicatif::span_ext::IndicatifSpanExt;
use uascout_core::scanner::{ProgressCallback, ScanProgress};

const TICKS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

fn scan_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.blue} {bar:24.green/black} {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("━╸ ")
        .tick_strings(TICKS)
}

/// Span whose progress bar tracks a scan. Enter it for the duration of the scan.
pub fn scan_span() -> Span {
    let span = info_span!("scan", indicatif.pb_show = true);
    span.pb_set_style(&scan_style());
    span.pb_set_message("Waiting for the first probes...");
    span
}

pub fn progress_message(progress: &ScanProgress) -> String {
    format!(
        "{} hosts, {} endpoints, {} probes running",
        progress.addresses_found.to_string().green().bold(),
        progress.endpoints_found.to_string().green().bold(),
        progress.active_probes
    )
}

/// Feeds scan progress into the bar of `span`.
pub fn progress_callback(span: Span) -> ProgressCallback {
    Arc::new(move |progress: &ScanProgress| {
        span.pb_set_length(progress.total_addresses);
        span.pb_set_position(progress.addresses_scanned);
        span.pb_set_message(&progress_message(progress));
    })
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
    fn message_counts_hosts_and_endpoints() {
        colored::control::set_override(false);
        let progress = ScanProgress {
            total_addresses: 256,
            addresses_scanned: 100,
            addresses_found: 4,
            ports_scanned: 12,
            endpoints_found: 2,
            active_probes: 7,
        };
        assert_eq!(progress_message(&progress), "4 hosts, 2 endpoints, 7 probes running");
    }

    #[test]
    fn callback_without_subscriber_is_harmless() {
        let callback = progress_callback(Span::none());
        callback(&ScanProgress::default());
    }
}
