use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::bail;
use chrono::Utc;
use colored::*;
use tracing::{Instrument, warn};
use uascout_common::config::DiscoveryConfigModel;
use uascout_common::models::application::ApplicationModel;
use uascout_common::models::options::{DiscoveryMode, DiscoveryOptions};
use uascout_common::utils::cancel::CancelSource;
use uascout_core::discovery::{self, Discoverer, ProbeOnlyClient, SystemInterfaces};
use uascout_core::scanner::PortScanner;

use crate::commands::DiscoverArgs;
use crate::emitter::JsonLinesEmitter;
use crate::mprint;
use crate::terminal::{colors, format, print, spinner};

impl DiscoverArgs {
    /// Options of the one-shot pass. Range text goes through the same validation as a
    /// configuration update.
    pub fn options(&self) -> anyhow::Result<DiscoveryOptions> {
        if self.mode == DiscoveryMode::Off {
            bail!("mode 'off' discovers nothing, pick local, fast or scan");
        }
        let mut options = DiscoveryOptions {
            network_class: self.class,
            ..DiscoveryOptions::with_mode(self.mode)
        };
        if let Some(parallelism) = self.parallelism {
            options.max_degree_of_parallelism = parallelism.max(1);
        }
        options.apply(&DiscoveryConfigModel {
            idle_time_between_scans: None,
            address_ranges_to_scan: self.ranges.clone(),
            port_ranges_to_scan: self.ports.clone(),
            port_probe_timeout: self.port_timeout.map(Duration::from_millis),
            network_probe_timeout: self.network_timeout.map(Duration::from_millis),
            max_port_probes: self.port_probes,
            max_network_probes: self.network_probes,
        })?;
        Ok(options)
    }
}

pub async fn discover(args: DiscoverArgs) -> anyhow::Result<()> {
    let options: DiscoveryOptions = args.options()?;
    let emitter = Arc::new(JsonLinesEmitter::to(args.output.as_ref()).await?);

    let span = spinner::scan_span();
    let scanner = PortScanner::new().on_progress(spinner::progress_callback(span.clone()));
    let discoverer = Discoverer::new(
        Arc::new(scanner),
        Arc::new(ProbeOnlyClient),
        emitter.clone(),
        Arc::new(SystemInterfaces),
    );

    let source = Arc::new(CancelSource::new());
    let interrupt = tokio::spawn({
        let source = source.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing with what was found so far");
                source.cancel();
            }
        }
    });

    let start_time: Instant = Instant::now();
    let result = discoverer
        .run_once(&options, source.token())
        .instrument(span.clone())
        .await;
    interrupt.abort();
    drop(span);
    let apps: Vec<ApplicationModel> = result?;

    if args.json || args.output.is_some() {
        discovery::publish(emitter.as_ref(), &apps, Utc::now()).await?;
    }

    discovery_ends(&apps, start_time.elapsed());
    Ok(())
}

fn discovery_ends(apps: &[ApplicationModel], total_time: Duration) {
    if apps.is_empty() {
        print::header("zero servers detected");
        print::no_results();
        return;
    }

    print::header("OPC UA Discovery");
    for (idx, app) in apps.iter().enumerate() {
        let name: &str = app
            .application
            .application_name
            .as_deref()
            .unwrap_or(&app.application.application_uri);
        print::tree_head(idx, name);
        print::as_tree_one_level(format::application_to_details(app));
        if idx + 1 != apps.len() {
            mprint!();
        }
    }
    print_summary(apps, total_time);
}

fn print_summary(apps: &[ApplicationModel], total_time: Duration) {
    let servers: ColoredString = format!("{} servers", apps.len()).bold().green();
    let endpoints: ColoredString =
        format!("{} endpoints", ApplicationModel::endpoint_count(apps)).bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: ColoredString =
        format!("Discovery Complete: {servers} with {endpoints} in {total_time}")
            .color(colors::TEXT_DEFAULT);

    print::fat_separator();
    print::centerln(&output.to_string());
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
    use clap::Parser;
    use uascout_common::network::port::PortRange;
    use uascout_common::network::range::AddressRange;

    use crate::commands::{CommandLine, Commands, DiscoverArgs};

    fn args(argv: &[&str]) -> DiscoverArgs {
        let mut full = vec!["uascout", "discover"];
        full.extend_from_slice(argv);
        match CommandLine::try_parse_from(full).unwrap().command {
            Commands::Discover(args) => args,
            _ => panic!("expected discover"),
        }
    }

    #[test]
    fn flags_map_onto_options() {
        let options = args(&[
            "10.0.0.0/24",
            "--ports",
            "4840-4841",
            "--mode",
            "scan",
            "--port-timeout",
            "250",
            "--parallelism",
            "16",
            "--port-probes",
            "32",
        ])
        .options()
        .unwrap();

        assert_eq!(options.address_ranges, Some(AddressRange::parse("10.0.0.0/24").unwrap()));
        assert_eq!(options.port_ranges, Some(PortRange::parse("4840-4841").unwrap()));
        assert_eq!(options.port_probe_timeout, Some(std::time::Duration::from_millis(250)));
        assert_eq!(options.max_degree_of_parallelism, 16);
        assert_eq!(options.max_port_probes_or_default(), 32);
        assert_eq!(options.network_probe_timeout, None);
    }

    #[test]
    fn bad_ranges_and_off_mode_are_rejected() {
        assert!(args(&["10.0.0.300/24"]).options().is_err());
        assert!(args(&["--ports", "70000"]).options().is_err());
        assert!(args(&["--mode", "off"]).options().is_err());
    }
}
