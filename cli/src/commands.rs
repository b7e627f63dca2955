pub mod discover;
pub mod interfaces;
pub mod ranges;
pub mod run;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use uascout_common::models::options::{DiscoveryMode, NetworkClass};

#[derive(Parser)]
#[command(name = "uascout")]
#[command(about = "Finds OPC UA servers on the networks around this device.", version)]
pub struct CommandLine {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one discovery pass and print the servers found
    #[command(alias = "d")]
    Discover(DiscoverArgs),
    /// Sweep continuously and publish results as JSON lines
    #[command(alias = "r")]
    Run(RunArgs),
    /// Normalize and count address or port ranges
    Ranges(RangesArgs),
    /// Show the local interfaces discovery derives its ranges from
    #[command(alias = "i")]
    Interfaces {
        /// Interface kinds to list
        #[arg(short, long, default_value = "all")]
        class: NetworkClass,
    },
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Address ranges, e.g. "10.0.0.0/24, 192.168.1.10-192.168.1.20". Derived from the interfaces if omitted
    pub ranges: Option<String>,

    /// Port ranges, e.g. "4840-4843, 48010". Derived from the mode if omitted
    #[arg(short, long)]
    pub ports: Option<String>,

    /// local, fast or scan
    #[arg(short, long, default_value = "fast")]
    pub mode: DiscoveryMode,

    /// Interface kinds used for default ranges
    #[arg(short, long, default_value = "wired")]
    pub class: NetworkClass,

    /// Network sweep connect timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub network_timeout: Option<u64>,

    /// Port probe timeout in milliseconds
    #[arg(long, value_name = "MS")]
    pub port_timeout: Option<u64>,

    /// Concurrent network sweep probes
    #[arg(long)]
    pub network_probes: Option<usize>,

    /// Concurrent port probes
    #[arg(long)]
    pub port_probes: Option<usize>,

    /// Concurrent application interrogations
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Also write the discovery events as JSON lines to stdout
    #[arg(long)]
    pub json: bool,

    /// Append the discovery events as JSON lines to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Service configuration, reloaded while running
    #[arg(short, long, default_value = "uascout.yaml")]
    pub config: PathBuf,

    /// Overrides the mode of the configuration file
    #[arg(short, long)]
    pub mode: Option<DiscoveryMode>,

    /// Seconds between configuration file checks
    #[arg(long, default_value_t = 10)]
    pub reload_interval: u64,

    /// Seconds before the first pass
    #[arg(long)]
    pub initial_delay: Option<u64>,
}

#[derive(Args, Debug)]
pub struct RangesArgs {
    /// Comma separated ranges
    pub ranges: String,

    /// Treat the input as port ranges
    #[arg(short, long)]
    pub ports: bool,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
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
