//! # Shared building blocks
//!
//! Types shared by every crate in the workspace:
//!
//! * **[`network`]**: the IPv4 address / TCP port range model and local interface enumeration.
//! * **[`models`]**: discovery options, results and the outbound event records.
//! * **[`config`]**: the externally supplied discovery configuration.
//! * **[`utils`]**: cancellation and serde helpers.

pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod utils;
