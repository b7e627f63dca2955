//! # Discovery Models
//!
//! * [`options::DiscoveryOptions`]: the configuration snapshot a sweep runs with.
//! * [`application::ApplicationModel`]: one discovered application and its endpoints.
//! * [`event::DiscoveryEventModel`]: the outbound record a sweep result is flattened into.

pub mod application;
pub mod event;
pub mod options;
