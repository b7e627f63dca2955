//! Wire codecs spoken by the probes.
//!
//! * **[`ua`]**: the OPC UA TCP (UACP) connection handshake.

pub mod ua;
