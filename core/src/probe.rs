//! # Connect Probes
//!
//! A probe unit ([`ConnectProbe`]) is one concurrently running task that pulls candidate
//! endpoints from a shared [`ProbeHost`], connects to each with a deadline and hands the open
//! stream to an [`AsyncProbe`] interrogation strategy. Many units share one host; the host
//! owns the candidate stream, the result sinks and the give-up policy.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

mod connect;
mod server;

pub use connect::{ConnectProbe, is_resource_exhaustion};
#[cfg(test)]
pub(crate) use connect::Connect;
pub use server::UaServerProbe;

/// One endpoint to probe and the time budget for connect plus interrogation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub endpoint: SocketAddr,
    pub timeout: Duration,
}

/// Source of candidates and sink of outcomes, shared by every unit of a pool.
#[async_trait]
pub trait ProbeHost: Send + Sync {
    /// Next candidate, or `None` once the source is drained.
    async fn next(&self) -> Option<Candidate>;

    async fn on_success(&self, endpoint: SocketAddr);

    fn on_fail(&self, endpoint: SocketAddr);

    /// Called after `on_success` or `on_fail` for every candidate that reached an outcome.
    fn on_complete(&self, endpoint: SocketAddr);

    /// Called exactly once when a unit stops, whatever the reason.
    fn on_exit(&self);

    /// Asked when connecting failed because the host ran out of sockets or ports.
    ///
    /// Returning `true` means the host took `candidate` back for another unit and the asking
    /// unit must stop. Returning `false` means the unit should back off and retry.
    fn should_give_up(&self, candidate: &Candidate) -> bool;
}

/// Interrogation strategy run on an established connection.
#[async_trait]
pub trait AsyncProbe: Send {
    /// Prepares a retry after the interrogation ran out of time.
    /// Returns `false` if the strategy cannot be reused for the same candidate.
    fn reset(&mut self) -> bool;

    /// Returns whether the peer speaks the expected protocol.
    async fn interrogate(&mut self, stream: &mut TcpStream, endpoint: SocketAddr) -> anyhow::Result<bool>;

    fn dispose(&mut self);
}

/// Treats every established connection as a hit.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProbe;

#[async_trait]
impl AsyncProbe for NullProbe {
    fn reset(&mut self) -> bool {
        true
    }

    async fn interrogate(&mut self, _stream: &mut TcpStream, _endpoint: SocketAddr) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn dispose(&mut self) {}
}
