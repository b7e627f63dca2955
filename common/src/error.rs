use thiserror::Error;

/// Raised when address or port range text cannot be parsed.
///
/// A single bad entry fails the whole list, so callers never observe a partially parsed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeParseError {
    #[error("invalid address range '{entry}': {reason}")]
    Address { entry: String, reason: String },
    #[error("invalid port range '{entry}': {reason}")]
    Port { entry: String, reason: String },
}

impl RangeParseError {
    pub(crate) fn address(entry: &str, reason: impl Into<String>) -> Self {
        Self::Address {
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn port(entry: &str, reason: impl Into<String>) -> Self {
        Self::Port {
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }
}

/// Raised when a configuration update is rejected. Nothing of the update is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field}: {source}")]
    Range {
        field: &'static str,
        #[source]
        source: RangeParseError,
    },
}
