//! Domain Errors for the Address Manager

use thiserror::Error;

use super::address_manager::{ConfigError, InvariantViolation};

/// Errors that can occur at the address manager boundary.
///
/// Collisions and duplicates are not errors: they surface as
/// `AddResult { success: false }`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressManagerError {
    /// Malformed address, out-of-range port or count.
    #[error("{0}")]
    InvalidArgument(String),

    /// Unrecognized network filter.
    #[error("Network not recognized: {0}")]
    UnknownNetwork(String),

    /// Self-audit failure. Indicates a bug, never bad input.
    ///
    /// Carries the counters as they stood when the audit ran; `total` is
    /// the number of stored records.
    #[error(
        "Address manager consistency check failed (new {new}, tried {tried}, total {total}): {violation}"
    )]
    InternalInconsistency {
        new: usize,
        tried: usize,
        total: usize,
        #[source]
        violation: InvariantViolation,
    },

    /// Snapshot bytes could not be decoded or failed validation.
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Snapshot storage I/O failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Rejected configuration.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors from parsing untrusted address input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("Address is empty")]
    Empty,

    #[error("Invalid address: {0}")]
    InvalidHost(String),

    #[error("Invalid onion address: {0}")]
    InvalidOnion(String),

    #[error("Invalid I2P address: {0}")]
    InvalidI2p(String),

    #[error("Port out of range: {0}")]
    PortOutOfRange(i64),

    #[error("Network not recognized: {0}")]
    UnknownNetwork(String),

    #[error("Unrecognized service name: {0}")]
    InvalidServiceName(String),

    #[error("Invalid services hex: {0}")]
    InvalidServiceHex(String),
}

impl From<AddressParseError> for AddressManagerError {
    fn from(err: AddressParseError) -> Self {
        match err {
            AddressParseError::UnknownNetwork(token) => AddressManagerError::UnknownNetwork(token),
            other => AddressManagerError::InvalidArgument(other.to_string()),
        }
    }
}
