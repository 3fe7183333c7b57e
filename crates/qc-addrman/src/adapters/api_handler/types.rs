use serde::{Deserialize, Serialize};

use crate::domain::{AddressManagerError, AddressRecord};

/// JSON-RPC error: invalid method parameter.
pub const RPC_INVALID_PARAMETER: i32 = -8;
/// JSON-RPC error: unexpected parameter type.
pub const RPC_TYPE_ERROR: i32 = -3;
/// JSON-RPC error: miscellaneous (used for out-of-range integers).
pub const RPC_MISC_ERROR: i32 = -1;
/// JSON-RPC error: method not found.
pub const RPC_METHOD_NOT_FOUND: i32 = -32601;
/// JSON-RPC error: internal error.
pub const RPC_INTERNAL_ERROR: i32 = -32603;

/// One address as returned by `select`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcNodeAddress {
    /// Last-seen time, Unix seconds
    pub time: u64,
    /// Service bits, 16 hex digits
    pub services: String,
    /// Capability names of the same bits
    #[serde(rename = "servicesnames")]
    pub services_names: Vec<String>,
    pub address: String,
    pub port: u16,
    /// One of `ipv4`, `ipv6`, `onion`, `i2p`, `cjdns`, `not_publicly_routable`
    pub network: String,
}

impl From<&AddressRecord> for RpcNodeAddress {
    fn from(record: &AddressRecord) -> Self {
        Self {
            time: record.time.as_secs(),
            services: record.services.to_hex(),
            services_names: record.services.names(),
            address: record.address.addr.to_string(),
            port: record.address.port,
            network: record.network().name().to_string(),
        }
    }
}

/// Service bitfield in both renderings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcServices {
    pub services: String,
    #[serde(rename = "servicesnames")]
    pub services_names: Vec<String>,
}

/// Table statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcAddrmanStats {
    pub new: usize,
    pub tried: usize,
    pub total: usize,
    pub new_slots_used: usize,
    pub tried_collisions: u64,
}

/// Error type for API query responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiQueryError {
    /// JSON-RPC error code.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
}

impl ApiQueryError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<AddressManagerError> for ApiQueryError {
    fn from(err: AddressManagerError) -> Self {
        let code = match err {
            AddressManagerError::InvalidArgument(_) | AddressManagerError::UnknownNetwork(_) => {
                RPC_INVALID_PARAMETER
            }
            AddressManagerError::InternalInconsistency { .. }
            | AddressManagerError::Snapshot(_)
            | AddressManagerError::Storage(_)
            | AddressManagerError::Config(_) => RPC_INTERNAL_ERROR,
        };
        Self::new(code, err.to_string())
    }
}
