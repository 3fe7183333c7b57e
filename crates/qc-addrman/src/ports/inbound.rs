//! # Driving Ports (Inbound API)
//!
//! The string-level API consumers (RPC façade, connection manager, gossip
//! handler) use. Inputs are untrusted and validated before any mutation.

use crate::domain::{
    AddResult, AddressManagerError, AddressManagerStats, AddressRecord, ConsistencyReport,
    PeerAddress,
};

/// Primary API of the address manager.
///
/// # Example
///
/// ```rust,ignore
/// use qc_addrman::ports::AddressManagerApi;
///
/// fn share_addresses<T: AddressManagerApi>(api: &T) {
///     let ipv6 = api.select(0, Some("ipv6")).unwrap_or_default();
///     println!("{} ipv6 addresses", ipv6.len());
/// }
/// ```
pub trait AddressManagerApi {
    /// Insert a manually supplied address (source = the address itself).
    ///
    /// With `tried` the address is promoted right after a successful
    /// insertion.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty or malformed address or a port
    ///   outside `0..=65535`
    fn add_address(&self, address: &str, port: i64, tried: bool) -> Result<AddResult, AddressManagerError>;

    /// Random sample of usable addresses.
    ///
    /// `count == 0` returns every usable address.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument("Address count out of range")` for a negative or
    ///   oversized count
    /// - `UnknownNetwork` for an unrecognized network filter
    fn select(&self, count: i64, network: Option<&str>) -> Result<Vec<AddressRecord>, AddressManagerError>;

    /// Audit the internal structure.
    fn check_consistency(&self) -> Result<ConsistencyReport, AddressManagerError>;

    /// Table statistics.
    fn stats(&self) -> AddressManagerStats;

    /// Copy of the record for `address`, if known.
    fn lookup(&self, address: &PeerAddress) -> Option<AddressRecord>;
}
