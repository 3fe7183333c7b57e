//! # Peer Address Manager
//!
//! Remembers, validates and selects peer network addresses across restarts
//! and attacks, following Bitcoin Core's `addrman` design:
//!
//! - a *new* table of addresses heard about through gossip
//! - a *tried* table of addresses we have successfully connected to
//! - keyed (SipHash) bucket placement, so an attacker cannot aim at buckets
//! - bounded memory: both tables are fixed grids of slots
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture with:
//! - **Domain Layer:** addresses, records, tables, the manager itself
//! - **Ports Layer:** `AddressManagerApi` inbound; time, randomness, config
//!   and snapshot storage outbound
//! - **Service Layer:** the single lock-guarded instance shared by the node
//! - **Adapters Layer:** system clock, OS randomness, file store, TOML
//!   config, JSON façade (feature-gated)
//!
//! ## Example
//!
//! ```rust
//! use qc_addrman::adapters::SeededRandomSource;
//! use qc_addrman::ports::RandomSource;
//! use qc_addrman::{AddressManager, AddressManagerConfig, NetAddress, PeerAddress, ServiceFlags, Timestamp};
//!
//! let rng = SeededRandomSource::new(1);
//! let mut manager = AddressManager::new(AddressManagerConfig::default(), rng.random_key()).unwrap();
//! let now = Timestamp::new(1_700_000_000);
//!
//! let peer = PeerAddress::new(NetAddress::v4(1, 2, 3, 4), 8333);
//! let result = manager.add_address(peer, peer.addr, ServiceFlags::NETWORK, now, 0, now, &rng);
//! assert!(result.success);
//!
//! manager.mark_good(&peer, now, &rng);
//! assert_eq!(manager.stats().tried_count, 1);
//! assert!(manager.check_invariants().is_ok());
//! ```

// =============================================================================
// CORE MODULES
// =============================================================================

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

/// Test utilities (FixedTimeSource)
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// =============================================================================
// RE-EXPORTS
// =============================================================================

// Domain entities
pub use domain::{
    AddResult, AddressId, AddressManager, AddressManagerConfig, AddressManagerError,
    AddressManagerSnapshot, AddressManagerStats, AddressParseError, AddressPosition, AddressRecord,
    ConfigError, ConsistencyReport, InvariantViolation, NetAddress, NetGroup, Network,
    PeerAddress, ServiceFlags, Timestamp,
};

// Port traits
pub use ports::{AddressManagerApi, ConfigProvider, RandomSource, SnapshotStore, TimeSource};

// Service
pub use service::{AddressManagerService, GossipedAddress};
