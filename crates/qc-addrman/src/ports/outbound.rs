//! # Driven Ports (Outbound SPI)
//!
//! These are the interfaces the address manager **requires** from the host.

use crate::domain::{AddressManagerConfig, AddressManagerError, Timestamp};

/// Abstract interface for time-related operations.
///
/// Enables deterministic testing by injecting controllable time sources.
/// Production implementations use system time; tests use fixed timestamps.
pub trait TimeSource: Send + Sync {
    /// Get the current timestamp.
    fn now(&self) -> Timestamp;
}

/// Source of randomness for bucketing keys, sampling and the stochastic
/// parts of insertion and selection.
///
/// # Security
///
/// The production implementation must be unpredictable: an attacker who
/// knows the key or the sampling sequence can target buckets.
pub trait RandomSource: Send + Sync {
    /// Uniform value in `[0, max)`; `0` when `max == 0`.
    fn random_usize(&self, max: usize) -> usize;

    /// Uniform value with the low `bits` bits random (`bits <= 64`).
    fn random_bits(&self, bits: u32) -> u64;

    /// Fair coin.
    fn random_bool(&self) -> bool {
        self.random_bits(1) == 1
    }

    /// Fresh 128-bit bucketing key.
    fn random_key(&self) -> [u8; 16];
}

/// Abstract interface for configuration loading.
pub trait ConfigProvider: Send + Sync {
    /// Address manager parameters.
    fn address_manager_config(&self) -> AddressManagerConfig;
}

/// Durable storage for encoded snapshots.
pub trait SnapshotStore: Send + Sync {
    /// Persist an encoded snapshot, replacing any previous one.
    fn save(&self, bytes: &[u8]) -> Result<(), AddressManagerError>;

    /// Load the last saved snapshot; `None` if nothing was saved yet.
    fn load(&self) -> Result<Option<Vec<u8>>, AddressManagerError>;
}
