//! # Address Manager - New/Tried Bucket System
//!
//! Implements Bitcoin's `addrman` pattern for Eclipse Attack resistance.
//!
//! ## Design (Bitcoin-Inspired)
//!
//! - **New Table**: Addresses heard about but never successfully connected to
//! - **Tried Table**: Addresses we've successfully connected to
//!
//! ## Anti-Eclipse Properties
//!
//! 1. Keyed bucketing by address group and source group limits how much of
//!    the New table one source can fill
//! 2. Segregation prevents poisoning Tried with unverified addresses
//! 3. Tried placement depends only on the address group, so one /16 reaches
//!    at most a handful of Tried buckets
//!
//! Reference: Bitcoin Core's `addrman.h`

// Semantic submodules
mod config;
mod hasher;
mod invariants;
mod manager;
mod snapshot;
mod table;
mod types;

// Re-export public API
pub use config::{AddressManagerConfig, ConfigError};
pub use hasher::BucketHasher;
pub use invariants::{ConsistencyReport, InvariantViolation};
pub use manager::{sanitize_time, AddressManager, MIN_TIMESTAMP};
pub use snapshot::{requires_rebucket, AddressManagerSnapshot, SnapshotSlot, SNAPSHOT_VERSION};
pub use table::{AddressTable, PlaceOutcome, SlotPosition, TableKind};
pub use types::{AddResult, AddressManagerStats, AddressPosition};
