//! # Adapters
//!
//! Concrete implementations of the outbound ports plus the JSON façade.
//!
//! | Port | Production | Testing |
//! |------|------------|---------|
//! | `TimeSource` | `SystemTimeSource` | `test_utils::FixedTimeSource` |
//! | `RandomSource` | `OsRandomSource` | `SeededRandomSource` |
//! | `SnapshotStore` | `FileSnapshotStore` | `FileSnapshotStore` in a temp dir |
//! | `ConfigProvider` | `TomlConfigProvider` | `StaticConfigProvider` |
//!
//! ## Feature Flags
//!
//! - `rpc` - JSON façade (`api_handler`)
//! - `config` - TOML config loading

/// JSON rendering for an RPC layer
#[cfg(feature = "rpc")]
pub mod api_handler;
/// Configuration providers
pub mod config;
/// Random source adapters
pub mod random;
/// Snapshot storage
pub mod storage;
/// Time source adapters
pub mod time;

// Re-export public API
pub use config::StaticConfigProvider;
pub use random::{OsRandomSource, SeededRandomSource};
pub use storage::FileSnapshotStore;
pub use time::SystemTimeSource;

#[cfg(feature = "config")]
pub use config::TomlConfigProvider;

#[cfg(feature = "rpc")]
pub use api_handler::{handle_api_query, AddressManagerHandler, ApiQueryError};
