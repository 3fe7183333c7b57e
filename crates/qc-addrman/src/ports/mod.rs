//! # Ports Layer - Hexagonal Architecture Boundaries
//!
//! - **Driving Ports (Inbound):** the API the address manager exposes
//! - **Driven Ports (Outbound):** time, randomness, configuration and
//!   snapshot storage supplied by the host

pub mod inbound;
pub mod outbound;

pub use inbound::AddressManagerApi;
pub use outbound::{ConfigProvider, RandomSource, SnapshotStore, TimeSource};
