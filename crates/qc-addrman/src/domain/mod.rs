//! Domain Layer - Pure business logic with no I/O
//!
//! This module contains:
//! - Addresses, network classes and routing groups
//! - Service flags
//! - Address records and their quality metrics
//! - Address Manager (New/Tried bucket system - Bitcoin addrman)

pub mod address_manager;
pub mod entities;
pub mod errors;
pub mod network;
pub mod record;
pub mod service_flags;

pub use address_manager::*;
pub use entities::*;
pub use errors::*;
pub use network::*;
pub use record::AddressRecord;
pub use service_flags::*;
