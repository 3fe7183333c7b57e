//! # JSON Façade
//!
//! Renders address manager operations as JSON for an RPC layer. This is not
//! a server: the host routes `(method, params)` here and sends the result.
//!
//! ## Supported Methods
//!
//! - `add_address` / `addpeeraddress` - manual insertion (`{"success": bool}`)
//! - `select` / `getnodeaddresses` - random sample with optional network filter
//! - `check_consistency` / `checkaddrman` - structural audit
//! - `get_stats` - table statistics
//! - `decode_services` - hex and names of a service bitfield
//! - `ping` - health check

// Semantic submodules
mod routes;
mod types;

// Re-export public API
pub use routes::{handle_api_query, AddressManagerHandler};
pub use types::*;

#[cfg(test)]
mod tests;
