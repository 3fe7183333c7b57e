//! Address manager type definitions.

use serde::Serialize;

/// Outcome of an insertion.
///
/// `success: false` covers every soft rejection: unroutable address, no new
/// information, already tried, multiplicity cap, lost slot collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddResult {
    pub success: bool,
}

/// Where an address currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressPosition {
    /// In the Tried table
    pub tried: bool,
    /// Number of slots referencing the address (1 when tried)
    pub multiplicity: u32,
    /// Bucket of the first referencing slot
    pub bucket: usize,
    /// Position inside that bucket
    pub position: usize,
}

/// Statistics about the address manager.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressManagerStats {
    /// Number of addresses in the New table.
    pub new_count: usize,
    /// Number of addresses in the Tried table.
    pub tried_count: usize,
    /// Occupied New-table slots (an address may hold several).
    pub new_slots_used: usize,
    /// Number of buckets in the New table.
    pub new_bucket_count: usize,
    /// Number of buckets in the Tried table.
    pub tried_bucket_count: usize,
    /// Slots per bucket.
    pub bucket_size: usize,
    /// Promotions refused because the tried incumbent was recently good.
    pub tried_collisions: u64,
}

impl AddressManagerStats {
    pub fn total(&self) -> usize {
        self.new_count + self.tried_count
    }
}
