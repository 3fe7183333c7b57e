//! Address Manager configuration.

use serde::Deserialize;
use thiserror::Error;

/// Configuration for the address manager
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AddressManagerConfig {
    /// Number of buckets in the New table
    pub new_bucket_count: usize,
    /// Number of buckets in the Tried table
    pub tried_bucket_count: usize,
    /// Slots per bucket (both tables)
    pub bucket_size: usize,
    /// Maximum number of New-table slots one address may occupy
    pub new_buckets_per_address: u32,
    /// New buckets reachable from one source group
    pub new_buckets_per_source_group: u64,
    /// Tried buckets reachable from one address group
    pub tried_buckets_per_group: u64,
    /// Addresses not seen for this many days are terrible
    pub horizon_days: u64,
    /// Failed attempts without any success before an address is terrible
    pub retries: u32,
    /// Failed attempts after `min_fail_days` before an address is terrible
    pub max_failures: u32,
    /// Days since last success after which `max_failures` applies
    pub min_fail_days: u64,
    /// A tried incumbent that succeeded this recently keeps its slot
    pub replacement_hours: u64,
    /// Run the consistency check on 1 in N operations (0 disables)
    pub consistency_check_ratio: u32,
    /// Keep the bucketing key across snapshot/restore
    pub persist_key: bool,
}

impl Default for AddressManagerConfig {
    fn default() -> Self {
        Self {
            new_bucket_count: 1024,
            tried_bucket_count: 256,
            bucket_size: 64,
            new_buckets_per_address: 8,
            new_buckets_per_source_group: 64,
            tried_buckets_per_group: 8,
            horizon_days: 30,
            retries: 3,
            max_failures: 10,
            min_fail_days: 7,
            replacement_hours: 4,
            consistency_check_ratio: 0,
            persist_key: true,
        }
    }
}

impl AddressManagerConfig {
    /// Testing config with smaller tables and every operation audited
    pub fn for_testing() -> Self {
        Self {
            new_bucket_count: 64,
            tried_bucket_count: 16,
            bucket_size: 8,
            new_buckets_per_source_group: 16,
            tried_buckets_per_group: 4,
            consistency_check_ratio: 1,
            ..Self::default()
        }
    }

    /// Number of slots in the New table.
    pub fn new_capacity(&self) -> usize {
        self.new_bucket_count * self.bucket_size
    }

    /// Number of slots in the Tried table.
    pub fn tried_capacity(&self) -> usize {
        self.tried_bucket_count * self.bucket_size
    }

    /// Reject configurations the tables cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let dimensions: [(&'static str, u64); 6] = [
            ("new_bucket_count", self.new_bucket_count as u64),
            ("tried_bucket_count", self.tried_bucket_count as u64),
            ("bucket_size", self.bucket_size as u64),
            ("new_buckets_per_address", u64::from(self.new_buckets_per_address)),
            ("new_buckets_per_source_group", self.new_buckets_per_source_group),
            ("tried_buckets_per_group", self.tried_buckets_per_group),
        ];
        if let Some((field, _)) = dimensions.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero(*field));
        }

        // 2^ref_count must fit the stochastic re-add test
        if self.new_buckets_per_address > 32 {
            return Err(ConfigError::OutOfRange {
                field: "new_buckets_per_address",
                reason: "must be at most 32".to_string(),
            });
        }
        if self.new_capacity().checked_mul(2).is_none() {
            return Err(ConfigError::OutOfRange {
                field: "new_bucket_count",
                reason: "table too large".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} must be non-zero")]
    Zero(&'static str),

    #[error("{field} out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("failed to read config: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}
