//! Keyed bucket placement.
//!
//! SECURITY-CRITICAL: an attacker who can predict bucket placement can fill
//! the tables from a handful of networks. Every index below is derived from
//! SipHash-2-4 keyed with a per-manager secret.

use std::hash::Hasher;

use siphasher::sip::SipHasher24;

use super::config::AddressManagerConfig;
use crate::domain::{NetAddress, PeerAddress};

/// Tag mixed into position hashes of the New table.
const NEW_TAG: u8 = b'N';
/// Tag mixed into position hashes of the Tried table.
const TRIED_TAG: u8 = b'K';

/// Deterministic keyed mapping from addresses to table coordinates.
#[derive(Clone, PartialEq, Eq)]
pub struct BucketHasher {
    key: [u8; 16],
    k0: u64,
    k1: u64,
}

impl BucketHasher {
    pub fn new(key: [u8; 16]) -> Self {
        let mut lo = [0u8; 8];
        let mut hi = [0u8; 8];
        lo.copy_from_slice(&key[..8]);
        hi.copy_from_slice(&key[8..]);
        Self {
            key,
            k0: u64::from_le_bytes(lo),
            k1: u64::from_le_bytes(hi),
        }
    }

    /// The secret key.
    pub fn key(&self) -> [u8; 16] {
        self.key
    }

    fn hash(&self, parts: &[&[u8]]) -> u64 {
        let mut hasher = SipHasher24::new_with_keys(self.k0, self.k1);
        for part in parts {
            hasher.write(part);
        }
        hasher.finish()
    }

    /// Tried bucket: an address group reaches at most
    /// `tried_buckets_per_group` buckets.
    pub fn tried_bucket(&self, address: &PeerAddress, config: &AddressManagerConfig) -> usize {
        let h1 = self.hash(&[&address.key_bytes()]);
        let spread = h1 % config.tried_buckets_per_group;
        let h2 = self.hash(&[address.addr.group().as_bytes(), &spread.to_le_bytes()]);
        (h2 % config.tried_bucket_count as u64) as usize
    }

    /// New bucket: a source group reaches at most
    /// `new_buckets_per_source_group` buckets.
    pub fn new_bucket(
        &self,
        address: &PeerAddress,
        source: &NetAddress,
        config: &AddressManagerConfig,
    ) -> usize {
        let source_group = source.group();
        let h1 = self.hash(&[address.addr.group().as_bytes(), source_group.as_bytes()]);
        let spread = h1 % config.new_buckets_per_source_group;
        let h2 = self.hash(&[source_group.as_bytes(), &spread.to_le_bytes()]);
        (h2 % config.new_bucket_count as u64) as usize
    }

    /// Position of an address inside a bucket.
    pub fn position(
        &self,
        new_table: bool,
        bucket: usize,
        address: &PeerAddress,
        config: &AddressManagerConfig,
    ) -> usize {
        let tag = if new_table { NEW_TAG } else { TRIED_TAG };
        let h = self.hash(&[&[tag], &(bucket as u64).to_le_bytes(), &address.key_bytes()]);
        (h % config.bucket_size as u64) as usize
    }
}

impl std::fmt::Debug for BucketHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the key
        f.debug_struct("BucketHasher").finish_non_exhaustive()
    }
}
