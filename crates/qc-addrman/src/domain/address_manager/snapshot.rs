//! Snapshot and restore.
//!
//! Wire format: `[version: u8] [bincode payload] [sha256(version ‖ payload)]`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::config::AddressManagerConfig;
use super::invariants::check_all_invariants;
use super::manager::AddressManager;
use super::table::{AddressTable, PlaceOutcome, SlotPosition};
use crate::domain::{AddressId, AddressManagerError, AddressRecord, Timestamp};
use crate::ports::RandomSource;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u8 = 1;

const CHECKSUM_LEN: usize = 32;

/// One occupied slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSlot {
    pub bucket: u32,
    pub position: u32,
    pub id: AddressId,
}

/// Self-contained copy of the manager state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressManagerSnapshot {
    pub key: [u8; 16],
    pub new_bucket_count: u32,
    pub tried_bucket_count: u32,
    pub bucket_size: u32,
    pub records: Vec<(AddressId, AddressRecord)>,
    pub new_slots: Vec<SnapshotSlot>,
    pub tried_slots: Vec<SnapshotSlot>,
    pub last_good: Timestamp,
    pub tried_collisions: u64,
}

impl AddressManagerSnapshot {
    /// Serialize with version byte and checksum.
    pub fn encode(&self) -> Result<Vec<u8>, AddressManagerError> {
        let payload = bincode::serialize(self)
            .map_err(|e| AddressManagerError::Snapshot(format!("encode failed: {}", e)))?;

        let mut out = Vec::with_capacity(1 + payload.len() + CHECKSUM_LEN);
        out.push(SNAPSHOT_VERSION);
        out.extend_from_slice(&payload);
        let checksum = Sha256::digest(&out);
        out.extend_from_slice(&checksum);
        Ok(out)
    }

    /// Parse bytes produced by [`AddressManagerSnapshot::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self, AddressManagerError> {
        if bytes.len() < 1 + CHECKSUM_LEN {
            return Err(AddressManagerError::Snapshot("truncated snapshot".to_string()));
        }
        let (body, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
        if Sha256::digest(body).as_slice() != checksum {
            return Err(AddressManagerError::Snapshot("checksum mismatch".to_string()));
        }
        if body[0] != SNAPSHOT_VERSION {
            return Err(AddressManagerError::Snapshot(format!(
                "unsupported snapshot version {}",
                body[0]
            )));
        }
        bincode::deserialize(&body[1..])
            .map_err(|e| AddressManagerError::Snapshot(format!("decode failed: {}", e)))
    }
}

fn snapshot_slots(table: &AddressTable) -> Vec<SnapshotSlot> {
    table
        .occupied_slots()
        .map(|(slot, id)| SnapshotSlot {
            bucket: slot.bucket as u32,
            position: slot.position as u32,
            id,
        })
        .collect()
}

fn corrupt(reason: impl Into<String>) -> AddressManagerError {
    let reason = reason.into();
    warn!("[addrman] Rejecting snapshot: {}", reason);
    AddressManagerError::Snapshot(reason)
}

impl AddressManager {
    /// Copy the full state.
    pub fn snapshot(&self) -> AddressManagerSnapshot {
        AddressManagerSnapshot {
            key: self.hasher.key(),
            new_bucket_count: self.new_table.bucket_count() as u32,
            tried_bucket_count: self.tried_table.bucket_count() as u32,
            bucket_size: self.new_table.bucket_size() as u32,
            records: self.records.iter().map(|(id, r)| (*id, r.clone())).collect(),
            new_slots: snapshot_slots(&self.new_table),
            tried_slots: snapshot_slots(&self.tried_table),
            last_good: self.last_good,
            tried_collisions: self.tried_collisions,
        }
    }

    /// Rebuild a manager from a snapshot.
    ///
    /// When the snapshot's table shape matches `config` and the key is
    /// kept, slots are restored verbatim and must pass the consistency
    /// check. Otherwise (different shape, or `persist_key == false`) every
    /// record is placed again under the current key.
    pub fn restore(
        snapshot: AddressManagerSnapshot,
        config: AddressManagerConfig,
        rng: &dyn RandomSource,
    ) -> Result<Self, AddressManagerError> {
        config.validate()?;

        let rebucket = requires_rebucket(&snapshot, &config);
        let key = if config.persist_key { snapshot.key } else { rng.random_key() };

        let mut manager = AddressManager::new(config, key)?;
        manager.last_good = snapshot.last_good;
        manager.tried_collisions = snapshot.tried_collisions;

        let mut records = BTreeMap::new();
        let mut index = HashMap::new();
        for (id, record) in snapshot.records {
            if index.insert(record.address, id).is_some() {
                return Err(corrupt(format!("duplicate address {}", record.address)));
            }
            if records.insert(id, record).is_some() {
                return Err(corrupt(format!("duplicate record id {}", id)));
            }
        }
        manager.next_id = records.keys().next_back().map_or(0, |id| id.0 + 1);
        manager.records = records;
        manager.index = index;

        if rebucket {
            manager.rebucket();
        } else {
            manager.restore_slots(&snapshot.new_slots, &snapshot.tried_slots)?;
            check_all_invariants(&manager)
                .map_err(|violation| corrupt(format!("consistency check failed: {}", violation)))?;
        }

        info!(
            "[addrman] Restored {} addresses ({} new, {} tried)",
            manager.records.len(),
            manager.new_count,
            manager.tried_count
        );
        Ok(manager)
    }

    fn restore_slots(
        &mut self,
        new_slots: &[SnapshotSlot],
        tried_slots: &[SnapshotSlot],
    ) -> Result<(), AddressManagerError> {
        for (table, slots) in [(&mut self.new_table, new_slots), (&mut self.tried_table, tried_slots)] {
            for slot in slots {
                let (bucket, position) = (slot.bucket as usize, slot.position as usize);
                if bucket >= table.bucket_count() || position >= table.bucket_size() {
                    return Err(corrupt(format!(
                        "slot {}[{}][{}] out of range",
                        table.kind().name(),
                        bucket,
                        position
                    )));
                }
                if !self.records.contains_key(&slot.id) {
                    return Err(corrupt(format!("slot references unknown record {}", slot.id)));
                }
                let outcome = table.place(SlotPosition::new(bucket, position), slot.id, |_| false);
                if outcome != PlaceOutcome::Inserted {
                    return Err(corrupt(format!(
                        "slot {}[{}][{}] listed twice",
                        table.kind().name(),
                        bucket,
                        position
                    )));
                }
            }
        }

        self.new_count = self.records.values().filter(|r| !r.in_tried).count();
        self.tried_count = self.records.values().filter(|r| r.in_tried).count();
        Ok(())
    }

    /// Place every record again under the current key and shape.
    ///
    /// Tried records keep Tried if their slot is free, otherwise they fall
    /// back to New. New records get a single reference; those whose slot is
    /// already taken are dropped.
    fn rebucket(&mut self) {
        self.new_table.clear();
        self.tried_table.clear();
        self.new_count = 0;
        self.tried_count = 0;

        let ids: Vec<AddressId> = self.records.keys().copied().collect();
        let mut discarded = Vec::new();

        for id in ids {
            let Some(record) = self.records.get_mut(&id) else {
                continue;
            };
            let address = record.address;
            let source = record.source;
            record.ref_count = 0;

            if record.in_tried {
                let bucket = self.hasher.tried_bucket(&address, &self.config);
                let position = self.hasher.position(false, bucket, &address, &self.config);
                let slot = SlotPosition::new(bucket, position);
                if self.tried_table.place(slot, id, |_| false) == PlaceOutcome::Inserted {
                    self.tried_count += 1;
                    continue;
                }
                record.in_tried = false;
            }

            let bucket = self.hasher.new_bucket(&address, &source, &self.config);
            let position = self.hasher.position(true, bucket, &address, &self.config);
            let slot = SlotPosition::new(bucket, position);
            if self.new_table.place(slot, id, |_| false) == PlaceOutcome::Inserted {
                record.ref_count = 1;
                self.new_count += 1;
            } else {
                discarded.push(id);
            }
        }

        for id in &discarded {
            if let Some(record) = self.records.remove(id) {
                self.index.remove(&record.address);
            }
        }
        if !discarded.is_empty() {
            info!(
                "[addrman] Rebucketing discarded {} addresses on slot collisions",
                discarded.len()
            );
        }
    }
}

/// Whether restoring `snapshot` under `config` places records afresh
/// instead of restoring slots verbatim.
pub fn requires_rebucket(snapshot: &AddressManagerSnapshot, config: &AddressManagerConfig) -> bool {
    !config.persist_key
        || snapshot.new_bucket_count as usize != config.new_bucket_count
        || snapshot.tried_bucket_count as usize != config.tried_bucket_count
        || snapshot.bucket_size as usize != config.bucket_size
}
