//! Structural invariants of the address manager.
//!
//! The check never repairs anything: a violation means a bug in this crate
//! or a corrupt snapshot.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use super::manager::AddressManager;
use super::table::{AddressTable, SlotPosition, TableKind};
use crate::domain::AddressId;

/// Counts reported by a successful consistency check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsistencyReport {
    pub new: usize,
    pub tried: usize,
    pub total: usize,
}

/// A broken structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("bucketing key is unset")]
    NullKey,

    #[error("{table} table has {actual} buckets of {size}, configured {expected}")]
    TableDimensions {
        table: &'static str,
        expected: usize,
        actual: usize,
        size: usize,
    },

    #[error("counters say new {new} + tried {tried}, but {total} records exist")]
    CountMismatch { new: usize, tried: usize, total: usize },

    #[error("{table} table has {occupied} occupied slots, records account for {expected}")]
    Occupancy {
        table: &'static str,
        occupied: usize,
        expected: usize,
    },

    #[error("record {id} is indexed under a different address")]
    IndexMismatch { id: AddressId },

    #[error("record {id} is referenced from both tables")]
    InBothTables { id: AddressId },

    #[error("record {id} is in no table")]
    Orphan { id: AddressId },

    #[error("record {id} has ref count {recorded}, found in {actual} new slots")]
    RefCount {
        id: AddressId,
        recorded: u32,
        actual: u32,
    },

    #[error("record {id} has ref count {ref_count} above the cap of {cap}")]
    RefCountAboveCap { id: AddressId, ref_count: u32, cap: u32 },

    #[error("tried record {id} occupies {slots} tried slots")]
    TriedSlots { id: AddressId, slots: usize },

    #[error("{table}[{bucket}][{position}] references unknown record {id}")]
    DanglingSlot {
        table: &'static str,
        bucket: usize,
        position: usize,
        id: AddressId,
    },

    #[error("{table}[{bucket}][{position}] holds {id}, which hashes elsewhere")]
    MisplacedSlot {
        table: &'static str,
        bucket: usize,
        position: usize,
        id: AddressId,
    },
}

/// INVARIANT: the key is not all zeroes.
fn invariant_key_set(manager: &AddressManager) -> Result<(), InvariantViolation> {
    if manager.hasher.key() == [0u8; 16] {
        return Err(InvariantViolation::NullKey);
    }
    Ok(())
}

/// INVARIANT: tables have the configured shape.
fn invariant_dimensions(manager: &AddressManager) -> Result<(), InvariantViolation> {
    let config = &manager.config;
    for (table, expected) in [
        (&manager.new_table, config.new_bucket_count),
        (&manager.tried_table, config.tried_bucket_count),
    ] {
        if table.bucket_count() != expected || table.bucket_size() != config.bucket_size {
            return Err(InvariantViolation::TableDimensions {
                table: table.kind().name(),
                expected,
                actual: table.bucket_count(),
                size: table.bucket_size(),
            });
        }
    }
    Ok(())
}

/// INVARIANT: per-record flags agree with the counters and the index.
fn invariant_records(manager: &AddressManager) -> Result<(), InvariantViolation> {
    let cap = manager.config.new_buckets_per_address;
    let mut new = 0;
    let mut tried = 0;

    for (id, record) in &manager.records {
        if manager.index.get(&record.address) != Some(id) {
            return Err(InvariantViolation::IndexMismatch { id: *id });
        }
        if record.in_tried {
            if record.ref_count != 0 {
                return Err(InvariantViolation::InBothTables { id: *id });
            }
            tried += 1;
        } else {
            if record.ref_count == 0 {
                return Err(InvariantViolation::Orphan { id: *id });
            }
            if record.ref_count > cap {
                return Err(InvariantViolation::RefCountAboveCap {
                    id: *id,
                    ref_count: record.ref_count,
                    cap,
                });
            }
            new += 1;
        }
    }

    let total = manager.records.len();
    if new != manager.new_count
        || tried != manager.tried_count
        || manager.index.len() != total
        || new + tried != total
    {
        return Err(InvariantViolation::CountMismatch {
            new: manager.new_count,
            tried: manager.tried_count,
            total,
        });
    }
    Ok(())
}

/// Walk one table: every slot points at a live record of the right table,
/// at the position the hasher assigns. Returns references per id.
fn walk_table(
    manager: &AddressManager,
    table: &AddressTable,
) -> Result<HashMap<AddressId, u32>, InvariantViolation> {
    let kind = table.kind();
    let mut references: HashMap<AddressId, u32> = HashMap::new();

    for (SlotPosition { bucket, position }, id) in table.occupied_slots() {
        let dangling = || InvariantViolation::DanglingSlot {
            table: kind.name(),
            bucket,
            position,
            id,
        };
        let misplaced = || InvariantViolation::MisplacedSlot {
            table: kind.name(),
            bucket,
            position,
            id,
        };

        let record = manager.records.get(&id).ok_or_else(dangling)?;
        let in_new_table = kind == TableKind::New;
        if record.in_tried == in_new_table {
            return Err(InvariantViolation::InBothTables { id });
        }

        let address = &record.address;
        let expected_position = manager
            .hasher
            .position(in_new_table, bucket, address, &manager.config);
        if expected_position != position {
            return Err(misplaced());
        }
        if kind == TableKind::Tried && manager.hasher.tried_bucket(address, &manager.config) != bucket {
            return Err(misplaced());
        }

        *references.entry(id).or_default() += 1;
    }
    Ok(references)
}

/// INVARIANT: slot references agree with the records.
fn invariant_slots(manager: &AddressManager) -> Result<(), InvariantViolation> {
    let new_refs = walk_table(manager, &manager.new_table)?;
    let tried_refs = walk_table(manager, &manager.tried_table)?;

    for (id, record) in &manager.records {
        if record.in_tried {
            let slots = tried_refs.get(id).copied().unwrap_or(0) as usize;
            if slots != 1 {
                return Err(InvariantViolation::TriedSlots { id: *id, slots });
            }
        } else {
            let actual = new_refs.get(id).copied().unwrap_or(0);
            if actual != record.ref_count {
                return Err(InvariantViolation::RefCount {
                    id: *id,
                    recorded: record.ref_count,
                    actual,
                });
            }
        }
    }

    let expected_new: usize = manager.records.values().map(|r| r.ref_count as usize).sum();
    if manager.new_table.count() != expected_new {
        return Err(InvariantViolation::Occupancy {
            table: TableKind::New.name(),
            occupied: manager.new_table.count(),
            expected: expected_new,
        });
    }
    if manager.tried_table.count() != manager.tried_count {
        return Err(InvariantViolation::Occupancy {
            table: TableKind::Tried.name(),
            occupied: manager.tried_table.count(),
            expected: manager.tried_count,
        });
    }
    Ok(())
}

/// Check all structural invariants.
pub(crate) fn check_all_invariants(
    manager: &AddressManager,
) -> Result<ConsistencyReport, InvariantViolation> {
    invariant_key_set(manager)?;
    invariant_dimensions(manager)?;
    invariant_records(manager)?;
    invariant_slots(manager)?;

    Ok(ConsistencyReport {
        new: manager.new_count,
        tried: manager.tried_count,
        total: manager.records.len(),
    })
}
