//! Main AddressManager implementation.
//!
//! Reference: Bitcoin Core's `addrman.h`

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use tracing::{debug, error, trace};

use super::config::AddressManagerConfig;
use super::hasher::BucketHasher;
use super::invariants::{check_all_invariants, ConsistencyReport, InvariantViolation};
use super::table::{AddressTable, PlaceOutcome, SlotPosition, TableKind};
use super::types::{AddResult, AddressManagerStats, AddressPosition};
use crate::domain::record::{DAY, HOUR, MINUTE};
use crate::domain::{
    AddressId, AddressManagerError, AddressRecord, NetAddress, Network, PeerAddress, ServiceFlags,
    Timestamp,
};
use crate::ports::RandomSource;

/// Advertised times at or below this are treated as garbage.
pub const MIN_TIMESTAMP: u64 = 100_000_000;

/// Replace implausible advertised times with "five days ago".
pub fn sanitize_time(time: Timestamp, now: Timestamp) -> Timestamp {
    if time.as_secs() <= MIN_TIMESTAMP || time > now.add_secs(10 * MINUTE) {
        now.sub_secs(5 * DAY)
    } else {
        time
    }
}

/// Subtract a gossip penalty without dropping below the plausible range.
fn penalize(time: Timestamp, time_penalty: u64) -> Timestamp {
    Timestamp::new(
        time.as_secs()
            .saturating_sub(time_penalty)
            .max(MIN_TIMESTAMP + 1),
    )
}

/// Address manager with New/Tried segregation
///
/// # Anti-Eclipse Defense
///
/// 1. Gossiped addresses land in the New table, bucketed by the groups of
///    both the address and the peer that sent it
/// 2. Only a successful outbound connection moves an address to Tried
/// 3. All placement is keyed, so an attacker cannot aim at a bucket
#[derive(Debug, Clone)]
pub struct AddressManager {
    pub(super) config: AddressManagerConfig,
    pub(super) hasher: BucketHasher,
    /// Addresses we've heard about but never connected to
    pub(super) new_table: AddressTable,
    /// Addresses we've successfully connected to
    pub(super) tried_table: AddressTable,
    pub(super) records: BTreeMap<AddressId, AddressRecord>,
    pub(super) index: HashMap<PeerAddress, AddressId>,
    pub(super) next_id: u64,
    /// Records with at least one New reference
    pub(super) new_count: usize,
    /// Records in the Tried table
    pub(super) tried_count: usize,
    /// Last time any address was marked good
    pub(super) last_good: Timestamp,
    pub(super) tried_collisions: u64,
}

impl AddressManager {
    /// Create an empty address manager
    pub fn new(config: AddressManagerConfig, key: [u8; 16]) -> Result<Self, AddressManagerError> {
        config.validate()?;
        Ok(Self {
            new_table: AddressTable::new(TableKind::New, config.new_bucket_count, config.bucket_size),
            tried_table: AddressTable::new(
                TableKind::Tried,
                config.tried_bucket_count,
                config.bucket_size,
            ),
            hasher: BucketHasher::new(key),
            records: BTreeMap::new(),
            index: HashMap::new(),
            next_id: 0,
            new_count: 0,
            tried_count: 0,
            last_good: Timestamp::new(1),
            tried_collisions: 0,
            config,
        })
    }

    pub fn config(&self) -> &AddressManagerConfig {
        &self.config
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Add an address learned from `source`.
    ///
    /// `time_penalty` seconds are subtracted from the advertised time unless
    /// the source announces itself.
    #[allow(clippy::too_many_arguments)]
    pub fn add_address(
        &mut self,
        address: PeerAddress,
        source: NetAddress,
        services: ServiceFlags,
        time: Timestamp,
        time_penalty: u64,
        now: Timestamp,
        rng: &dyn RandomSource,
    ) -> AddResult {
        let success = self.add_single(address, source, services, time, time_penalty, now, rng);
        if success {
            trace!("[addrman] Added {} from {}", address, source);
        }
        self.periodic_check(rng);
        AddResult { success }
    }

    /// Add an address and immediately promote it to Tried.
    ///
    /// `success` reports the insertion; promotion only follows a successful
    /// insertion.
    pub fn add_tried(
        &mut self,
        address: PeerAddress,
        source: NetAddress,
        services: ServiceFlags,
        time: Timestamp,
        now: Timestamp,
        rng: &dyn RandomSource,
    ) -> AddResult {
        let result = self.add_address(address, source, services, time, 0, now, rng);
        if result.success {
            self.mark_good(&address, now, rng);
        }
        result
    }

    #[allow(clippy::too_many_arguments)]
    fn add_single(
        &mut self,
        address: PeerAddress,
        source: NetAddress,
        services: ServiceFlags,
        time: Timestamp,
        time_penalty: u64,
        now: Timestamp,
        rng: &dyn RandomSource,
    ) -> bool {
        if !address.addr.is_routable() {
            trace!("[addrman] Ignoring unroutable {}", address);
            return false;
        }

        let time = sanitize_time(time, now);
        // No penalty for self-announcements
        let time_penalty = if address.addr == source { 0 } else { time_penalty };

        let id = match self.index.get(&address).copied() {
            Some(id) => {
                let Some(record) = self.records.get_mut(&id) else {
                    return false;
                };

                let currently_online = now.secs_since(time) < DAY;
                let update_interval = if currently_online { HOUR } else { DAY };
                let refresh_after = record
                    .time
                    .as_secs()
                    .saturating_add(update_interval)
                    .saturating_add(time_penalty);
                if refresh_after < time.as_secs() {
                    record.time = penalize(time, time_penalty);
                }
                record.services |= services;

                if time <= record.time || record.in_tried {
                    return false;
                }
                if record.ref_count >= self.config.new_buckets_per_address {
                    return false;
                }
                // Each extra reference is half as likely as the previous one
                if record.ref_count > 0 && rng.random_bits(record.ref_count) != 0 {
                    return false;
                }
                id
            }
            None => {
                let record = AddressRecord::new(address, source, services, penalize(time, time_penalty));
                let id = self.allocate(record);
                self.new_count += 1;
                id
            }
        };

        let bucket = self.hasher.new_bucket(&address, &source, &self.config);
        let position = self.hasher.position(true, bucket, &address, &self.config);
        let slot = SlotPosition::new(bucket, position);
        let candidate_refs = self.records.get(&id).map_or(0, |r| r.ref_count);

        let outcome = {
            let records = &self.records;
            let config = &self.config;
            self.new_table.place(slot, id, |incumbent| {
                records.get(&incumbent).map_or(true, |existing| {
                    existing.is_terrible(now, config)
                        || (existing.ref_count > 1 && candidate_refs == 0)
                })
            })
        };

        match outcome {
            PlaceOutcome::Inserted => {
                self.add_reference(id);
                true
            }
            PlaceOutcome::Replaced(evicted) => {
                debug!(
                    "[addrman] new[{}][{}]: {} replaces {}",
                    bucket, position, address, evicted
                );
                self.release_reference(evicted);
                self.add_reference(id);
                true
            }
            PlaceOutcome::AlreadyPresent => false,
            PlaceOutcome::Rejected => {
                if candidate_refs == 0 {
                    self.delete(id);
                }
                false
            }
        }
    }

    fn allocate(&mut self, record: AddressRecord) -> AddressId {
        let id = AddressId(self.next_id);
        self.next_id += 1;
        self.index.insert(record.address, id);
        self.records.insert(id, record);
        id
    }

    fn add_reference(&mut self, id: AddressId) {
        if let Some(record) = self.records.get_mut(&id) {
            record.ref_count += 1;
        }
    }

    /// Drop one New reference; a record left with none is discarded.
    fn release_reference(&mut self, id: AddressId) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        record.ref_count = record.ref_count.saturating_sub(1);
        if record.ref_count == 0 {
            self.delete(id);
        }
    }

    /// Remove a New record that no slot references.
    fn delete(&mut self, id: AddressId) {
        if let Some(record) = self.records.remove(&id) {
            self.index.remove(&record.address);
            self.new_count -= 1;
        }
    }

    // =========================================================================
    // CONNECTION OUTCOMES
    // =========================================================================

    /// Record a successful connection and promote the address to Tried.
    ///
    /// Returns `true` only if the address moved tables.
    pub fn mark_good(&mut self, address: &PeerAddress, time: Timestamp, rng: &dyn RandomSource) -> bool {
        let promoted = self.good(address, time);
        self.periodic_check(rng);
        promoted
    }

    fn good(&mut self, address: &PeerAddress, time: Timestamp) -> bool {
        self.last_good = time;

        let Some(id) = self.index.get(address).copied() else {
            return false;
        };
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };

        record.last_success = Some(time);
        record.last_try = Some(time);
        record.attempts = 0;

        if record.in_tried || record.ref_count == 0 {
            return false;
        }

        let bucket = self.hasher.tried_bucket(address, &self.config);
        let position = self.hasher.position(false, bucket, address, &self.config);
        let slot = SlotPosition::new(bucket, position);

        if let Some(incumbent) = self.tried_table.get(slot) {
            let keep_window = self.config.replacement_hours * HOUR;
            let recently_good = self
                .records
                .get(&incumbent)
                .and_then(|r| r.last_success)
                .is_some_and(|success| time.secs_since(success) < keep_window);
            if recently_good {
                self.tried_collisions += 1;
                debug!(
                    "[addrman] tried[{}][{}] collision: keeping {}, {} stays new",
                    bucket, position, incumbent, address
                );
                return false;
            }
        }

        self.make_tried(id, slot);
        true
    }

    /// Move `id` from New into `slot` of Tried, demoting any incumbent.
    fn make_tried(&mut self, id: AddressId, slot: SlotPosition) {
        for new_slot in self.new_table.positions_of(id) {
            self.new_table.remove(new_slot);
        }
        if let Some(record) = self.records.get_mut(&id) {
            record.ref_count = 0;
        }
        self.new_count -= 1;

        if let Some(evicted) = self.tried_table.remove(slot) {
            self.demote(evicted);
        }

        self.tried_table.place(slot, id, |_| false);
        if let Some(record) = self.records.get_mut(&id) {
            record.in_tried = true;
        }
        self.tried_count += 1;
    }

    /// Put an evicted Tried record back into its New bucket.
    fn demote(&mut self, id: AddressId) {
        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        record.in_tried = false;
        self.tried_count -= 1;

        let address = record.address;
        let source = record.source;
        let bucket = self.hasher.new_bucket(&address, &source, &self.config);
        let position = self.hasher.position(true, bucket, &address, &self.config);
        let slot = SlotPosition::new(bucket, position);

        if let Some(occupant) = self.new_table.remove(slot) {
            self.release_reference(occupant);
        }
        self.new_table.place(slot, id, |_| false);
        if let Some(record) = self.records.get_mut(&id) {
            record.ref_count = 1;
        }
        self.new_count += 1;
        debug!(
            "[addrman] Demoted {} from tried to new[{}][{}]",
            address, bucket, position
        );
    }

    /// Record a connection attempt.
    ///
    /// A failure is counted at most once between two successes anywhere in
    /// the manager, so a local outage does not make every address terrible.
    pub fn mark_attempt(
        &mut self,
        address: &PeerAddress,
        success: bool,
        time: Timestamp,
        rng: &dyn RandomSource,
    ) -> bool {
        let last_good = self.last_good;
        let found = match self.lookup_mut(address) {
            Some(record) => {
                record.last_try = Some(time);
                if success {
                    record.last_success = Some(time);
                    record.attempts = 0;
                } else if record.last_count_attempt.map_or(true, |t| t < last_good) {
                    record.last_count_attempt = Some(time);
                    record.attempts += 1;
                }
                true
            }
            None => false,
        };
        self.periodic_check(rng);
        found
    }

    /// Refresh the last-seen time of a connected peer (at most every 20 minutes).
    ///
    /// `time` is the local clock; implausible values are sanitized against
    /// `now` like advertised times.
    pub fn mark_connected(&mut self, address: &PeerAddress, time: Timestamp, now: Timestamp) -> bool {
        let time = sanitize_time(time, now);
        match self.lookup_mut(address) {
            Some(record) => {
                if time.secs_since(record.time) > 20 * MINUTE {
                    record.time = time;
                }
                true
            }
            None => false,
        }
    }

    /// Overwrite the advertised services of a known address.
    pub fn set_services(&mut self, address: &PeerAddress, services: ServiceFlags) -> bool {
        match self.lookup_mut(address) {
            Some(record) => {
                record.services = services;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Random sample of non-terrible addresses.
    ///
    /// `count == 0` means "all". With a `network` filter only records of
    /// that class are returned.
    pub fn select(
        &self,
        count: usize,
        network: Option<Network>,
        now: Timestamp,
        rng: &dyn RandomSource,
    ) -> Vec<AddressRecord> {
        let mut ids: Vec<AddressId> = self.records.keys().copied().collect();
        let limit = if count == 0 { ids.len() } else { count.min(ids.len()) };
        let mut selected = Vec::with_capacity(limit);

        // Partial Fisher-Yates
        for n in 0..ids.len() {
            if selected.len() >= limit {
                break;
            }
            let pick = n + rng.random_usize(ids.len() - n);
            ids.swap(n, pick);

            let Some(record) = self.records.get(&ids[n]) else {
                continue;
            };
            if network.is_some_and(|net| record.network() != net) {
                continue;
            }
            if record.is_terrible(now, &self.config) {
                continue;
            }
            selected.push(record.clone());
        }

        self.periodic_check(rng);
        selected
    }

    /// Pick one address to connect to.
    ///
    /// Tables are chosen 50/50 (unless one is empty or `new_only`), then a
    /// random walk over slots accepts a candidate with probability
    /// `chance * factor`; the factor grows after every rejection so the walk
    /// terminates. Returns the record and its last attempt time.
    pub fn select_for_connection(
        &self,
        new_only: bool,
        now: Timestamp,
        rng: &dyn RandomSource,
    ) -> Option<(AddressRecord, Option<Timestamp>)> {
        if self.records.is_empty() || (new_only && self.new_count == 0) {
            return None;
        }

        let search_tried =
            !new_only && self.tried_count > 0 && (self.new_count == 0 || rng.random_bool());
        let table = if search_tried { &self.tried_table } else { &self.new_table };
        if table.count() == 0 {
            return None;
        }

        let bucket_size = table.bucket_size();
        let mut factor = 1.0f64;
        loop {
            let bucket = rng.random_usize(table.bucket_count());
            let initial = rng.random_usize(bucket_size);
            let found = (0..bucket_size)
                .map(|i| SlotPosition::new(bucket, (initial + i) % bucket_size))
                .find_map(|slot| table.get(slot));
            let Some(record) = found.and_then(|id| self.records.get(&id)) else {
                continue;
            };

            let threshold = factor * record.chance(now) * (1u64 << 30) as f64;
            if (rng.random_bits(30) as f64) < threshold {
                trace!(
                    "[addrman] Selected {} from {} table",
                    record.address,
                    table.kind().name()
                );
                return Some((record.clone(), record.last_try));
            }
            factor *= 1.2;
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Record for `address`, if known.
    pub fn lookup(&self, address: &PeerAddress) -> Option<&AddressRecord> {
        self.index.get(address).and_then(|id| self.records.get(id))
    }

    fn lookup_mut(&mut self, address: &PeerAddress) -> Option<&mut AddressRecord> {
        let id = self.index.get(address)?;
        self.records.get_mut(id)
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.index.contains_key(address)
    }

    /// Table coordinates of `address`.
    pub fn locate(&self, address: &PeerAddress) -> Option<AddressPosition> {
        let id = *self.index.get(address)?;
        let record = self.records.get(&id)?;
        let table = if record.in_tried { &self.tried_table } else { &self.new_table };
        let slot = table.positions_of(id).into_iter().next()?;
        Some(AddressPosition {
            tried: record.in_tried,
            multiplicity: if record.in_tried { 1 } else { record.ref_count },
            bucket: slot.bucket,
            position: slot.position,
        })
    }

    /// Total number of addresses.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of addresses, optionally restricted to a network and table.
    pub fn size(&self, network: Option<Network>, in_new: Option<bool>) -> usize {
        self.records
            .values()
            .filter(|r| network.map_or(true, |net| r.network() == net))
            .filter(|r| in_new.map_or(true, |new| r.in_tried != new))
            .count()
    }

    /// Get statistics
    pub fn stats(&self) -> AddressManagerStats {
        AddressManagerStats {
            new_count: self.new_count,
            tried_count: self.tried_count,
            new_slots_used: self.new_table.count(),
            new_bucket_count: self.config.new_bucket_count,
            tried_bucket_count: self.config.tried_bucket_count,
            bucket_size: self.config.bucket_size,
            tried_collisions: self.tried_collisions,
        }
    }

    // =========================================================================
    // CONSISTENCY
    // =========================================================================

    /// Audit every structural invariant.
    pub fn check_invariants(&self) -> Result<ConsistencyReport, InvariantViolation> {
        debug!(
            "[addrman] CheckAddrman: new {}, tried {}, total {} started",
            self.new_count,
            self.tried_count,
            self.new_count + self.tried_count
        );
        let started = Instant::now();
        let result = check_all_invariants(self);
        match &result {
            Ok(_) => debug!(
                "[addrman] CheckAddrman: completed ({:.2}ms)",
                started.elapsed().as_secs_f64() * 1000.0
            ),
            Err(violation) => error!(
                "[addrman] CheckAddrman: new {}, tried {}, total {} failed: {}",
                self.new_count,
                self.tried_count,
                self.records.len(),
                violation
            ),
        }
        result
    }

    /// Audit and wrap any violation with the current counters.
    pub fn check_consistency(&self) -> Result<ConsistencyReport, AddressManagerError> {
        self.check_invariants()
            .map_err(|violation| AddressManagerError::InternalInconsistency {
                new: self.new_count,
                tried: self.tried_count,
                total: self.records.len(),
                violation,
            })
    }

    /// Run the audit on roughly one in `consistency_check_ratio` operations.
    fn periodic_check(&self, rng: &dyn RandomSource) {
        let ratio = self.config.consistency_check_ratio as usize;
        if ratio == 0 || rng.random_usize(ratio) != 0 {
            return;
        }
        // Failures are already logged at error level
        let _ = self.check_invariants();
    }

    /// Current bucketing key.
    pub fn key(&self) -> [u8; 16] {
        self.hasher.key()
    }
}
