//! # Address Manager Service
//!
//! The single shared instance of the address manager. Wraps the domain
//! `AddressManager` in a reader-writer lock and supplies time and randomness
//! from the outbound ports.
//!
//! ## Locking
//!
//! Reads (`select`, `lookup`, `check_consistency`, `stats`, `snapshot`) take
//! the read lock; every mutation takes the write lock. No I/O happens under
//! either lock: `save` copies the state under a read lock and encodes and
//! writes after the guard is dropped.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::domain::{
    AddResult, AddressManager, AddressManagerConfig, AddressManagerError, AddressManagerSnapshot,
    AddressManagerStats, AddressRecord, ConsistencyReport, NetAddress, Network, PeerAddress,
    ServiceFlags, Timestamp,
};
use crate::ports::{AddressManagerApi, ConfigProvider, RandomSource, SnapshotStore, TimeSource};

/// Largest count accepted by [`AddressManagerService::select`].
const MAX_SELECT_COUNT: i64 = i32::MAX as i64;

/// One gossiped address: where, what it offers, when it was last seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GossipedAddress {
    pub address: PeerAddress,
    pub services: ServiceFlags,
    pub time: Timestamp,
}

/// Lock-guarded address manager shared by all collaborators.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use qc_addrman::adapters::{OsRandomSource, SystemTimeSource};
/// use qc_addrman::{AddressManagerConfig, AddressManagerService};
///
/// let service = AddressManagerService::new(
///     AddressManagerConfig::default(),
///     Arc::new(SystemTimeSource::new()),
///     Arc::new(OsRandomSource::new()),
/// )?;
/// ```
pub struct AddressManagerService {
    manager: RwLock<AddressManager>,
    time_source: Arc<dyn TimeSource>,
    random: Arc<dyn RandomSource>,
}

impl AddressManagerService {
    /// Create an empty manager with a fresh random key.
    pub fn new(
        config: AddressManagerConfig,
        time_source: Arc<dyn TimeSource>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, AddressManagerError> {
        let manager = AddressManager::new(config, random.random_key())?;
        Ok(Self::from_manager(manager, time_source, random))
    }

    /// Wrap an already built manager.
    pub fn from_manager(
        manager: AddressManager,
        time_source: Arc<dyn TimeSource>,
        random: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            manager: RwLock::new(manager),
            time_source,
            random,
        }
    }

    /// Restore from `store`, or start empty when nothing was saved.
    ///
    /// # Errors
    ///
    /// A snapshot that exists but fails to decode or validate is an error;
    /// it is never silently replaced.
    pub fn load(
        store: &dyn SnapshotStore,
        config: AddressManagerConfig,
        time_source: Arc<dyn TimeSource>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, AddressManagerError> {
        let Some(bytes) = store.load()? else {
            info!("[addrman] No snapshot found, starting with an empty address manager");
            return Self::new(config, time_source, random);
        };

        let snapshot = AddressManagerSnapshot::decode(&bytes)?;
        let manager = AddressManager::restore(snapshot, config, random.as_ref())?;
        info!(
            "[addrman] Loaded {} addresses from snapshot ({} bytes)",
            manager.len(),
            bytes.len()
        );
        Ok(Self::from_manager(manager, time_source, random))
    }

    /// Startup entry point: configuration from `provider`, state from `store`.
    pub fn open(
        provider: &dyn ConfigProvider,
        store: &dyn SnapshotStore,
        time_source: Arc<dyn TimeSource>,
        random: Arc<dyn RandomSource>,
    ) -> Result<Self, AddressManagerError> {
        let config = provider.address_manager_config();
        config.validate()?;
        Self::load(store, config, time_source, random)
    }

    /// Encode the current state and hand it to `store`.
    pub fn save(&self, store: &dyn SnapshotStore) -> Result<(), AddressManagerError> {
        let snapshot = self.snapshot();
        let total = snapshot.records.len();
        let bytes = snapshot.encode()?;
        store.save(&bytes)?;
        info!("[addrman] Saved {} addresses ({} bytes)", total, bytes.len());
        Ok(())
    }

    /// Copy of the state, taken under the read lock.
    pub fn snapshot(&self) -> AddressManagerSnapshot {
        self.manager.read().snapshot()
    }

    fn now(&self) -> Timestamp {
        self.time_source.now()
    }

    // =========================================================================
    // INSERTION
    // =========================================================================

    /// Add one address learned from `source`.
    pub fn add(
        &self,
        address: PeerAddress,
        source: NetAddress,
        services: ServiceFlags,
        time: Timestamp,
        time_penalty: u64,
    ) -> AddResult {
        let now = self.now();
        self.manager
            .write()
            .add_address(address, source, services, time, time_penalty, now, self.random.as_ref())
    }

    /// Add a gossip batch from one source. Returns how many were inserted.
    pub fn add_addresses(
        &self,
        batch: &[GossipedAddress],
        source: NetAddress,
        time_penalty: u64,
    ) -> usize {
        let now = self.now();
        let added = {
            let mut manager = self.manager.write();
            batch
                .iter()
                .filter(|entry| {
                    manager
                        .add_address(
                            entry.address,
                            source,
                            entry.services,
                            entry.time,
                            time_penalty,
                            now,
                            self.random.as_ref(),
                        )
                        .success
                })
                .count()
        };
        if added > 0 {
            debug!(
                "[addrman] Added {} of {} addresses from {}",
                added,
                batch.len(),
                source
            );
        }
        added
    }

    // =========================================================================
    // CONNECTION OUTCOMES
    // =========================================================================

    /// Report the result of an outbound connection.
    ///
    /// Success refreshes services and last-seen time and promotes the address
    /// to Tried; failure counts an attempt.
    pub fn on_connection_outcome(
        &self,
        address: &PeerAddress,
        success: bool,
        services: ServiceFlags,
        time: Timestamp,
    ) {
        let now = self.now();
        let mut manager = self.manager.write();
        let rng = self.random.as_ref();
        if success {
            manager.set_services(address, services);
            manager.mark_good(address, time, rng);
            manager.mark_connected(address, time, now);
        } else {
            manager.mark_attempt(address, false, time, rng);
        }
    }

    /// Promote `address` to Tried.
    pub fn mark_good(&self, address: &PeerAddress) -> bool {
        let now = self.now();
        self.manager.write().mark_good(address, now, self.random.as_ref())
    }

    /// Record a connection attempt.
    pub fn mark_attempt(&self, address: &PeerAddress, success: bool) -> bool {
        let now = self.now();
        self.manager
            .write()
            .mark_attempt(address, success, now, self.random.as_ref())
    }

    /// Refresh the last-seen time of a connected peer.
    pub fn mark_connected(&self, address: &PeerAddress) -> bool {
        let now = self.now();
        self.manager.write().mark_connected(address, now, now)
    }

    pub fn set_services(&self, address: &PeerAddress, services: ServiceFlags) -> bool {
        self.manager.write().set_services(address, services)
    }

    // =========================================================================
    // SELECTION
    // =========================================================================

    /// Pick an address to connect to.
    pub fn select_for_connection(&self, new_only: bool) -> Option<(AddressRecord, Option<Timestamp>)> {
        let now = self.now();
        self.manager
            .read()
            .select_for_connection(new_only, now, self.random.as_ref())
    }

    /// Typed variant of [`AddressManagerApi::select`].
    pub fn select_typed(&self, count: usize, network: Option<Network>) -> Vec<AddressRecord> {
        let now = self.now();
        self.manager
            .read()
            .select(count, network, now, self.random.as_ref())
    }

    /// Total number of addresses.
    pub fn len(&self) -> usize {
        self.manager.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.manager.read().is_empty()
    }

    /// Number of addresses, optionally by network and table.
    pub fn size(&self, network: Option<Network>, in_new: Option<bool>) -> usize {
        self.manager.read().size(network, in_new)
    }
}

impl AddressManagerApi for AddressManagerService {
    fn add_address(&self, address: &str, port: i64, tried: bool) -> Result<AddResult, AddressManagerError> {
        // Validate before taking the lock
        let address = PeerAddress::parse(address, port)?;
        let now = self.now();
        let services = ServiceFlags::DEFAULT_MANUAL;
        let rng = self.random.as_ref();

        let mut manager = self.manager.write();
        let result = if tried {
            manager.add_tried(address, address.addr, services, now, now, rng)
        } else {
            manager.add_address(address, address.addr, services, now, 0, now, rng)
        };
        Ok(result)
    }

    fn select(&self, count: i64, network: Option<&str>) -> Result<Vec<AddressRecord>, AddressManagerError> {
        if !(0..=MAX_SELECT_COUNT).contains(&count) {
            return Err(AddressManagerError::InvalidArgument(
                "Address count out of range".to_string(),
            ));
        }
        let network = network.map(str::parse::<Network>).transpose()?;
        Ok(self.select_typed(count as usize, network))
    }

    fn check_consistency(&self) -> Result<ConsistencyReport, AddressManagerError> {
        self.manager.read().check_consistency()
    }

    fn stats(&self) -> AddressManagerStats {
        self.manager.read().stats()
    }

    fn lookup(&self, address: &PeerAddress) -> Option<AddressRecord> {
        self.manager.read().lookup(address).cloned()
    }
}
