//! Shared helpers for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use qc_addrman::adapters::SeededRandomSource;
use qc_addrman::{AddressManagerConfig, AddressManagerService, TimeSource, Timestamp};

pub const NOW: u64 = 1_700_000_000;

/// Clock the test moves by hand.
#[derive(Debug)]
pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub fn new(secs: u64) -> Self {
        Self(AtomicU64::new(secs))
    }

    pub fn advance(&self, secs: u64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.0.load(Ordering::SeqCst))
    }
}

pub fn service_with(config: AddressManagerConfig, seed: u64) -> (AddressManagerService, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(NOW));
    let service = AddressManagerService::new(
        config,
        clock.clone(),
        Arc::new(SeededRandomSource::new(seed)),
    )
    .unwrap();
    (service, clock)
}

pub fn service() -> (AddressManagerService, Arc<ManualClock>) {
    service_with(AddressManagerConfig::default(), 42)
}
