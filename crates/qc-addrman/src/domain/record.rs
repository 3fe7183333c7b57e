//! Address record: one peer address plus connection bookkeeping.

use serde::{Deserialize, Serialize};

use super::address_manager::AddressManagerConfig;
use super::{NetAddress, Network, PeerAddress, ServiceFlags, Timestamp};

/// Seconds in a day.
pub(crate) const DAY: u64 = 24 * 60 * 60;
/// Seconds in an hour.
pub(crate) const HOUR: u64 = 60 * 60;
/// Seconds in a minute.
pub(crate) const MINUTE: u64 = 60;

/// A single stored address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    /// Address and port; the identity key.
    pub address: PeerAddress,
    /// Advertised services.
    pub services: ServiceFlags,
    /// Last time the address was seen alive.
    pub time: Timestamp,
    /// Peer that told us about this address.
    pub source: NetAddress,
    /// Last connection attempt.
    pub last_try: Option<Timestamp>,
    /// Last counted failed attempt.
    pub last_count_attempt: Option<Timestamp>,
    /// Last successful connection.
    pub last_success: Option<Timestamp>,
    /// Failed attempts since the last success.
    pub attempts: u32,
    /// Number of new-table slots referencing this record.
    pub(crate) ref_count: u32,
    /// Whether the record lives in the tried table.
    pub(crate) in_tried: bool,
}

impl AddressRecord {
    /// Create a record that is not yet in any table.
    pub fn new(address: PeerAddress, source: NetAddress, services: ServiceFlags, time: Timestamp) -> Self {
        Self {
            address,
            services,
            time,
            source,
            last_try: None,
            last_count_attempt: None,
            last_success: None,
            attempts: 0,
            ref_count: 0,
            in_tried: false,
        }
    }

    /// Network class reported for this record.
    pub fn network(&self) -> Network {
        self.address.addr.net_class()
    }

    /// Whether the record is in the tried table.
    pub fn is_tried(&self) -> bool {
        self.in_tried
    }

    /// Number of new-table slots referencing this record.
    pub fn new_references(&self) -> u32 {
        self.ref_count
    }

    /// Whether the record is not worth keeping or sharing.
    ///
    /// Anything tried within the last minute is never terrible.
    pub fn is_terrible(&self, now: Timestamp, config: &AddressManagerConfig) -> bool {
        if let Some(last_try) = self.last_try {
            if now.secs_since(last_try) <= MINUTE {
                return false;
            }
        }

        // Came in a flying DeLorean
        if self.time > now.add_secs(10 * MINUTE) {
            return true;
        }

        if now.secs_since(self.time) > config.horizon_days * DAY {
            return true;
        }

        if self.last_success.is_none() && self.attempts >= config.retries {
            return true;
        }

        let last_success = self.last_success.unwrap_or(Timestamp::ZERO);
        now.secs_since(last_success) > config.min_fail_days * DAY && self.attempts >= config.max_failures
    }

    /// Relative chance of this record being chosen for a connection.
    pub fn chance(&self, now: Timestamp) -> f64 {
        let mut chance = 1.0;

        // Deprioritize very recent attempts
        if let Some(last_try) = self.last_try {
            if now.secs_since(last_try) < 10 * MINUTE {
                chance *= 0.01;
            }
        }

        // Deprioritize 66% after each failed attempt, capped at 1/28th
        chance * 0.66f64.powi(self.attempts.min(8) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn record() -> AddressRecord {
        let addr = PeerAddress::new(NetAddress::v4(1, 2, 3, 4), 8333);
        AddressRecord::new(addr, addr.addr, ServiceFlags::NETWORK, Timestamp::new(NOW))
    }

    #[test]
    fn test_fresh_record_is_not_terrible() {
        let config = AddressManagerConfig::default();
        assert!(!record().is_terrible(Timestamp::new(NOW), &config));
    }

    #[test]
    fn test_future_timestamp_is_terrible() {
        let config = AddressManagerConfig::default();
        let mut rec = record();
        rec.time = Timestamp::new(NOW + 11 * MINUTE);
        assert!(rec.is_terrible(Timestamp::new(NOW), &config));
    }

    #[test]
    fn test_stale_record_is_terrible() {
        let config = AddressManagerConfig::default();
        let rec = record();
        let later = Timestamp::new(NOW + (config.horizon_days + 1) * DAY);
        assert!(rec.is_terrible(later, &config));
    }

    #[test]
    fn test_repeated_failures_without_success_are_terrible() {
        let config = AddressManagerConfig::default();
        let mut rec = record();
        rec.attempts = config.retries;
        rec.last_try = Some(Timestamp::new(NOW - HOUR));
        assert!(rec.is_terrible(Timestamp::new(NOW), &config));
    }

    #[test]
    fn test_recent_attempt_shields_record() {
        let config = AddressManagerConfig::default();
        let mut rec = record();
        rec.attempts = config.retries;
        rec.last_try = Some(Timestamp::new(NOW - 30));
        assert!(!rec.is_terrible(Timestamp::new(NOW), &config));
    }

    #[test]
    fn test_chance_decays_with_attempts() {
        let now = Timestamp::new(NOW);
        let mut rec = record();
        let fresh = rec.chance(now);
        rec.attempts = 2;
        assert!(rec.chance(now) < fresh);
        rec.attempts = 100;
        let capped = rec.chance(now);
        rec.attempts = 8;
        assert_eq!(rec.chance(now), capped);
    }

    #[test]
    fn test_recent_try_lowers_chance() {
        let now = Timestamp::new(NOW);
        let mut rec = record();
        rec.last_try = Some(now.sub_secs(MINUTE));
        assert!((rec.chance(now) - 0.01).abs() < 1e-9);
    }
}
