//! # End-to-end scenarios for the address manager service
//!
//! Drives the service through the same entry points an RPC layer or the
//! connection manager would use.

mod common;

use std::sync::Arc;
use std::thread;

use common::{service, service_with, NOW};
use qc_addrman::{
    AddressManagerApi, AddressManagerConfig, AddressManagerError, GossipedAddress, NetAddress,
    Network, PeerAddress, ServiceFlags, Timestamp,
};

const PORT: i64 = 24156;

// =============================================================================
// TEST GROUP 1: Bulk insertion and selection
// =============================================================================

#[test]
fn test_ten_thousand_addresses_fill_new_table() {
    let (service, _clock) = service();

    for i in 0..10_000u32 {
        let host = format!("{}.{}.1.1", i >> 8, i % 256);
        service.add_address(&host, PORT, false).unwrap();
    }

    let stats = service.stats();
    assert_eq!(stats.tried_count, 0);
    assert!(
        stats.new_count > 5_000 && stats.new_count < 10_000,
        "new count {}",
        stats.new_count
    );

    let all = service.select(0, None).unwrap();
    assert_eq!(all.len(), stats.new_count);
    for record in &all {
        assert_eq!(record.address.port, PORT as u16);
        assert_eq!(record.services, ServiceFlags::DEFAULT_MANUAL);
        assert_eq!(record.time, Timestamp::new(NOW));
        assert_eq!(record.network(), Network::Ipv4);
    }

    assert_eq!(service.select(8, None).unwrap().len(), 8);
    assert_eq!(service.check_consistency().unwrap().total, stats.new_count);
}

#[test]
fn test_select_filters_by_network() {
    let (service, _clock) = service();
    service.add_address("1.2.3.4", 8333, false).unwrap();
    service.add_address("2803:0:1234:abcd::1", 8333, false).unwrap();
    service.add_address("2a01:4f8::2", 8333, true).unwrap();

    let ipv6 = service.select(0, Some("ipv6")).unwrap();
    assert_eq!(ipv6.len(), 2);
    assert!(ipv6.iter().all(|r| r.network() == Network::Ipv6));

    assert_eq!(service.select(0, Some("ipv4")).unwrap().len(), 1);
    assert!(service.select(0, Some("onion")).unwrap().is_empty());
    assert_eq!(service.size(Some(Network::Ipv6), Some(false)), 1);
}

#[test]
fn test_select_rejects_invalid_arguments() {
    let (service, _clock) = service();
    service.add_address("1.2.3.4", 8333, false).unwrap();

    assert_eq!(
        service.select(-1, None).unwrap_err(),
        AddressManagerError::InvalidArgument("Address count out of range".to_string())
    );
    assert_eq!(
        service.select(1, Some("Foo")).unwrap_err(),
        AddressManagerError::UnknownNetwork("Foo".to_string())
    );
}

#[test]
fn test_add_rejects_malformed_input() {
    let (service, _clock) = service();
    assert!(service.add_address("not an address", 8333, false).is_err());
    assert!(service.add_address("", 8333, false).is_err());
    assert!(service.add_address("1.2.3.4", 70_000, false).is_err());
    assert!(service.is_empty());

    // Well-formed but unroutable is a soft failure
    assert!(!service.add_address("127.0.0.1", 8333, false).unwrap().success);
}

// =============================================================================
// TEST GROUP 2: Table transitions
// =============================================================================

#[test]
fn test_tried_then_new_is_refused() {
    let (service, _clock) = service();

    assert!(service.add_address("1.2.3.4", 8333, true).unwrap().success);
    assert!(!service.add_address("1.2.3.4", 8333, false).unwrap().success);
    assert!(!service.add_address("1.2.3.4", 8333, true).unwrap().success);

    let stats = service.stats();
    assert_eq!((stats.new_count, stats.tried_count), (0, 1));

    assert!(service.add_address("5.6.7.8", 8333, false).unwrap().success);
    let report = service.check_consistency().unwrap();
    assert_eq!((report.new, report.tried, report.total), (1, 1, 2));
    assert_eq!(service.len(), 2);
}

#[test]
fn test_connection_outcomes() {
    let (service, clock) = service();
    let good = PeerAddress::new(NetAddress::v4(1, 2, 3, 4), 8333);
    let bad = PeerAddress::new(NetAddress::v4(5, 6, 7, 8), 8333);
    let source = NetAddress::v4(9, 9, 9, 9);
    let batch = [
        GossipedAddress {
            address: good,
            services: ServiceFlags::NETWORK,
            time: Timestamp::new(NOW),
        },
        GossipedAddress {
            address: bad,
            services: ServiceFlags::NETWORK,
            time: Timestamp::new(NOW),
        },
    ];
    assert_eq!(service.add_addresses(&batch, source, 2 * 60 * 60), 2);

    clock.advance(60);
    let now = Timestamp::new(NOW + 60);
    service.on_connection_outcome(&good, true, ServiceFlags::NETWORK | ServiceFlags::WITNESS, now);
    service.on_connection_outcome(&bad, false, ServiceFlags::NONE, now);

    let good_record = service.lookup(&good).unwrap();
    assert!(good_record.is_tried());
    assert_eq!(good_record.services, ServiceFlags::NETWORK | ServiceFlags::WITNESS);
    assert_eq!(good_record.last_success, Some(now));

    let bad_record = service.lookup(&bad).unwrap();
    assert!(!bad_record.is_tried());
    assert_eq!(bad_record.attempts, 1);

    let (picked, _) = service.select_for_connection(false).unwrap();
    assert!(picked.address == good || picked.address == bad);
    assert_eq!(service.select_for_connection(true).unwrap().0.address, bad);
}

#[test]
fn test_small_tables_stay_consistent_under_load() {
    let (service, clock) = service_with(AddressManagerConfig::for_testing(), 3);

    for i in 0..2_000u32 {
        let address = PeerAddress::new(NetAddress::v4(1 + (i % 50) as u8, (i / 50) as u8, 1, 1), 8333);
        let source = NetAddress::v4(200, (i % 7) as u8, 0, 1);
        service.add(address, source, ServiceFlags::NETWORK, Timestamp::new(NOW), 0);
        if i % 5 == 0 {
            service.mark_good(&address);
        }
        if i % 100 == 0 {
            clock.advance(3_600);
        }
    }

    let stats = service.stats();
    let config = AddressManagerConfig::for_testing();
    assert!(stats.tried_count <= config.tried_capacity());
    assert!(stats.new_slots_used <= config.new_capacity());
    assert_eq!(service.check_consistency().unwrap().total, service.len());
}

// =============================================================================
// TEST GROUP 3: Shared access
// =============================================================================

#[test]
fn test_concurrent_writers_and_readers_stay_consistent() {
    let config = AddressManagerConfig {
        consistency_check_ratio: 50,
        ..AddressManagerConfig::default()
    };
    let (service, _clock) = service_with(config, 17);
    let service = Arc::new(service);

    thread::scope(|scope| {
        for worker in 0..4u8 {
            let service = Arc::clone(&service);
            scope.spawn(move || {
                for i in 0..150u8 {
                    let host = format!("{}.{}.3.4", 11 + worker * 20 + i % 20, i);
                    service.add_address(&host, 8333, false).unwrap();
                    if i % 3 == 0 {
                        let peer = PeerAddress::new(NetAddress::parse(&host).unwrap(), 8333);
                        service.mark_good(&peer);
                    }
                    if i % 10 == 0 {
                        let selected = service.select(5, None).unwrap();
                        assert!(selected.len() <= 5);
                    }
                }
            });
        }

        let reader = Arc::clone(&service);
        scope.spawn(move || {
            for _ in 0..100 {
                let report = reader.check_consistency().unwrap();
                assert_eq!(report.new + report.tried, report.total);
                let stats = reader.stats();
                assert_eq!(stats.total(), stats.new_count + stats.tried_count);
                thread::yield_now();
            }
        });
    });

    let report = service.check_consistency().unwrap();
    assert_eq!(report.total, service.len());
    assert!(report.tried > 0);
}
