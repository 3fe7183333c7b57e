//! Tests for the JSON façade
use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::adapters::SeededRandomSource;
use crate::domain::{AddressManagerConfig, NetAddress, PeerAddress, ServiceFlags};
use crate::service::AddressManagerService;
use crate::test_utils::FixedTimeSource;

const NOW: u64 = 1_700_000_000;

fn handler() -> AddressManagerHandler<AddressManagerService> {
    let service = AddressManagerService::new(
        AddressManagerConfig::default(),
        Arc::new(FixedTimeSource::new(NOW)),
        Arc::new(SeededRandomSource::new(42)),
    )
    .unwrap();
    AddressManagerHandler::new(service)
}

fn call(handler: &AddressManagerHandler<AddressManagerService>, method: &str, params: serde_json::Value) -> Result<serde_json::Value, ApiQueryError> {
    handle_api_query(handler, method, &params)
}

// =============================================================================
// add_address
// =============================================================================

#[test]
fn test_add_address_reports_success() {
    let h = handler();
    let first = call(&h, "addpeeraddress", json!({"address": "1.2.3.4", "port": 8333})).unwrap();
    assert_eq!(first, json!({"success": true}));

    let again = call(&h, "addpeeraddress", json!({"address": "1.2.3.4", "port": 8333})).unwrap();
    assert_eq!(again, json!({"success": false}));
}

#[test]
fn test_add_unroutable_is_soft_failure() {
    let h = handler();
    let result = call(&h, "add_address", json!({"address": "10.0.0.1", "port": 8333})).unwrap();
    assert_eq!(result, json!({"success": false}));
}

#[test]
fn test_port_out_of_range_is_json_integer_error() {
    let h = handler();
    for port in [json!(65536), json!(-1)] {
        let err = call(&h, "addpeeraddress", json!({"address": "1.2.3.4", "port": port})).unwrap_err();
        assert_eq!(err.code, RPC_MISC_ERROR);
        assert_eq!(err.message, "JSON integer out of range");
    }
}

#[test]
fn test_empty_address_is_invalid_parameter() {
    let h = handler();
    let err = call(&h, "addpeeraddress", json!({"address": "", "port": 8333})).unwrap_err();
    assert_eq!(err.code, RPC_INVALID_PARAMETER);
}

#[test]
fn test_wrong_parameter_types() {
    let h = handler();
    let err = call(&h, "addpeeraddress", json!({"address": 5, "port": 8333})).unwrap_err();
    assert_eq!(err.code, RPC_TYPE_ERROR);
    let err = call(&h, "addpeeraddress", json!({"address": "1.2.3.4", "port": "80"})).unwrap_err();
    assert_eq!(err.code, RPC_TYPE_ERROR);
}

// =============================================================================
// select
// =============================================================================

#[test]
fn test_select_shape() {
    let h = handler();
    call(&h, "addpeeraddress", json!({"address": "1.2.3.4", "port": 8333})).unwrap();

    let result = call(&h, "getnodeaddresses", json!({"count": 0})).unwrap();
    let entries = result.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0],
        json!({
            "time": NOW,
            "services": "0000000000000009",
            "servicesnames": ["NETWORK", "WITNESS"],
            "address": "1.2.3.4",
            "port": 8333,
            "network": "ipv4",
        })
    );

    let peer = PeerAddress::new(NetAddress::v4(1, 2, 3, 4), 8333);
    h.service().set_services(&peer, ServiceFlags::NETWORK | ServiceFlags(1 << 5));
    let result = call(&h, "getnodeaddresses", json!({})).unwrap();
    assert_eq!(result[0]["services"], json!("0000000000000021"));
    assert_eq!(result[0]["servicesnames"], json!(["NETWORK", "UNKNOWN[2^5]"]));
}

#[test]
fn test_select_network_filter() {
    let h = handler();
    call(&h, "addpeeraddress", json!({"address": "1.2.3.4", "port": 8333})).unwrap();
    call(
        &h,
        "addpeeraddress",
        json!({"address": "1233:3432:2434:2343:3234:2345:6546:4534", "port": 8333}),
    )
    .unwrap();

    let ipv6 = call(&h, "getnodeaddresses", json!({"count": 0, "network": "ipv6"})).unwrap();
    let ipv6 = ipv6.as_array().unwrap();
    assert_eq!(ipv6.len(), 1);
    assert_eq!(ipv6[0]["network"], "ipv6");
    assert_eq!(ipv6[0]["address"], "1233:3432:2434:2343:3234:2345:6546:4534");

    for network in ["onion", "i2p", "cjdns"] {
        let result = call(&h, "getnodeaddresses", json!({"count": 0, "network": network})).unwrap();
        assert_eq!(result, json!([]));
    }
}

#[test]
fn test_select_invalid_arguments() {
    let h = handler();
    let err = call(&h, "getnodeaddresses", json!({"count": -1})).unwrap_err();
    assert_eq!(err.code, RPC_INVALID_PARAMETER);
    assert_eq!(err.message, "Address count out of range");

    let err = call(&h, "getnodeaddresses", json!({"count": 1, "network": "Foo"})).unwrap_err();
    assert_eq!(err.code, RPC_INVALID_PARAMETER);
    assert_eq!(err.message, "Network not recognized: Foo");
}

// =============================================================================
// diagnostics
// =============================================================================

#[test]
fn test_check_consistency_counts() {
    let h = handler();
    call(&h, "addpeeraddress", json!({"address": "1.2.3.4", "port": 8333})).unwrap();
    call(&h, "addpeeraddress", json!({"address": "5.6.7.8", "port": 8333, "tried": true})).unwrap();

    let report = call(&h, "checkaddrman", json!({})).unwrap();
    assert_eq!(report, json!({"new": 1, "tried": 1, "total": 2}));

    let stats = call(&h, "get_stats", json!({})).unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["tried_collisions"], 0);
}

#[test]
fn test_decode_services() {
    let h = handler();
    let result = call(&h, "decode_services", json!({"services": "0000000000000009"})).unwrap();
    assert_eq!(
        result,
        json!({"services": "0000000000000009", "servicesnames": ["NETWORK", "WITNESS"]})
    );
    let err = call(&h, "decode_services", json!({"services": "zz"})).unwrap_err();
    assert_eq!(err.code, RPC_INVALID_PARAMETER);
}

#[test]
fn test_unknown_method() {
    let h = handler();
    let err = call(&h, "getpeerinfo", json!({})).unwrap_err();
    assert_eq!(err.code, RPC_METHOD_NOT_FOUND);
    assert_eq!(call(&h, "ping", json!({})).unwrap()["status"], "ok");
}

#[test]
fn test_internal_errors_map_to_internal_code() {
    let err: ApiQueryError = crate::domain::AddressManagerError::Storage("disk".into()).into();
    assert_eq!(err.code, RPC_INTERNAL_ERROR);
}
