//! # Periodic consistency audit through the public entry points
//!
//! With `consistency_check_ratio = 1` every selection audits the tables and
//! logs the table counts at debug level.

mod common;

use std::io;
use std::sync::{Arc, Mutex};

use common::service_with;
use qc_addrman::{AddressManagerApi, AddressManagerConfig};

const START_LINE: &str = "CheckAddrman: new 1, tried 1, total 2 started";

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with debug logs captured into the returned buffer.
fn capture<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

fn always_audit() -> AddressManagerConfig {
    AddressManagerConfig {
        consistency_check_ratio: 1,
        ..AddressManagerConfig::default()
    }
}

// =============================================================================
// TEST GROUP 1: Audit on selection
// =============================================================================

#[test]
fn test_select_runs_audit_and_logs_counts() {
    let (service, _clock) = service_with(always_audit(), 7);
    assert!(service.add_address("1.2.3.4", 8333, true).unwrap().success);
    assert!(service.add_address("5.6.7.8", 8333, false).unwrap().success);

    let (selected, logs) = capture(|| service.select(0, None));
    assert_eq!(selected.unwrap().len(), 2);
    assert!(logs.contains(START_LINE), "{}", logs);
    assert!(logs.contains("CheckAddrman: completed"), "{}", logs);
}

#[test]
fn test_audit_disabled_logs_nothing() {
    let config = AddressManagerConfig {
        consistency_check_ratio: 0,
        ..AddressManagerConfig::default()
    };
    let (service, _clock) = service_with(config, 7);
    service.add_address("1.2.3.4", 8333, true).unwrap();
    service.add_address("5.6.7.8", 8333, false).unwrap();

    let (_, logs) = capture(|| service.select(0, None));
    assert!(!logs.contains("CheckAddrman"), "{}", logs);
}

#[cfg(feature = "rpc")]
#[test]
fn test_getnodeaddresses_runs_audit_and_logs_counts() {
    use qc_addrman::adapters::{handle_api_query, AddressManagerHandler};
    use serde_json::json;

    let (service, _clock) = service_with(always_audit(), 7);
    let handler = AddressManagerHandler::new(service);
    handle_api_query(&handler, "addpeeraddress", &json!({"address": "1.2.3.4", "port": 8333, "tried": true})).unwrap();
    handle_api_query(&handler, "addpeeraddress", &json!({"address": "5.6.7.8", "port": 8333})).unwrap();

    let (result, logs) = capture(|| handle_api_query(&handler, "getnodeaddresses", &json!({"count": 0})));
    assert_eq!(result.unwrap().as_array().unwrap().len(), 2);
    assert!(logs.contains(START_LINE), "{}", logs);
}
