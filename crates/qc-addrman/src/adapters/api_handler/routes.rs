use serde_json::Value;

use super::types::*;
use crate::domain::ServiceFlags;
use crate::ports::AddressManagerApi;

/// Request handler over any [`AddressManagerApi`].
pub struct AddressManagerHandler<S> {
    service: S,
}

impl<S: AddressManagerApi> AddressManagerHandler<S> {
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Handle `addpeeraddress`: `{"address": str, "port": int, "tried": bool?}`.
    pub fn handle_add_address(&self, params: &Value) -> Result<Value, ApiQueryError> {
        let address = params
            .get("address")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiQueryError::new(RPC_TYPE_ERROR, "Expected type string for address"))?;
        let port = port_param(params)?;
        let tried = match params.get("tried") {
            None | Some(Value::Null) => false,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| ApiQueryError::new(RPC_TYPE_ERROR, "Expected type bool for tried"))?,
        };

        let result = self.service.add_address(address, port, tried)?;
        to_json(&result)
    }

    /// Handle `getnodeaddresses`: `{"count": int?, "network": str?}`.
    pub fn handle_select(&self, params: &Value) -> Result<Value, ApiQueryError> {
        let count = match params.get("count") {
            None | Some(Value::Null) => 1,
            Some(value) => value
                .as_i64()
                .ok_or_else(|| ApiQueryError::new(RPC_TYPE_ERROR, "Expected type number for count"))?,
        };
        let network = match params.get("network") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.as_str().ok_or_else(|| {
                ApiQueryError::new(RPC_TYPE_ERROR, "Expected type string for network")
            })?),
        };

        let records = self.service.select(count, network)?;
        let addresses: Vec<RpcNodeAddress> = records.iter().map(RpcNodeAddress::from).collect();
        to_json(&addresses)
    }

    /// Handle `checkaddrman`.
    pub fn handle_check_consistency(&self) -> Result<Value, ApiQueryError> {
        let report = self.service.check_consistency()?;
        to_json(&report)
    }

    /// Handle `get_stats`.
    pub fn handle_get_stats(&self) -> Result<Value, ApiQueryError> {
        let stats = self.service.stats();
        to_json(&RpcAddrmanStats {
            new: stats.new_count,
            tried: stats.tried_count,
            total: stats.total(),
            new_slots_used: stats.new_slots_used,
            tried_collisions: stats.tried_collisions,
        })
    }

    /// Handle `decode_services`: `{"services": hex}`.
    pub fn handle_decode_services(&self, params: &Value) -> Result<Value, ApiQueryError> {
        let hex = params
            .get("services")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiQueryError::new(RPC_TYPE_ERROR, "Expected type string for services"))?;
        let flags = ServiceFlags::from_hex(hex)
            .map_err(|e| ApiQueryError::new(RPC_INVALID_PARAMETER, e.to_string()))?;
        to_json(&RpcServices {
            services: flags.to_hex(),
            services_names: flags.names(),
        })
    }

    /// Handle ping request (health check).
    pub fn handle_ping(&self) -> Value {
        serde_json::json!({
            "status": "ok",
            "subsystem": "qc-addrman"
        })
    }
}

/// Route one request.
pub fn handle_api_query<S: AddressManagerApi>(
    handler: &AddressManagerHandler<S>,
    method: &str,
    params: &Value,
) -> Result<Value, ApiQueryError> {
    match method {
        "add_address" | "addpeeraddress" => handler.handle_add_address(params),
        "select" | "getnodeaddresses" => handler.handle_select(params),
        "check_consistency" | "checkaddrman" => handler.handle_check_consistency(),
        "get_stats" => handler.handle_get_stats(),
        "decode_services" => handler.handle_decode_services(params),
        "ping" => Ok(handler.handle_ping()),
        _ => Err(ApiQueryError::new(
            RPC_METHOD_NOT_FOUND,
            format!("Method not found: {}", method),
        )),
    }
}

/// Ports must be JSON integers within `0..=65535`.
fn port_param(params: &Value) -> Result<i64, ApiQueryError> {
    let value = params
        .get("port")
        .ok_or_else(|| ApiQueryError::new(RPC_TYPE_ERROR, "Expected type number for port"))?;
    if !value.is_number() {
        return Err(ApiQueryError::new(RPC_TYPE_ERROR, "Expected type number for port"));
    }
    match value.as_i64() {
        Some(port) if (0..=i64::from(u16::MAX)).contains(&port) => Ok(port),
        _ => Err(ApiQueryError::new(RPC_MISC_ERROR, "JSON integer out of range")),
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ApiQueryError> {
    serde_json::to_value(value).map_err(|e| ApiQueryError::new(RPC_INTERNAL_ERROR, e.to_string()))
}
