// JSON-RPC envelope and method parameter types.
//
// Field names are the platform's wire names; optional scan bounds are
// omitted rather than sent as null.

use serde::{Deserialize, Serialize};

pub(crate) const JSONRPC_VERSION: &str = "2.0";

/// Outgoing request. The session token rides in the body, not a header.
#[derive(Debug, Serialize)]
pub(crate) struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: String,
    pub method: &'a str,
    pub params: &'a P,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorization: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RpcResponse {
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcErrorBody {
    pub code: i64,
    pub message: String,
}

// ── Method parameters ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

/// `start_bacnet_scan`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanParams {
    pub proxy_identity: String,
    pub platform_uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_device_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_device_id: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_address: Option<String>,
    /// Seconds the proxy listens for I-Am replies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan_length: Option<u32>,
}

/// `publish_bacnet_props`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishParams {
    pub proxy_identity: String,
    pub platform_uuid: String,
    pub device_id: String,
    pub address: String,
}

/// One point in a `fetch_point_details` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointQuery {
    pub point_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
}

/// `fetch_point_details`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailsParams {
    pub proxy_identity: String,
    pub platform_uuid: String,
    pub device_ids: Vec<String>,
    pub points: Vec<PointQuery>,
}

/// `store_agent_config`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentConfig {
    pub platform_uuid: String,
    pub agent_identity: String,
    pub config_name: String,
    pub raw_contents: String,
    pub config_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_params_omit_missing_bounds() {
        let params = ScanParams {
            proxy_identity: "platform.bacnet_proxy".into(),
            platform_uuid: "p1".into(),
            low_device_id: Some(100),
            ..ScanParams::default()
        };
        let value = serde_json::to_value(&params).unwrap_or_default();
        assert_eq!(value["low_device_id"], 100);
        assert!(value.get("high_device_id").is_none());
        assert!(value.get("target_address").is_none());
    }
}
