// ── Device domain types ──

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

use super::row::PointRecord;
use crate::registry::DeviceRegistry;

/// Identity of a discovered device. The same id at two addresses is two keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey {
    pub id: String,
    pub address: String,
}

impl DeviceKey {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.address)
    }
}

/// A field device found by a scan or added by hand, with its registry.
#[derive(Debug, Clone, Serialize)]
pub struct Device {
    pub id: String,
    pub address: String,
    pub name: Option<String>,
    pub vendor_id: Option<String>,
    pub max_apdu_length: Option<String>,
    pub segmentation: Option<String>,
    /// Platform the device was discovered through.
    pub platform_uuid: String,
    pub show_points: bool,
    /// Points are currently streaming in for this device.
    pub configuring: bool,
    pub registry: DeviceRegistry,
    pub selected_points: Vec<String>,
}

impl Device {
    pub fn new(key: DeviceKey, platform_uuid: impl Into<String>, key_props: Vec<String>) -> Self {
        Self {
            id: key.id,
            address: key.address,
            name: None,
            vendor_id: None,
            max_apdu_length: None,
            segmentation: None,
            platform_uuid: platform_uuid.into(),
            show_points: false,
            configuring: false,
            registry: DeviceRegistry::new(key_props),
            selected_points: Vec::new(),
        }
    }

    pub(crate) fn from_announcement(
        announcement: DeviceAnnouncement,
        platform_uuid: &str,
        key_props: Vec<String>,
    ) -> Self {
        let mut device = Self::new(
            DeviceKey::new(announcement.device_id, announcement.address),
            platform_uuid,
            key_props,
        );
        device.name = announcement.device_name;
        device.vendor_id = announcement.vendor_id;
        device.max_apdu_length = announcement.max_apdu_length;
        device.segmentation = announcement.segmentation_supported;
        device
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(&self.id, &self.address)
    }

    pub fn matches(&self, key: &DeviceKey) -> bool {
        self.id == key.id && self.address == key.address
    }
}

// ── Stream payloads ──────────────────────────────────────────────────

/// Payload on the device channel.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAnnouncement {
    #[serde(deserialize_with = "lenient_string")]
    pub device_id: String,
    #[serde(deserialize_with = "lenient_string")]
    pub address: String,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub device_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub vendor_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub max_apdu_length: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub segmentation_supported: Option<String>,
    /// Present only on point payloads that leak onto the device channel.
    #[serde(default)]
    results: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("unparseable payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("payload is a point record, not a device announcement")]
    NotADevice,
}

impl DeviceAnnouncement {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        let announcement: Self = serde_json::from_str(raw)?;
        if announcement.results.is_some() {
            return Err(PayloadError::NotADevice);
        }
        Ok(announcement)
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(&self.device_id, &self.address)
    }
}

/// Status value that closes a device's point stream.
pub const POINTS_COMPLETE: &str = "COMPLETE";

/// Payload on the point channel.
#[derive(Debug, Clone, Deserialize)]
pub struct PointAnnouncement {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub device_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub address: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub results: IndexMap<String, serde_json::Value>,
}

impl PointAnnouncement {
    pub fn parse(raw: &str) -> Result<Self, PayloadError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_complete(&self) -> bool {
        self.status.as_deref() == Some(POINTS_COMPLETE)
    }

    pub fn into_record(self) -> PointRecord {
        PointRecord::new(
            self.results
                .into_iter()
                .map(|(label, value)| (label, value_to_string(value))),
        )
    }
}

pub(crate) fn value_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(de)?;
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn lenient_opt_string<'de, D: Deserializer<'de>>(de: D) -> Result<Option<String>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(de)?;
    Ok(value.and_then(|v| match v {
        serde_json::Value::Null => None,
        other => Some(value_to_string(other)),
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn numeric_device_id_is_stringified() {
        let a = DeviceAnnouncement::parse(
            r#"{"device_id": 150, "address": "10.0.0.5", "vendor_id": 15, "max_apdu_length": 1024}"#,
        )
        .unwrap();
        assert_eq!(a.device_id, "150");
        assert_eq!(a.vendor_id.as_deref(), Some("15"));
        assert_eq!(a.key(), DeviceKey::new("150", "10.0.0.5"));
    }

    #[test]
    fn point_payload_is_not_a_device() {
        let err = DeviceAnnouncement::parse(
            r#"{"device_id": 150, "address": "10.0.0.5", "results": {"Index": 1}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, PayloadError::NotADevice));
    }

    #[test]
    fn point_results_keep_arrival_order() {
        let p = PointAnnouncement::parse(
            r#"{"device_id": 150, "address": "10.0.0.5",
                "results": {"Volttron Point Name": "A", "Units": "degF", "Index": 3, "Notes": null}}"#,
        )
        .unwrap();
        let record = p.into_record();
        let labels: Vec<_> = record.attributes.keys().cloned().collect();
        assert_eq!(labels, vec!["Volttron Point Name", "Units", "Index", "Notes"]);
        assert_eq!(record.get("index"), Some("3"));
        assert_eq!(record.get("notes"), Some(""));
    }

    #[test]
    fn complete_marker_detected() {
        let p = PointAnnouncement::parse(
            r#"{"device_id": 150, "address": "10.0.0.5", "status": "COMPLETE", "results": {}}"#,
        )
        .unwrap();
        assert!(p.is_complete());
    }
}
