// ── Cell and column types ──

use serde::{Deserialize, Serialize};

/// Width assigned to a column that has no better hint.
pub const DEFAULT_COLUMN_WIDTH: u16 = 200;

/// Narrowest width a column can be resized to.
pub const MIN_COLUMN_WIDTH: u16 = 100;

/// Turn a column label into its key: trimmed, lowercase, spaces as underscores.
///
/// `"Volttron Point Name"` becomes `"volttron_point_name"`.
pub fn normalize_key(label: &str) -> String {
    label.trim().to_lowercase().replace(' ', "_")
}

/// One value in a registry row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub key: String,
    pub label: String,
    pub value: String,
    pub editable: bool,
    /// The cell's column is one of the device's shown/configured columns.
    pub key_prop: bool,
    /// Highlighted by an active find.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub selected: bool,
}

impl Cell {
    pub fn new(column: &ColumnTemplate, value: impl Into<String>) -> Self {
        Self {
            key: column.key.clone(),
            label: column.label.clone(),
            value: value.into(),
            editable: true,
            key_prop: false,
            selected: false,
        }
    }
}

/// Key/label pair describing a column before any values are attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTemplate {
    pub key: String,
    pub label: String,
}

impl ColumnTemplate {
    pub fn from_label(label: &str) -> Self {
        Self {
            key: normalize_key(label),
            label: label.trim().to_owned(),
        }
    }
}

/// A column of a device registry, with its display width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub key: String,
    pub label: String,
    pub width: u16,
}

impl Column {
    pub fn template(&self) -> ColumnTemplate {
        ColumnTemplate {
            key: self.key.clone(),
            label: self.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_lowercases_and_underscores() {
        assert_eq!(normalize_key("Volttron Point Name"), "volttron_point_name");
        assert_eq!(normalize_key("  Notes "), "notes");
        assert_eq!(normalize_key("BACnet Object Type"), "bacnet_object_type");
    }

    #[test]
    fn template_keeps_label_text() {
        let t = ColumnTemplate::from_label("Unit Details");
        assert_eq!(t.key, "unit_details");
        assert_eq!(t.label, "Unit Details");
    }
}
