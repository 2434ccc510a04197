// ── Registry rows and point records ──

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::cell::{Cell, ColumnTemplate};

/// `virtual_index` of a row hidden by the active filter.
pub const HIDDEN_INDEX: isize = -2;

pub const OBJECT_TYPE_KEY: &str = "bacnet_object_type";
pub const INDEX_KEY: &str = "index";

/// One point of a device registry.
///
/// Cell 0 is the point name and identifies the row within its device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRow {
    pub cells: Vec<Cell>,
    pub visible: bool,
    /// Position among visible rows, or [`HIDDEN_INDEX`].
    pub virtual_index: isize,
    /// Extended attributes were requested for this point.
    pub selected: bool,
}

impl RegistryRow {
    /// Build a row by filling `columns` positionally with `values`.
    ///
    /// Missing trailing values become empty strings.
    pub fn from_template<I, S>(columns: &[ColumnTemplate], values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values = values.into_iter();
        let cells = columns
            .iter()
            .map(|column| Cell::new(column, values.next().map(Into::into).unwrap_or_default()))
            .collect();

        Self {
            cells,
            visible: true,
            virtual_index: 0,
            selected: false,
        }
    }

    pub fn point_name(&self) -> &str {
        self.cells.first().map_or("", |c| c.value.as_str())
    }

    pub fn value(&self, key: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.value.as_str())
    }

    pub fn object_type(&self) -> Option<&str> {
        self.value(OBJECT_TYPE_KEY).filter(|v| !v.is_empty())
    }

    pub fn object_index(&self) -> Option<&str> {
        self.value(INDEX_KEY).filter(|v| !v.is_empty())
    }

    /// `(object type, index)` when both are present.
    pub fn object_identity(&self) -> Option<(&str, &str)> {
        Some((self.object_type()?, self.object_index()?))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|c| c.value.as_str())
    }
}

/// Raw label/value attributes of one point, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointRecord {
    pub attributes: IndexMap<String, String>,
}

impl PointRecord {
    pub fn new<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            attributes: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Column templates in attribute order.
    pub fn columns(&self) -> Vec<ColumnTemplate> {
        self.attributes
            .keys()
            .map(|label| ColumnTemplate::from_label(label))
            .collect()
    }

    /// Value for a normalized column key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(label, _)| super::normalize_key(label) == key)
            .map(|(_, v)| v.as_str())
    }

    /// The point name: the first attribute's value.
    pub fn point_name(&self) -> Option<&str> {
        self.attributes.first().map(|(_, v)| v.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnTemplate> {
        ["Volttron Point Name", "BACnet Object Type", "Index"]
            .iter()
            .map(|l| ColumnTemplate::from_label(l))
            .collect()
    }

    #[test]
    fn from_template_pads_missing_values() {
        let row = RegistryRow::from_template(&columns(), ["SupplyTemp"]);
        assert_eq!(row.cells.len(), 3);
        assert_eq!(row.point_name(), "SupplyTemp");
        assert_eq!(row.cells[2].value, "");
        assert!(row.visible);
    }

    #[test]
    fn object_identity_needs_both_parts() {
        let row = RegistryRow::from_template(&columns(), ["A", "analogInput", "3"]);
        assert_eq!(row.object_identity(), Some(("analogInput", "3")));

        let partial = RegistryRow::from_template(&columns(), ["A", "analogInput"]);
        assert_eq!(partial.object_identity(), None);
    }

    #[test]
    fn point_record_lookup_by_key() {
        let record = PointRecord::new([("Volttron Point Name", "A"), ("Units", "degF")]);
        assert_eq!(record.get("units"), Some("degF"));
        assert_eq!(record.point_name(), Some("A"));
        assert_eq!(record.columns()[0].key, "volttron_point_name");
    }
}
