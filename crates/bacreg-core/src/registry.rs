// ── Per-device point registry ──
//
// The row/column matrix of one device. Every row holds exactly one cell per
// column, in schema order, and cell 0 (the point name) is unique among rows.
// Schema mutations validate before touching anything, then apply to every
// row in one pass.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::codec::ParsedCsv;
use crate::error::CoreError;
use crate::model::row::{INDEX_KEY, OBJECT_TYPE_KEY};
use crate::model::{
    Cell, Column, ColumnTemplate, DEFAULT_COLUMN_WIDTH, DeviceKey, HIDDEN_INDEX,
    MIN_COLUMN_WIDTH, PointRecord, RegistryRow, normalize_key,
};

/// Columns shown for a device until the operator changes them.
pub const DEFAULT_KEY_PROPS: [&str; 3] = ["volttron_point_name", "units", "writable"];

pub fn default_key_props() -> Vec<String> {
    DEFAULT_KEY_PROPS.iter().map(|k| (*k).to_owned()).collect()
}

/// What a save hands to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryHandoff {
    pub device_id: String,
    pub device_address: String,
    pub columns: Vec<ColumnTemplate>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRegistry {
    columns: Vec<Column>,
    rows: Vec<RegistryRow>,
    key_props: Vec<String>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(default_key_props())
    }
}

impl DeviceRegistry {
    pub fn new(key_props: Vec<String>) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            key_props,
        }
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[RegistryRow] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut [RegistryRow] {
        &mut self.rows
    }

    pub fn row(&self, index: usize) -> Option<&RegistryRow> {
        self.rows.get(index)
    }

    pub fn key_props(&self) -> &[String] {
        &self.key_props
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        let key = normalize_key(key);
        self.columns.iter().position(|c| c.key == key)
    }

    pub fn position(&self, point_name: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.point_name() == point_name)
    }

    /// Highest `virtual_index` in use, or -1 with nothing visible.
    pub fn last_virtual_index(&self) -> isize {
        self.rows
            .iter()
            .map(|r| r.virtual_index)
            .max()
            .filter(|vi| *vi >= 0)
            .unwrap_or(-1)
    }

    // ── Loading ──────────────────────────────────────────────────────

    /// Replace all rows with discovered points. The first record sets the schema.
    ///
    /// Returns the point names dropped for repeating an earlier row.
    pub fn load_from_discovery(&mut self, records: &[PointRecord]) -> Vec<String> {
        let columns = records.first().map(PointRecord::columns).unwrap_or_default();
        let rows = records.iter().map(|r| conform(&columns, r)).collect();
        self.load(columns, rows)
    }

    /// Replace all rows with an imported CSV file.
    ///
    /// Returns the point names dropped for repeating an earlier row.
    pub fn load_from_csv(&mut self, parsed: ParsedCsv) -> Vec<String> {
        self.load(parsed.columns, parsed.rows)
    }

    fn load(&mut self, columns: Vec<ColumnTemplate>, rows: Vec<RegistryRow>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dropped = Vec::new();
        let mut kept = Vec::with_capacity(rows.len());

        for row in rows {
            if seen.insert(row.point_name().to_owned()) {
                kept.push(row);
            } else {
                dropped.push(row.point_name().to_owned());
            }
        }

        if !dropped.is_empty() {
            warn!(count = dropped.len(), "dropped rows with repeated point names");
        }

        self.columns = columns
            .into_iter()
            .map(|t| Column {
                key: t.key,
                label: t.label,
                width: DEFAULT_COLUMN_WIDTH,
            })
            .collect();
        self.rows = kept;
        for row in &mut self.rows {
            row.visible = true;
            row.selected = false;
        }
        self.apply_key_props();
        self.assign_default_widths();
        self.reindex();
        dropped
    }

    /// Append one discovered point unless it is already present.
    ///
    /// A point matches an existing row by object type and index, or by
    /// point name. The first point of an empty registry sets the schema.
    pub fn append_point(&mut self, record: &PointRecord) -> bool {
        if record.is_empty() {
            return false;
        }

        let first = self.rows.is_empty();
        if first && self.columns.is_empty() {
            self.columns = record
                .columns()
                .into_iter()
                .map(|t| Column {
                    key: t.key,
                    label: t.label,
                    width: DEFAULT_COLUMN_WIDTH,
                })
                .collect();
        }

        let templates: Vec<ColumnTemplate> = self.columns.iter().map(Column::template).collect();
        let mut row = conform(&templates, record);
        if self.contains_point(&row) {
            debug!(point = row.point_name(), "ignoring repeated point");
            return false;
        }

        for cell in &mut row.cells {
            cell.key_prop = self.key_props.contains(&cell.key);
        }
        row.virtual_index = self.last_virtual_index() + 1;
        self.rows.push(row);

        if first {
            self.assign_default_widths();
        }
        true
    }

    fn contains_point(&self, row: &RegistryRow) -> bool {
        let identity = row.object_identity();
        self.rows.iter().any(|existing| {
            existing.point_name() == row.point_name()
                || (identity.is_some() && existing.object_identity() == identity)
        })
    }

    fn apply_key_props(&mut self) {
        for row in &mut self.rows {
            for cell in &mut row.cells {
                cell.key_prop = self.key_props.contains(&cell.key);
            }
        }
    }

    /// Key-prop columns fit the first row's value, all others get the default.
    fn assign_default_widths(&mut self) {
        let first = self.rows.first();
        for (i, column) in self.columns.iter_mut().enumerate() {
            let hint = first
                .and_then(|row| row.cells.get(i))
                .filter(|cell| cell.key_prop)
                .map(|cell| cell.value.chars().count().saturating_mul(10));
            column.width = hint.map_or(DEFAULT_COLUMN_WIDTH, |w| {
                u16::try_from(w)
                    .unwrap_or(u16::MAX)
                    .max(DEFAULT_COLUMN_WIDTH)
            });
        }
    }

    /// Number visible rows contiguously in row order; hidden rows get [`HIDDEN_INDEX`].
    pub(crate) fn reindex(&mut self) {
        let mut next: isize = 0;
        for row in &mut self.rows {
            if row.visible {
                row.virtual_index = next;
                next += 1;
            } else {
                row.virtual_index = HIDDEN_INDEX;
            }
        }
    }

    // ── Schema mutation ──────────────────────────────────────────────

    /// Insert an empty, editable column after `after_index`.
    ///
    /// Returns the new column's index. Fails without changing anything when
    /// the name collides with an existing column.
    pub fn add_column(&mut self, after_index: usize, label: &str) -> Result<usize, CoreError> {
        self.insert_column(after_index, label, false)
    }

    /// Like [`add_column`](Self::add_column), seeding each row with its value
    /// from column `after_index`.
    pub fn clone_column(&mut self, after_index: usize, label: &str) -> Result<usize, CoreError> {
        self.insert_column(after_index, label, true)
    }

    fn insert_column(
        &mut self,
        after_index: usize,
        label: &str,
        copy_values: bool,
    ) -> Result<usize, CoreError> {
        assert!(
            after_index < self.columns.len(),
            "column index {after_index} out of range for {} columns",
            self.columns.len()
        );

        let template = ColumnTemplate::from_label(label);
        if template.key.is_empty() {
            return Err(CoreError::validation("Column name cannot be empty."));
        }
        if self
            .columns
            .iter()
            .any(|c| c.key.eq_ignore_ascii_case(&template.key))
        {
            return Err(CoreError::validation(format!(
                "A column named \"{}\" already exists.",
                template.label
            )));
        }

        let at = after_index + 1;
        let key_pos = self.key_prop_position_after(after_index);
        self.key_props.insert(key_pos, template.key.clone());
        self.columns.insert(
            at,
            Column {
                key: template.key.clone(),
                label: template.label.clone(),
                width: DEFAULT_COLUMN_WIDTH,
            },
        );

        for row in &mut self.rows {
            let source = &row.cells[after_index];
            let mut cell = if copy_values {
                let mut cell = Cell::new(&template, source.value.clone());
                cell.editable = source.editable;
                cell
            } else {
                Cell::new(&template, String::new())
            };
            cell.key_prop = true;
            row.cells.insert(at, cell);
        }

        debug!(key = %template.key, index = at, copy_values, "column inserted");
        Ok(at)
    }

    /// Slot in `key_props` just after the last shown column at or before `index`.
    fn key_prop_position_after(&self, index: usize) -> usize {
        self.columns[..=index]
            .iter()
            .filter_map(|c| self.key_props.iter().position(|k| *k == c.key))
            .max()
            .map_or(0, |p| p + 1)
    }

    /// Remove column `index` from every row and from the shown columns.
    ///
    /// The point name column cannot be removed.
    pub fn remove_column(&mut self, index: usize) -> Result<Column, CoreError> {
        assert!(
            index < self.columns.len(),
            "column index {index} out of range for {} columns",
            self.columns.len()
        );
        if index == 0 {
            return Err(CoreError::validation(
                "The point name column cannot be removed.",
            ));
        }

        let column = self.columns.remove(index);
        self.key_props.retain(|k| *k != column.key);
        for row in &mut self.rows {
            row.cells.remove(index);
        }

        debug!(key = %column.key, index, "column removed");
        Ok(column)
    }

    pub fn resize_column(&mut self, index: usize, width: u16) {
        assert!(
            index < self.columns.len(),
            "column index {index} out of range for {} columns",
            self.columns.len()
        );
        self.columns[index].width = width.max(MIN_COLUMN_WIDTH);
    }

    // ── Points ───────────────────────────────────────────────────────

    /// Append an empty point named `point_name`. Returns its row index.
    pub fn add_point(&mut self, point_name: &str) -> Result<usize, CoreError> {
        let name = point_name.trim();
        if name.is_empty() {
            return Err(CoreError::validation("Point name cannot be empty."));
        }
        if self.columns.is_empty() {
            return Err(CoreError::validation(
                "The registry has no columns to add a point to.",
            ));
        }
        if self.position(name).is_some() {
            return Err(CoreError::validation(format!(
                "A point named \"{name}\" already exists."
            )));
        }

        let templates: Vec<ColumnTemplate> = self.columns.iter().map(Column::template).collect();
        let mut row = RegistryRow::from_template(&templates, [name]);
        for cell in &mut row.cells {
            cell.key_prop = self.key_props.contains(&cell.key);
        }
        row.virtual_index = self.last_virtual_index() + 1;
        self.rows.push(row);
        Ok(self.rows.len() - 1)
    }

    /// Remove every row whose point name is in `point_keys`. Unknown keys are ignored.
    pub fn remove_points<S: AsRef<str>>(&mut self, point_keys: &[S]) -> usize {
        let before = self.rows.len();
        self.rows
            .retain(|row| !point_keys.iter().any(|k| k.as_ref() == row.point_name()));
        let removed = before - self.rows.len();
        if removed > 0 {
            self.reindex();
        }
        removed
    }

    pub fn update_cell(&mut self, row_index: usize, column_index: usize, value: impl Into<String>) {
        assert!(
            row_index < self.rows.len(),
            "row index {row_index} out of range for {} rows",
            self.rows.len()
        );
        assert!(
            column_index < self.columns.len(),
            "column index {column_index} out of range for {} columns",
            self.columns.len()
        );
        self.rows[row_index].cells[column_index].value = value.into();
    }

    /// Merge extended attributes into the rows they describe.
    ///
    /// Records whose row has been removed since the request are skipped, as
    /// are attributes with no matching column. Returns the rows updated.
    pub fn apply_point_details(&mut self, records: &[PointRecord]) -> usize {
        let mut updated = 0;
        for record in records {
            let Some(row_index) = self.find_record_row(record) else {
                debug!(point = ?record.point_name(), "details for a point no longer present");
                continue;
            };

            for (label, value) in &record.attributes {
                let key = normalize_key(label);
                if let Some(col) = self.columns.iter().position(|c| c.key == key) {
                    if col > 0 {
                        self.rows[row_index].cells[col].value.clone_from(value);
                    }
                }
            }
            updated += 1;
        }
        updated
    }

    fn find_record_row(&self, record: &PointRecord) -> Option<usize> {
        let identity = record.get(OBJECT_TYPE_KEY).zip(record.get(INDEX_KEY));
        identity
            .and_then(|id| {
                self.rows
                    .iter()
                    .position(|row| row.object_identity() == Some(id))
            })
            .or_else(|| record.point_name().and_then(|name| self.position(name)))
    }

    // ── Save ─────────────────────────────────────────────────────────

    pub fn handoff(&self, device: &DeviceKey) -> RegistryHandoff {
        RegistryHandoff {
            device_id: device.id.clone(),
            device_address: device.address.clone(),
            columns: self.columns.iter().map(Column::template).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| row.values().map(str::to_owned).collect())
                .collect(),
        }
    }
}

/// Lay a point record onto a schema, taking values by column key.
fn conform(columns: &[ColumnTemplate], record: &PointRecord) -> RegistryRow {
    let values: Vec<String> = columns
        .iter()
        .map(|c| record.get(&c.key).unwrap_or_default().to_owned())
        .collect();
    RegistryRow::from_template(columns, values)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn record(name: &str, object_type: &str, index: &str) -> PointRecord {
        PointRecord::new([
            ("Volttron Point Name", name),
            ("Units", "degF"),
            ("BACnet Object Type", object_type),
            ("Index", index),
            ("Writable", "FALSE"),
        ])
    }

    fn registry() -> DeviceRegistry {
        let mut registry = DeviceRegistry::default();
        registry.load_from_discovery(&[
            record("A", "analogInput", "1"),
            record("B", "analogInput", "2"),
            record("C", "binaryOutput", "1"),
        ]);
        registry
    }

    fn assert_rectangular(registry: &DeviceRegistry) {
        let keys: Vec<&str> = registry.columns().iter().map(|c| c.key.as_str()).collect();
        for row in registry.rows() {
            let row_keys: Vec<&str> = row.cells.iter().map(|c| c.key.as_str()).collect();
            assert_eq!(row_keys, keys);
        }
    }

    #[test]
    fn load_assigns_key_props_and_indices() {
        let registry = registry();
        assert_eq!(registry.len(), 3);
        let row = &registry.rows()[1];
        assert_eq!(row.virtual_index, 1);
        assert!(row.cells[0].key_prop);
        assert!(row.cells[1].key_prop);
        assert!(!row.cells[2].key_prop);
        assert!(row.cells[4].key_prop);
    }

    #[test]
    fn load_widths_follow_first_row() {
        let mut registry = DeviceRegistry::default();
        let long_name = "Supply Air Temperature Setpoint Offset";
        registry.load_from_discovery(&[record(long_name, "analogValue", "9")]);
        assert_eq!(registry.columns()[0].width, 380);
        assert_eq!(registry.columns()[1].width, DEFAULT_COLUMN_WIDTH);
        assert_eq!(registry.columns()[2].width, DEFAULT_COLUMN_WIDTH);
    }

    #[test]
    fn load_drops_repeated_point_names() {
        let mut registry = DeviceRegistry::default();
        let dropped = registry.load_from_discovery(&[
            record("A", "analogInput", "1"),
            record("A", "analogInput", "7"),
        ]);
        assert_eq!(dropped, vec!["A"]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn add_column_inserts_into_every_row() {
        let mut registry = registry();
        let at = registry.add_column(0, "Notes").unwrap();
        assert_eq!(at, 1);
        assert_rectangular(&registry);
        for row in registry.rows() {
            assert_eq!(row.cells[1].key, "notes");
            assert_eq!(row.cells[1].value, "");
            assert!(row.cells[1].editable);
            assert!(row.cells[1].key_prop);
        }
        assert_eq!(
            registry.key_props(),
            ["volttron_point_name", "notes", "units", "writable"]
        );
    }

    #[test]
    fn add_column_rejects_duplicate_name_untouched() {
        let mut registry = registry();
        let before = registry.clone();
        let err = registry.add_column(2, "units").unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
        let err = registry.add_column(2, "BACNET OBJECT TYPE").unwrap_err();
        assert!(matches!(err, CoreError::ValidationFailed { .. }));
        assert_eq!(registry, before);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn add_column_out_of_range_panics() {
        let mut registry = registry();
        let _ = registry.add_column(5, "Extra");
    }

    #[test]
    fn clone_column_copies_values() {
        let mut registry = registry();
        let at = registry.clone_column(2, "Object Type Copy").unwrap();
        assert_eq!(at, 3);
        assert_rectangular(&registry);
        for row in registry.rows() {
            assert_eq!(row.cells[3].value, row.cells[2].value);
        }
        registry.update_cell(0, 3, "changed");
        assert_eq!(registry.rows()[0].cells[2].value, "analogInput");
    }

    #[test]
    fn add_then_remove_restores_schema() {
        let mut registry = registry();
        let before = registry.clone();
        let at = registry.add_column(1, "Notes").unwrap();
        registry.remove_column(at).unwrap();
        assert_eq!(registry, before);
    }

    #[test]
    fn remove_column_drops_key_prop() {
        let mut registry = registry();
        let removed = registry.remove_column(1).unwrap();
        assert_eq!(removed.key, "units");
        assert_rectangular(&registry);
        assert_eq!(registry.key_props(), ["volttron_point_name", "writable"]);
    }

    #[test]
    fn point_name_column_is_permanent() {
        let mut registry = registry();
        assert!(registry.remove_column(0).is_err());
        assert_eq!(registry.width(), 5);
    }

    #[test]
    fn remove_points_ignores_unknown_and_reindexes() {
        let mut registry = registry();
        let removed = registry.remove_points(&["A", "nope"]);
        assert_eq!(removed, 1);
        let names: Vec<_> = registry.rows().iter().map(RegistryRow::point_name).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(registry.rows()[0].virtual_index, 0);
        assert_eq!(registry.rows()[1].virtual_index, 1);
    }

    #[test]
    fn add_point_validates_name() {
        let mut registry = registry();
        assert!(registry.add_point("  ").is_err());
        assert!(registry.add_point("B").is_err());

        let index = registry.add_point("D").unwrap();
        assert_eq!(index, 3);
        assert_rectangular(&registry);
        assert_eq!(registry.rows()[3].point_name(), "D");
        assert_eq!(registry.rows()[3].virtual_index, 3);
    }

    #[test]
    fn append_point_is_idempotent() {
        let mut registry = DeviceRegistry::default();
        assert!(registry.append_point(&record("A", "analogInput", "1")));
        assert!(!registry.append_point(&record("A", "analogInput", "1")));
        assert!(!registry.append_point(&record("A2", "analogInput", "1")));
        assert!(registry.append_point(&record("B", "analogInput", "2")));
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.rows()[1].virtual_index, 1);
    }

    #[test]
    fn resize_has_a_floor() {
        let mut registry = registry();
        registry.resize_column(1, 20);
        assert_eq!(registry.columns()[1].width, MIN_COLUMN_WIDTH);
        registry.resize_column(1, 320);
        assert_eq!(registry.columns()[1].width, 320);
    }

    #[test]
    fn point_details_apply_only_to_present_rows() {
        let mut registry = registry();
        registry.remove_points(&["C"]);
        let updated = registry.apply_point_details(&[
            PointRecord::new([
                ("Volttron Point Name", "B"),
                ("BACnet Object Type", "analogInput"),
                ("Index", "2"),
                ("Units", "percent"),
                ("Unknown Attribute", "x"),
            ]),
            PointRecord::new([
                ("Volttron Point Name", "C"),
                ("BACnet Object Type", "binaryOutput"),
                ("Index", "1"),
                ("Units", "on/off"),
            ]),
        ]);
        assert_eq!(updated, 1);
        assert_eq!(registry.rows()[1].value("units"), Some("percent"));
        assert_rectangular(&registry);
    }

    #[test]
    fn handoff_carries_matrix_in_order() {
        let registry = registry();
        let handoff = registry.handoff(&DeviceKey::new("150", "10.0.0.5"));
        assert_eq!(handoff.device_id, "150");
        assert_eq!(handoff.columns.len(), 5);
        assert_eq!(handoff.rows[2][0], "C");
    }
}
