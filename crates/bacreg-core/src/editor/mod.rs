//! Selection, search and filtering over one device's registry.
//!
//! The editor owns only selection state. Every operation borrows the
//! [`DeviceRegistry`] it works on for the length of the call, so the matrix
//! itself stays with its [`Device`](crate::model::Device).
//!
//! - **Range selection** walks *virtual* indices, so rows hidden by the
//!   active filter are skipped.
//! - **Find / replace** works on one column and keeps an ordered match set
//!   that [`find_next`](RegistryEditor::find_next) cycles through.
//! - **Filtering** hides rows and renumbers the visible ones.

mod filter;
mod find;
mod range;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

pub use filter::RowFilter;
pub use range::KeyboardRange;

use crate::model::DeviceKey;
use crate::registry::DeviceRegistry;

/// Keys the editor understands while it has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorKey {
    /// Toggle range mode.
    RangeMode,
    Escape,
    /// Fetch extended attributes for the range.
    Enter,
    Down,
    Up,
    ExtendDown,
    ExtendUp,
    /// Remove the points in the range.
    Delete,
}

/// Work a key press asks the caller to carry out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorAction {
    FetchAttributes(FetchRequest),
    /// Point names to remove once the operator confirms.
    RemovePoints(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointRef {
    pub point_name: String,
    pub object_type: Option<String>,
    pub index: Option<String>,
}

/// Points whose extended attributes were requested by a range fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchRequest {
    pub device: DeviceKey,
    pub points: Vec<PointRef>,
}

impl FetchRequest {
    /// Object indices grouped by object type, in row order.
    pub fn by_object_type(&self) -> IndexMap<String, Vec<String>> {
        let mut groups: IndexMap<String, Vec<String>> = IndexMap::new();
        for point in &self.points {
            if let (Some(object_type), Some(index)) = (&point.object_type, &point.index) {
                groups
                    .entry(object_type.clone())
                    .or_default()
                    .push(index.clone());
            }
        }
        groups
    }
}

#[derive(Debug, Clone)]
pub struct RegistryEditor {
    device: DeviceKey,
    selected_cell_row: Option<usize>,
    selected_cell_column: Option<usize>,
    selected_cells: Vec<usize>,
    range: KeyboardRange,
    range_mode: bool,
    filter: Option<RowFilter>,
}

impl RegistryEditor {
    pub fn new(device: DeviceKey) -> Self {
        Self {
            device,
            selected_cell_row: None,
            selected_cell_column: None,
            selected_cells: Vec::new(),
            range: KeyboardRange::CLEARED,
            range_mode: false,
            filter: None,
        }
    }

    pub fn device(&self) -> &DeviceKey {
        &self.device
    }

    pub fn selected_cell_row(&self) -> Option<usize> {
        self.selected_cell_row
    }

    pub fn selected_cell_column(&self) -> Option<usize> {
        self.selected_cell_column
    }

    pub fn selected_cells(&self) -> &[usize] {
        &self.selected_cells
    }

    pub fn keyboard_range(&self) -> KeyboardRange {
        self.range
    }

    pub fn in_range_mode(&self) -> bool {
        self.range_mode
    }

    pub fn active_filter(&self) -> Option<&RowFilter> {
        self.filter.as_ref()
    }

    /// Focus a single cell, as a click would.
    pub fn select_cell(&mut self, row: usize, column: usize) {
        self.selected_cell_row = Some(row);
        self.selected_cell_column = Some(column);
    }

    // ── Keyboard range ───────────────────────────────────────────────

    pub fn handle_key(
        &mut self,
        registry: &mut DeviceRegistry,
        key: EditorKey,
    ) -> Option<EditorAction> {
        if key == EditorKey::RangeMode {
            if self.range_mode {
                self.exit_range_mode();
            } else {
                self.range_mode = true;
                self.range = KeyboardRange::FIRST;
            }
            return None;
        }

        if !self.range_mode {
            return None;
        }

        let last = registry.last_virtual_index();
        match key {
            EditorKey::Escape => self.exit_range_mode(),
            EditorKey::Down => self.range.move_down(last),
            EditorKey::Up => self.range.move_up(last),
            EditorKey::ExtendDown => self.range.extend_down(last),
            EditorKey::ExtendUp => self.range.extend_up(last),
            EditorKey::Enter => return self.fetch_range(registry).map(EditorAction::FetchAttributes),
            EditorKey::Delete => {
                let keys = self.points_in_range(registry);
                return (!keys.is_empty()).then_some(EditorAction::RemovePoints(keys));
            }
            EditorKey::RangeMode => {}
        }
        None
    }

    fn exit_range_mode(&mut self) {
        self.range_mode = false;
        self.range = KeyboardRange::CLEARED;
    }

    /// Mark unfetched rows in the range as selected and describe them.
    fn fetch_range(&self, registry: &mut DeviceRegistry) -> Option<FetchRequest> {
        let range = self.range;
        let points: Vec<PointRef> = registry
            .rows_mut()
            .iter_mut()
            .filter(|row| range.contains(row.virtual_index) && !row.selected)
            .map(|row| {
                row.selected = true;
                PointRef {
                    point_name: row.point_name().to_owned(),
                    object_type: row.object_type().map(str::to_owned),
                    index: row.object_index().map(str::to_owned),
                }
            })
            .collect();

        debug!(device = %self.device, count = points.len(), "range fetch");
        (!points.is_empty()).then(|| FetchRequest {
            device: self.device.clone(),
            points,
        })
    }

    /// Undo a fetch's selection marks, for rows that still exist.
    pub fn revert_fetch(&self, registry: &mut DeviceRegistry, request: &FetchRequest) {
        for row in registry.rows_mut() {
            if request.points.iter().any(|p| p.point_name == row.point_name()) {
                row.selected = false;
            }
        }
    }

    fn points_in_range(&self, registry: &DeviceRegistry) -> Vec<String> {
        registry
            .rows()
            .iter()
            .filter(|row| self.range.contains(row.virtual_index))
            .map(|row| row.point_name().to_owned())
            .collect()
    }

    /// Bring selection state back in line after rows were removed.
    pub fn rows_removed(&mut self, registry: &mut DeviceRegistry) {
        self.clear_match_state(registry);
        self.selected_cell_row = None;
        self.selected_cell_column = None;
        if let Some(filter) = self.filter.clone() {
            filter.apply(registry);
        }
        self.range.clamp(registry.last_virtual_index());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::PointRecord;

    fn registry(names: &[&str]) -> DeviceRegistry {
        let records: Vec<PointRecord> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                PointRecord::new([
                    ("Volttron Point Name", (*name).to_owned()),
                    ("BACnet Object Type", "analogInput".to_owned()),
                    ("Index", i.to_string()),
                ])
            })
            .collect();
        let mut registry = DeviceRegistry::default();
        registry.load_from_discovery(&records);
        registry
    }

    fn editor() -> RegistryEditor {
        RegistryEditor::new(DeviceKey::new("150", "10.0.0.5"))
    }

    #[test]
    fn keys_ignored_outside_range_mode() {
        let mut registry = registry(&["A", "B"]);
        let mut editor = editor();
        assert!(editor.handle_key(&mut registry, EditorKey::Enter).is_none());
        assert!(!registry.rows()[0].selected);
        assert_eq!(editor.keyboard_range(), KeyboardRange::CLEARED);
    }

    #[test]
    fn range_mode_toggles() {
        let mut registry = registry(&["A", "B"]);
        let mut editor = editor();
        editor.handle_key(&mut registry, EditorKey::RangeMode);
        assert!(editor.in_range_mode());
        assert_eq!(editor.keyboard_range(), KeyboardRange::FIRST);

        editor.handle_key(&mut registry, EditorKey::RangeMode);
        assert!(!editor.in_range_mode());
        assert_eq!(editor.keyboard_range(), KeyboardRange::CLEARED);
    }

    #[test]
    fn escape_clears_range() {
        let mut registry = registry(&["A", "B"]);
        let mut editor = editor();
        editor.handle_key(&mut registry, EditorKey::RangeMode);
        editor.handle_key(&mut registry, EditorKey::ExtendDown);
        editor.handle_key(&mut registry, EditorKey::Escape);
        assert_eq!(editor.keyboard_range(), KeyboardRange::CLEARED);
        assert!(!editor.in_range_mode());
    }

    #[test]
    fn enter_fetches_each_row_once() {
        let mut registry = registry(&["A", "B", "C"]);
        let mut editor = editor();
        editor.handle_key(&mut registry, EditorKey::RangeMode);
        editor.handle_key(&mut registry, EditorKey::ExtendDown);

        let Some(EditorAction::FetchAttributes(request)) =
            editor.handle_key(&mut registry, EditorKey::Enter)
        else {
            panic!("expected a fetch");
        };
        let names: Vec<_> = request.points.iter().map(|p| p.point_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(request.by_object_type()["analogInput"], vec!["0", "1"]);
        assert!(registry.rows()[0].selected && registry.rows()[1].selected);
        assert!(!registry.rows()[2].selected);

        assert!(editor.handle_key(&mut registry, EditorKey::Enter).is_none());

        editor.handle_key(&mut registry, EditorKey::ExtendDown);
        let Some(EditorAction::FetchAttributes(request)) =
            editor.handle_key(&mut registry, EditorKey::Enter)
        else {
            panic!("expected a fetch");
        };
        assert_eq!(request.points.len(), 1);
        assert_eq!(request.points[0].point_name, "C");
    }

    #[test]
    fn revert_fetch_unmarks_rows() {
        let mut registry = registry(&["A", "B"]);
        let mut editor = editor();
        editor.handle_key(&mut registry, EditorKey::RangeMode);
        let Some(EditorAction::FetchAttributes(request)) =
            editor.handle_key(&mut registry, EditorKey::Enter)
        else {
            panic!("expected a fetch");
        };
        editor.revert_fetch(&mut registry, &request);
        assert!(!registry.rows()[0].selected);
    }

    #[test]
    fn range_skips_hidden_rows() {
        let mut registry = registry(&["AHU-1", "VAV-1", "AHU-2", "VAV-2"]);
        let mut editor = editor();
        editor.filter(&mut registry, "ahu", 0);
        editor.handle_key(&mut registry, EditorKey::RangeMode);
        editor.handle_key(&mut registry, EditorKey::ExtendDown);
        editor.handle_key(&mut registry, EditorKey::ExtendDown);

        assert_eq!(editor.keyboard_range(), KeyboardRange { start: 0, end: 1 });
        let Some(EditorAction::RemovePoints(keys)) =
            editor.handle_key(&mut registry, EditorKey::Delete)
        else {
            panic!("expected removal");
        };
        assert_eq!(keys, vec!["AHU-1", "AHU-2"]);
    }

    #[test]
    fn rows_removed_clamps_range() {
        let mut registry = registry(&["A", "B", "C"]);
        let mut editor = editor();
        editor.handle_key(&mut registry, EditorKey::RangeMode);
        editor.handle_key(&mut registry, EditorKey::Down);
        editor.handle_key(&mut registry, EditorKey::Down);
        registry.remove_points(&["B", "C"]);
        editor.rows_removed(&mut registry);
        assert_eq!(editor.keyboard_range(), KeyboardRange::FIRST);
    }
}
