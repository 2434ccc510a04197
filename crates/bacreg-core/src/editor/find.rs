// ── Cyclic find / replace within one column ──

use std::ops::Range;

use super::RegistryEditor;
use crate::registry::DeviceRegistry;

impl RegistryEditor {
    /// Focus the next cell in `column` containing `value` (case-sensitive).
    ///
    /// The first call collects every match in row order and focuses the
    /// first one; later calls cycle through that set. Returns the focused row.
    pub fn find_next(
        &mut self,
        registry: &mut DeviceRegistry,
        value: &str,
        column: usize,
    ) -> Option<usize> {
        if self.selected_cells.is_empty() {
            self.collect_matches(registry, value, column);
            self.selected_cell_row = self.selected_cells.first().copied();
            self.selected_cell_column = self.selected_cell_row.map(|_| column);
        } else {
            let next = self.next_match_after(self.selected_cell_row);
            self.selected_cell_row = next;
            self.selected_cell_column = Some(column);
        }
        self.selected_cell_row
    }

    fn collect_matches(&mut self, registry: &mut DeviceRegistry, value: &str, column: usize) {
        self.selected_cells.clear();
        for (i, row) in registry.rows_mut().iter_mut().enumerate() {
            let Some(cell) = row.cells.get_mut(column) else {
                continue;
            };
            cell.selected = !value.is_empty() && cell.value.contains(value);
            if cell.selected {
                self.selected_cells.push(i);
            }
        }
    }

    /// The match after `row` in the match set, wrapping to the first.
    fn next_match_after(&self, row: Option<usize>) -> Option<usize> {
        let position = row.and_then(|r| self.selected_cells.iter().position(|&c| c == r));
        match position {
            Some(pos) => self
                .selected_cells
                .get(pos + 1)
                .or_else(|| self.selected_cells.first())
                .copied(),
            None => self.selected_cells.first().copied(),
        }
    }

    /// Replace the first occurrence of `find` in the focused cell.
    ///
    /// When nothing is focused this behaves like [`find_next`](Self::find_next).
    /// The cell stays a match while its new value contains `find` anywhere
    /// other than wholly inside the inserted text; otherwise it drops out of
    /// the match set and focus moves to the next match.
    pub fn replace(
        &mut self,
        registry: &mut DeviceRegistry,
        find: &str,
        replacement: &str,
        column: usize,
    ) -> Option<usize> {
        let Some(row) = self.selected_cell_row else {
            return self.find_next(registry, find, column);
        };
        if find.is_empty() {
            return Some(row);
        }

        let Some(cell) = registry
            .rows_mut()
            .get_mut(row)
            .and_then(|r| r.cells.get_mut(column))
        else {
            return self.drop_match(row);
        };

        let Some(at) = cell.value.find(find) else {
            cell.selected = false;
            return self.drop_match(row);
        };

        cell.value.replace_range(at..at + find.len(), replacement);
        let inserted = at..at + replacement.len();

        if contains_outside(&cell.value, find, &inserted) {
            return Some(row);
        }
        cell.selected = false;
        self.drop_match(row)
    }

    /// Remove `row` from the match set and move focus past it.
    fn drop_match(&mut self, row: usize) -> Option<usize> {
        let position = self.selected_cells.iter().position(|&r| r == row);
        if let Some(pos) = position {
            self.selected_cells.remove(pos);
        }

        if self.selected_cells.is_empty() {
            self.selected_cell_row = None;
            self.selected_cell_column = None;
            return None;
        }

        let next = position
            .and_then(|pos| self.selected_cells.get(pos))
            .or_else(|| self.selected_cells.first())
            .copied();
        self.selected_cell_row = next;
        next
    }

    /// Replace `find` once in every matched cell and clear focus.
    ///
    /// Cells still containing `find` afterwards stay in the match set.
    pub fn replace_all(
        &mut self,
        registry: &mut DeviceRegistry,
        find: &str,
        replacement: &str,
        column: usize,
    ) {
        let rows = registry.rows_mut();
        let mut survivors = Vec::new();

        for &row in &self.selected_cells {
            let Some(cell) = rows.get_mut(row).and_then(|r| r.cells.get_mut(column)) else {
                continue;
            };
            cell.value = cell.value.replacen(find, replacement, 1);
            if !find.is_empty() && cell.value.contains(find) {
                survivors.push(row);
            } else {
                cell.selected = false;
            }
        }

        self.selected_cells = survivors;
        self.selected_cell_row = None;
        self.selected_cell_column = None;
    }

    /// Deselect every matched cell in `column` and forget the match set.
    pub fn clear_find(&mut self, registry: &mut DeviceRegistry, column: usize) {
        let rows = registry.rows_mut();
        for &row in &self.selected_cells {
            if let Some(cell) = rows.get_mut(row).and_then(|r| r.cells.get_mut(column)) {
                cell.selected = false;
            }
        }
        self.selected_cells.clear();
        self.selected_cell_row = None;
        self.selected_cell_column = None;
    }

    /// Drop the match set whatever column it was built on.
    pub(crate) fn clear_match_state(&mut self, registry: &mut DeviceRegistry) {
        for row in registry.rows_mut() {
            for cell in &mut row.cells {
                cell.selected = false;
            }
        }
        self.selected_cells.clear();
    }
}

/// Whether `value` holds `find` at a position not wholly inside `span`.
fn contains_outside(value: &str, find: &str, span: &Range<usize>) -> bool {
    value.char_indices().any(|(start, _)| {
        let inside = start >= span.start && start + find.len() <= span.end;
        !inside && value.get(start..).is_some_and(|tail| tail.starts_with(find))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::editor::RegistryEditor;
    use crate::model::{DeviceKey, PointRecord};
    use crate::registry::DeviceRegistry;

    fn registry(names: &[&str]) -> DeviceRegistry {
        let records: Vec<PointRecord> = names
            .iter()
            .map(|name| PointRecord::new([("Volttron Point Name", *name), ("Units", "degF")]))
            .collect();
        let mut registry = DeviceRegistry::default();
        registry.load_from_discovery(&records);
        registry
    }

    fn editor() -> RegistryEditor {
        RegistryEditor::new(DeviceKey::new("150", "10.0.0.5"))
    }

    #[test]
    fn find_next_cycles_through_every_match() {
        let mut registry = registry(&["ZoneTemp", "Fan", "ZoneHum", "Damper", "ZoneCO2"]);
        let mut editor = editor();

        let visited: Vec<_> = (0..6)
            .map(|_| editor.find_next(&mut registry, "Zone", 0).unwrap())
            .collect();
        assert_eq!(visited, vec![0, 2, 4, 0, 2, 4]);
        assert_eq!(editor.selected_cells(), [0, 2, 4]);
        assert!(registry.rows()[2].cells[0].selected);
        assert!(!registry.rows()[1].cells[0].selected);
        assert_eq!(editor.selected_cell_column(), Some(0));
    }

    #[test]
    fn find_is_case_sensitive() {
        let mut registry = registry(&["zonetemp", "ZoneTemp"]);
        let mut editor = editor();
        assert_eq!(editor.find_next(&mut registry, "Zone", 0), Some(1));
        assert_eq!(editor.selected_cells(), [1]);
    }

    #[test]
    fn find_without_matches_leaves_nothing_focused() {
        let mut registry = registry(&["A", "B"]);
        let mut editor = editor();
        assert_eq!(editor.find_next(&mut registry, "Q", 0), None);
        assert!(editor.selected_cells().is_empty());
        assert_eq!(editor.selected_cell_column(), None);
    }

    #[test]
    fn replace_moves_focus_to_next_match() {
        let mut registry = registry(&["ZoneTemp", "Fan", "ZoneHum"]);
        let mut editor = editor();
        editor.find_next(&mut registry, "Zone", 0);

        let focus = editor.replace(&mut registry, "Zone", "Room", 0);
        assert_eq!(registry.rows()[0].point_name(), "RoomTemp");
        assert!(!registry.rows()[0].cells[0].selected);
        assert_eq!(focus, Some(2));
        assert_eq!(editor.selected_cells(), [2]);
    }

    #[test]
    fn replacing_last_match_clears_everything() {
        let mut registry = registry(&["A", "B", "C"]);
        let mut editor = editor();
        editor.find_next(&mut registry, "B", 0);

        assert_eq!(editor.replace(&mut registry, "B", "B2", 0), None);
        assert_eq!(registry.rows()[1].point_name(), "B2");
        assert!(editor.selected_cells().is_empty());
        assert_eq!(editor.selected_cell_row(), None);
    }

    #[test]
    fn replace_keeps_cell_with_later_occurrence() {
        let mut registry = registry(&["AB-B"]);
        let mut editor = editor();
        editor.find_next(&mut registry, "B", 0);
        assert_eq!(editor.replace(&mut registry, "B", "X", 0), Some(0));
        assert_eq!(registry.rows()[0].point_name(), "AX-B");
        assert_eq!(editor.replace(&mut registry, "B", "X", 0), None);
        assert_eq!(registry.rows()[0].point_name(), "AX-X");
    }

    #[test]
    fn replace_keeps_a_match_spanning_the_replacement() {
        let mut registry = registry(&["aabb"]);
        let mut editor = editor();
        assert_eq!(editor.find_next(&mut registry, "ab", 0), Some(0));

        assert_eq!(editor.replace(&mut registry, "ab", "", 0), Some(0));
        assert_eq!(registry.rows()[0].point_name(), "ab");
        assert_eq!(editor.selected_cells(), [0]);
        assert!(registry.rows()[0].cells[0].selected);

        assert_eq!(editor.replace(&mut registry, "ab", "", 0), None);
        assert_eq!(registry.rows()[0].point_name(), "");
        assert!(editor.selected_cells().is_empty());
    }

    #[test]
    fn replace_ignores_find_text_inside_the_replacement() {
        let mut registry = registry(&["B"]);
        let mut editor = editor();
        editor.find_next(&mut registry, "B", 0);

        assert_eq!(editor.replace(&mut registry, "B", "BB", 0), None);
        assert_eq!(registry.rows()[0].point_name(), "BB");
        assert!(editor.selected_cells().is_empty());
        assert!(!registry.rows()[0].cells[0].selected);
    }

    #[test]
    fn replace_without_focus_finds_first() {
        let mut registry = registry(&["A", "B"]);
        let mut editor = editor();
        assert_eq!(editor.replace(&mut registry, "B", "C", 0), Some(1));
        assert_eq!(registry.rows()[1].point_name(), "B");
    }

    #[test]
    fn replace_all_keeps_survivors_selected() {
        let mut registry = registry(&["ZoneA", "Fan", "ZoneB"]);
        let mut editor = editor();
        editor.find_next(&mut registry, "Zone", 0);

        editor.replace_all(&mut registry, "Zone", "ZoneZone", 0);
        assert_eq!(registry.rows()[0].point_name(), "ZoneZoneA");
        assert_eq!(editor.selected_cells(), [0, 2]);
        assert_eq!(editor.selected_cell_row(), None);

        editor.replace_all(&mut registry, "Zone", "Rm", 0);
        assert_eq!(registry.rows()[0].point_name(), "RmZoneA");
        assert_eq!(editor.selected_cells(), [0, 2]);

        editor.replace_all(&mut registry, "Zone", "Rm", 0);
        assert_eq!(registry.rows()[2].point_name(), "RmRmB");
        assert!(editor.selected_cells().is_empty());
        assert!(!registry.rows()[2].cells[0].selected);
    }

    #[test]
    fn clear_find_deselects() {
        let mut registry = registry(&["ZoneA", "ZoneB"]);
        let mut editor = editor();
        editor.find_next(&mut registry, "Zone", 0);
        editor.clear_find(&mut registry, 0);
        assert!(editor.selected_cells().is_empty());
        assert!(registry.rows().iter().all(|r| !r.cells[0].selected));
        assert_eq!(editor.find_next(&mut registry, "B", 0), Some(1));
    }
}
