// ── Row filter ──

use serde::Serialize;
use tracing::debug;

use super::{KeyboardRange, RegistryEditor};
use crate::registry::DeviceRegistry;

/// Case-insensitive substring filter on one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowFilter {
    pub term: String,
    pub column: usize,
}

impl RowFilter {
    pub fn new(term: impl Into<String>, column: usize) -> Self {
        Self {
            term: term.into(),
            column,
        }
    }

    pub fn matches(&self, value: &str) -> bool {
        let term = self.term.trim().to_uppercase();
        term.is_empty() || value.trim().to_uppercase().contains(&term)
    }

    /// Set each row's visibility and renumber the visible ones.
    pub fn apply(&self, registry: &mut DeviceRegistry) {
        for row in registry.rows_mut() {
            row.visible = row
                .cells
                .get(self.column)
                .is_none_or(|cell| self.matches(&cell.value));
        }
        registry.reindex();
    }
}

impl RegistryEditor {
    /// Show only rows whose `column` contains `term`, ignoring case and
    /// surrounding whitespace. An empty term shows every row.
    pub fn filter(&mut self, registry: &mut DeviceRegistry, term: &str, column: usize) {
        let filter = RowFilter::new(term.trim(), column);
        filter.apply(registry);
        self.filter = (!filter.term.is_empty()).then_some(filter);

        if self.range_mode {
            self.range = if registry.last_virtual_index() >= 0 {
                KeyboardRange::FIRST
            } else {
                KeyboardRange::CLEARED
            };
        }
        debug!(term, column, visible = registry.last_virtual_index() + 1, "filter applied");
    }

    /// Show every row again and drop range and find state.
    pub fn clear_filter(&mut self, registry: &mut DeviceRegistry) {
        RowFilter::new("", 0).apply(registry);
        self.filter = None;
        self.range = KeyboardRange::CLEARED;
        self.range_mode = false;
        self.clear_match_state(registry);
        self.selected_cell_row = None;
        self.selected_cell_column = None;
    }
}
