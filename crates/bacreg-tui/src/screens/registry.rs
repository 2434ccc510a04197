//! Registry screen: one device's points as an editable grid.
//!
//! The cursor, keyboard range and find matches all live in the
//! [`RegistryEditor`](bacreg_core::RegistryEditor) snapshot; this screen
//! only draws them and turns keys into actions.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState};

use bacreg_core::{EditorKey, RegistryRow};

use crate::action::{Action, PromptKind, RegistryView};
use crate::component::Component;
use crate::theme;

/// Registry widths are in pixels-ish units; ten per terminal column.
const WIDTH_UNITS_PER_CHAR: u16 = 10;
const PAGE: isize = 10;

pub struct RegistryScreen {
    focused: bool,
    view: Option<Arc<RegistryView>>,
}

impl RegistryScreen {
    pub fn new() -> Self {
        Self {
            focused: false,
            view: None,
        }
    }

    fn range_mode(&self) -> bool {
        self.view.as_ref().is_some_and(|v| v.editor.in_range_mode())
    }

    fn render_empty(&self, frame: &mut Frame, area: Rect, message: &str) {
        let block = Block::default()
            .title(" Registry ")
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(self.focused));
        let text = Paragraph::new(Line::from(Span::styled(
            format!("  {message}"),
            theme::key_hint(),
        )))
        .block(block);
        frame.render_widget(text, area);
    }

    fn render_status(view: &RegistryView, frame: &mut Frame, area: Rect) {
        let editor = &view.editor;
        let mut spans = Vec::new();

        if editor.in_range_mode() {
            let range = editor.keyboard_range();
            spans.push(Span::styled(
                format!(" RANGE {}..{} ", range.start, range.end),
                Style::default().fg(theme::ACCENT).bg(theme::BG_RANGE),
            ));
        }
        if let Some(filter) = editor.active_filter() {
            let label = view
                .registry
                .columns()
                .get(filter.column)
                .map_or("?", |c| c.label.as_str());
            spans.push(Span::styled(
                format!(" filter {label} ~ \"{}\" ", filter.term),
                Style::default().fg(theme::CYAN),
            ));
        }
        if let Some(term) = &view.find_term {
            spans.push(Span::styled(
                format!(" find \"{term}\": {} match(es) ", editor.selected_cells().len()),
                Style::default().fg(theme::YELLOW),
            ));
        }
        if let (Some(row), Some(column)) = (editor.selected_cell_row(), editor.selected_cell_column())
        {
            spans.push(Span::styled(
                format!(" row {} col {} ", row + 1, column + 1),
                theme::key_hint(),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn hints(range_mode: bool) -> Line<'static> {
        let pairs: &[(&str, &str)] = if range_mode {
            &[
                ("j/k ", "move  "),
                ("J/K ", "extend  "),
                ("Enter ", "fetch attributes  "),
                ("Del ", "remove points  "),
                ("Esc ", "leave range"),
            ]
        } else {
            &[
                ("hjkl ", "move  "),
                ("^R ", "range  "),
                ("e ", "edit  "),
                ("/ ", "filter  "),
                ("f/n ", "find  "),
                ("r/R ", "replace  "),
                ("+/c/x ", "columns  "),
                ("a ", "add point  "),
                ("w ", "write  "),
                ("s ", "save"),
            ]
        };
        let mut spans = vec![Span::raw(" ")];
        for (key, label) in pairs {
            spans.push(Span::styled(*key, theme::key_hint_key()));
            spans.push(Span::styled(*label, theme::key_hint()));
        }
        Line::from(spans)
    }
}

/// Map a key to the registry action it stands for.
pub fn key_action(key: KeyEvent, range_mode: bool) -> Option<Action> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    if ctrl {
        return match key.code {
            KeyCode::Char('r') => Some(Action::Editor(EditorKey::RangeMode)),
            KeyCode::Char('d') if !range_mode => Some(Action::MoveCursor {
                rows: PAGE,
                columns: 0,
            }),
            KeyCode::Char('u') if !range_mode => Some(Action::MoveCursor {
                rows: -PAGE,
                columns: 0,
            }),
            _ => None,
        };
    }

    if range_mode {
        let extend = shift || matches!(key.code, KeyCode::Char('J' | 'K'));
        let editor_key = match key.code {
            KeyCode::Char('j' | 'J') | KeyCode::Down if extend => EditorKey::ExtendDown,
            KeyCode::Char('k' | 'K') | KeyCode::Up if extend => EditorKey::ExtendUp,
            KeyCode::Char('j') | KeyCode::Down => EditorKey::Down,
            KeyCode::Char('k') | KeyCode::Up => EditorKey::Up,
            KeyCode::Enter => EditorKey::Enter,
            KeyCode::Delete | KeyCode::Char('d') => EditorKey::Delete,
            KeyCode::Esc => EditorKey::Escape,
            _ => return None,
        };
        return Some(Action::Editor(editor_key));
    }

    let action = match key.code {
        KeyCode::Char('j') | KeyCode::Down => Action::MoveCursor { rows: 1, columns: 0 },
        KeyCode::Char('k') | KeyCode::Up => Action::MoveCursor {
            rows: -1,
            columns: 0,
        },
        KeyCode::Char('l') | KeyCode::Right => Action::MoveCursor { rows: 0, columns: 1 },
        KeyCode::Char('h') | KeyCode::Left => Action::MoveCursor {
            rows: 0,
            columns: -1,
        },
        KeyCode::Char('g') | KeyCode::Home => Action::MoveCursor {
            rows: isize::MIN,
            columns: 0,
        },
        KeyCode::Char('G') | KeyCode::End => Action::MoveCursor {
            rows: isize::MAX,
            columns: 0,
        },
        KeyCode::Enter | KeyCode::Char('e') => Action::OpenPrompt(PromptKind::EditCell),
        KeyCode::Char('/') => Action::OpenPrompt(PromptKind::Filter),
        KeyCode::Char('f') => Action::OpenPrompt(PromptKind::Find),
        KeyCode::Char('n') => Action::FindNext,
        KeyCode::Char('r') => Action::OpenPrompt(PromptKind::Replace),
        KeyCode::Char('R') => Action::OpenPrompt(PromptKind::ReplaceAll),
        KeyCode::Char('+') => Action::OpenPrompt(PromptKind::AddColumn),
        KeyCode::Char('c') => Action::OpenPrompt(PromptKind::CloneColumn),
        KeyCode::Char('x') => Action::RequestRemoveColumn,
        KeyCode::Char('a') => Action::OpenPrompt(PromptKind::AddPoint),
        KeyCode::Char('<') => Action::ResizeColumn { grow: false },
        KeyCode::Char('>') => Action::ResizeColumn { grow: true },
        KeyCode::Char('w') => Action::WriteFile,
        KeyCode::Char('s') => Action::SaveToPlatform,
        KeyCode::Esc => Action::ClearSelection,
        _ => return None,
    };
    Some(action)
}

/// First column to draw so that `cursor` fits in `available` cells.
fn first_column(widths: &[u16], cursor: usize, available: u16) -> usize {
    let Some(&cursor_width) = widths.get(cursor) else {
        return 0;
    };
    let mut start = cursor;
    let mut used = cursor_width;
    while start > 0 {
        let next = used.saturating_add(widths[start - 1]).saturating_add(1);
        if next > available {
            break;
        }
        used = next;
        start -= 1;
    }
    start
}

/// Row to keep on screen: the range end in range mode, else the cursor.
fn anchor_row(view: &RegistryView) -> Option<usize> {
    let editor = &view.editor;
    if editor.in_range_mode() {
        let end = editor.keyboard_range().end;
        view.registry
            .rows()
            .iter()
            .position(|r| r.visible && r.virtual_index == end)
    } else {
        editor.selected_cell_row()
    }
}

fn row_style(view: &RegistryView, row: &RegistryRow) -> Style {
    let editor = &view.editor;
    if editor.in_range_mode() && editor.keyboard_range().contains(row.virtual_index) {
        theme::range_row()
    } else if row.selected {
        theme::fetched_row()
    } else {
        theme::row()
    }
}

impl Component for RegistryScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if self.view.is_none() {
            return Ok(None);
        }
        Ok(key_action(key, self.range_mode()))
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        if let Action::RegistryUpdated(view) = action {
            self.view.clone_from(view);
        }
        Ok(None)
    }

    #[allow(clippy::too_many_lines)]
    fn render(&self, frame: &mut Frame, area: Rect) {
        let Some(view) = &self.view else {
            self.render_empty(
                frame,
                area,
                "No registry open. Pick a device on the Devices screen (1).",
            );
            return;
        };

        let registry = &view.registry;
        let editor = &view.editor;
        let visible: Vec<(usize, &RegistryRow)> = registry
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, r)| r.visible)
            .collect();

        let dirty = if view.dirty { " *" } else { "" };
        let title = if visible.len() == registry.len() {
            format!(" {}{dirty} ({} points) ", view.device, registry.len())
        } else {
            format!(
                " {}{dirty} ({} of {} points) ",
                view.device,
                visible.len(),
                registry.len()
            )
        };
        let block = Block::default()
            .title(title)
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(self.focused));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let layout = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(inner);

        Self::render_status(view, frame, layout[0]);
        frame.render_widget(Paragraph::new(Self::hints(editor.in_range_mode())), layout[2]);

        if registry.is_empty() {
            let empty = Paragraph::new(Span::styled(
                "  No points. Press a to add one.",
                theme::key_hint(),
            ));
            frame.render_widget(empty, layout[1]);
            return;
        }

        let widths: Vec<u16> = registry
            .columns()
            .iter()
            .map(|c| (c.width / WIDTH_UNITS_PER_CHAR).max(1))
            .collect();
        let cursor_column = editor.selected_cell_column();
        let start = first_column(&widths, cursor_column.unwrap_or(0), layout[1].width);
        let cursor_row = editor.selected_cell_row();

        let header = Row::new(
            registry
                .columns()
                .iter()
                .skip(start)
                .map(|c| Cell::from(c.label.clone()).style(theme::header())),
        );

        let rows: Vec<Row> = visible
            .iter()
            .map(|&(index, row)| {
                let cells = row.cells.iter().enumerate().skip(start).map(|(column, cell)| {
                    let focused =
                        cursor_row == Some(index) && cursor_column == Some(column);
                    let style = if focused {
                        theme::cursor()
                    } else if cell.selected {
                        theme::find_match()
                    } else {
                        Style::default()
                    };
                    Cell::from(cell.value.clone()).style(style)
                });
                Row::new(cells).style(row_style(view, row))
            })
            .collect();

        let constraints: Vec<Constraint> = widths
            .iter()
            .skip(start)
            .map(|&w| Constraint::Length(w))
            .collect();
        let table = Table::new(rows, constraints)
            .header(header)
            .column_spacing(1);

        let selected = anchor_row(view).and_then(|r| visible.iter().position(|&(i, _)| i == r));
        let mut state = TableState::default().with_selected(selected);
        frame.render_stateful_widget(table, layout[1], &mut state);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn arrows_drive_the_range_only_in_range_mode() {
        assert!(matches!(
            key_action(press(KeyCode::Down), true),
            Some(Action::Editor(EditorKey::Down))
        ));
        assert!(matches!(
            key_action(press(KeyCode::Down), false),
            Some(Action::MoveCursor { rows: 1, columns: 0 })
        ));
        assert!(matches!(
            key_action(KeyEvent::new(KeyCode::Up, KeyModifiers::SHIFT), true),
            Some(Action::Editor(EditorKey::ExtendUp))
        ));
        assert!(matches!(
            key_action(KeyEvent::new(KeyCode::Char('J'), KeyModifiers::SHIFT), true),
            Some(Action::Editor(EditorKey::ExtendDown))
        ));
    }

    #[test]
    fn ctrl_r_toggles_range_mode_either_way() {
        let ctrl_r = KeyEvent::new(KeyCode::Char('r'), KeyModifiers::CONTROL);
        for range_mode in [false, true] {
            assert!(matches!(
                key_action(ctrl_r, range_mode),
                Some(Action::Editor(EditorKey::RangeMode))
            ));
        }
    }

    #[test]
    fn editing_keys_are_inert_in_range_mode() {
        assert!(key_action(press(KeyCode::Char('a')), true).is_none());
        assert!(matches!(
            key_action(press(KeyCode::Char('a')), false),
            Some(Action::OpenPrompt(PromptKind::AddPoint))
        ));
        assert!(matches!(
            key_action(press(KeyCode::Esc), true),
            Some(Action::Editor(EditorKey::Escape))
        ));
        assert!(matches!(
            key_action(press(KeyCode::Esc), false),
            Some(Action::ClearSelection)
        ));
    }

    #[test]
    fn first_column_scrolls_just_enough() {
        let widths = [20, 20, 20, 20];
        assert_eq!(first_column(&widths, 0, 50), 0);
        assert_eq!(first_column(&widths, 1, 50), 0);
        assert_eq!(first_column(&widths, 2, 50), 1);
        assert_eq!(first_column(&widths, 3, 50), 2);
        assert_eq!(first_column(&widths, 3, 200), 0);
        assert_eq!(first_column(&widths, 9, 50), 0);
    }
}
