//! Devices screen: what the last scan found.

use std::sync::Arc;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState};
use throbber_widgets_tui::{Throbber, ThrobberState};

use bacreg_core::{Device, ScanState};

use crate::action::{Action, InventoryView};
use crate::component::Component;
use crate::theme;

pub struct DevicesScreen {
    focused: bool,
    view: Option<Arc<InventoryView>>,
    table_state: TableState,
    throbber_state: ThrobberState,
}

impl DevicesScreen {
    pub fn new() -> Self {
        Self {
            focused: false,
            view: None,
            table_state: TableState::default(),
            throbber_state: ThrobberState::default(),
        }
    }

    fn devices(&self) -> &[Device] {
        self.view.as_ref().map_or(&[], |v| v.devices.as_slice())
    }

    fn selected_index(&self) -> usize {
        self.table_state.selected().unwrap_or(0)
    }

    fn select(&mut self, idx: usize) {
        let len = self.devices().len();
        let clamped = if len == 0 { 0 } else { idx.min(len - 1) };
        self.table_state.select(Some(clamped));
    }

    fn move_selection(&mut self, delta: isize) {
        if self.devices().is_empty() {
            return;
        }
        self.select(self.selected_index().saturating_add_signed(delta));
    }

    fn selected_device(&self) -> Option<&Device> {
        self.devices().get(self.selected_index())
    }

    fn connected(&self) -> bool {
        self.view.as_ref().is_some_and(|v| v.connected)
    }

    fn render_status(&self, frame: &mut Frame, area: Rect) {
        let Some(view) = &self.view else {
            return;
        };
        if view.state == ScanState::Scanning {
            let label = format!(" Scanning… {} found", view.devices.len());
            let throbber = Throbber::default()
                .label(label)
                .style(Style::default().fg(theme::CYAN))
                .throbber_style(Style::default().fg(theme::ACCENT));
            frame.render_stateful_widget(throbber, area, &mut self.throbber_state.clone());
            return;
        }

        let mut spans = vec![Span::styled(
            format!(" Scan {}", view.state),
            Style::default().fg(theme::CYAN),
        )];
        if let Some(key) = &view.configuring {
            spans.push(Span::styled(
                format!("   collecting points from {key}"),
                Style::default().fg(theme::YELLOW),
            ));
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn hints(&self) -> Line<'static> {
        let mut spans = vec![
            Span::styled("  j/k ", theme::key_hint_key()),
            Span::styled("navigate  ", theme::key_hint()),
            Span::styled("Enter ", theme::key_hint_key()),
            Span::styled("open registry  ", theme::key_hint()),
        ];
        if self.connected() {
            spans.extend([
                Span::styled("p ", theme::key_hint_key()),
                Span::styled("collect points  ", theme::key_hint()),
                Span::styled("s ", theme::key_hint_key()),
                Span::styled("scan  ", theme::key_hint()),
                Span::styled("x ", theme::key_hint_key()),
                Span::styled("cancel", theme::key_hint()),
            ]);
        }
        Line::from(spans)
    }
}

/// Table cell text for an optional device attribute.
fn or_dash(value: Option<&String>) -> String {
    value.map_or_else(|| "—".into(), Clone::clone)
}

impl Component for DevicesScreen {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.move_selection(1);
                None
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.move_selection(-1);
                None
            }
            KeyCode::Char('g') => {
                self.select(0);
                None
            }
            KeyCode::Char('G') => {
                self.select(usize::MAX);
                None
            }
            KeyCode::Enter => self.selected_device().map(|d| Action::OpenDevice(d.key())),
            KeyCode::Char('p') => self
                .selected_device()
                .map(|d| Action::ConfigureDevice(d.key())),
            KeyCode::Char('s') => Some(Action::StartScan),
            KeyCode::Char('x') => Some(Action::CancelScan),
            _ => None,
        };
        Ok(action)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::InventoryUpdated(view) => {
                self.view = Some(Arc::clone(view));
                let len = self.devices().len();
                if len == 0 {
                    self.table_state.select(None);
                } else if self.table_state.selected().is_none_or(|i| i >= len) {
                    self.select(len - 1);
                }
            }
            Action::Tick => {
                if self.view.as_ref().is_some_and(|v| v.state == ScanState::Scanning) {
                    self.throbber_state.calc_next();
                }
            }
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let devices = self.devices();
        let block = Block::default()
            .title(format!(" Devices ({}) ", devices.len()))
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(self.focused));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let warnings: Vec<&String> = self.view.iter().flat_map(|v| &v.warnings).collect();
        let warning_rows = u16::try_from(warnings.len()).unwrap_or(u16::MAX).min(4);

        let layout = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(warning_rows),
            Constraint::Length(1),
        ])
        .split(inner);

        self.render_status(frame, layout[0]);

        let header = Row::new(
            ["ID", "Address", "Name", "Vendor", "Max APDU", "Segmentation", "Points"]
                .map(|h| Cell::from(h).style(theme::header())),
        );

        let configuring = self.view.as_ref().and_then(|v| v.configuring.as_ref());
        let selected_idx = self.selected_index();
        let rows: Vec<Row> = devices
            .iter()
            .enumerate()
            .map(|(i, device)| {
                let is_selected = i == selected_idx;
                let prefix = if is_selected { "▸" } else { " " };
                let points = if configuring.is_some_and(|k| device.matches(k)) {
                    format!("{}…", device.registry.len())
                } else {
                    device.registry.len().to_string()
                };
                Row::new(vec![
                    Cell::from(format!("{prefix}{}", device.id))
                        .style(Style::default().fg(theme::CYAN)),
                    Cell::from(device.address.clone()).style(Style::default().fg(theme::PINK)),
                    Cell::from(or_dash(device.name.as_ref())),
                    Cell::from(or_dash(device.vendor_id.as_ref())),
                    Cell::from(or_dash(device.max_apdu_length.as_ref())),
                    Cell::from(or_dash(device.segmentation.as_ref())),
                    Cell::from(points),
                ])
                .style(if is_selected {
                    theme::selected_row()
                } else {
                    theme::row()
                })
            })
            .collect();

        let widths = [
            Constraint::Length(10),
            Constraint::Length(18),
            Constraint::Min(16),
            Constraint::Length(8),
            Constraint::Length(9),
            Constraint::Length(16),
            Constraint::Length(8),
        ];
        let table = Table::new(rows, widths)
            .header(header)
            .row_highlight_style(theme::selected_row());
        let mut state = self.table_state;
        frame.render_stateful_widget(table, layout[1], &mut state);

        if !warnings.is_empty() {
            let lines: Vec<Line> = warnings
                .iter()
                .map(|w| {
                    Line::from(vec![
                        Span::styled(" ! ", Style::default().fg(theme::YELLOW)),
                        Span::styled(w.as_str(), theme::row()),
                    ])
                })
                .collect();
            frame.render_widget(Paragraph::new(lines), layout[2]);
        }

        frame.render_widget(Paragraph::new(self.hints()), layout[3]);
    }

    fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use bacreg_core::DeviceKey;
    use crossterm::event::KeyModifiers;

    fn view(ids: &[&str]) -> Arc<InventoryView> {
        Arc::new(InventoryView {
            devices: ids
                .iter()
                .map(|id| Device::new(DeviceKey::new(*id, "10.0.0.1"), "vc", Vec::new()))
                .collect(),
            warnings: Vec::new(),
            state: ScanState::Completed,
            configuring: None,
            connected: true,
        })
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn enter_opens_the_selected_device() {
        let mut screen = DevicesScreen::new();
        screen
            .update(&Action::InventoryUpdated(view(&["100", "200"])))
            .unwrap();
        screen.handle_key_event(press(KeyCode::Down)).unwrap();

        let action = screen.handle_key_event(press(KeyCode::Enter)).unwrap();
        assert!(matches!(action, Some(Action::OpenDevice(key)) if key.id == "200"));
    }

    #[test]
    fn selection_clamps_when_the_inventory_shrinks() {
        let mut screen = DevicesScreen::new();
        screen
            .update(&Action::InventoryUpdated(view(&["1", "2", "3"])))
            .unwrap();
        screen.select(2);
        screen.update(&Action::InventoryUpdated(view(&["1"]))).unwrap();
        assert_eq!(screen.selected_index(), 0);

        screen.update(&Action::InventoryUpdated(view(&[]))).unwrap();
        assert!(screen.selected_device().is_none());
        assert!(screen.handle_key_event(press(KeyCode::Enter)).unwrap().is_none());
    }
}
