//! One-line text prompts and yes/no confirmation popups.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::Rect,
    style::Style,
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph},
};

use crate::action::{ConfirmAction, PromptKind};
use crate::theme;
use crate::widgets::centered;

/// Where a key press left an open prompt.
#[derive(Debug, PartialEq, Eq)]
pub enum PromptOutcome {
    Editing,
    Submitted(String),
    Canceled,
}

#[derive(Debug, Clone)]
pub struct Prompt {
    pub kind: PromptKind,
    pub input: String,
}

impl Prompt {
    pub fn new(kind: PromptKind, initial: impl Into<String>) -> Self {
        Self {
            kind,
            input: initial.into(),
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> PromptOutcome {
        match key.code {
            KeyCode::Esc => PromptOutcome::Canceled,
            KeyCode::Enter => PromptOutcome::Submitted(std::mem::take(&mut self.input)),
            KeyCode::Backspace => {
                self.input.pop();
                PromptOutcome::Editing
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.input.clear();
                PromptOutcome::Editing
            }
            KeyCode::Char(c) => {
                self.input.push(c);
                PromptOutcome::Editing
            }
            _ => PromptOutcome::Editing,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let popup = centered(area, 60, 3);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(format!(" {} ", self.kind.title()))
            .title_style(theme::title())
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border(true))
            .style(Style::default().bg(theme::BG_POPUP));

        let line = Line::from(vec![
            Span::styled(" ", theme::row()),
            Span::styled(self.input.as_str(), theme::row()),
            Span::styled("█", Style::default().fg(theme::ACCENT)),
        ]);
        frame.render_widget(Paragraph::new(line).block(block), popup);
    }
}

pub fn render_confirm(frame: &mut Frame, area: Rect, action: &ConfirmAction) {
    let question = action.to_string();
    let width = u16::try_from(question.len() + 6).unwrap_or(u16::MAX).max(30);
    let popup = centered(area, width, 5);
    frame.render_widget(Clear, popup);

    let block = Block::default()
        .title(" Confirm ")
        .title_style(theme::title())
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme::YELLOW))
        .style(Style::default().bg(theme::BG_POPUP));

    let lines = vec![
        Line::from(Span::styled(format!(" {question}"), theme::row())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" y ", theme::key_hint_key()),
            Span::styled("yes   ", theme::key_hint()),
            Span::styled("n/Esc ", theme::key_hint_key()),
            Span::styled("no", theme::key_hint()),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn typing_and_submitting() {
        let mut prompt = Prompt::new(PromptKind::Find, "");
        for c in "AHUX".chars() {
            assert_eq!(prompt.handle_key(press(KeyCode::Char(c))), PromptOutcome::Editing);
        }
        prompt.handle_key(press(KeyCode::Backspace));
        assert_eq!(
            prompt.handle_key(press(KeyCode::Enter)),
            PromptOutcome::Submitted("AHU".into())
        );
    }

    #[test]
    fn ctrl_u_clears_prefill() {
        let mut prompt = Prompt::new(PromptKind::EditCell, "degF");
        prompt.handle_key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert!(prompt.input.is_empty());
        assert_eq!(prompt.handle_key(press(KeyCode::Esc)), PromptOutcome::Canceled);
    }
}
