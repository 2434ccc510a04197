//! Colors and semantic styles.

use ratatui::style::{Color, Modifier, Style};

pub const ACCENT: Color = Color::Rgb(225, 53, 255);
pub const CYAN: Color = Color::Rgb(128, 255, 234);
pub const PINK: Color = Color::Rgb(255, 106, 193);
pub const YELLOW: Color = Color::Rgb(241, 250, 140);
pub const GREEN: Color = Color::Rgb(80, 250, 123);
pub const RED: Color = Color::Rgb(255, 99, 99);

pub const TEXT: Color = Color::Rgb(189, 193, 207);
pub const MUTED: Color = Color::Rgb(98, 114, 164);
pub const BG_RANGE: Color = Color::Rgb(52, 40, 72);
pub const BG_POPUP: Color = Color::Rgb(30, 31, 41);

pub fn title() -> Style {
    Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
}

pub fn border(focused: bool) -> Style {
    Style::default().fg(if focused { ACCENT } else { MUTED })
}

pub fn header() -> Style {
    Style::default()
        .fg(CYAN)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn row() -> Style {
    Style::default().fg(TEXT)
}

/// Rows inside the keyboard range.
pub fn range_row() -> Style {
    Style::default().fg(TEXT).bg(BG_RANGE)
}

/// Rows whose extended attributes were requested.
pub fn fetched_row() -> Style {
    Style::default().fg(GREEN)
}

/// Cells matching the active find.
pub fn find_match() -> Style {
    Style::default().fg(Color::Black).bg(YELLOW)
}

/// The focused cell.
pub fn cursor() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(ACCENT)
        .add_modifier(Modifier::BOLD)
}

pub fn selected_row() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn tab(active: bool) -> Style {
    if active {
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(TEXT)
    }
}

pub fn key_hint() -> Style {
    Style::default().fg(MUTED)
}

pub fn key_hint_key() -> Style {
    Style::default().fg(CYAN).add_modifier(Modifier::BOLD)
}
