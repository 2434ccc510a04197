// ── Keyboard range over virtual row indices ──

use serde::Serialize;

/// Inclusive `[start, end]` window over visible rows; `[-1, -1]` when cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyboardRange {
    pub start: isize,
    pub end: isize,
}

impl Default for KeyboardRange {
    fn default() -> Self {
        Self::CLEARED
    }
}

impl KeyboardRange {
    pub const CLEARED: Self = Self { start: -1, end: -1 };
    pub const FIRST: Self = Self { start: 0, end: 0 };

    pub fn is_cleared(&self) -> bool {
        self.start < 0 || self.end < 0
    }

    pub fn contains(&self, virtual_index: isize) -> bool {
        !self.is_cleared() && (self.start..=self.end).contains(&virtual_index)
    }

    /// Grow the window down by one; never past `last`, never shrinking.
    pub fn extend_down(&mut self, last: isize) {
        if last < 0 {
            return;
        }
        self.end = (self.end + 1).min(last).max(self.end);
    }

    /// Collapse to the single row after the window.
    pub fn move_down(&mut self, last: isize) {
        if last < 0 {
            return;
        }
        let next = (self.end + 1).min(last);
        self.start = next;
        self.end = next;
    }

    /// Grow the window up by one, stopping at 0.
    pub fn extend_up(&mut self, last: isize) {
        if last < 0 {
            return;
        }
        self.start = (self.start - 1).max(0);
    }

    /// Collapse to the single row before the window.
    pub fn move_up(&mut self, last: isize) {
        if last < 0 {
            return;
        }
        let prev = (self.start - 1).max(0);
        self.start = prev;
        self.end = prev;
    }

    /// Pull the window back inside `[0, last]` after rows disappear.
    pub fn clamp(&mut self, last: isize) {
        if self.is_cleared() {
            return;
        }
        if last < 0 {
            *self = Self::CLEARED;
            return;
        }
        self.end = self.end.min(last);
        self.start = self.start.min(self.end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extend_down_stops_at_last() {
        let mut range = KeyboardRange::FIRST;
        range.extend_down(2);
        range.extend_down(2);
        range.extend_down(2);
        assert_eq!(range, KeyboardRange { start: 0, end: 2 });
    }

    #[test]
    fn move_down_collapses_window() {
        let mut range = KeyboardRange { start: 0, end: 2 };
        range.move_down(5);
        assert_eq!(range, KeyboardRange { start: 3, end: 3 });
        range.move_down(3);
        assert_eq!(range, KeyboardRange { start: 3, end: 3 });
    }

    #[test]
    fn up_moves_clip_at_zero() {
        let mut range = KeyboardRange { start: 1, end: 3 };
        range.extend_up(5);
        range.extend_up(5);
        assert_eq!(range, KeyboardRange { start: 0, end: 3 });
        range.move_up(5);
        assert_eq!(range, KeyboardRange::FIRST);
    }

    #[test]
    fn nothing_visible_is_a_no_op() {
        let mut range = KeyboardRange::FIRST;
        range.move_down(-1);
        range.extend_down(-1);
        assert_eq!(range, KeyboardRange::FIRST);
    }

    #[test]
    fn clamp_after_removal() {
        let mut range = KeyboardRange { start: 3, end: 4 };
        range.clamp(2);
        assert_eq!(range, KeyboardRange { start: 2, end: 2 });
        range.clamp(-1);
        assert!(range.is_cleared());
    }
}
