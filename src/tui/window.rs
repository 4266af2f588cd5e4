//! The base tiled/popup visible component.

use ratatui::layout::Rect;

use super::cursor::Cursor;
use crate::events::MouseButton;

/// A rectangular, scrollable region of text content with an optional
/// line cursor. Setters record invalidation but never draw directly;
/// drawing happens only from `Screen::repaint`.
pub struct Window {
    pub rect: Rect,
    pub caption: String,
    pub lines: Vec<String>,
    pub top_line: usize,
    pub cursor: Cursor,
    pub auto_scroll: bool,
    pub active: bool,
    invalidated: bool,
}

impl Window {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            rect: Rect::default(),
            caption: caption.into(),
            lines: Vec::new(),
            top_line: 0,
            cursor: Cursor::Free { position: 0 },
            auto_scroll: true,
            active: false,
            invalidated: true,
        }
    }

    pub fn with_cursor(mut self, cursor: Cursor) -> Self {
        self.cursor = cursor;
        self
    }

    pub fn with_auto_scroll(mut self, auto_scroll: bool) -> Self {
        self.auto_scroll = auto_scroll;
        self
    }

    /// Visible content rows, excluding the caption/border ratatui draws.
    pub fn viewport_lines(&self) -> usize {
        (self.rect.height as usize).saturating_sub(2).max(1)
    }

    pub fn invalidate(&mut self) {
        self.invalidated = true;
    }

    pub fn is_invalidated(&self) -> bool {
        self.invalidated
    }

    pub fn clear_invalidated(&mut self) {
        self.invalidated = false;
    }

    /// Replaces all content. If `auto_scroll`, snaps `top_line` to
    /// `max(0, len - viewport_lines)`.
    pub fn set_content(&mut self, lines: Vec<String>) {
        self.lines = lines;
        if self.auto_scroll {
            self.snap_to_bottom();
        }
        self.invalidate();
    }

    /// Appends `text`, splitting on newlines; auto-scroll applies.
    pub fn add_lines(&mut self, text: &str) {
        for line in text.split('\n') {
            self.lines.push(line.to_string());
        }
        if self.auto_scroll {
            self.snap_to_bottom();
        }
        self.invalidate();
    }

    pub fn add_line(&mut self, line: impl Into<String>) {
        self.add_lines(&line.into());
    }

    fn snap_to_bottom(&mut self) {
        let viewport = self.viewport_lines();
        self.top_line = self.lines.len().saturating_sub(viewport);
    }

    fn scroll_to_keep_cursor_visible(&mut self) {
        let pos = self.cursor.position();
        if pos < 0 {
            return;
        }
        let pos = pos as usize;
        let viewport = self.viewport_lines();
        if pos < self.top_line {
            self.top_line = pos;
        } else if pos >= self.top_line + viewport {
            self.top_line = pos + 1 - viewport;
        }
    }

    /// Default key map. Returns `true` if the key was consumed.
    pub fn handle_key(&mut self, key: &str) -> bool {
        let len = self.lines.len();
        let viewport = self.viewport_lines();
        let consumed = match key {
            "Up" | "k" => {
                self.cursor.move_up();
                true
            }
            "Down" | "j" => {
                self.cursor.move_down(len);
                true
            }
            "PageUp" => {
                self.top_line = self.top_line.saturating_sub(viewport);
                for _ in 0..viewport {
                    self.cursor.move_up();
                }
                true
            }
            "PageDown" => {
                self.top_line = (self.top_line + viewport).min(len.saturating_sub(1));
                for _ in 0..viewport {
                    self.cursor.move_down(len);
                }
                true
            }
            "Home" => {
                self.cursor.move_to_first();
                self.top_line = 0;
                true
            }
            "End" => {
                self.cursor.move_to_last(len);
                self.snap_to_bottom();
                true
            }
            "Ctrl-U" => {
                let half = (viewport / 2).max(1);
                self.top_line = self.top_line.saturating_sub(half);
                true
            }
            "Ctrl-D" => {
                let half = (viewport / 2).max(1);
                self.top_line = (self.top_line + half).min(len.saturating_sub(1));
                true
            }
            _ => false,
        };
        if consumed {
            self.scroll_to_keep_cursor_visible();
            self.invalidate();
        }
        consumed
    }

    /// Scroll events move the cursor by 4; clicks inside the viewport
    /// move the cursor to the clicked line index.
    pub fn handle_mouse(&mut self, button: MouseButton, x: u16, y: u16) -> bool {
        let len = self.lines.len();
        match button {
            MouseButton::ScrollUp => {
                for _ in 0..4 {
                    self.cursor.move_up();
                }
                self.scroll_to_keep_cursor_visible();
                self.invalidate();
                true
            }
            MouseButton::ScrollDown => {
                for _ in 0..4 {
                    self.cursor.move_down(len);
                }
                self.scroll_to_keep_cursor_visible();
                self.invalidate();
                true
            }
            MouseButton::Left => {
                if !self.contains(x, y) {
                    return false;
                }
                let row = (y.saturating_sub(self.rect.y + 1)) as usize;
                let target = self.top_line + row;
                if target < len {
                    self.cursor.move_to(target, len);
                    self.invalidate();
                }
                true
            }
            MouseButton::Middle | MouseButton::Right => false,
        }
    }

    pub fn contains(&self, x: u16, y: u16) -> bool {
        x >= self.rect.x
            && x < self.rect.x + self.rect.width
            && y >= self.rect.y
            && y < self.rect.y + self.rect.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_with(len: usize, height: u16) -> Window {
        let mut w = Window::new("test").with_auto_scroll(false);
        w.rect = Rect::new(0, 0, 40, height);
        w.set_content((0..len).map(|i| i.to_string()).collect());
        w
    }

    #[test]
    fn content_with_auto_scroll_snaps_to_bottom() {
        let mut w = Window::new("log");
        w.rect = Rect::new(0, 0, 40, 5);
        w.set_content((0..20).map(|i| i.to_string()).collect());
        assert_eq!(w.top_line, 20 - w.viewport_lines());
    }

    #[test]
    fn cursor_stays_in_bounds_after_key_sequence() {
        let mut w = window_with(10, 5);
        for _ in 0..50 {
            w.handle_key("Down");
        }
        assert_eq!(w.cursor.position(), 9);
        for _ in 0..50 {
            w.handle_key("Up");
        }
        assert_eq!(w.cursor.position(), 0);
    }

    #[test]
    fn home_and_end_jump_to_bounds() {
        let mut w = window_with(10, 5);
        w.handle_key("End");
        assert_eq!(w.cursor.position(), 9);
        w.handle_key("Home");
        assert_eq!(w.cursor.position(), 0);
    }

    #[test]
    fn mouse_click_moves_cursor_to_clicked_line() {
        let mut w = window_with(10, 5);
        w.rect = Rect::new(0, 0, 40, 5);
        w.handle_mouse(MouseButton::Left, 1, 2);
        assert_eq!(w.cursor.position(), 1);
    }
}
