//! Centered, overlapping windows on the screen's LIFO popup stack.

use ratatui::layout::Rect;

use super::cursor::Cursor;
use super::window::Window;
use crate::tui::ansi;

/// A centered popup sized from its content. Closes on `q`/Esc unless a
/// subclass consumes the key first.
pub struct PopupWindow {
    pub window: Window,
    max_height: u16,
}

impl PopupWindow {
    pub fn new(caption: impl Into<String>, max_height: u16) -> Self {
        Self {
            window: Window::new(caption).with_auto_scroll(false),
            max_height,
        }
    }

    /// Recomputes size from content and recenters within `screen`.
    pub fn set_content(&mut self, lines: Vec<String>, screen: Rect) {
        self.window.set_content(lines);
        self.resize_and_center(screen);
    }

    fn resize_and_center(&mut self, screen: Rect) {
        let width = self
            .window
            .lines
            .iter()
            .map(|l| ansi::width(l))
            .max()
            .unwrap_or(0) as u16
            + 4;
        let content_height = self.window.lines.len() as u16 + 2;
        let height = content_height.min(self.max_height);

        let max_width = (screen.width as u32 * 8 / 10).max(1) as u16;
        let max_height = (screen.height as u32 * 8 / 10).max(1) as u16;
        let width = width.min(max_width).max(1);
        let height = height.min(max_height).max(1);

        let x = screen.x + (screen.width.saturating_sub(width)) / 2;
        let y = screen.y + (screen.height.saturating_sub(height)) / 2;
        self.window.rect = Rect::new(x, y, width, height);

        if (self.window.lines.len() as u16) > self.max_height {
            self.window.cursor = Cursor::free();
        }
    }

    /// Returns `true` if the key closed the popup (caller should pop it
    /// off the screen's stack).
    pub fn handle_key_default(&self, key: &str) -> bool {
        matches!(key, "q" | "Esc")
    }
}

/// Maps single-character keys to callbacks; pressing a listed key, or
/// Enter when the cursor is on an option, invokes the callback and
/// closes. Any other key closes silently.
pub struct PickerWindow {
    pub popup: PopupWindow,
    options: Vec<(char, String)>,
}

impl PickerWindow {
    pub fn new(caption: impl Into<String>, options: Vec<(char, &str)>, screen: Rect) -> Self {
        let mut popup = PopupWindow::new(caption, 10);
        let lines: Vec<String> = options
            .iter()
            .map(|(key, label)| format!("{key}  {label}"))
            .collect();
        popup.set_content(lines, screen);
        popup.window.cursor = Cursor::free();
        Self {
            popup,
            options: options.into_iter().map(|(k, l)| (k, l.to_string())).collect(),
        }
    }

    /// Returns the index of the chosen option, if any, and whether the
    /// popup should close as a result of handling this key.
    pub fn handle_key(&mut self, key: &str) -> (Option<usize>, bool) {
        if key == "Enter" {
            let pos = self.popup.window.cursor.position();
            if pos >= 0 {
                return (Some(pos as usize), true);
            }
            return (None, true);
        }
        if let Some(c) = single_char(key) {
            if let Some(idx) = self.options.iter().position(|(k, _)| *k == c) {
                return (Some(idx), true);
            }
        }
        if self.popup.handle_key_default(key) {
            return (None, true);
        }
        if self.popup.window.handle_key(key) {
            return (None, false);
        }
        // Any other key closes the picker silently.
        (None, true)
    }
}

fn single_char(key: &str) -> Option<char> {
    let mut chars = key.chars();
    let c = chars.next()?;
    if chars.next().is_none() { Some(c) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_sizes_from_content_and_clamps_to_screen() {
        let mut popup = PopupWindow::new("title", 20);
        let screen = Rect::new(0, 0, 80, 24);
        popup.set_content(
            vec!["short".to_string(), "a longer line of text".to_string()],
            screen,
        );
        assert_eq!(popup.window.rect.width, "a longer line of text".len() as u16 + 4);
        assert!(popup.window.rect.x + popup.window.rect.width <= screen.width);
    }

    #[test]
    fn picker_maps_listed_key_to_option() {
        let screen = Rect::new(0, 0, 80, 24);
        let mut picker = PickerWindow::new(
            "power",
            vec![('s', "start"), ('o', "shutdown"), ('r', "reboot"), ('R', "reset")],
            screen,
        );
        let (chosen, close) = picker.handle_key("r");
        assert_eq!(chosen, Some(2));
        assert!(close);
    }

    #[test]
    fn picker_enter_chooses_cursor_option() {
        let screen = Rect::new(0, 0, 80, 24);
        let mut picker = PickerWindow::new(
            "power",
            vec![('s', "start"), ('o', "shutdown")],
            screen,
        );
        picker.popup.window.cursor.move_down(2);
        let (chosen, close) = picker.handle_key("Enter");
        assert_eq!(chosen, Some(1));
        assert!(close);
    }

    #[test]
    fn picker_unlisted_key_closes_silently() {
        let screen = Rect::new(0, 0, 80, 24);
        let mut picker = PickerWindow::new("power", vec![('s', "start")], screen);
        let (chosen, close) = picker.handle_key("z");
        assert_eq!(chosen, None);
        assert!(close);
    }
}
