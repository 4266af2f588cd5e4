//! Layout tree: tiled windows plus a LIFO popup stack.

use std::collections::BTreeMap;
use std::io;

use ratatui::Frame;
use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};

use super::ansi;
use super::popup::{PickerWindow, PopupWindow};
use super::window::Window;

/// One entry on the popup stack: either a plain popup (closes on
/// `q`/Esc) or a picker (maps keys to options). Kept as an enum rather
/// than a trait object so the stack stays a plain `Vec` and callers
/// that only care about "the window to draw" go through `window()`.
enum PopupEntry {
    Plain(PopupWindow),
    Picker(PickerWindow),
}

impl PopupEntry {
    fn window(&self) -> &Window {
        match self {
            PopupEntry::Plain(p) => &p.window,
            PopupEntry::Picker(p) => &p.popup.window,
        }
    }

    fn window_mut(&mut self) -> &mut Window {
        match self {
            PopupEntry::Plain(p) => &mut p.window,
            PopupEntry::Picker(p) => &mut p.popup.window,
        }
    }
}

/// Holds the tiled windows (keyed by their keyboard shortcut) and the
/// popup stack; the topmost popup receives input.
///
/// All mutating methods are expected to run only from the event loop
/// thread (enforced at the call site by routing every mutation through
/// `EventQueue::submit`/the handler passed to `run_loop`).
pub struct Screen {
    tiled: BTreeMap<char, Window>,
    tiled_order: Vec<char>,
    active: char,
    popups: Vec<PopupEntry>,
    full_repaint: bool,
    size: Rect,
    status_rect: Rect,
    status_line: String,
}

impl Screen {
    pub fn new(windows: Vec<(char, Window)>) -> Self {
        let tiled_order = windows.iter().map(|(c, _)| *c).collect::<Vec<_>>();
        let active = tiled_order.first().copied().unwrap_or('1');
        let mut tiled: BTreeMap<char, Window> = windows.into_iter().collect();
        if let Some(w) = tiled.get_mut(&active) {
            w.active = true;
        }
        Self {
            tiled,
            tiled_order,
            active,
            popups: Vec::new(),
            full_repaint: true,
            size: Rect::default(),
            status_rect: Rect::default(),
            status_line: String::new(),
        }
    }

    pub fn active_shortcut(&self) -> char {
        self.active
    }

    pub fn window(&self, shortcut: char) -> Option<&Window> {
        self.tiled.get(&shortcut)
    }

    pub fn window_mut(&mut self, shortcut: char) -> Option<&mut Window> {
        self.tiled.get_mut(&shortcut)
    }

    pub fn active_window_mut(&mut self) -> Option<&mut Window> {
        let active = self.active;
        self.tiled.get_mut(&active)
    }

    /// Switches keyboard focus to the tiled window with this shortcut.
    pub fn set_active(&mut self, shortcut: char) {
        if !self.tiled.contains_key(&shortcut) || shortcut == self.active {
            return;
        }
        if let Some(w) = self.tiled.get_mut(&self.active) {
            w.active = false;
            w.invalidate();
        }
        self.active = shortcut;
        if let Some(w) = self.tiled.get_mut(&shortcut) {
            w.active = true;
            w.invalidate();
        }
    }

    pub fn invalidate(&mut self, shortcut: char) {
        if let Some(w) = self.tiled.get_mut(&shortcut) {
            w.invalidate();
        }
    }

    pub fn has_popup(&self) -> bool {
        !self.popups.is_empty()
    }

    /// Returns the topmost popup, if it is a plain (non-picker) popup.
    pub fn top_popup_mut(&mut self) -> Option<&mut PopupWindow> {
        match self.popups.last_mut()? {
            PopupEntry::Plain(p) => Some(p),
            PopupEntry::Picker(_) => None,
        }
    }

    /// Returns the topmost popup, if it is a picker.
    pub fn top_picker_mut(&mut self) -> Option<&mut PickerWindow> {
        match self.popups.last_mut()? {
            PopupEntry::Picker(p) => Some(p),
            PopupEntry::Plain(_) => None,
        }
    }

    pub fn add_popup(&mut self, popup: PopupWindow) {
        self.popups.push(PopupEntry::Plain(popup));
        self.full_repaint = true;
    }

    pub fn add_picker(&mut self, picker: PickerWindow) {
        self.popups.push(PopupEntry::Picker(picker));
        self.full_repaint = true;
    }

    /// Pops the topmost popup. Triggers a full repaint (per the
    /// repaint policy: popup removal forces everything to redraw so
    /// the area it covered is cleared).
    pub fn remove_top_popup(&mut self) {
        self.popups.pop();
        self.full_repaint = true;
    }

    /// Recomputes tiled window rects from the current screen size using
    /// `relayout`, called on TTY resize. Reserves the bottom row for the
    /// status line before handing the rest to `relayout`.
    pub fn layout<F>(&mut self, size: Rect, relayout: F)
    where
        F: FnOnce(&mut BTreeMap<char, Window>, Rect),
    {
        self.size = size;
        let tiled_height = size.height.saturating_sub(1);
        let tiled_area = Rect::new(size.x, size.y, size.width, tiled_height);
        self.status_rect = Rect::new(size.x, size.y + tiled_height, size.width, size.height - tiled_height);
        relayout(&mut self.tiled, tiled_area);
        self.full_repaint = true;
    }

    pub fn size(&self) -> Rect {
        self.size
    }

    /// Sets the one-line status bar text; no-op (no repaint triggered)
    /// if the text is unchanged.
    pub fn set_status_line(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.status_line {
            self.status_line = text;
            self.full_repaint = true;
        }
    }

    /// Draws a frame if anything is invalidated or a full repaint is
    /// pending; returns whether a draw happened.
    ///
    /// ratatui redraws the whole frame buffer on every `Terminal::draw`
    /// call and diffs it against the previous one internally, so the
    /// "repaint only invalidated tiled windows, clip-or-overdraw
    /// popups" policy collapses here to: decide *whether* to draw at
    /// all (coalescing consecutive invalidations into one frame), not
    /// *which* widgets to draw — ratatui's own diffing already avoids
    /// the redundant terminal writes the manual scheme was for.
    pub fn repaint<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<bool> {
        let any_tiled_dirty = self.tiled.values().any(Window::is_invalidated);
        let any_popup_dirty = self.popups.iter().any(|p| p.window().is_invalidated());
        if !self.full_repaint && !any_tiled_dirty && !any_popup_dirty {
            return Ok(false);
        }

        terminal.draw(|frame| self.render(frame))?;

        for w in self.tiled.values_mut() {
            w.clear_invalidated();
        }
        for p in &mut self.popups {
            p.window_mut().clear_invalidated();
        }
        self.full_repaint = false;
        Ok(true)
    }

    fn render(&self, frame: &mut Frame) {
        for shortcut in &self.tiled_order {
            if let Some(window) = self.tiled.get(shortcut) {
                render_window(frame, window);
            }
        }
        for popup in &self.popups {
            render_window(frame, popup.window());
        }
        if self.status_rect.height > 0 {
            let line = Line::from(ansi::to_spans(&self.status_line));
            frame.render_widget(Paragraph::new(line), self.status_rect);
        }
    }
}

fn render_window(frame: &mut Frame, window: &Window) {
    if window.rect.width == 0 || window.rect.height == 0 {
        return;
    }
    let mut border_style = Style::default();
    if window.active {
        border_style = border_style.add_modifier(Modifier::BOLD);
    }
    let block = Block::default()
        .title(window.caption.clone())
        .borders(Borders::ALL)
        .border_style(border_style);

    let viewport = window.viewport_lines();
    let cursor_pos = window.cursor.position();
    let lines: Vec<Line> = window
        .lines
        .iter()
        .skip(window.top_line)
        .take(viewport)
        .enumerate()
        .map(|(i, line)| {
            let absolute = window.top_line + i;
            let spans = ansi::to_spans(line);
            let mut rendered = Line::from(spans);
            if cursor_pos >= 0 && absolute == cursor_pos as usize {
                rendered = rendered.patch_style(Style::default().add_modifier(Modifier::REVERSED));
            }
            rendered
        })
        .collect();

    let paragraph = Paragraph::new(lines).block(block);
    frame.render_widget(paragraph, window.rect);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_active_moves_focus_and_invalidates_both() {
        let windows = vec![('1', Window::new("a")), ('2', Window::new("b"))];
        let mut screen = Screen::new(windows);
        assert_eq!(screen.active_shortcut(), '1');
        screen.window_mut('1').unwrap().clear_invalidated();
        screen.window_mut('2').unwrap().clear_invalidated();

        screen.set_active('2');
        assert_eq!(screen.active_shortcut(), '2');
        assert!(screen.window('1').unwrap().is_invalidated());
        assert!(screen.window('2').unwrap().is_invalidated());
    }

    #[test]
    fn remove_top_popup_forces_full_repaint() {
        let windows = vec![('1', Window::new("a"))];
        let mut screen = Screen::new(windows);
        screen.add_popup(PopupWindow::new("popup", 5));
        assert!(screen.has_popup());
        screen.remove_top_popup();
        assert!(!screen.has_popup());
    }

    #[test]
    fn picker_is_reachable_only_through_top_picker_mut() {
        let windows = vec![('1', Window::new("a"))];
        let mut screen = Screen::new(windows);
        screen.layout(Rect::new(0, 0, 80, 24), |_, _| {});
        let picker = PickerWindow::new("power", vec![('s', "start")], screen.size());
        screen.add_picker(picker);
        assert!(screen.has_popup());
        assert!(screen.top_popup_mut().is_none());
        assert!(screen.top_picker_mut().is_some());
    }
}
