//! Maps `crossterm` terminal events onto the key-string/mouse-button
//! vocabulary [`Window::handle_key`](super::window::Window::handle_key)
//! and the rest of the application expect.
//!
//! The external-interface table in the source tool's terminal-input
//! section (raw escape sequences: `ESC[A`, `ESC[5~`, ...) is exactly
//! what `crossterm::event::read` already decodes for us, so no
//! hand-rolled byte parser is written here — this module only
//! translates `crossterm`'s typed events into the smaller vocabulary
//! `domtop`'s window model speaks.

use crossterm::event::{
    Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind,
};

use crate::events::{Event, MouseButton};

/// Converts one `crossterm` event into zero or one [`Event`]s for the
/// [`crate::events::EventQueue`]. Returns `None` for event kinds the
/// application doesn't act on (key releases/repeats' modifier-only
/// variants, focus, paste).
pub fn translate(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) => translate_key(key).map(Event::Key),
        CrosstermEvent::Mouse(mouse) => translate_mouse(mouse),
        CrosstermEvent::Resize(width, height) => Some(Event::TTYSize { width, height }),
        _ => None,
    }
}

fn translate_key(key: KeyEvent) -> Option<String> {
    if key.kind == crossterm::event::KeyEventKind::Release {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let s = match key.code {
        KeyCode::Up => "Up".to_string(),
        KeyCode::Down => "Down".to_string(),
        KeyCode::Left => "Left".to_string(),
        KeyCode::Right => "Right".to_string(),
        KeyCode::Home => "Home".to_string(),
        KeyCode::End => "End".to_string(),
        KeyCode::PageUp => "PageUp".to_string(),
        KeyCode::PageDown => "PageDown".to_string(),
        KeyCode::Enter => "Enter".to_string(),
        KeyCode::Esc => "Esc".to_string(),
        KeyCode::Char('u') if ctrl => "Ctrl-U".to_string(),
        KeyCode::Char('d') if ctrl => "Ctrl-D".to_string(),
        KeyCode::Char(c) => c.to_string(),
        _ => return None,
    };
    Some(s)
}

fn translate_mouse(mouse: MouseEvent) -> Option<Event> {
    let button = match mouse.kind {
        MouseEventKind::Down(crossterm::event::MouseButton::Left) => MouseButton::Left,
        MouseEventKind::Down(crossterm::event::MouseButton::Middle) => MouseButton::Middle,
        MouseEventKind::Down(crossterm::event::MouseButton::Right) => MouseButton::Right,
        MouseEventKind::ScrollUp => MouseButton::ScrollUp,
        MouseEventKind::ScrollDown => MouseButton::ScrollDown,
        _ => return None,
    };
    Some(Event::Mouse {
        button,
        x: mouse.column,
        y: mouse.row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyEventKind;

    #[test]
    fn translates_plain_char() {
        let event = CrosstermEvent::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(matches!(translate(event), Some(Event::Key(k)) if k == "q"));
    }

    #[test]
    fn translates_ctrl_u() {
        let event = CrosstermEvent::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert!(matches!(translate(event), Some(Event::Key(k)) if k == "Ctrl-U"));
    }

    #[test]
    fn translates_page_down() {
        let event = CrosstermEvent::Key(KeyEvent::new(KeyCode::PageDown, KeyModifiers::NONE));
        assert!(matches!(translate(event), Some(Event::Key(k)) if k == "PageDown"));
    }

    #[test]
    fn key_release_is_ignored() {
        let mut key_event = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        key_event.kind = KeyEventKind::Release;
        let event = CrosstermEvent::Key(key_event);
        assert!(translate(event).is_none());
    }

    #[test]
    fn translates_resize() {
        let event = CrosstermEvent::Resize(100, 40);
        assert!(matches!(
            translate(event),
            Some(Event::TTYSize { width: 100, height: 40 })
        ));
    }

    #[test]
    fn translates_scroll_down() {
        let mouse = MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 5,
            row: 6,
            modifiers: KeyModifiers::NONE,
        };
        let event = CrosstermEvent::Mouse(mouse);
        assert!(matches!(
            translate(event),
            Some(Event::Mouse {
                button: MouseButton::ScrollDown,
                x: 5,
                y: 6
            })
        ));
    }
}
