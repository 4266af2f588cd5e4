//! ANSI SGR handling for window content lines.
//!
//! Window content lines carry raw ANSI color escapes (as produced by
//! the formatting helpers); printable width is measured after
//! stripping them, and `to_spans` converts a line into ratatui
//! `Span`s for `repaint()`.

use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

/// Strips every `ESC [ ... m` SGR sequence from `text`.
pub fn strip(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            chars.next();
            for c2 in chars.by_ref() {
                if c2 == 'm' {
                    break;
                }
            }
            continue;
        }
        out.push(c);
    }
    out
}

/// Printable width of `text`, ignoring ANSI escapes.
pub fn width(text: &str) -> usize {
    strip(text).chars().count()
}

fn apply_code(style: Style, code: u32) -> Style {
    match code {
        0 => Style::default(),
        1 => style.add_modifier(Modifier::BOLD),
        2 => style.add_modifier(Modifier::DIM),
        4 => style.add_modifier(Modifier::UNDERLINED),
        7 => style.add_modifier(Modifier::REVERSED),
        30 => style.fg(Color::Black),
        31 => style.fg(Color::Red),
        32 => style.fg(Color::Green),
        33 => style.fg(Color::Yellow),
        34 => style.fg(Color::Blue),
        35 => style.fg(Color::Magenta),
        36 => style.fg(Color::Cyan),
        37 => style.fg(Color::White),
        39 => style.fg(Color::Reset),
        90 => style.fg(Color::DarkGray),
        91 => style.fg(Color::LightRed),
        92 => style.fg(Color::LightGreen),
        93 => style.fg(Color::LightYellow),
        94 => style.fg(Color::LightBlue),
        _ => style,
    }
}

/// Converts one content line carrying ANSI SGR escapes into owned
/// ratatui spans, applying each recognized code cumulatively.
pub fn to_spans(text: &str) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut style = Style::default();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\u{1b}' && chars.peek() == Some(&'[') {
            if !current.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut current), style));
            }
            chars.next();
            let mut code_str = String::new();
            for c2 in chars.by_ref() {
                if c2 == 'm' {
                    break;
                }
                code_str.push(c2);
            }
            for part in code_str.split(';') {
                if let Ok(code) = part.parse::<u32>() {
                    style = apply_code(style, code);
                } else if part.is_empty() {
                    style = apply_code(style, 0);
                }
            }
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        spans.push(Span::styled(current, style));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_removes_color_codes() {
        assert_eq!(strip("\u{1b}[31mhello\u{1b}[0m"), "hello");
    }

    #[test]
    fn width_ignores_ansi() {
        assert_eq!(width("\u{1b}[31mhello\u{1b}[0m"), 5);
        assert_eq!(width("plain"), 5);
    }

    #[test]
    fn to_spans_splits_on_color_change() {
        let spans = to_spans("\u{1b}[31mred\u{1b}[0mplain");
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].content, "red");
        assert_eq!(spans[1].content, "plain");
    }
}
