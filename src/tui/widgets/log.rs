//! An in-memory log sink feeding the LogWindow.
//!
//! The source tool's process-wide logger is replaced here with an
//! explicit sink injected at construction: a `tracing_subscriber::Layer`
//! that appends formatted lines to a shared ring buffer, which the
//! LogWindow polls on each refresh. Tests construct a `LogSink`
//! directly and assert on its captured lines without touching global
//! subscriber state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const MAX_LINES: usize = 2000;

/// Shared handle to the captured log lines.
#[derive(Clone)]
pub struct LogSink {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(MAX_LINES))),
        }
    }

    fn push(&self, line: String) {
        let mut lines = self.lines.lock().unwrap();
        if lines.len() >= MAX_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    /// Returns every captured line, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().unwrap().iter().cloned().collect()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else if self.message.is_empty() {
            self.message = format!("{}={:?}", field.name(), value);
        }
    }
}

fn level_color(level: &Level) -> &'static str {
    match *level {
        Level::ERROR => "\u{1b}[31m",
        Level::WARN => "\u{1b}[33m",
        Level::INFO => "\u{1b}[32m",
        Level::DEBUG => "\u{1b}[36m",
        Level::TRACE => "\u{1b}[90m",
    }
}

impl<S: Subscriber> Layer<S> for LogSink {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);
        let level = event.metadata().level();
        let target = event.metadata().target();
        let line = format!(
            "{}{level:<5}\u{1b}[0m {target}: {}",
            level_color(level),
            visitor.message
        );
        self.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::prelude::*;

    #[test]
    fn captures_event_message_with_level_color() {
        let sink = LogSink::new();
        let subscriber = tracing_subscriber::registry().with(sink.clone());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("resized web1 to 2.6G");
        });
        let lines = sink.snapshot();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("resized web1 to 2.6G"));
        assert!(lines[0].contains("INFO"));
    }

    #[test]
    fn ring_buffer_drops_oldest_past_capacity() {
        let sink = LogSink::new();
        for i in 0..(MAX_LINES + 10) {
            sink.push(format!("line {i}"));
        }
        let lines = sink.snapshot();
        assert_eq!(lines.len(), MAX_LINES);
        assert_eq!(lines[0], "line 10");
    }
}
