//! Content-line formatters for each tiled window, kept separate from
//! the [`super::window::Window`] widget itself so they can be unit
//! tested against a [`crate::model::Snapshot`] directly.

mod log;
mod system;
mod vm;

pub use log::LogSink;
pub use system::format_system_lines;
pub use vm::{format_balloon_status, format_vm_lines};
