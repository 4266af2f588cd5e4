//! The event-driven TUI runtime: a `Screen` of tiled windows plus a
//! LIFO popup stack, driven by a single-threaded `AppController` event
//! loop (see [`app::App`]).

mod ansi;
mod app;
mod cursor;
mod input;
mod popup;
mod screen;
mod window;
mod widgets;

pub use app::{App, run};
pub use cursor::Cursor;
pub use popup::{PickerWindow, PopupWindow};
pub use screen::Screen;
pub use widgets::LogSink;
pub use window::Window;
