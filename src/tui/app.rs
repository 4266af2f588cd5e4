//! AppController: composes the cache, the ballooning controller, and
//! the three tiled windows into one event-driven dashboard.
//!
//! State mutation is single-owner (the event loop thread); background
//! producer threads only ever `post`/`submit` onto the `EventQueue`, per
//! the concurrency model. `run` wraps the mutable state behind an
//! `Arc<Mutex<_>>` purely so those producer threads can hand mutating
//! closures back to the loop thread through `submit` — the mutex is
//! never contended, since only the loop thread ever locks it to act on
//! a dequeued item.

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ratatui::Terminal;
use ratatui::backend::Backend;
use ratatui::layout::Rect;
use tracing::warn;

use super::cursor::Cursor;
use super::input;
use super::popup::PickerWindow;
use super::screen::Screen;
use super::widgets;
use super::window::Window;
use crate::balloon::{self, BallooningParams};
use crate::cache::SamplingCache;
use crate::events::{Event, EventQueue, FatalError, MouseButton};
use crate::hypervisor::{Adapter, CommandRunner};
use crate::sysinfo::{FileSystem, Provider};
use crate::tui::widgets::LogSink;

const VM_SHORTCUT: char = '1';
const SYSTEM_SHORTCUT: char = '2';
const LOG_SHORTCUT: char = '3';
const SYSTEM_WINDOW_HEIGHT: u16 = 13;
const SYSTEM_WINDOW_MAX_WIDTH: u16 = 60;

/// Holds every piece of mutable dashboard state owned by the event loop.
pub struct App<R, F>
where
    R: CommandRunner + Clone + 'static,
    F: FileSystem + 'static,
{
    screen: Screen,
    cache: SamplingCache<R, F>,
    balloon: balloon::Controller,
    adapter: Adapter<R>,
    log_sink: LogSink,
    viewer_command: String,
    show_disks_when_stopped: bool,
    vm_line_owner: Vec<String>,
    pending_power_target: Option<String>,
}

impl<R, F> App<R, F>
where
    R: CommandRunner + Clone + 'static,
    F: FileSystem + 'static,
{
    pub fn new(
        adapter: Adapter<R>,
        provider: Provider<F>,
        runner: R,
        log_sink: LogSink,
        viewer_command: impl Into<String>,
    ) -> Self {
        let cache = SamplingCache::new(adapter.clone(), provider, runner);
        let balloon = balloon::Controller::new(BallooningParams::default());
        let screen = Screen::new(vec![
            (VM_SHORTCUT, Window::new("VMs").with_auto_scroll(false)),
            (
                SYSTEM_SHORTCUT,
                Window::new("System").with_cursor(Cursor::None).with_auto_scroll(false),
            ),
            (LOG_SHORTCUT, Window::new("Log")),
        ]);
        Self {
            screen,
            cache,
            balloon,
            adapter,
            log_sink,
            viewer_command: viewer_command.into(),
            show_disks_when_stopped: false,
            vm_line_owner: Vec::new(),
            pending_power_target: None,
        }
    }

    /// Recomputes tiled window rects and the status bar from the current
    /// terminal size; called at startup and on every resize event.
    pub fn relayout(&mut self, size: Rect) {
        self.screen.layout(size, relayout_tiled);
        self.refresh_status_line();
    }

    /// Draws a frame if anything is invalidated; see `Screen::repaint`.
    pub fn repaint<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<bool> {
        self.screen.repaint(terminal)
    }

    /// Runs one sampling tick: refresh the cache, run the ballooning
    /// controller over the new snapshot, then refresh window content.
    pub fn on_tick(&mut self) {
        if let Err(e) = self.cache.update() {
            warn!(error = %e, "sampling cache update failed");
            self.refresh_windows();
            return;
        }
        let snapshot = self.cache.snapshot().clone();
        let adapter = self.adapter.clone();
        let statuses = self.balloon.update(&snapshot, move |name, bytes| {
            adapter
                .set_memory(name, bytes)
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        });
        for (name, status) in &statuses {
            match status {
                balloon::Status::Updated { .. } => {
                    tracing::info!("{}", widgets::format_balloon_status(name, status));
                }
                balloon::Status::BackingOff { .. } => {
                    tracing::debug!("{}", widgets::format_balloon_status(name, status));
                }
                _ => {}
            }
        }
        self.refresh_windows();
    }

    /// Handles one keyboard event. Returns `false` when the key means
    /// the application should quit (bare `q`/Esc with no popup open).
    pub fn handle_key(&mut self, key: &str) -> bool {
        if let Some(picker) = self.screen.top_picker_mut() {
            let (chosen, close) = picker.handle_key(key);
            if let Some(idx) = chosen {
                self.apply_power_choice(idx);
            }
            if close {
                self.screen.remove_top_popup();
            }
            return true;
        }
        if let Some(popup) = self.screen.top_popup_mut() {
            if popup.handle_key_default(key) {
                self.screen.remove_top_popup();
            } else {
                popup.window.handle_key(key);
            }
            return true;
        }

        match key {
            "1" | "2" | "3" => {
                self.screen.set_active(key.chars().next().expect("non-empty literal"));
                self.refresh_status_line();
                return true;
            }
            "q" | "Esc" => return false,
            _ => {}
        }

        if self.screen.active_shortcut() == VM_SHORTCUT && self.handle_vm_key(key) {
            return true;
        }

        if let Some(w) = self.screen.active_window_mut() {
            w.handle_key(key);
        }
        true
    }

    pub fn handle_mouse(&mut self, button: MouseButton, x: u16, y: u16) {
        if let Some(picker) = self.screen.top_picker_mut() {
            picker.popup.window.handle_mouse(button, x, y);
            return;
        }
        if let Some(popup) = self.screen.top_popup_mut() {
            popup.window.handle_mouse(button, x, y);
            return;
        }
        for shortcut in [VM_SHORTCUT, SYSTEM_SHORTCUT, LOG_SHORTCUT] {
            let hit = self
                .screen
                .window(shortcut)
                .is_some_and(|w| w.contains(x, y));
            if hit {
                self.screen.set_active(shortcut);
                if let Some(w) = self.screen.window_mut(shortcut) {
                    w.handle_mouse(button, x, y);
                }
                self.refresh_status_line();
                return;
            }
        }
    }

    fn handle_vm_key(&mut self, key: &str) -> bool {
        let Some(name) = self.selected_vm() else {
            return false;
        };
        match key {
            "p" => {
                let picker = PickerWindow::new(
                    format!("power: {name}"),
                    vec![('s', "start"), ('o', "shutdown"), ('r', "reboot"), ('R', "reset")],
                    self.screen.size(),
                );
                self.pending_power_target = Some(name);
                self.screen.add_picker(picker);
                true
            }
            "v" => {
                self.adapter.launch_viewer(&self.viewer_command, &name);
                true
            }
            "b" => {
                if self.cache.is_running(&name) {
                    let enabled = self.balloon.is_enabled(&name);
                    self.balloon.set_enabled(&name, !enabled);
                    self.refresh_vm_window();
                }
                true
            }
            "d" => {
                self.show_disks_when_stopped = !self.show_disks_when_stopped;
                self.refresh_vm_window();
                true
            }
            _ => false,
        }
    }

    fn apply_power_choice(&mut self, idx: usize) {
        let Some(name) = self.pending_power_target.take() else {
            return;
        };
        match idx {
            0 => self.adapter.start(&name),
            1 => self.adapter.shutdown(&name),
            2 => {
                if let Err(e) = self.adapter.reboot(&name) {
                    warn!(domain = %name, error = %e, "reboot command failed");
                }
            }
            3 => {
                if let Err(e) = self.adapter.reset(&name) {
                    warn!(domain = %name, error = %e, "reset command failed");
                }
            }
            _ => {}
        }
    }

    fn selected_vm(&self) -> Option<String> {
        let window = self.screen.window(VM_SHORTCUT)?;
        let pos = window.cursor.position();
        if pos < 0 {
            return None;
        }
        self.vm_line_owner.get(pos as usize).cloned()
    }

    fn refresh_windows(&mut self) {
        self.refresh_vm_window();
        self.refresh_system_window();
        self.refresh_log_window();
        self.refresh_status_line();
    }

    fn refresh_vm_window(&mut self) {
        let snapshot = self.cache.snapshot();
        let names: Vec<&String> = snapshot.per_vm.keys().collect();
        let blocks = widgets::format_vm_lines(snapshot, &self.balloon, self.show_disks_when_stopped);

        let mut display = Vec::new();
        let mut owners = Vec::new();
        for (name, block) in names.into_iter().zip(blocks.into_iter()) {
            for line in block.split('\n') {
                display.push(line.to_string());
                owners.push(name.clone());
            }
        }
        self.vm_line_owner = owners;
        if let Some(w) = self.screen.window_mut(VM_SHORTCUT) {
            w.set_content(display);
        }
    }

    fn refresh_system_window(&mut self) {
        let lines = widgets::format_system_lines(self.cache.snapshot());
        if let Some(w) = self.screen.window_mut(SYSTEM_SHORTCUT) {
            w.set_content(lines);
        }
    }

    fn refresh_log_window(&mut self) {
        let lines = self.log_sink.snapshot();
        if let Some(w) = self.screen.window_mut(LOG_SHORTCUT) {
            w.set_content(lines);
        }
    }

    fn refresh_status_line(&mut self) {
        let hint = match self.screen.active_shortcut() {
            VM_SHORTCUT => "p:power  v:viewer  b:balloon  d:disks",
            SYSTEM_SHORTCUT | LOG_SHORTCUT => "Up/Down PageUp/PageDown Home/End scroll",
            _ => "",
        };
        self.screen.set_status_line(format!("q:quit  1/2/3:window  {hint}"));
    }
}

fn relayout_tiled(tiled: &mut BTreeMap<char, Window>, area: Rect) {
    let bottom_height = SYSTEM_WINDOW_HEIGHT.min(area.height);
    let vm_height = area.height - bottom_height;

    if let Some(w) = tiled.get_mut(&VM_SHORTCUT) {
        w.rect = Rect::new(area.x, area.y, area.width, vm_height);
    }

    let system_width = (area.width / 2).min(SYSTEM_WINDOW_MAX_WIDTH).max(1);
    let bottom_y = area.y + vm_height;
    if let Some(w) = tiled.get_mut(&SYSTEM_SHORTCUT) {
        w.rect = Rect::new(area.x, bottom_y, system_width, bottom_height);
    }
    if let Some(w) = tiled.get_mut(&LOG_SHORTCUT) {
        let log_x = area.x + system_width;
        let log_width = area.width.saturating_sub(system_width);
        w.rect = Rect::new(log_x, bottom_y, log_width, bottom_height);
    }
}

struct Runtime<R, F, B>
where
    R: CommandRunner + Clone + 'static,
    F: FileSystem + 'static,
    B: Backend,
{
    app: App<R, F>,
    terminal: Terminal<B>,
}

/// Owns the terminal and runs the event loop to completion: installs the
/// keyboard/mouse/resize reader thread and the 2-second sampling timer,
/// then blocks until a quit key or a fatal error ends the loop.
///
/// Restores the terminal (raw mode, alternate screen) before returning,
/// whether the loop ended cleanly or with an error.
pub fn run<R, F, B>(app: App<R, F>, mut terminal: Terminal<B>, tick: Duration) -> Result<(), FatalError>
where
    R: CommandRunner + Clone + 'static,
    F: FileSystem + 'static,
    B: Backend + Send + 'static,
{
    let queue = EventQueue::new();

    let size = terminal.size().unwrap_or_default();
    let mut app = app;
    app.relayout(Rect::new(0, 0, size.width, size.height));
    let _ = app.repaint(&mut terminal);

    let shared = Arc::new(Mutex::new(Runtime { app, terminal }));

    {
        let queue = queue.clone();
        thread::spawn(move || {
            loop {
                match crossterm::event::read() {
                    Ok(raw) => {
                        if let Some(event) = input::translate(raw) {
                            queue.post(event);
                        }
                    }
                    Err(e) => {
                        queue.post_error(format!("terminal input error: {e}"));
                        break;
                    }
                }
            }
        });
    }

    {
        let queue = queue.clone();
        let shared = Arc::clone(&shared);
        thread::spawn(move || {
            loop {
                thread::sleep(Duration::from_secs(2));
                let shared = Arc::clone(&shared);
                queue.submit(move || {
                    let mut rt = shared.lock().unwrap();
                    let Runtime { app, terminal } = &mut *rt;
                    app.on_tick();
                    let _ = app.repaint(terminal);
                });
            }
        });
    }

    let handler_shared = Arc::clone(&shared);
    let handler_queue = queue.clone();
    let result = queue.run_loop(move |event| {
        let mut rt = handler_shared.lock().unwrap();
        let mut should_quit = false;
        let dispatch = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let Runtime { app, terminal } = &mut *rt;
            match event {
                Event::Key(key) => {
                    if !app.handle_key(&key) {
                        should_quit = true;
                    }
                }
                Event::Mouse { button, x, y } => app.handle_mouse(button, x, y),
                Event::TTYSize { width, height } => {
                    app.relayout(Rect::new(0, 0, width, height));
                }
                Event::EmptyQueue => {}
            }
            if !should_quit {
                let _ = app.repaint(terminal);
            }
        }));
        if let Err(payload) = dispatch {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            tracing::error!(panic = %message, "event handler panicked; continuing the loop");
        }
        if should_quit {
            drop(rt);
            handler_queue.stop();
        }
    });

    result
}
