//! domtop - interactive terminal dashboard for libvirt/QEMU virtual machines.
//!
//! Usage:
//!   domtop                                  # connect to qemu:///system
//!   domtop -c qemu+ssh://host/system         # connect to a remote hypervisor
//!   domtop --viewer virt-viewer              # external viewer for the 'v' key
//!   domtop --log-file /var/log/domtop.log    # also mirror logs to a file

use std::fs::OpenOptions;
use std::io;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::ExecutableCommand;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tracing_subscriber::prelude::*;

use domtop::hypervisor::{Adapter, RealRunner};
use domtop::sysinfo::{Provider, RealFs};
use domtop::tui::{self, LogSink};

const DEFAULT_CONNECT_URI: &str = "qemu:///system";
const DEFAULT_VIEWER: &str = "virt-viewer";
const DEFAULT_TICK_MS: u64 = 2000;

/// Interactive terminal dashboard for libvirt/QEMU virtual machines.
#[derive(Parser)]
#[command(name = "domtop", about = "Interactive terminal dashboard for libvirt/QEMU virtual machines")]
struct Args {
    /// Hypervisor connection URI, passed to `virsh -c`.
    #[arg(short = 'c', long = "connect", value_name = "URI", default_value = DEFAULT_CONNECT_URI)]
    connect: String,

    /// External command used to launch a graphical viewer for a VM (the 'v' key).
    #[arg(long, default_value = DEFAULT_VIEWER)]
    viewer: String,

    /// Sampling/ballooning tick interval, in milliseconds.
    #[arg(long = "tick-ms", default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Path to /proc (override for testing on non-standard mounts).
    #[arg(long, default_value = "/proc")]
    proc_path: String,

    /// Also append log lines to this file (the TUI owns the terminal, so
    /// logs never go to stdout while running).
    #[arg(long, value_name = "PATH")]
    log_file: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_sink = LogSink::new();
    if let Err(e) = init_logging(&log_sink, args.log_file.as_deref()) {
        eprintln!("domtop: could not open log file: {e}");
        return ExitCode::FAILURE;
    }

    let terminal = match setup_terminal() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("domtop: could not initialize terminal: {e}");
            return ExitCode::FAILURE;
        }
    };

    install_signal_handler();

    let runner = RealRunner::new();
    let adapter = Adapter::with_runner(runner.clone(), Some(args.connect.clone()));
    let provider = Provider::new(RealFs::new(), args.proc_path.clone());
    let app = tui::App::new(adapter, provider, runner, log_sink, args.viewer.clone());

    let result = tui::run(app, terminal, Duration::from_millis(args.tick_ms));

    let _ = teardown_terminal();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("domtop: {e}");
            ExitCode::FAILURE
        }
    }
}

type Backend = CrosstermBackend<io::Stdout>;

fn setup_terminal() -> io::Result<Terminal<Backend>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    stdout.execute(EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

/// `tui::run` consumes the `Terminal`, so there is nothing to call
/// `show_cursor` on afterwards; raw mode and the alternate screen are
/// reverted directly against stdout instead.
fn teardown_terminal() -> io::Result<()> {
    disable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(LeaveAlternateScreen)?;
    stdout.execute(DisableMouseCapture)?;
    Ok(())
}

/// Restores the terminal on SIGINT/SIGTERM: raw mode suppresses the
/// usual Ctrl-C-generates-SIGINT behavior for keystrokes delivered
/// through crossterm, but the process can still receive a real signal
/// from outside (e.g. `kill`, a terminal closing).
fn install_signal_handler() {
    let handled = Arc::new(AtomicBool::new(false));
    let _ = ctrlc::set_handler(move || {
        if handled.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = stdout.execute(LeaveAlternateScreen);
        let _ = stdout.execute(DisableMouseCapture);
        std::process::exit(130);
    });
}

fn init_logging(log_sink: &LogSink, log_file: Option<&str>) -> io::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter).with(log_sink.clone());

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let file_layer = tracing_subscriber::fmt::layer().with_ansi(false).with_writer(Arc::new(file));
        registry.with(file_layer).init();
    } else {
        registry.init();
    }
    Ok(())
}
