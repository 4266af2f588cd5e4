//! The hypervisor adapter: wires the pure parser onto a [`CommandRunner`]
//! and exposes the typed operations the rest of the application uses.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use tracing::{error, info};

use super::error::CommandError;
use super::parser::{parse_node_info, parse_stats};
use super::runner::{CommandRunner, RealRunner};
use crate::model::{DomainData, HostCpuInfo};

const MIN_SET_MEMORY_BYTES: u64 = 256 * 1024 * 1024;

/// Invokes the hypervisor CLI and translates its textual output into
/// the records in [`crate::model`].
///
/// Generic over [`CommandRunner`] so tests can substitute
/// `MockRunner` instead of shelling out to a real `virsh`.
pub struct Adapter<R: CommandRunner = RealRunner> {
    runner: Arc<R>,
    connect_uri: Option<String>,
}

impl<R: CommandRunner> Clone for Adapter<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
            connect_uri: self.connect_uri.clone(),
        }
    }
}

impl Adapter<RealRunner> {
    pub fn new() -> Self {
        Self {
            runner: Arc::new(RealRunner::new()),
            connect_uri: None,
        }
    }
}

impl Default for Adapter<RealRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner + 'static> Adapter<R> {
    pub fn with_runner(runner: R, connect_uri: Option<String>) -> Self {
        Self {
            runner: Arc::new(runner),
            connect_uri,
        }
    }

    fn connect_args(&self, into: &mut Vec<String>) {
        if let Some(uri) = &self.connect_uri {
            into.push("-c".to_string());
            into.push(uri.clone());
        }
    }

    fn run(&self, args: Vec<String>) -> Result<std::process::Output, CommandError> {
        let mut full = Vec::with_capacity(args.len() + 2);
        self.connect_args(&mut full);
        full.extend(args);
        let cmd_str = format!("virsh {}", full.join(" "));
        self.runner
            .run("virsh", &full)
            .map_err(|e| CommandError::new(cmd_str, e.to_string()))
    }

    fn run_checked(&self, args: Vec<String>) -> Result<String, CommandError> {
        let cmd_str = format!("virsh {}", args.join(" "));
        let output = self.run(args)?;
        if !output.status.success() {
            return Err(CommandError::new(
                cmd_str,
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Invokes the statistics subcommand and parses every domain block.
    ///
    /// `--all` is required so shut-off domains are included (`domstats`
    /// defaults to active domains only); `--balloon`/`--block` are
    /// required so the balloon and block-device groups are actually
    /// emitted (`--balloon` alone restricts output to *only* the
    /// balloon group and drops `block.*` fields entirely).
    ///
    /// The sampling timestamp is captured immediately after the
    /// subprocess returns, per the "captured at call time" convention.
    pub fn domain_data(&self) -> Result<BTreeMap<String, DomainData>, super::error::HypervisorError> {
        let stdout = self.run_checked(vec![
            "domstats".to_string(),
            "--all".to_string(),
            "--balloon".to_string(),
            "--block".to_string(),
        ])?;
        let sampled_at_ms = now_ms();
        Ok(parse_stats(&stdout, sampled_at_ms)?)
    }

    /// Invokes the node-info subcommand and parses the host CPU topology.
    pub fn host_info(&self) -> Result<HostCpuInfo, super::error::HypervisorError> {
        let stdout = self.run_checked(vec!["nodeinfo".to_string()])?;
        Ok(parse_node_info(&stdout)?)
    }

    /// Starts a VM. Runs on a background thread because start can take
    /// several seconds; completion is only logged, never awaited.
    pub fn start(&self, name: &str) {
        self.spawn_lifecycle("start", name);
    }

    /// Requests a graceful shutdown. Same asynchronous treatment as `start`.
    pub fn shutdown(&self, name: &str) {
        self.spawn_lifecycle("shutdown", name);
    }

    /// Reboots a VM, blocking until the command returns.
    pub fn reboot(&self, name: &str) -> Result<(), CommandError> {
        self.run_checked(vec!["reboot".to_string(), name.to_string()])
            .map(|_| ())
    }

    /// Resets (hard reset) a VM, blocking until the command returns.
    pub fn reset(&self, name: &str) -> Result<(), CommandError> {
        self.run_checked(vec!["reset".to_string(), name.to_string()])
            .map(|_| ())
    }

    /// Launches the external graphical viewer for a VM, asynchronously.
    /// The viewer is a separate long-running process (e.g.
    /// `virt-viewer`) whose lifetime is independent of `domtop`;
    /// completion is only logged, never awaited.
    pub fn launch_viewer(&self, viewer_command: &str, name: &str) {
        let runner = Arc::clone(&self.runner);
        let connect_uri = self.connect_uri.clone();
        let viewer_command = viewer_command.to_string();
        let name = name.to_string();
        thread::spawn(move || {
            let mut args = Vec::new();
            if let Some(uri) = &connect_uri {
                args.push("-c".to_string());
                args.push(uri.clone());
            }
            args.push(name.clone());
            match runner.run(&viewer_command, &args) {
                Ok(output) if output.status.success() => {
                    info!(domain = %name, viewer = %viewer_command, "viewer process exited");
                }
                Ok(output) => {
                    error!(
                        domain = %name,
                        viewer = %viewer_command,
                        stderr = %String::from_utf8_lossy(&output.stderr),
                        "viewer process exited with an error"
                    );
                }
                Err(e) => {
                    error!(domain = %name, viewer = %viewer_command, error = %e, "could not launch viewer");
                }
            }
        });
    }

    fn spawn_lifecycle(&self, subcommand: &'static str, name: &str) {
        let runner = Arc::clone(&self.runner);
        let connect_uri = self.connect_uri.clone();
        let name = name.to_string();
        thread::spawn(move || {
            let mut args = Vec::new();
            if let Some(uri) = &connect_uri {
                args.push("-c".to_string());
                args.push(uri.clone());
            }
            args.push(subcommand.to_string());
            args.push(name.clone());
            let cmd_str = format!("virsh {}", args.join(" "));
            match runner.run("virsh", &args) {
                Ok(output) if output.status.success() => {
                    info!(domain = %name, command = subcommand, "lifecycle command completed");
                }
                Ok(output) => {
                    error!(
                        domain = %name,
                        command = %cmd_str,
                        stderr = %String::from_utf8_lossy(&output.stderr),
                        "lifecycle command failed"
                    );
                }
                Err(e) => {
                    error!(domain = %name, command = %cmd_str, error = %e, "lifecycle command could not be spawned");
                }
            }
        });
    }

    /// Resizes a VM's live memory. Rejects targets under 256 MiB;
    /// otherwise issues the memory-resize subcommand with the
    /// equivalent KiB value and logs the change at info level.
    pub fn set_memory(&self, name: &str, bytes: u64) -> Result<(), super::error::HypervisorError> {
        if bytes < MIN_SET_MEMORY_BYTES {
            return Err(super::error::HypervisorError::Validation(
                super::error::ValidationError::new(format!(
                    "set_memory target {bytes} bytes is below the 256 MiB minimum"
                )),
            ));
        }
        let kib = bytes / 1024;
        self.run_checked(vec![
            "setmem".to_string(),
            name.to_string(),
            kib.to_string(),
            "--live".to_string(),
        ])?;
        info!(domain = %name, bytes, kib, "resized VM memory");
        Ok(())
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::runner::MockRunner;

    fn stats_text() -> &'static str {
        "\
Domain: web1
  state.state=1
  vcpu.maximum=4
  cpu.time=1000000
  balloon.current=2097152
  balloon.maximum=16777216
  balloon.rss=1048576
  balloon.last-update=1700000000
  block.count=0
"
    }

    #[test]
    fn domain_data_parses_runner_output() {
        let runner = MockRunner::new();
        runner.set_response("virsh", &["domstats", "--all", "--balloon", "--block"], 0, stats_text(), "");
        let adapter = Adapter::with_runner(runner, None);
        let data = adapter.domain_data().unwrap();
        assert!(data.contains_key("web1"));
    }

    #[test]
    fn domain_data_fails_on_nonzero_exit() {
        let runner = MockRunner::new();
        runner.set_response("virsh", &["domstats", "--all", "--balloon", "--block"], 1, "", "connection refused");
        let adapter = Adapter::with_runner(runner, None);
        let err = adapter.domain_data().unwrap_err();
        assert!(matches!(err, super::super::error::HypervisorError::Command(_)));
    }

    #[test]
    fn set_memory_rejects_below_minimum() {
        let runner = MockRunner::new();
        let adapter = Adapter::with_runner(runner, None);
        let err = adapter.set_memory("web1", 128 * 1024 * 1024).unwrap_err();
        assert!(matches!(err, super::super::error::HypervisorError::Validation(_)));
    }

    #[test]
    fn set_memory_issues_setmem_in_kib() {
        let runner = MockRunner::new();
        runner.set_response(
            "virsh",
            &["setmem", "web1", "2097152", "--live"],
            0,
            "",
            "",
        );
        let adapter = Adapter::with_runner(runner.clone(), None);
        adapter.set_memory("web1", 2 * 1024 * 1024 * 1024).unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args, vec!["setmem", "web1", "2097152", "--live"]);
    }

    #[test]
    fn connect_uri_is_prefixed_to_every_invocation() {
        let runner = MockRunner::new();
        runner.set_response(
            "virsh",
            &["-c", "qemu:///system", "nodeinfo"],
            0,
            "CPU model:           x86_64\nCPU socket(s):        1\nCore(s) per socket:   4\nThread(s) per core:   1\n",
            "",
        );
        let adapter = Adapter::with_runner(runner, Some("qemu:///system".to_string()));
        let info = adapter.host_info().unwrap();
        assert_eq!(info.sockets, 1);
    }

    #[test]
    fn launch_viewer_runs_on_a_background_thread() {
        let runner = MockRunner::new();
        runner.set_response("remote-viewer", &["web1"], 0, "", "");
        let adapter = Adapter::with_runner(runner.clone(), None);
        adapter.launch_viewer("remote-viewer", "web1");
        for _ in 0..100 {
            if !runner.calls().is_empty() {
                break;
            }
            thread::sleep(std::time::Duration::from_millis(10));
        }
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "remote-viewer");
    }
}
