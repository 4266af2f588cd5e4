//! Abstraction over invoking the hypervisor CLI, so the adapter can be
//! unit-tested without a real `virsh` binary on `PATH`.
//!
//! Mirrors the `FileSystem` trait pattern used for `/proc` access: a
//! trait plus a real implementation (`RealRunner`, shelling out through
//! `std::process::Command`) and an in-memory mock for tests.

use std::process::Output;
use std::sync::{Arc, Mutex};

/// Abstraction for running an external command and collecting its output.
pub trait CommandRunner: Send + Sync {
    /// Runs `program` with `args` to completion and returns its output.
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<Output>;
}

/// Runs commands through the real `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealRunner;

impl RealRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for RealRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<Output> {
        std::process::Command::new(program).args(args).output()
    }
}

fn output_with(status: i32, stdout: &str, stderr: &str) -> Output {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        Output {
            status: std::process::ExitStatus::from_raw(status << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = status;
        // Only exercised in unit tests on the Linux host domtop targets.
        unreachable!("MockRunner::output_with requires unix ExitStatus construction")
    }
}

/// One recorded invocation, for assertions in tests.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: String,
    pub args: Vec<String>,
}

/// In-memory command runner for tests: returns canned outputs keyed by
/// the joined `program args...` invocation, and records every call made.
#[derive(Clone, Default)]
pub struct MockRunner {
    inner: Arc<Mutex<MockRunnerState>>,
}

#[derive(Default)]
struct MockRunnerState {
    responses: std::collections::HashMap<String, (i32, String, String)>,
    calls: Vec<RecordedCall>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(program: &str, args: &[String]) -> String {
        let mut k = program.to_string();
        for a in args {
            k.push(' ');
            k.push_str(a);
        }
        k
    }

    /// Registers the output to return for an exact `program args...` call.
    pub fn set_response(
        &self,
        program: &str,
        args: &[&str],
        exit_code: i32,
        stdout: &str,
        stderr: &str,
    ) {
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        let key = Self::key(program, &args);
        self.inner
            .lock()
            .unwrap()
            .responses
            .insert(key, (exit_code, stdout.to_string(), stderr.to_string()));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().unwrap().calls.clone()
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<Output> {
        let key = Self::key(program, args);
        let mut state = self.inner.lock().unwrap();
        state.calls.push(RecordedCall {
            program: program.to_string(),
            args: args.to_vec(),
        });
        let (code, stdout, stderr) = state
            .responses
            .get(&key)
            .cloned()
            .unwrap_or((0, String::new(), String::new()));
        Ok(output_with(code, &stdout, &stderr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_runner_records_calls_and_returns_canned_output() {
        let runner = MockRunner::new();
        runner.set_response("virsh", &["start", "web1"], 0, "Domain started\n", "");

        let out = runner
            .run("virsh", &["start".to_string(), "web1".to_string()])
            .unwrap();
        assert!(out.status.success());
        assert_eq!(String::from_utf8_lossy(&out.stdout), "Domain started\n");
        assert_eq!(runner.calls().len(), 1);
    }

    #[test]
    fn mock_runner_defaults_to_success_for_unset_responses() {
        let runner = MockRunner::new();
        let out = runner.run("virsh", &["list".to_string()]).unwrap();
        assert!(out.status.success());
    }
}
