//! Samples host CPU/memory/disk counters from `/proc` and `df`.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use super::error::CollectError;
use super::fs::FileSystem;
use super::parser::{cpu_usage_percent, parse_cpu_flags, parse_meminfo, parse_stat};
use crate::hypervisor::CommandRunner;
use crate::model::{CpuSample, DiskUsage, MemoryStat};

/// Samples host counters without blocking the event loop: every method
/// here does a single bounded read (or, for disk usage, a single `df`
/// invocation) and returns.
pub struct Provider<F: FileSystem> {
    fs: F,
    proc_path: String,
}

impl<F: FileSystem> Provider<F> {
    pub fn new(fs: F, proc_path: impl Into<String>) -> Self {
        Self {
            fs,
            proc_path: proc_path.into(),
        }
    }

    /// Reads `/proc/meminfo` and returns `(ram, swap)`.
    pub fn memory_stats(&self) -> Result<(MemoryStat, MemoryStat), CollectError> {
        let path = format!("{}/meminfo", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        Ok(parse_meminfo(&content)?)
    }

    /// Reads the aggregate CPU line of `/proc/stat` and derives the
    /// usage percent relative to `prev`.
    pub fn cpu_usage(&self, prev: Option<CpuSample>) -> Result<(CpuSample, f64), CollectError> {
        let path = format!("{}/stat", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        let sample = parse_stat(&content)?;
        let percent = cpu_usage_percent(prev, sample);
        Ok((sample, percent))
    }

    /// Reads `/proc/cpuinfo` and returns the union of `flags` across cores.
    pub fn cpu_flags(&self) -> Result<HashSet<String>, CollectError> {
        let path = format!("{}/cpuinfo", self.proc_path);
        let content = self.fs.read_to_string(Path::new(&path))?;
        Ok(parse_cpu_flags(&content))
    }

    /// Resolves each `(path, physical_bytes)` pair to its backing block
    /// device via `df --output=source <path>`, aggregating per device.
    /// Duplicate device rows are merged; empty input yields an empty map.
    pub fn disk_usage<R: CommandRunner>(
        &self,
        runner: &R,
        qcow2: &[(String, u64)],
    ) -> Result<BTreeMap<String, DiskUsage>, CollectError> {
        let mut out: BTreeMap<String, DiskUsage> = BTreeMap::new();
        for (path, physical) in qcow2 {
            let device = match resolve_device(runner, path) {
                Some(d) => d,
                None => continue,
            };
            let entry = out.entry(device.clone()).or_default();
            entry.vm_bytes += physical;
            entry.qcow2_paths.push(path.clone());
            if let Some(usage) = device_usage(runner, &device) {
                entry.usage = usage;
            }
        }
        Ok(out)
    }
}

fn resolve_device<R: CommandRunner>(runner: &R, path: &str) -> Option<String> {
    let output = runner
        .run(
            "df",
            &["--output=source".to_string(), "--".to_string(), path.to_string()],
        )
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().nth(1).map(|l| l.trim().to_string())
}

fn device_usage<R: CommandRunner>(runner: &R, device: &str) -> Option<MemoryStat> {
    let output = runner
        .run(
            "df",
            &[
                "--output=size,avail".to_string(),
                "--block-size=1".to_string(),
                device.to_string(),
            ],
        )
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    let fields: Vec<u64> = stdout
        .lines()
        .nth(1)?
        .split_whitespace()
        .filter_map(|f| f.parse::<u64>().ok())
        .collect();
    let total = *fields.first()?;
    let available = *fields.get(1)?;
    Some(MemoryStat::new(total, available))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::MockRunner;
    use crate::sysinfo::fs::MockFs;

    #[test]
    fn memory_stats_reads_proc_meminfo() {
        let fs = MockFs::new().with_file(
            "/proc/meminfo",
            "MemTotal: 1000 kB\nMemAvailable: 500 kB\nSwapTotal: 100 kB\nSwapFree: 100 kB\n",
        );
        let provider = Provider::new(fs, "/proc");
        let (ram, swap) = provider.memory_stats().unwrap();
        assert_eq!(ram.total, 1000 * 1024);
        assert_eq!(swap.available, 100 * 1024);
    }

    #[test]
    fn disk_usage_merges_duplicate_devices() {
        let fs = MockFs::new();
        let provider = Provider::new(fs, "/proc");
        let runner = MockRunner::new();
        runner.set_response(
            "df",
            &["--output=source", "--", "/var/lib/libvirt/images/a.qcow2"],
            0,
            "Filesystem\n/dev/vg0/data\n",
            "",
        );
        runner.set_response(
            "df",
            &["--output=source", "--", "/var/lib/libvirt/images/b.qcow2"],
            0,
            "Filesystem\n/dev/vg0/data\n",
            "",
        );
        runner.set_response(
            "df",
            &["--output=size,avail", "--block-size=1", "/dev/vg0/data"],
            0,
            "1B-blocks      Avail\n1000000000 400000000\n",
            "",
        );

        let qcow2 = vec![
            ("/var/lib/libvirt/images/a.qcow2".to_string(), 100),
            ("/var/lib/libvirt/images/b.qcow2".to_string(), 200),
        ];
        let usage = provider.disk_usage(&runner, &qcow2).unwrap();
        assert_eq!(usage.len(), 1);
        let dev = &usage["/dev/vg0/data"];
        assert_eq!(dev.vm_bytes, 300);
        assert_eq!(dev.qcow2_paths.len(), 2);
        assert_eq!(dev.usage.total, 1_000_000_000);
    }

    #[test]
    fn disk_usage_empty_input_is_empty_map() {
        let fs = MockFs::new();
        let provider = Provider::new(fs, "/proc");
        let runner = MockRunner::new();
        let usage = provider.disk_usage(&runner, &[]).unwrap();
        assert!(usage.is_empty());
    }
}
