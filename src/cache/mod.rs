//! The sampling cache: merges hypervisor + host samples into an
//! immutable [`Snapshot`] each tick, computing deltas against the
//! previous tick's raw data.

mod error;

pub use error::CacheError;

use std::collections::BTreeMap;

use crate::hypervisor::{Adapter, CommandRunner, ValidationError};
use crate::model::{DomainData, Snapshot, VMCache};
use crate::sysinfo::{FileSystem, Provider};

/// Composes the [`Adapter`] and [`Provider`] into one periodically
/// refreshed, read-only [`Snapshot`].
///
/// `R` is also used directly for the `df`-based disk resolution in
/// [`Provider::disk_usage`], so the cache needs its own handle to a
/// runner in addition to the one owned by `Adapter`.
pub struct SamplingCache<R: CommandRunner, F: FileSystem> {
    adapter: Adapter<R>,
    provider: Provider<F>,
    runner: R,
    prev_domain_data: BTreeMap<String, DomainData>,
    prev_cpu: Option<crate::model::CpuSample>,
    host_cpu_count: Option<u32>,
    snapshot: Snapshot,
}

impl<R: CommandRunner + Clone + 'static, F: FileSystem> SamplingCache<R, F> {
    pub fn new(adapter: Adapter<R>, provider: Provider<F>, runner: R) -> Self {
        Self {
            adapter,
            provider,
            runner,
            prev_domain_data: BTreeMap::new(),
            prev_cpu: None,
            host_cpu_count: None,
            snapshot: Snapshot::default(),
        }
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn vm(&self, name: &str) -> Option<&VMCache> {
        self.snapshot.per_vm.get(name)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.vm(name).is_some_and(|v| v.data.is_running())
    }

    /// Validates `128 MiB <= new_actual <= info.max_memory`, then
    /// delegates to the adapter's `set_memory`.
    pub fn set_memory(&self, name: &str, new_actual: u64) -> Result<(), CacheError> {
        const MIN_ACTUAL: u64 = 128 * 1024 * 1024;
        let vm = self
            .vm(name)
            .ok_or_else(|| ValidationError::new(format!("unknown VM {name}")))?;
        if new_actual < MIN_ACTUAL || new_actual > vm.data.info.max_memory {
            return Err(ValidationError::new(format!(
                "set_memory target {new_actual} bytes outside [{MIN_ACTUAL}, {}]",
                vm.data.info.max_memory
            ))
            .into());
        }
        self.adapter.set_memory(name, new_actual)?;
        Ok(())
    }

    fn ensure_host_cpu_count(&mut self) -> Result<u32, CacheError> {
        if let Some(n) = self.host_cpu_count {
            return Ok(n);
        }
        let info = self.adapter.host_info()?;
        let n = info.cpus().max(1);
        self.host_cpu_count = Some(n);
        Ok(n)
    }

    /// Refreshes the snapshot. On failure the previous snapshot is left
    /// in place; the caller (the 2-second timer) is expected to log the
    /// error and retry on the next tick.
    pub fn update(&mut self) -> Result<(), CacheError> {
        let host_cpu_count = self.ensure_host_cpu_count()?;
        let current = self.adapter.domain_data()?;
        let (ram, swap) = self.provider.memory_stats()?;
        let (cpu_sample, host_cpu_percent) = self.provider.cpu_usage(self.prev_cpu)?;

        let qcow2: Vec<(String, u64)> = current
            .values()
            .flat_map(|d| d.disks.iter())
            .filter_map(|disk| disk.path.as_ref().map(|p| (p.clone(), disk.physical)))
            .collect();
        let disks = self.provider.disk_usage(&self.runner, &qcow2)?;

        let mut per_vm = BTreeMap::new();
        let mut total_vm_rss = 0u64;
        let mut total_vm_cpu_percent = 0.0f64;

        for (name, data) in &current {
            let prev = self.prev_domain_data.get(name);
            let vm_cache = diff(prev, data);
            if vm_cache.data.is_running() {
                if let Some(mem) = &vm_cache.data.mem_stat {
                    total_vm_rss += mem.rss;
                }
                total_vm_cpu_percent += vm_cache.cpu_usage_percent;
            }
            per_vm.insert(name.clone(), vm_cache);
        }
        total_vm_cpu_percent /= host_cpu_count as f64;

        self.snapshot = Snapshot {
            per_vm,
            host: crate::model::HostSample {
                mem: ram,
                swap,
                cpu: cpu_sample,
                disks,
            },
            host_cpu_percent,
            total_vm_rss,
            total_vm_cpu_percent,
        };
        self.prev_cpu = Some(cpu_sample);
        self.prev_domain_data = current;
        Ok(())
    }
}

/// Computes `curr - prev`, but returns `None` across a counter
/// regression (the guest rebooted and `cpu.time` restarted near zero).
/// Mirrors the `di64` guard the host-side rate computations use for the
/// same class of reset.
fn non_negative_delta(curr: i64, prev: i64) -> Option<i64> {
    (curr >= prev).then_some(curr - prev)
}

/// Builds one VM's derived record from its previous and current raw
/// samples, per the rules in `SamplingCache::update`.
fn diff(prev: Option<&DomainData>, next: &DomainData) -> VMCache {
    let cpu_usage_percent = match prev {
        Some(prev) => {
            let dt = next.sampled_at_ms - prev.sampled_at_ms;
            if dt > 0 {
                non_negative_delta(next.cpu_time_ms, prev.cpu_time_ms)
                    .map(|d| d as f64 * 100.0 / dt as f64)
                    .unwrap_or(0.0)
            } else {
                0.0
            }
        }
        None => 0.0,
    };

    let mem_data_age_sec = match &next.mem_stat {
        None => None,
        Some(next_mem) => match prev.and_then(|p| p.mem_stat.as_ref()) {
            None => Some(0),
            Some(prev_mem) => Some(next_mem.last_updated_sec - prev_mem.last_updated_sec),
        },
    };

    VMCache {
        data: next.clone(),
        cpu_usage_percent,
        mem_data_age_sec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypervisor::MockRunner;
    use crate::model::{DomainInfo, DomainState, MemStat};
    use crate::sysinfo::MockFs;

    fn domain(sampled_at_ms: i64, cpu_time_ms: i64, last_updated_sec: Option<i64>) -> DomainData {
        DomainData {
            info: DomainInfo {
                name: "web1".into(),
                cpus: 4,
                max_memory: 16 * 1024 * 1024 * 1024,
            },
            state: DomainState::Running,
            sampled_at_ms,
            cpu_time_ms,
            mem_stat: last_updated_sec.map(|t| MemStat {
                actual: 2 * 1024 * 1024 * 1024,
                unused: Some(100),
                available: Some(100),
                usable: Some(100),
                disk_caches: Some(10),
                rss: 1024 * 1024 * 1024,
                last_updated_sec: t,
            }),
            disks: vec![],
        }
    }

    #[test]
    fn diff_computes_cpu_percent_from_deltas() {
        let prev = domain(0, 0, Some(100));
        let next = domain(1000, 500, Some(100));
        let vm = diff(Some(&prev), &next);
        assert_eq!(vm.cpu_usage_percent, 50.0);
    }

    #[test]
    fn diff_stale_data_when_timestamp_unchanged() {
        let prev = domain(0, 0, Some(100));
        let next = domain(7000, 0, Some(100));
        let vm = diff(Some(&prev), &next);
        assert_eq!(vm.mem_data_age_sec, Some(7));
        assert!(vm.stale());
    }

    #[test]
    fn diff_age_is_zero_when_prior_balloon_data_absent() {
        let next = domain(1000, 0, Some(100));
        let vm = diff(None, &next);
        assert_eq!(vm.mem_data_age_sec, Some(0));
        assert!(!vm.stale());
    }

    #[test]
    fn diff_no_prior_sample_gives_zero_cpu_percent() {
        let next = domain(1000, 500, Some(100));
        let vm = diff(None, &next);
        assert_eq!(vm.cpu_usage_percent, 0.0);
    }

    #[test]
    fn diff_cpu_time_regression_yields_zero_percent() {
        // Guest rebooted between samples: cpu.time restarted near zero.
        let prev = domain(0, 5_000, Some(100));
        let next = domain(1000, 50, Some(100));
        let vm = diff(Some(&prev), &next);
        assert_eq!(vm.cpu_usage_percent, 0.0);
    }

    #[test]
    fn set_memory_rejects_out_of_range_target() {
        let runner = MockRunner::new();
        runner.set_response(
            "virsh",
            &["nodeinfo"],
            0,
            "CPU model:           x86_64\nCPU socket(s):        1\nCore(s) per socket:   1\nThread(s) per core:   1\n",
            "",
        );
        let adapter = Adapter::with_runner(runner.clone(), None);
        let fs = MockFs::new()
            .with_file("/proc/meminfo", "MemTotal: 1000 kB\nMemAvailable: 500 kB\nSwapTotal: 100 kB\nSwapFree: 100 kB\n")
            .with_file("/proc/stat", "cpu  100 0 50 9724 417 0 0 0 0 0\n")
            .with_file("/proc/cpuinfo", "processor: 0\nflags: fpu vme sse sse2\n");
        let provider = Provider::new(fs, "/proc");
        let mut cache = SamplingCache::new(adapter, provider, runner);
        cache.update().unwrap();

        let err = cache.set_memory("web1", 1024).unwrap_err();
        assert!(matches!(err, CacheError::Hypervisor(_)));
    }
}
