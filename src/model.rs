//! Shared value records.
//!
//! Every type here is a plain data record. Ownership of the live instances
//! is held by [`crate::cache::SamplingCache`], which replaces its internal
//! map wholesale on each refresh; everything downstream (the TUI, the
//! ballooning controller) reads an immutable [`Snapshot`].

use std::collections::BTreeMap;

/// Host or guest memory totals, in bytes.
///
/// Invariant: `0 <= available <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStat {
    pub total: u64,
    pub available: u64,
}

impl MemoryStat {
    pub fn new(total: u64, available: u64) -> Self {
        let available = available.min(total);
        Self { total, available }
    }

    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// Percentage of `total` in use, rounded to two decimals.
    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        round2(self.used() as f64 * 100.0 / self.total as f64)
    }
}

/// Guest-reported (VirtIO balloon) memory statistics for a running VM.
///
/// The four optional fields (`unused`, `available`, `usable`,
/// `disk_caches`) are either all present (balloon driver active and
/// reporting) or all absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemStat {
    /// Current balloon target ("actual"), in bytes.
    pub actual: u64,
    pub unused: Option<u64>,
    pub available: Option<u64>,
    pub usable: Option<u64>,
    pub disk_caches: Option<u64>,
    /// Resident set size as seen by the host, in bytes.
    pub rss: u64,
    /// Hypervisor-reported timestamp of this sample, in seconds.
    pub last_updated_sec: i64,
}

impl MemStat {
    /// Whether the guest is reporting balloon statistics at all.
    pub fn has_guest_data(&self) -> bool {
        self.unused.is_some()
    }

    /// Guest-observed memory usage, derived from `usable`/`unused` when
    /// present. Returns `None` when the guest isn't reporting.
    pub fn guest_mem(&self) -> Option<MemoryStat> {
        let available = self.usable.or(self.unused)?;
        Some(MemoryStat::new(self.actual, available))
    }
}

/// On-disk statistics for one qcow2-backed (or other) disk of a VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskStat {
    pub name: String,
    pub allocation: u64,
    pub capacity: u64,
    pub physical: u64,
    pub path: Option<String>,
}

impl DiskStat {
    /// `round((physical/allocation - 1) * 100)`, clamped to `[-100, 999]`.
    pub fn overhead_percent(&self) -> i32 {
        if self.allocation == 0 {
            return 0;
        }
        let ratio = self.physical as f64 / self.allocation as f64 - 1.0;
        (ratio * 100.0).round().clamp(-100.0, 999.0) as i32
    }
}

/// Static facts about a running VM (do not change while it runs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainInfo {
    pub name: String,
    pub cpus: u32,
    pub max_memory: u64,
}

/// Coarse lifecycle state of a libvirt domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainState {
    Running,
    ShutOff,
    Paused,
    Other,
}

impl DomainState {
    /// Maps the `state.state=<int>` code from `virsh domstats` output.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => DomainState::Running,
            3 => DomainState::Paused,
            5 => DomainState::ShutOff,
            _ => DomainState::Other,
        }
    }
}

/// One VM's complete sampled record.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainData {
    pub info: DomainInfo,
    pub state: DomainState,
    /// Wall-clock time of this sample, milliseconds since epoch.
    pub sampled_at_ms: i64,
    /// Cumulative guest CPU time, milliseconds.
    pub cpu_time_ms: i64,
    /// Present iff `state == Running`.
    pub mem_stat: Option<MemStat>,
    pub disks: Vec<DiskStat>,
}

impl DomainData {
    pub fn is_running(&self) -> bool {
        matches!(self.state, DomainState::Running)
    }
}

/// Static description of the host's CPU topology.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostCpuInfo {
    pub model: String,
    pub sockets: u32,
    pub cores_per_socket: u32,
    pub threads_per_core: u32,
}

impl HostCpuInfo {
    pub fn cpus(&self) -> u32 {
        self.sockets * self.cores_per_socket * self.threads_per_core
    }
}

/// One read of the aggregate host CPU counters (`/proc/stat`, `cpu ` line).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuSample {
    pub total_clocks: u64,
    pub idle_clocks: u64,
}

/// Aggregated disk usage for one host block device, across every VM that
/// has a qcow2 file backed by it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiskUsage {
    pub usage: MemoryStat,
    pub vm_bytes: u64,
    pub qcow2_paths: Vec<String>,
}

/// One host-wide sample (memory, swap, CPU, per-device disk usage).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostSample {
    pub mem: MemoryStat,
    pub swap: MemoryStat,
    pub cpu: CpuSample,
    pub disks: BTreeMap<String, DiskUsage>,
}

/// Per-VM derived record held by the sampling cache.
#[derive(Debug, Clone, PartialEq)]
pub struct VMCache {
    pub data: DomainData,
    pub cpu_usage_percent: f64,
    pub mem_data_age_sec: Option<i64>,
}

impl VMCache {
    /// `mem_data_age_sec >= 7`.
    pub fn stale(&self) -> bool {
        self.mem_data_age_sec.is_some_and(|age| age >= 7)
    }
}

/// An immutable, whole-system view produced by one `SamplingCache` tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub per_vm: BTreeMap<String, VMCache>,
    pub host: HostSample,
    pub host_cpu_percent: f64,
    pub total_vm_rss: u64,
    pub total_vm_cpu_percent: f64,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_stat_clamps_available_to_total() {
        let m = MemoryStat::new(100, 200);
        assert_eq!(m.available, 100);
        assert_eq!(m.used(), 0);
    }

    #[test]
    fn disk_overhead_percent_matches_seed_example() {
        let d = DiskStat {
            name: "vda".into(),
            allocation: 20 * 1024 * 1024 * 1024,
            capacity: 20 * 1024 * 1024 * 1024,
            physical: 25 * 1024 * 1024 * 1024,
            path: None,
        };
        assert_eq!(d.overhead_percent(), 25);
    }

    #[test]
    fn domain_state_from_code() {
        assert_eq!(DomainState::from_code(1), DomainState::Running);
        assert_eq!(DomainState::from_code(3), DomainState::Paused);
        assert_eq!(DomainState::from_code(5), DomainState::ShutOff);
        assert_eq!(DomainState::from_code(99), DomainState::Other);
    }
}
