//! Per-VM and parent ballooning controllers.

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::error;

use super::clock::{Clock, SystemClock};
use super::params::BallooningParams;
use super::status::Status;
use crate::model::{DomainData, Snapshot};

/// Closed-loop controller for one VM's `MemStat.actual`.
pub struct VmController<C: Clock = SystemClock> {
    params: BallooningParams,
    enabled: bool,
    back_off_until: Option<std::time::Instant>,
    last_update_at: Option<i64>,
    clock: C,
}

impl VmController<SystemClock> {
    pub fn new(params: BallooningParams) -> Self {
        Self::with_clock(params, SystemClock)
    }
}

impl<C: Clock> VmController<C> {
    pub fn with_clock(params: BallooningParams, clock: C) -> Self {
        Self {
            params,
            enabled: true,
            back_off_until: None,
            last_update_at: None,
            clock,
        }
    }

    pub fn params(&self) -> &BallooningParams {
        &self.params
    }

    /// Replaces the tunable parameters; clears any active cool-down,
    /// since a runtime tuning change is user intent.
    pub fn set_params(&mut self, params: BallooningParams) {
        self.params = params;
        self.back_off_until = None;
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Toggles the enable switch; clears any active cool-down immediately.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.back_off_until = None;
    }

    fn enter_back_off(&mut self, secs: i64) {
        self.back_off_until = Some(self.clock.now() + Duration::from_secs(secs.max(0) as u64));
    }

    /// Runs one control-loop iteration. `data` is `None` when the VM has
    /// disappeared from the latest snapshot. Returns the status to
    /// report and, when a resize decision was made, the new target in
    /// bytes for the caller to apply via `HypervisorAdapter::set_memory`.
    pub fn tick(&mut self, data: Option<&DomainData>) -> (Status, Option<u64>) {
        if !self.enabled {
            self.back_off_until = None;
            self.last_update_at = None;
            return (Status::Disabled, None);
        }

        let running = data.is_some_and(|d| d.is_running());
        if !running {
            self.enter_back_off(self.params.boot_back_off_sec);
            self.last_update_at = None;
            return (Status::VmStopped, None);
        }
        let data = data.expect("running implies data present");

        let Some(mem) = &data.mem_stat else {
            return (Status::BallooningUnsupported, None);
        };
        if !mem.has_guest_data() {
            return (Status::BallooningUnsupported, None);
        }

        if self.last_update_at == Some(mem.last_updated_sec) {
            return (Status::NoNewData, None);
        }

        let guest_mem = mem
            .guest_mem()
            .expect("has_guest_data() implies guest_mem() is Some");
        let percent_used = guest_mem.percent_used();

        let delta_percent = if percent_used >= self.params.trigger_increase {
            self.params.increase_by
        } else if percent_used <= self.params.trigger_decrease {
            if let Some(until) = self.back_off_until {
                let now = self.clock.now();
                if now < until {
                    let remaining = (until - now).as_secs() as i64;
                    return (Status::BackingOff { remaining_sec: remaining }, None);
                }
            }
            -self.params.decrease_by
        } else {
            return (Status::SweetSpot, None);
        };

        let raw = apply_delta(mem.actual, delta_percent);
        let lower = self.params.min_actual;
        let upper = data.info.max_memory;
        let clamped = raw.clamp(lower, upper);
        let capped = clamped != raw;

        if clamped == mem.actual {
            self.last_update_at = Some(mem.last_updated_sec);
            if capped {
                // The bound, not the target itself, forced this to equal
                // `actual`: the VM is already pinned at min_actual/max_memory.
                return (Status::CappedAtLimit { delta_percent }, None);
            }
            return (Status::Unchanged, None);
        }

        self.enter_back_off(self.params.back_off_sec);
        self.last_update_at = Some(mem.last_updated_sec);
        (
            Status::Updated {
                delta_percent,
                new_actual: clamped,
                capped,
            },
            Some(clamped),
        )
    }
}

fn apply_delta(actual: u64, delta_percent: f64) -> u64 {
    let factor = 1.0 + delta_percent / 100.0;
    ((actual as f64) * factor) as u64
}

/// Owns one [`VmController`] per known VM, pruning entries whose VM
/// disappeared from the latest snapshot.
pub struct Controller {
    params: BallooningParams,
    controllers: BTreeMap<String, VmController>,
}

impl Controller {
    pub fn new(default_params: BallooningParams) -> Self {
        Self {
            params: default_params,
            controllers: BTreeMap::new(),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.controllers.get(name).is_some_and(VmController::enabled)
    }

    pub fn set_enabled(&mut self, name: &str, enabled: bool) {
        if let Some(vm) = self.controllers.get_mut(name) {
            vm.set_enabled(enabled);
        }
    }

    /// Runs one tick over every VM in `snapshot`, applying resize
    /// decisions through `set_memory`. Failures from `set_memory` are
    /// logged and the VM's bookkeeping is left exactly as it was before
    /// the decision, so the next tick can retry.
    pub fn update<SM>(&mut self, snapshot: &Snapshot, mut set_memory: SM) -> BTreeMap<String, Status>
    where
        SM: FnMut(&str, u64) -> Result<(), Box<dyn std::error::Error>>,
    {
        let params = self.params;
        self.controllers
            .retain(|name, _| snapshot.per_vm.contains_key(name));

        let mut statuses = BTreeMap::new();
        for (name, vm_cache) in &snapshot.per_vm {
            let controller = self
                .controllers
                .entry(name.clone())
                .or_insert_with(|| VmController::new(params));
            let (status, target) = controller.tick(Some(&vm_cache.data));
            if let Some(bytes) = target {
                if let Err(e) = set_memory(name, bytes) {
                    error!(domain = %name, error = %e, "set_memory failed during ballooning tick");
                }
            }
            statuses.insert(name.clone(), status);
        }
        statuses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::balloon::clock::ManualClock;
    use crate::model::{DomainInfo, DomainState, MemStat};

    fn vm_with_pressure(actual_gib: f64, percent_used: f64, max_memory_gib: f64) -> DomainData {
        let actual = (actual_gib * 1024.0 * 1024.0 * 1024.0) as u64;
        let max_memory = (max_memory_gib * 1024.0 * 1024.0 * 1024.0) as u64;
        let usable = (actual as f64 * (100.0 - percent_used) / 100.0) as u64;
        DomainData {
            info: DomainInfo {
                name: "web1".into(),
                cpus: 4,
                max_memory,
            },
            state: DomainState::Running,
            sampled_at_ms: 0,
            cpu_time_ms: 0,
            mem_stat: Some(MemStat {
                actual,
                unused: Some(usable),
                available: Some(usable),
                usable: Some(usable),
                disk_caches: Some(0),
                rss: actual / 2,
                last_updated_sec: 1_700_000_000,
            }),
            disks: vec![],
        }
    }

    #[test]
    fn inflate_on_pressure_matches_seed_scenario() {
        let clock = std::sync::Arc::new(ManualClock::new());
        let mut vm = VmController::with_clock(BallooningParams::default(), clock);
        let data = vm_with_pressure(2.0, 100.0, 16.0);
        let (status, target) = vm.tick(Some(&data));
        assert_eq!(target, Some(2_791_728_742));
        match status {
            Status::Updated { new_actual, .. } => assert_eq!(new_actual, 2_791_728_742),
            other => panic!("expected Updated, got {other:?}"),
        }
    }

    #[test]
    fn cap_at_max_matches_seed_scenario() {
        let clock = std::sync::Arc::new(ManualClock::new());
        let mut vm = VmController::with_clock(BallooningParams::default(), clock);
        let data = vm_with_pressure(15.0, 95.0, 16.0);
        let (status, target) = vm.tick(Some(&data));
        let max = 16 * 1024 * 1024 * 1024u64;
        assert_eq!(target, Some(max));
        assert!(matches!(status, Status::Updated { capped: true, .. }));
    }

    #[test]
    fn already_at_max_reports_capped_at_limit_not_unchanged() {
        let clock = std::sync::Arc::new(ManualClock::new());
        let mut vm = VmController::with_clock(BallooningParams::default(), clock);
        // actual is already pinned at max_memory; pressure still wants to inflate.
        let data = vm_with_pressure(16.0, 100.0, 16.0);
        let (status, target) = vm.tick(Some(&data));
        assert_eq!(target, None);
        assert!(matches!(status, Status::CappedAtLimit { delta_percent } if delta_percent > 0.0));
        assert_ne!(status, Status::Unchanged);
    }

    #[test]
    fn back_off_suppresses_deflate_then_releases() {
        let clock = std::sync::Arc::new(ManualClock::new());
        let mut vm = VmController::with_clock(BallooningParams::default(), clock.clone());

        // First tick: deflate (50% used is below the 55% trigger_decrease).
        let mut data = vm_with_pressure(4.0, 50.0, 16.0);
        let (status, target) = vm.tick(Some(&data));
        assert!(target.is_some());
        assert!(matches!(status, Status::Updated { .. }));

        // Second tick, same guest pressure, new timestamp, within 10s: backing off.
        data.mem_stat.as_mut().unwrap().last_updated_sec += 2;
        clock.advance(2);
        let (status, target) = vm.tick(Some(&data));
        assert!(target.is_none());
        assert!(matches!(status, Status::BackingOff { .. }));

        // Third tick, after 11s total: back-off has expired, deflate proceeds.
        data.mem_stat.as_mut().unwrap().last_updated_sec += 2;
        clock.advance(9);
        let (status, target) = vm.tick(Some(&data));
        assert!(target.is_some());
        assert!(matches!(status, Status::Updated { .. }));
        let expected = ((4.0 * 1024.0 * 1024.0 * 1024.0) * 0.9) as u64;
        assert_eq!(target, Some(expected));
    }

    #[test]
    fn disabled_controller_never_changes_actual() {
        let mut vm = VmController::new(BallooningParams::default());
        vm.set_enabled(false);
        let data = vm_with_pressure(2.0, 100.0, 16.0);
        let (status, target) = vm.tick(Some(&data));
        assert_eq!(status, Status::Disabled);
        assert!(target.is_none());
    }

    #[test]
    fn same_timestamp_is_no_new_data() {
        let mut vm = VmController::new(BallooningParams::default());
        let data = vm_with_pressure(2.0, 60.0, 16.0);
        let (_, _) = vm.tick(Some(&data));
        let (status, target) = vm.tick(Some(&data));
        assert_eq!(status, Status::NoNewData);
        assert!(target.is_none());
    }

    #[test]
    fn stopped_vm_reports_vm_stopped() {
        let mut vm = VmController::new(BallooningParams::default());
        let (status, target) = vm.tick(None);
        assert_eq!(status, Status::VmStopped);
        assert!(target.is_none());
    }
}
