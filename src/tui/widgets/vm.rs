//! Formats the VM list window's content lines from a [`Snapshot`].

use crate::balloon::{Controller, Status};
use crate::fmt::{human_bytes, percent2};
use crate::model::{DomainState, Snapshot};

/// One line per VM: name, state, CPU%, memory usage, ballooning status.
pub fn format_vm_lines(snapshot: &Snapshot, balloon: &Controller, show_disks_when_stopped: bool) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshot.per_vm.len());
    for (name, vm) in &snapshot.per_vm {
        let state = match vm.data.state {
            DomainState::Running => "\u{1b}[32mrunning\u{1b}[0m",
            DomainState::Paused => "\u{1b}[33mpaused\u{1b}[0m",
            DomainState::ShutOff => "\u{1b}[90mshut off\u{1b}[0m",
            DomainState::Other => "other",
        };

        let mem_part = match &vm.data.mem_stat {
            Some(mem) => match mem.guest_mem() {
                Some(guest) => format!(
                    "{}/{} ({}%)",
                    human_bytes(guest.used()),
                    human_bytes(mem.actual),
                    percent2(guest.percent_used())
                ),
                None => format!("{} (no guest data)", human_bytes(mem.actual)),
            },
            None => "-".to_string(),
        };

        let stale_marker = if vm.stale() { " \u{1b}[33m[stale]\u{1b}[0m" } else { "" };

        let balloon_enabled = balloon.is_enabled(name);
        let status_part = if vm.data.is_running() {
            format!(" ballooning: {}", if balloon_enabled { "on" } else { "off" })
        } else {
            String::new()
        };

        let mut line = format!(
            "{name:<20} {state:<10} cpu={:>6}%  mem={mem_part}{stale_marker}{status_part}",
            percent2(vm.cpu_usage_percent)
        );

        if !vm.data.is_running() && show_disks_when_stopped {
            for disk in &vm.data.disks {
                line.push_str(&format!(
                    "\n    {:<10} alloc={} phys={} overhead={}%",
                    disk.name,
                    human_bytes(disk.allocation),
                    human_bytes(disk.physical),
                    disk.overhead_percent()
                ));
            }
        }
        lines.push(line);
    }
    lines
}

/// Formats one status line for a per-VM ballooning decision, used by
/// the detail popup and the log window.
pub fn format_balloon_status(name: &str, status: &Status) -> String {
    format!("{name}: {status}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DomainData, DomainInfo, VMCache};
    use std::collections::BTreeMap;

    #[test]
    fn format_vm_lines_includes_name_and_state() {
        let mut per_vm = BTreeMap::new();
        per_vm.insert(
            "web1".to_string(),
            VMCache {
                data: DomainData {
                    info: DomainInfo {
                        name: "web1".into(),
                        cpus: 2,
                        max_memory: 4 * 1024 * 1024 * 1024,
                    },
                    state: DomainState::ShutOff,
                    sampled_at_ms: 0,
                    cpu_time_ms: 0,
                    mem_stat: None,
                    disks: vec![],
                },
                cpu_usage_percent: 0.0,
                mem_data_age_sec: None,
            },
        );
        let snapshot = Snapshot {
            per_vm,
            ..Default::default()
        };
        let balloon = Controller::new(crate::balloon::BallooningParams::default());
        let lines = format_vm_lines(&snapshot, &balloon, false);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("web1"));
        assert!(lines[0].contains("shut off"));
    }
}
