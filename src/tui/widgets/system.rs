//! Formats the SystemWindow's content lines from a [`Snapshot`]'s host
//! summary: aggregate CPU, memory, swap, and per-device disk usage.

use crate::fmt::{human_bytes, percent2};
use crate::model::Snapshot;

/// One block of lines: host CPU/memory/swap totals, the running VMs'
/// aggregate RSS/CPU share, then one line per backing disk device.
pub fn format_system_lines(snapshot: &Snapshot) -> Vec<String> {
    let mut lines = Vec::new();

    lines.push(format!("host cpu   {:>6}%", percent2(snapshot.host_cpu_percent)));
    lines.push(format!(
        "host mem   {}/{} ({}%)",
        human_bytes(snapshot.host.mem.used()),
        human_bytes(snapshot.host.mem.total),
        percent2(snapshot.host.mem.percent_used())
    ));
    lines.push(format!(
        "host swap  {}/{} ({}%)",
        human_bytes(snapshot.host.swap.used()),
        human_bytes(snapshot.host.swap.total),
        percent2(snapshot.host.swap.percent_used())
    ));
    lines.push(format!(
        "vm rss     {}  vm cpu {:>6}%",
        human_bytes(snapshot.total_vm_rss),
        percent2(snapshot.total_vm_cpu_percent)
    ));
    lines.push(String::new());

    if snapshot.host.disks.is_empty() {
        lines.push("no qcow2-backed disks in use".to_string());
    } else {
        lines.push("disk              used/total        vm bytes".to_string());
        for (device, usage) in &snapshot.host.disks {
            lines.push(format!(
                "{device:<16}  {}/{} ({}%)  {}",
                human_bytes(usage.usage.used()),
                human_bytes(usage.usage.total),
                percent2(usage.usage.percent_used()),
                human_bytes(usage.vm_bytes)
            ));
        }
    }
    lines
}
