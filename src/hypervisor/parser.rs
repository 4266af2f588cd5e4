//! Pure parsing functions for the hypervisor CLI's textual output.
//!
//! Kept free of any process-spawning or I/O so they can be driven
//! directly from unit tests with literal strings, mirroring the
//! `collector::procfs::parser` split between "read the file" and
//! "parse the text" in the teacher.

use std::collections::BTreeMap;

use super::error::InputFormatError;
use crate::model::{DiskStat, DomainData, DomainInfo, DomainState, HostCpuInfo, MemStat};

/// Parses one `key=value` line, returning `None` for blank lines or
/// lines that don't parse as `key=value` (silently ignored per the
/// external format: "any unparseable key/value pair is ignored").
fn split_kv(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let (k, v) = line.split_once('=')?;
    Some((k.trim(), v.trim()))
}

struct DomainBlock<'a> {
    name: &'a str,
    fields: BTreeMap<&'a str, &'a str>,
}

fn split_blocks(text: &str) -> Vec<DomainBlock<'_>> {
    let mut blocks = Vec::new();
    let mut current_name: Option<&str> = None;
    let mut fields: BTreeMap<&str, &str> = BTreeMap::new();

    for raw_line in text.lines() {
        let trimmed = raw_line.trim();
        if let Some(name) = trimmed.strip_prefix("Domain:") {
            if let Some(n) = current_name.take() {
                blocks.push(DomainBlock {
                    name: n,
                    fields: std::mem::take(&mut fields),
                });
            }
            current_name = Some(name.trim());
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }
        if let Some((k, v)) = split_kv(raw_line) {
            fields.insert(k, v);
        }
    }
    if let Some(n) = current_name.take() {
        blocks.push(DomainBlock { name: n, fields });
    }
    blocks
}

fn parse_u64(fields: &BTreeMap<&str, &str>, key: &str) -> Option<u64> {
    fields.get(key).and_then(|v| v.parse::<u64>().ok())
}

fn parse_i64(fields: &BTreeMap<&str, &str>, key: &str) -> Option<i64> {
    fields.get(key).and_then(|v| v.parse::<i64>().ok())
}

fn kib_to_bytes(kib: u64) -> u64 {
    kib * 1024
}

fn ns_to_ms(ns: i64) -> i64 {
    ns / 1_000_000
}

/// Parses one domain block's fields into a [`DomainData`], given the
/// sampling timestamp captured by the caller at invocation time.
fn parse_domain(block: &DomainBlock<'_>, sampled_at_ms: i64) -> Result<DomainData, InputFormatError> {
    let state_code = parse_i64(&block.fields, "state.state").ok_or_else(|| {
        InputFormatError::new(format!("domain {}: missing state.state", block.name))
    })?;
    let state = DomainState::from_code(state_code);

    let cpus = parse_u64(&block.fields, "vcpu.maximum")
        .ok_or_else(|| InputFormatError::new(format!("domain {}: missing vcpu.maximum", block.name)))?
        as u32;
    let max_memory_kib = parse_u64(&block.fields, "balloon.maximum").ok_or_else(|| {
        InputFormatError::new(format!("domain {}: missing balloon.maximum", block.name))
    })?;
    let cpu_time_ns = parse_i64(&block.fields, "cpu.time")
        .ok_or_else(|| InputFormatError::new(format!("domain {}: missing cpu.time", block.name)))?;

    let info = DomainInfo {
        name: block.name.to_string(),
        cpus,
        max_memory: kib_to_bytes(max_memory_kib),
    };

    let mem_stat = if matches!(state, DomainState::Running) {
        let rss = parse_u64(&block.fields, "balloon.rss");
        let last_updated_sec = parse_i64(&block.fields, "balloon.last-update");
        match (rss, last_updated_sec) {
            (Some(rss), Some(last_updated_sec)) => {
                let actual = parse_u64(&block.fields, "balloon.current").ok_or_else(|| {
                    InputFormatError::new(format!(
                        "domain {}: running with balloon data but missing balloon.current",
                        block.name
                    ))
                })?;
                Some(MemStat {
                    actual: kib_to_bytes(actual),
                    unused: parse_u64(&block.fields, "balloon.unused").map(kib_to_bytes),
                    available: parse_u64(&block.fields, "balloon.available").map(kib_to_bytes),
                    usable: parse_u64(&block.fields, "balloon.usable").map(kib_to_bytes),
                    disk_caches: parse_u64(&block.fields, "balloon.disk_caches").map(kib_to_bytes),
                    rss: kib_to_bytes(rss),
                    last_updated_sec,
                })
            }
            _ => None,
        }
    } else {
        None
    };

    let disks = parse_disks(block);

    Ok(DomainData {
        info,
        state,
        sampled_at_ms,
        cpu_time_ms: ns_to_ms(cpu_time_ns),
        mem_stat,
        disks,
    })
}

fn parse_disks(block: &DomainBlock<'_>) -> Vec<DiskStat> {
    let count = parse_u64(&block.fields, "block.count").unwrap_or(0);
    let mut disks = Vec::new();
    for i in 0..count {
        let name_key = format!("block.{i}.name");
        let alloc_key = format!("block.{i}.allocation");
        let cap_key = format!("block.{i}.capacity");
        let phys_key = format!("block.{i}.physical");
        let path_key = format!("block.{i}.path");

        let name = block.fields.get(name_key.as_str());
        let allocation = block.fields.get(alloc_key.as_str()).and_then(|v| v.parse::<u64>().ok());
        let capacity = block.fields.get(cap_key.as_str()).and_then(|v| v.parse::<u64>().ok());
        let physical = block.fields.get(phys_key.as_str()).and_then(|v| v.parse::<u64>().ok());

        if let (Some(name), Some(allocation), Some(capacity), Some(physical)) =
            (name, allocation, capacity, physical)
        {
            disks.push(DiskStat {
                name: name.to_string(),
                allocation,
                capacity,
                physical,
                path: block.fields.get(path_key.as_str()).map(|s| s.to_string()),
            });
        }
    }
    disks
}

/// Parses the full output of the hypervisor statistics subcommand into
/// one [`DomainData`] per domain block, keyed by domain name.
///
/// `sampled_at_ms` is the wall-clock time (milliseconds since epoch)
/// captured by the caller immediately before or after invoking the
/// subcommand; every domain in the batch shares this timestamp.
pub fn parse_stats(
    text: &str,
    sampled_at_ms: i64,
) -> Result<BTreeMap<String, DomainData>, InputFormatError> {
    let mut out = BTreeMap::new();
    for block in split_blocks(text) {
        let data = parse_domain(&block, sampled_at_ms)?;
        out.insert(block.name.to_string(), data);
    }
    Ok(out)
}

/// Parses node-info output into [`HostCpuInfo`].
///
/// Expected `key: value`-style lines, tolerant of the exact label
/// spelling used by the hypervisor's node-info subcommand
/// (`CPU model:`, `CPU socket(s):`, `Core(s) per socket:`,
/// `Thread(s) per core:`).
pub fn parse_node_info(text: &str) -> Result<HostCpuInfo, InputFormatError> {
    let mut model = None;
    let mut sockets = None;
    let mut cores_per_socket = None;
    let mut threads_per_core = None;

    for line in text.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        match key {
            "CPU model" => model = Some(value.to_string()),
            "CPU socket(s)" => sockets = value.parse::<u32>().ok(),
            "Core(s) per socket" => cores_per_socket = value.parse::<u32>().ok(),
            "Thread(s) per core" => threads_per_core = value.parse::<u32>().ok(),
            _ => {}
        }
    }

    Ok(HostCpuInfo {
        model: model.ok_or_else(|| InputFormatError::new("missing CPU model"))?,
        sockets: sockets.ok_or_else(|| InputFormatError::new("missing CPU socket(s)"))?,
        cores_per_socket: cores_per_socket
            .ok_or_else(|| InputFormatError::new("missing Core(s) per socket"))?,
        threads_per_core: threads_per_core
            .ok_or_else(|| InputFormatError::new("missing Thread(s) per core"))?,
    })
}
