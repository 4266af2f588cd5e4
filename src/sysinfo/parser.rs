//! Pure parsers for `/proc/meminfo`, `/proc/stat`, and `/proc/cpuinfo`.
//!
//! Designed to be exercised directly with string literals in tests,
//! independent of the [`super::fs::FileSystem`] used to obtain them.

use std::collections::HashSet;

use super::error::ParseError;
use crate::model::{CpuSample, MemoryStat};

fn kb_line_value(line: &str) -> Option<u64> {
    let (_, rest) = line.split_once(':')?;
    let rest = rest.trim();
    let number = rest.strip_suffix("kB").unwrap_or(rest).trim();
    number.parse::<u64>().ok()
}

/// Parses `/proc/meminfo` into `(ram, swap)`. Required labels: `MemTotal`,
/// `MemAvailable`, `SwapTotal`, `SwapFree`. Values are kB and converted to bytes.
pub fn parse_meminfo(text: &str) -> Result<(MemoryStat, MemoryStat), ParseError> {
    let mut mem_total = None;
    let mut mem_available = None;
    let mut swap_total = None;
    let mut swap_free = None;

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal") {
            mem_total = kb_line_value(&format!("MemTotal{rest}"));
        } else if let Some(rest) = line.strip_prefix("MemAvailable") {
            mem_available = kb_line_value(&format!("MemAvailable{rest}"));
        } else if let Some(rest) = line.strip_prefix("SwapTotal") {
            swap_total = kb_line_value(&format!("SwapTotal{rest}"));
        } else if let Some(rest) = line.strip_prefix("SwapFree") {
            swap_free = kb_line_value(&format!("SwapFree{rest}"));
        }
    }

    let mem_total = mem_total.ok_or_else(|| ParseError::new("missing MemTotal"))?;
    let mem_available = mem_available.ok_or_else(|| ParseError::new("missing MemAvailable"))?;
    let swap_total = swap_total.ok_or_else(|| ParseError::new("missing SwapTotal"))?;
    let swap_free = swap_free.ok_or_else(|| ParseError::new("missing SwapFree"))?;

    Ok((
        MemoryStat::new(mem_total * 1024, mem_available * 1024),
        MemoryStat::new(swap_total * 1024, swap_free * 1024),
    ))
}

/// Parses the aggregate `cpu ` line of `/proc/stat` into a [`CpuSample`].
///
/// `idle_clocks = idle + iowait`; `total_clocks` sums all ten fields.
pub fn parse_stat(text: &str) -> Result<CpuSample, ParseError> {
    let line = text
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| ParseError::new("missing aggregate `cpu ` line"))?;

    let fields: Vec<u64> = line
        .split_whitespace()
        .skip(1)
        .map(|f| f.parse::<u64>().unwrap_or(0))
        .collect();

    if fields.len() < 4 {
        return Err(ParseError::new("`cpu ` line has fewer than 4 fields"));
    }

    let user = fields[0];
    let nice = fields[1];
    let system = fields[2];
    let idle = fields[3];
    let iowait = fields.get(4).copied().unwrap_or(0);
    let irq = fields.get(5).copied().unwrap_or(0);
    let softirq = fields.get(6).copied().unwrap_or(0);
    let steal = fields.get(7).copied().unwrap_or(0);
    let guest = fields.get(8).copied().unwrap_or(0);
    let guest_nice = fields.get(9).copied().unwrap_or(0);

    let idle_clocks = idle + iowait;
    let non_idle = user + nice + system + irq + softirq + steal;
    let total_clocks = idle_clocks + non_idle + guest + guest_nice;

    Ok(CpuSample {
        total_clocks,
        idle_clocks,
    })
}

/// Computes CPU usage percent from two samples, rounded to two decimals.
/// Returns `0.0` with no prior sample, or when `total` hasn't advanced.
pub fn cpu_usage_percent(prev: Option<CpuSample>, next: CpuSample) -> f64 {
    let Some(prev) = prev else {
        return 0.0;
    };
    let delta_total = next.total_clocks.saturating_sub(prev.total_clocks);
    if delta_total == 0 {
        return 0.0;
    }
    let delta_idle = next.idle_clocks.saturating_sub(prev.idle_clocks);
    let percent = 100.0 * (1.0 - delta_idle as f64 / delta_total as f64);
    (percent * 100.0).round() / 100.0
}

/// Parses `/proc/cpuinfo`, returning the union of `flags` across every core.
pub fn parse_cpu_flags(text: &str) -> HashSet<String> {
    let mut flags = HashSet::new();
    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim() == "flags" {
                flags.extend(value.split_whitespace().map(|s| s.to_string()));
            }
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "\
MemTotal:       16384000 kB
MemFree:         1000000 kB
MemAvailable:    8192000 kB
SwapTotal:       2048000 kB
SwapFree:        2048000 kB
";

    #[test]
    fn parses_meminfo_into_bytes() {
        let (ram, swap) = parse_meminfo(MEMINFO).unwrap();
        assert_eq!(ram.total, 16384000 * 1024);
        assert_eq!(ram.available, 8192000 * 1024);
        assert_eq!(swap.total, 2048000 * 1024);
        assert_eq!(swap.available, 2048000 * 1024);
    }

    #[test]
    fn meminfo_missing_label_is_error() {
        let text = "MemTotal: 100 kB\n";
        assert!(parse_meminfo(text).is_err());
    }

    #[test]
    fn cpu_percent_matches_seed_example() {
        let prev = CpuSample {
            total_clocks: 0,
            idle_clocks: 0,
        };
        let next = CpuSample {
            total_clocks: 10141,
            idle_clocks: 9724,
        };
        let pct = cpu_usage_percent(Some(prev), next);
        assert_eq!(pct, 4.11);
    }

    #[test]
    fn cpu_percent_with_no_prior_sample_is_zero() {
        let next = CpuSample {
            total_clocks: 100,
            idle_clocks: 50,
        };
        assert_eq!(cpu_usage_percent(None, next), 0.0);
    }

    #[test]
    fn parses_stat_aggregate_line() {
        let text = "cpu  100 0 50 9724 417 0 0 0 0 0\ncpu0 50 0 25 4862 200 0 0 0 0 0\n";
        let sample = parse_stat(text).unwrap();
        assert_eq!(sample.idle_clocks, 9724 + 417);
    }

    #[test]
    fn cpu_flags_union_across_cores() {
        let text = "\
processor: 0
flags: fpu vme sse sse2
processor: 1
flags: fpu vme sse2 avx
";
        let flags = parse_cpu_flags(text);
        assert!(flags.contains("fpu"));
        assert!(flags.contains("avx"));
        assert_eq!(flags.len(), 4);
    }
}
