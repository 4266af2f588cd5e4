//! Human-readable formatting helpers shared by the ballooning controller
//! and the TUI windows.

const UNITS: [(&str, f64); 4] = [
    ("T", 1024.0_f64 * 1024.0 * 1024.0 * 1024.0),
    ("G", 1024.0_f64 * 1024.0 * 1024.0),
    ("M", 1024.0_f64 * 1024.0),
    ("K", 1024.0_f64),
];

/// Formats a byte count as a one-decimal, base-1024 size with a single
/// letter suffix (`2.6G`, `512.0M`), matching the ballooning status text.
pub fn human_bytes(bytes: u64) -> String {
    let value = bytes as f64;
    for (suffix, scale) in UNITS {
        if value >= scale {
            return format!("{:.1}{suffix}", value / scale);
        }
    }
    format!("{bytes}B")
}

/// Formats a percentage to two decimal places (`"4.11"`).
pub fn percent2(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_bytes_matches_seed_inflate_example() {
        assert_eq!(human_bytes(2_791_728_742), "2.6G");
    }

    #[test]
    fn human_bytes_handles_small_values() {
        assert_eq!(human_bytes(512), "512B");
    }

    #[test]
    fn human_bytes_handles_megabytes() {
        assert_eq!(human_bytes(512 * 1024 * 1024), "512.0M");
    }
}
