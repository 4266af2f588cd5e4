//! Per-tick status reported by [`super::VmController`].

/// Outcome of one [`super::VmController::tick`] call, mirrored into the
/// VM window as a short human-readable line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    Disabled,
    VmStopped,
    BallooningUnsupported,
    /// `mem_stat.last_updated_sec` hadn't advanced since the last tick.
    NoNewData,
    SweetSpot,
    BackingOff { remaining_sec: i64 },
    /// The computed target hit `min_actual`/`max_memory` and clamped
    /// right back to the current `actual`: the VM is already sitting at
    /// the relevant bound, so nothing changed, but (unlike `Unchanged`)
    /// a resize *was* wanted. `delta_percent`'s sign carries the
    /// direction that was wanted.
    CappedAtLimit { delta_percent: f64 },
    /// The unclamped target itself equals the current actual (e.g.
    /// integer truncation on a very small `actual`); no bound was
    /// involved and nothing was wanted.
    Unchanged,
    Updated {
        delta_percent: f64,
        new_actual: u64,
        capped: bool,
    },
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Disabled => write!(f, "disabled"),
            Status::VmStopped => write!(f, "vm stopped"),
            Status::BallooningUnsupported => write!(f, "ballooning unsupported"),
            Status::NoNewData => write!(f, "no new data"),
            Status::SweetSpot => write!(f, "sweet spot"),
            Status::BackingOff { remaining_sec } => write!(f, "backing off for {remaining_sec}s"),
            Status::CappedAtLimit { delta_percent } => {
                let verb = if *delta_percent >= 0.0 { "increase" } else { "decrease" };
                write!(f, "wanted to {verb} actual, already at limit")
            }
            Status::Unchanged => write!(f, "unchanged"),
            Status::Updated {
                delta_percent,
                new_actual,
                capped,
            } => {
                let verb = if *delta_percent >= 0.0 { "increasing" } else { "decreasing" };
                let pct = delta_percent.abs();
                let size = crate::fmt::human_bytes(*new_actual);
                if *capped {
                    write!(f, "{verb} actual by {pct:.0}%, capped at {size}")
                } else {
                    write!(f, "updating actual by {pct:.0}% to {size}")
                }
            }
        }
    }
}
