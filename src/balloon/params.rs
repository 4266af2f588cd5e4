//! Tunable thresholds for the auto-ballooning feedback loop.

/// Per-VM overridable ballooning parameters. Replaces the mutable
/// globals of the source tool with a plain record passed at
/// construction; runtime tuning goes through [`super::VmController::set_params`],
/// which also clears any active back-off.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallooningParams {
    /// Lower bound for `actual`, in bytes.
    pub min_actual: u64,
    /// Guest pressure percent above which we inflate.
    pub trigger_increase: f64,
    /// Relative inflate step, as a percent (e.g. `30.0` for +30%).
    pub increase_by: f64,
    /// Guest pressure percent below which we deflate.
    pub trigger_decrease: f64,
    /// Relative deflate step, as a percent.
    pub decrease_by: f64,
    /// Cool-down after a deflate, in seconds.
    pub back_off_sec: i64,
    /// Cool-down applied after boot or when the VM is shut off, in seconds.
    pub boot_back_off_sec: i64,
}

impl Default for BallooningParams {
    fn default() -> Self {
        Self {
            min_actual: 2 * 1024 * 1024 * 1024,
            trigger_increase: 65.0,
            increase_by: 30.0,
            trigger_decrease: 55.0,
            decrease_by: 10.0,
            back_off_sec: 10,
            boot_back_off_sec: 20,
        }
    }
}
