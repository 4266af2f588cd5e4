//! domtop - interactive terminal dashboard for libvirt/QEMU virtual machines.
//!
//! This library provides:
//! - `hypervisor` - adapter over the hypervisor CLI (stats parsing, lifecycle commands)
//! - `sysinfo` - host CPU/memory/disk sampling from `/proc`
//! - `cache` - the sampling cache that merges hypervisor + host data into snapshots
//! - `balloon` - the per-VM auto-ballooning feedback controller
//! - `events` - the single-threaded cooperative event queue
//! - `tui` - the screen/window model and application controller

pub mod balloon;
pub mod cache;
pub mod events;
pub mod fmt;
pub mod hypervisor;
pub mod model;
pub mod sysinfo;
pub mod tui;
