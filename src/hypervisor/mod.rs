//! Adapter over the hypervisor CLI: statistics parsing, node info, and
//! lifecycle/memory commands.

mod adapter;
mod error;
mod parser;
mod runner;

pub use adapter::Adapter;
pub use error::{CommandError, HypervisorError, InputFormatError, ValidationError};
pub use parser::{parse_node_info, parse_stats};
pub use runner::{CommandRunner, MockRunner, RealRunner};
