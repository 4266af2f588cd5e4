//! Error types for the sampling cache.

use crate::hypervisor::{HypervisorError, ValidationError};
use crate::sysinfo::CollectError;

/// Failures `SamplingCache::update` can surface. Both variants are
/// handled the same way by the timer path: logged, tick aborted, next
/// tick retries from a fresh sample.
#[derive(Debug)]
pub enum CacheError {
    Hypervisor(HypervisorError),
    Collect(CollectError),
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Hypervisor(e) => e.fmt(f),
            CacheError::Collect(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<HypervisorError> for CacheError {
    fn from(e: HypervisorError) -> Self {
        CacheError::Hypervisor(e)
    }
}

impl From<CollectError> for CacheError {
    fn from(e: CollectError) -> Self {
        CacheError::Collect(e)
    }
}

impl From<ValidationError> for CacheError {
    fn from(e: ValidationError) -> Self {
        CacheError::Hypervisor(HypervisorError::Validation(e))
    }
}
