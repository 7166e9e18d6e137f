//! Crate-local error type (§7 ambient supplement).
//!
//! Mirrors `faas-orchestrator::Error`'s shape: a flat enum with
//! `#[from]` conversion at the `faas_common::FaasError` seam, rather
//! than `faas-common`'s shared error type leaking unwrapped through
//! every internal call site.

use thiserror::Error;

use faas_common::FaasError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("health probe for {endpoint} did not succeed within {timeout:?}")]
    HealthProbeTimeout {
        endpoint: String,
        timeout: std::time::Duration,
    },

    #[error(transparent)]
    Runtime(#[from] FaasError),
}
