//! Shared types and collaborator traits for the warm-pool FaaS scheduler.
//!
//! `faas-scheduler` owns the state machine; this crate holds the value
//! types and the `Runtime`/`Clock` collaborator interfaces so that the
//! scheduler, the HTTP gateway, and tests can all depend on a single,
//! dependency-free vocabulary.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
use thiserror::Error;
pub use uuid;

#[derive(Error, Debug)]
pub enum FaasError {
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FaasError>;

/// Warm-container selection policy (§4.2 / §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Least-recently-used: reuse the idle container with the oldest
    /// `last_used_time`.
    Lcs,
    /// Most-recently-used: reuse the idle container with the newest
    /// `last_used_time`.
    Mru,
}

impl Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Strategy::Lcs => "LCS",
            Strategy::Mru => "MRU",
        })
    }
}

#[derive(Debug, Error)]
#[error("unknown strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl std::str::FromStr for Strategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LCS" => Ok(Strategy::Lcs),
            "MRU" => Ok(Strategy::Mru),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// One worker container's lifecycle state (§3, §4.1).
///
/// `Executing -> Idle -> Executing -> ... -> Idle -> Released`. `Released`
/// is terminal; a container never re-enters a pool once released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerState {
    Executing,
    Idle,
    Released,
}

/// Sentinel `last_used_time` while a container is `Executing`, matching
/// `original_source/lcs_sim.py`'s `Container.last_used_time = -1`.
pub const NEVER_IDLE: i64 = -1;

/// A single warm or executing container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub function_id: String,
    pub endpoint: String,
    pub state: ContainerState,
    /// Simulation-only: when the current job will finish. Unused by the
    /// production scheduler, which observes completion by return of
    /// `Runtime::invoke`.
    pub execution_end_time: Option<i64>,
    /// Sentinel `NEVER_IDLE` while `Executing`; set when entering `Idle`.
    pub last_used_time: i64,
}

impl Container {
    pub fn new_executing(id: String, function_id: String, endpoint: String) -> Self {
        Self {
            id,
            function_id,
            endpoint,
            state: ContainerState::Executing,
            execution_end_time: None,
            last_used_time: NEVER_IDLE,
        }
    }
}

/// A pending or in-flight invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub function_id: String,
    /// Simulation tick at which the request arrives; ignored in production.
    pub arrival_time: i64,
    /// Seconds (production) or ticks (simulation) the job runs for.
    pub exec_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InvocationResult {
    pub request_id: String,
    pub response: Option<Vec<u8>>,
    pub logs: Option<String>,
    pub error: Option<String>,
}

impl Display for InvocationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "InvocationResult(request_id: {}, response: {:?}, logs: {:?}, error: {:?})",
            self.request_id, self.response, self.logs, self.error
        )
    }
}

/// Outcome of `Scheduler::invoke` (§4.3).
#[derive(Debug, Clone, PartialEq)]
pub enum InvokeOutcome {
    Executed {
        container_id: String,
        elapsed: Duration,
    },
    Queued,
    ColdStartFailed(String),
    InvocationFailed(String),
}

/// Abstracts "now" as a monotonically non-decreasing timestamp.
///
/// Production uses a real wall clock (seconds since `UNIX_EPOCH`); the
/// simulation harness uses a stepped integer clock driven by its own tick
/// loop. Both share the scheduler's code path (§9): the simulation is a
/// choice of `Clock` + `Runtime`, not a separate implementation.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Launch/Invoke/Stop/Probe contract for the container runtime (§6).
///
/// This is the one external collaborator kept out of scope for the core:
/// the reference implementation talks to Docker, but nothing in the
/// scheduler core is aware of that — it only ever sees this trait.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Create and start an instance of `image`. Returns its id and an
    /// opaque endpoint the scheduler can later `invoke`/`stop`.
    async fn launch(&self, image: &str) -> Result<(String, String)>;

    /// Send a work request to `endpoint`; blocks until completion.
    async fn invoke(&self, endpoint: &str, exec_time: Duration) -> Result<InvocationResult>;

    /// Terminate and remove the instance identified by `id`.
    async fn stop(&self, id: &str) -> Result<()>;

    /// Liveness check used after `launch`, before the container is
    /// handed to a caller.
    async fn probe(&self, endpoint: &str) -> Result<()>;
}
