//! The warm-pool FaaS scheduler core.
//!
//! Owns the decision engine (`Scheduler`), the per-function state machine
//! (`FunctionPool`), the background expiration sweep (`Reaper`), the
//! post-execution queue drain (`drain_queue`), and the `Clock`/`Runtime`
//! implementations that let the same `Scheduler` run in production or in
//! the deterministic `SimulationHarness`.

pub mod clock;
pub mod config;
pub mod drainer;
pub mod error;
pub mod pool;
pub mod reaper;
pub mod runtime;
pub mod scheduler;
pub mod simulation;
pub mod stats;

pub use clock::{RealClock, SteppedClock};
pub use config::{SchedulerConfig, SimulationConfig};
pub use drainer::drain_queue;
pub use error::SchedulerError;
pub use pool::FunctionPool;
pub use reaper::Reaper;
pub use runtime::{DockerRuntime, StubRuntime};
pub use scheduler::{Scheduler, SchedulerSettings};
pub use simulation::{SimulationHarness, SimulationReport};
pub use stats::{Counters, Stats, StatsSnapshot};

pub use faas_common::{
    Clock, Container, ContainerState, FaasError, InvocationResult, InvokeOutcome, Request,
    Result, Runtime, Strategy, UnknownStrategy, NEVER_IDLE,
};
