//! The top-level decision engine (spec §4.3).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use faas_common::{Clock, Container, InvokeOutcome, Request, Runtime, Strategy};
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use crate::drainer::drain_queue;
use crate::error::SchedulerError;
use crate::pool::FunctionPool;
use crate::stats::{Stats, StatsSnapshot};

/// Tuning knobs the `Scheduler` needs at construction time (spec §4.7).
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Per-function concurrency cap applied to pools created lazily.
    pub default_limit: usize,
    /// Image launched for every cold start. The reference implementation
    /// uses one generic worker image for every function — affinity is
    /// purely a scheduling-layer concept, not a Runtime one (mirrors
    /// `original_source/scheduler.py`'s `start_new_container`).
    pub worker_image: String,
    /// Bound on the cold-start liveness probe (spec §4.3).
    pub health_probe_timeout: Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            default_limit: 5,
            worker_image: "faas-function:latest".to_string(),
            health_probe_timeout: Duration::from_secs(5),
        }
    }
}

/// Per-function pools, the global strategy, and stats, generic over
/// `Clock` and `Runtime` so that production and simulation share one
/// code path (spec §9: "unify simulation and production by
/// parametrizing the Scheduler on Clock and Runtime").
pub struct Scheduler<C: Clock, R: Runtime> {
    clock: Arc<C>,
    runtime: Arc<R>,
    settings: SchedulerSettings,
    /// Lock ordering is strategy -> pool -> stats (spec §5); this lock
    /// also guards the dynamic-creation dictionary-shape mutation
    /// (inserting a brand-new function's pool), mirroring
    /// `original_source/scheduler.py`'s double-checked-locking around
    /// `FUNCTION_POOLS`.
    pools: Arc<Mutex<HashMap<String, Arc<FunctionPool>>>>,
    strategy: Mutex<Strategy>,
    stats: Arc<Stats>,
}

impl<C: Clock + 'static, R: Runtime + 'static> Scheduler<C, R> {
    pub fn new(clock: Arc<C>, runtime: Arc<R>, settings: SchedulerSettings) -> Self {
        Self {
            clock,
            runtime,
            settings,
            pools: Arc::new(Mutex::new(HashMap::new())),
            strategy: Mutex::new(Strategy::Lcs),
            stats: Arc::new(Stats::new()),
        }
    }

    /// Shared handle to the pool registry, for the `Reaper` to sweep
    /// without going through `Scheduler` itself.
    pub fn pools_handle(&self) -> Arc<Mutex<HashMap<String, Arc<FunctionPool>>>> {
        self.pools.clone()
    }

    pub fn clock(&self) -> &Arc<C> {
        &self.clock
    }

    pub fn runtime(&self) -> &Arc<R> {
        &self.runtime
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub async fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot().await
    }

    pub async fn current_strategy(&self) -> Strategy {
        *self.strategy.lock().await
    }

    /// Atomically replace the selection policy. Idempotent: calling this
    /// twice with the same strategy is a no-op (spec §8).
    pub async fn set_strategy(&self, strategy: Strategy) {
        *self.strategy.lock().await = strategy;
    }

    async fn pool_for(&self, function_id: &str) -> Arc<FunctionPool> {
        // Fast path: pool already exists.
        {
            let pools = self.pools.lock().await;
            if let Some(pool) = pools.get(function_id) {
                return pool.clone();
            }
        }

        // Slow path: double-checked creation (spec §4.2 supplement).
        let mut pools = self.pools.lock().await;
        pools
            .entry(function_id.to_string())
            .or_insert_with(|| {
                info!(function_id, "first request for function, creating pool");
                Arc::new(FunctionPool::new(function_id, self.settings.default_limit))
            })
            .clone()
    }

    /// Step through the seven-step algorithm of spec §4.3.
    #[instrument(skip(self), fields(function_id = %function_id))]
    pub async fn invoke(&self, function_id: &str, exec_time: Duration) -> InvokeOutcome {
        self.stats.record_received(function_id).await;
        let pool = self.pool_for(function_id).await;
        let strategy = self.current_strategy().await;

        if let Some(container) = pool.try_warm_reuse(strategy, None).await {
            info!(container_id = %container.id, %strategy, "warm start");
            self.stats.record_warm_start(function_id).await;
            return self.execute_on(pool, container, exec_time).await;
        }

        if pool.try_reserve_cold_start().await {
            match self.cold_start(&pool, function_id).await {
                Ok(container) => {
                    self.stats.record_cold_start(function_id).await;
                    return self.execute_on(pool, container, exec_time).await;
                }
                Err(reason) => return InvokeOutcome::ColdStartFailed(reason.to_string()),
            }
        }

        let now = self.clock.now();
        pool.enqueue(Request {
            function_id: function_id.to_string(),
            arrival_time: now,
            exec_time: exec_time.as_secs_f64(),
        })
        .await;
        self.stats.record_queued(function_id).await;
        info!(limit = pool.limit, "at limit, request queued");
        InvokeOutcome::Queued
    }

    async fn cold_start(
        &self,
        pool: &Arc<FunctionPool>,
        function_id: &str,
    ) -> Result<Container, SchedulerError> {
        let launch = self.runtime.launch(&self.settings.worker_image).await;
        let (id, endpoint) = match launch {
            Ok(pair) => pair,
            Err(e) => {
                pool.abort_cold_start().await;
                return Err(SchedulerError::Runtime(e));
            }
        };

        if let Err(e) = self
            .wait_until_healthy(&endpoint, self.settings.health_probe_timeout)
            .await
        {
            warn!(container_id = %id, error = %e, "health probe failed, tearing down");
            pool.abort_cold_start().await;
            let _ = self.runtime.stop(&id).await;
            return Err(e);
        }

        let container = Container::new_executing(id, function_id.to_string(), endpoint);
        pool.complete_cold_start(container.clone()).await;
        Ok(container)
    }

    async fn wait_until_healthy(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<(), SchedulerError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.runtime.probe(endpoint).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SchedulerError::HealthProbeTimeout {
                    endpoint: endpoint.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    async fn execute_on(
        &self,
        pool: Arc<FunctionPool>,
        container: Container,
        exec_time: Duration,
    ) -> InvokeOutcome {
        let start = Instant::now();
        match self.runtime.invoke(&container.endpoint, exec_time).await {
            Ok(_result) => {
                let elapsed = start.elapsed();
                let runtime = self.runtime.clone();
                let clock = self.clock.clone();
                let stats = self.stats.clone();
                let function_id = container.function_id.clone();
                let container_id = container.id.clone();
                let endpoint = container.endpoint.clone();
                tokio::spawn(async move {
                    drain_queue(pool, runtime, clock, stats, function_id, container_id, endpoint)
                        .await;
                });
                InvokeOutcome::Executed {
                    container_id: container.id,
                    elapsed,
                }
            }
            Err(e) => {
                let now = self.clock.now();
                pool.mark_idle(&container.id, now).await;
                InvokeOutcome::InvocationFailed(e.to_string())
            }
        }
    }
}
