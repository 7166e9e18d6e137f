//! Deterministic discrete-event driver for comparing LCS against MRU
//! without containers or real I/O (spec §2 component 9, §4.6, §8).
//!
//! Reuses `FunctionPool` for the bounded-resource state machine and
//! `Strategy` for warm-container selection -- the same pieces production
//! uses. What it does *not* reuse is `Scheduler::invoke`'s execution step:
//! that step's notion of "done" is `Runtime::invoke` returning, and a
//! stepped clock that never actually runs anything has no such signal.
//! Instead each tick compares `Container::execution_end_time` against the
//! clock directly (see `FunctionPool::tick_transition`).

use std::collections::HashMap;
use std::sync::Arc;

use faas_common::{Container, Request, Strategy};
use tokio::sync::Mutex;

use crate::pool::FunctionPool;

/// Counts from one simulation run. `cold_starts + warm_starts ==
/// total_requests + (requests drained after queueing)`: a request that
/// queues is counted once as `requests_queued` at admission, and again
/// as a `warm_starts` when the drainer later hands it to the
/// already-warm container that freed up (spec §8 scenario 5), the same
/// accounting production's `Stats` uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimulationReport {
    pub total_requests: u64,
    pub cold_starts: u64,
    pub warm_starts: u64,
    pub requests_queued: u64,
}

/// Replays a request trace against one warm-selection `strategy` over
/// `[0, end_time)`, enforcing `limit` concurrent containers per function.
pub struct SimulationHarness {
    strategy: Strategy,
    warm_time: i64,
    limit: usize,
}

impl SimulationHarness {
    pub fn new(strategy: Strategy, warm_time: i64, limit: usize) -> Self {
        Self {
            strategy,
            warm_time,
            limit,
        }
    }

    /// Run the trace. `requests` need not arrive in order; they are
    /// sorted by `arrival_time` first, matching
    /// `original_source/lcs_sim.py`'s use of a time-sorted event list.
    pub async fn run(&self, requests: &[Request], end_time: i64) -> SimulationReport {
        let pools: Mutex<HashMap<String, Arc<FunctionPool>>> = Mutex::new(HashMap::new());
        let mut sorted = requests.to_vec();
        sorted.sort_by_key(|r| r.arrival_time);

        let mut report = SimulationReport::default();
        let mut next_container_id: u64 = 0;
        let mut cursor = 0usize;

        for t in 0..end_time {
            let snapshot: Vec<Arc<FunctionPool>> = pools.lock().await.values().cloned().collect();
            for pool in snapshot {
                // Released containers need no further bookkeeping here;
                // unlike the reaper, nothing needs to `Runtime::stop` them.
                let outcome = pool.tick_transition(t, self.warm_time).await;
                report.warm_starts += outcome.drained;
            }

            while cursor < sorted.len() && sorted[cursor].arrival_time == t {
                let request = sorted[cursor].clone();
                cursor += 1;
                report.total_requests += 1;

                let pool = {
                    let mut pools = pools.lock().await;
                    pools
                        .entry(request.function_id.clone())
                        .or_insert_with(|| {
                            Arc::new(FunctionPool::new(request.function_id.clone(), self.limit))
                        })
                        .clone()
                };

                let end_tick = t + request.exec_time.round() as i64;

                if pool
                    .try_warm_reuse(self.strategy, Some(end_tick))
                    .await
                    .is_some()
                {
                    report.warm_starts += 1;
                    continue;
                }

                if pool.try_reserve_cold_start().await {
                    next_container_id += 1;
                    let mut container = Container::new_executing(
                        format!("sim-{next_container_id}"),
                        request.function_id.clone(),
                        String::new(),
                    );
                    container.execution_end_time = Some(end_tick);
                    pool.complete_cold_start(container).await;
                    report.cold_starts += 1;
                    continue;
                }

                pool.enqueue(request).await;
                report.requests_queued += 1;
            }
        }

        report
    }
}
