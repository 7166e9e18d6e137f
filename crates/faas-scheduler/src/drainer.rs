//! Post-execution queue drain (spec §4.4).
//!
//! Runs after every successful invocation on its own background task. The
//! source (`original_source/scheduler.py`'s `process_queued_request`)
//! recurses; this is turned into an iterative loop so a container under
//! sustained load on one function can't grow an unbounded call stack
//! (§9).

use std::sync::Arc;
use std::time::Duration;

use faas_common::{Clock, Runtime};
use tracing::{info, warn};

use crate::pool::FunctionPool;
use crate::stats::Stats;

/// Drains `pool`'s FIFO queue onto `container_id`/`endpoint`, which stays
/// `Executing` the whole time — a drained request always lands on a
/// container already warm for its function (affinity, spec §4.4). Each
/// request the drainer hands to the container is a warm start: it runs
/// on a container that was already up, just as a fresh warm-reuse pick
/// from the idle set would have (spec §8 scenario 5).
pub async fn drain_queue<C: Clock, R: Runtime>(
    pool: Arc<FunctionPool>,
    runtime: Arc<R>,
    clock: Arc<C>,
    stats: Arc<Stats>,
    function_id: String,
    container_id: String,
    endpoint: String,
) {
    loop {
        let Some(request) = pool.dequeue().await else {
            let now = clock.now();
            pool.mark_idle(&container_id, now).await;
            info!(container_id = %container_id, "queue empty, container idle");
            return;
        };

        let exec_time = Duration::from_secs_f64(request.exec_time.max(0.0));
        if let Err(e) = runtime.invoke(&endpoint, exec_time).await {
            warn!(container_id = %container_id, error = %e, "queued invocation failed");
            let now = clock.now();
            pool.mark_idle(&container_id, now).await;
            return;
        }
        stats.record_warm_start(&function_id).await;
        // Keep draining; the container remains `Executing` until the
        // queue is empty.
    }
}
