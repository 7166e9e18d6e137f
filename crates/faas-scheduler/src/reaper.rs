//! Background expiration sweep (spec §4.5).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use faas_common::{Clock, Runtime};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::pool::FunctionPool;

/// Runs at a fixed cadence, sweeping every pool for idle containers past
/// `warm_time`. Never touches `Executing` containers. `Runtime::stop` is
/// called outside any pool lock (spec §5: no suspension point is held
/// inside a pool mutex).
pub struct Reaper<C: Clock, R: Runtime> {
    clock: Arc<C>,
    runtime: Arc<R>,
    warm_time: i64,
    sleep: Duration,
}

impl<C: Clock + 'static, R: Runtime + 'static> Reaper<C, R> {
    pub fn new(clock: Arc<C>, runtime: Arc<R>, warm_time: Duration, sleep: Duration) -> Self {
        Self {
            clock,
            runtime,
            warm_time: warm_time.as_secs() as i64,
            sleep,
        }
    }

    /// One sweep across all pools. Exposed separately from `run` so the
    /// simulation harness can drive ticks without a background task.
    pub async fn sweep(&self, pools: &Mutex<HashMap<String, Arc<FunctionPool>>>) {
        let now = self.clock.now();
        let snapshot: Vec<Arc<FunctionPool>> = pools.lock().await.values().cloned().collect();

        for pool in snapshot {
            let expired = pool.reap_expired(now, self.warm_time).await;
            for container in expired {
                if let Err(e) = self.runtime.stop(&container.id).await {
                    error!(container_id = %container.id, error = %e, "reaper stop failed, dropping anyway");
                } else {
                    debug!(container_id = %container.id, function_id = %pool.function_id, "reaper released expired container");
                }
            }
        }
    }

    /// Spawn the long-lived background task (production only; the
    /// simulation harness calls `sweep` directly on each tick instead).
    pub fn spawn(self: Arc<Self>, pools: Arc<Mutex<HashMap<String, Arc<FunctionPool>>>>) {
        tokio::spawn(async move {
            info!("reaper starting");
            loop {
                tokio::time::sleep(self.sleep).await;
                self.sweep(&pools).await;
            }
        });
    }
}
