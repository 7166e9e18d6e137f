//! Running counters, global and per-function (spec §2 component 8, §6).

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::Mutex;

/// One function's or the process-wide counters.
///
/// A request is counted once as `requests_received` on arrival, and
/// again under exactly one of `cold_starts`/`warm_starts`/
/// `requests_queued` depending on how it was admitted -- except a
/// queued request is counted a second time under `warm_starts` once the
/// drainer hands it to the container that freed up (spec §8 scenario
/// 5), since that is a genuine warm start, not a new arrival.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct Counters {
    pub requests_received: u64,
    pub requests_executed: u64,
    pub cold_starts: u64,
    pub warm_starts: u64,
    pub requests_queued: u64,
    pub limit_reached: u64,
}

/// Guards global and per-function `Counters` behind one mutex (spec §5:
/// "a separate mutex guards `Stats`").
#[derive(Default)]
pub struct Stats {
    inner: Mutex<StatsInner>,
}

#[derive(Default)]
struct StatsInner {
    global: Counters,
    per_function: HashMap<String, Counters>,
}

#[derive(Debug, Serialize)]
pub struct StatsSnapshot {
    pub global: Counters,
    pub per_function: HashMap<String, Counters>,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_received(&self, function_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.global.requests_received += 1;
        inner.function_mut(function_id).requests_received += 1;
    }

    pub async fn record_warm_start(&self, function_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.global.warm_starts += 1;
        inner.global.requests_executed += 1;
        let f = inner.function_mut(function_id);
        f.warm_starts += 1;
        f.requests_executed += 1;
    }

    pub async fn record_cold_start(&self, function_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.global.cold_starts += 1;
        inner.global.requests_executed += 1;
        let f = inner.function_mut(function_id);
        f.cold_starts += 1;
        f.requests_executed += 1;
    }

    pub async fn record_queued(&self, function_id: &str) {
        let mut inner = self.inner.lock().await;
        inner.global.requests_queued += 1;
        inner.global.limit_reached += 1;
        let f = inner.function_mut(function_id);
        f.requests_queued += 1;
        f.limit_reached += 1;
    }

    pub async fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().await;
        StatsSnapshot {
            global: inner.global,
            per_function: inner.per_function.clone(),
        }
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.lock().await;
        inner.global = Counters::default();
        inner.per_function.clear();
    }
}

impl StatsInner {
    fn function_mut(&mut self, function_id: &str) -> &mut Counters {
        self.per_function.entry(function_id.to_string()).or_default()
    }
}
