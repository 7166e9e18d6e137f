//! `FunctionPool`: per-function container set, overflow queue, and
//! concurrency limit (spec §3, §4.2).

use std::collections::{HashMap, VecDeque};

use faas_common::{Container, ContainerState, Request, Strategy, NEVER_IDLE};
use tokio::sync::Mutex;

/// All mutable state for one function lives behind this single mutex
/// (spec §3: "a single mutex" guards containers + queue + limit
/// bookkeeping, including the "starting" counter for in-flight cold
/// starts described in §4.3).
pub struct FunctionPool {
    pub function_id: String,
    pub limit: usize,
    inner: Mutex<PoolInner>,
}

/// Result of one `tick_transition` sweep: containers released this tick,
/// and how many queued requests were handed to a finishing container
/// (each of those is a warm start).
pub struct TickOutcome {
    pub expired: Vec<Container>,
    pub drained: u64,
}

struct PoolInner {
    containers: HashMap<String, Container>,
    queue: VecDeque<Request>,
    /// Reserved slots for cold starts in flight: `Runtime::launch` is slow
    /// and runs with the lock released, so admission checks
    /// `count + starting <= limit` rather than just `count <= limit`
    /// (resolved race window, spec §4.3 / §9).
    starting: usize,
}

impl FunctionPool {
    pub fn new(function_id: impl Into<String>, limit: usize) -> Self {
        Self {
            function_id: function_id.into(),
            limit,
            inner: Mutex::new(PoolInner {
                containers: HashMap::new(),
                queue: VecDeque::new(),
                starting: 0,
            }),
        }
    }

    /// Total containers currently tracked (busy + idle), not counting
    /// reserved-but-not-yet-launched cold starts.
    pub async fn count(&self) -> usize {
        self.inner.lock().await.containers.len()
    }

    /// Find the best idle container under `strategy` and immediately
    /// transition it to `Executing`, clearing `last_used_time` (spec
    /// §4.1/§4.2). Ties broken by container id for determinism.
    ///
    /// `execution_end_time` is `None` in production, where completion is
    /// signalled by `Runtime::invoke` returning. The simulation harness
    /// passes `Some(now + exec_ticks)` instead, since its "runtime" never
    /// actually runs anything for `tick_transition` to later compare
    /// against the clock.
    pub async fn try_warm_reuse(
        &self,
        strategy: Strategy,
        execution_end_time: Option<i64>,
    ) -> Option<Container> {
        let mut inner = self.inner.lock().await;
        let chosen_id = {
            let mut idle = inner
                .containers
                .values()
                .filter(|c| c.state == ContainerState::Idle);

            let best = idle.next()?;
            let mut best = best;
            for candidate in idle {
                let better = match strategy {
                    Strategy::Lcs => {
                        candidate.last_used_time < best.last_used_time
                            || (candidate.last_used_time == best.last_used_time
                                && candidate.id < best.id)
                    }
                    Strategy::Mru => {
                        candidate.last_used_time > best.last_used_time
                            || (candidate.last_used_time == best.last_used_time
                                && candidate.id < best.id)
                    }
                };
                if better {
                    best = candidate;
                }
            }
            best.id.clone()
        };

        let container = inner.containers.get_mut(&chosen_id)?;
        container.state = ContainerState::Executing;
        container.last_used_time = NEVER_IDLE;
        container.execution_end_time = execution_end_time;
        Some(container.clone())
    }

    /// Attempt to reserve a slot for a cold start. Must be paired with
    /// exactly one of `complete_cold_start` or `abort_cold_start`.
    pub async fn try_reserve_cold_start(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.containers.len() + inner.starting < self.limit {
            inner.starting += 1;
            true
        } else {
            false
        }
    }

    /// `Runtime::launch` succeeded: release the reservation and insert the
    /// real container record.
    pub async fn complete_cold_start(&self, container: Container) {
        let mut inner = self.inner.lock().await;
        inner.starting = inner.starting.saturating_sub(1);
        inner.containers.insert(container.id.clone(), container);
    }

    /// `Runtime::launch` failed: release the reservation without
    /// inserting anything.
    pub async fn abort_cold_start(&self) {
        let mut inner = self.inner.lock().await;
        inner.starting = inner.starting.saturating_sub(1);
    }

    /// Append a request to the FIFO overflow queue (spec §4.2 `enqueue`).
    pub async fn enqueue(&self, request: Request) {
        self.inner.lock().await.queue.push_back(request);
    }

    /// Pop the oldest queued request, if any (spec §4.2 `dequeue`).
    pub async fn dequeue(&self) -> Option<Request> {
        self.inner.lock().await.queue.pop_front()
    }

    pub async fn queue_len(&self) -> usize {
        self.inner.lock().await.queue.len()
    }

    /// Transition a container to `Idle`, recording `last_used_time` (spec
    /// §4.1, §4.4: used both after a successful drain-to-empty and after
    /// an invocation failure, which marks the container reclaimable by
    /// the reaper rather than trusting it further).
    pub async fn mark_idle(&self, container_id: &str, now: i64) {
        let mut inner = self.inner.lock().await;
        if let Some(c) = inner.containers.get_mut(container_id) {
            c.state = ContainerState::Idle;
            c.last_used_time = now;
        }
    }

    /// Snapshot-and-remove containers whose idle deadline has passed
    /// (spec §4.5). The caller stops each returned container's Runtime
    /// instance *outside* this pool's lock.
    pub async fn reap_expired(&self, now: i64, warm_time: i64) -> Vec<Container> {
        let mut inner = self.inner.lock().await;
        let expired_ids: Vec<String> = inner
            .containers
            .values()
            .filter(|c| c.state == ContainerState::Idle && now >= c.last_used_time + warm_time)
            .map(|c| c.id.clone())
            .collect();

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            if let Some(mut c) = inner.containers.remove(&id) {
                c.state = ContainerState::Released;
                expired.push(c);
            }
        }
        expired
    }

    /// One discrete-event tick for the simulation harness (spec §4.6).
    /// Combines two of the three steps `lcs_sim.py`'s `Container.update`
    /// performs per container into a single lock acquisition: an
    /// `Executing` container whose `execution_end_time` has arrived either
    /// picks up the next queued request (staying `Executing`, affinity
    /// preserved -- this is a warm start, same as a fresh warm-reuse pick
    /// from the idle set, spec §8 scenario 5) or goes `Idle`; an `Idle`
    /// container past its deadline is released. Returns the containers
    /// released this tick, mirroring `reap_expired`'s contract, plus how
    /// many queued requests were handed to a finishing container.
    pub async fn tick_transition(&self, now: i64, warm_time: i64) -> TickOutcome {
        let mut inner = self.inner.lock().await;

        let finishing: Vec<String> = inner
            .containers
            .values()
            .filter(|c| c.state == ContainerState::Executing && c.execution_end_time == Some(now))
            .map(|c| c.id.clone())
            .collect();

        let mut drained = 0u64;
        for id in finishing {
            let next_request = inner.queue.pop_front();
            let container = inner.containers.get_mut(&id).expect("id came from this map");
            match next_request {
                Some(request) => {
                    container.execution_end_time = Some(now + request.exec_time.round() as i64);
                    drained += 1;
                }
                None => {
                    container.state = ContainerState::Idle;
                    container.last_used_time = now;
                    container.execution_end_time = None;
                }
            }
        }

        let expired_ids: Vec<String> = inner
            .containers
            .values()
            .filter(|c| c.state == ContainerState::Idle && now >= c.last_used_time + warm_time)
            .map(|c| c.id.clone())
            .collect();

        let mut expired = Vec::with_capacity(expired_ids.len());
        for id in expired_ids {
            if let Some(mut c) = inner.containers.remove(&id) {
                c.state = ContainerState::Released;
                expired.push(c);
            }
        }
        TickOutcome { expired, drained }
    }

    /// Snapshot of every tracked container, for the simulation harness's
    /// end-of-run report.
    pub async fn snapshot_containers(&self) -> Vec<Container> {
        self.inner.lock().await.containers.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle(id: &str, last_used: i64) -> Container {
        Container {
            id: id.to_string(),
            function_id: "f".to_string(),
            endpoint: format!("ep-{id}"),
            state: ContainerState::Idle,
            execution_end_time: None,
            last_used_time: last_used,
        }
    }

    #[tokio::test]
    async fn lcs_picks_the_oldest_idle_container() {
        let pool = FunctionPool::new("f", 10);
        pool.complete_cold_start(idle("c1", 3)).await;
        pool.complete_cold_start(idle("c2", 4)).await;

        let picked = pool.try_warm_reuse(Strategy::Lcs, None).await.unwrap();
        assert_eq!(picked.id, "c1");
        assert_eq!(picked.state, ContainerState::Executing);
        assert_eq!(picked.last_used_time, NEVER_IDLE);
    }

    #[tokio::test]
    async fn mru_picks_the_newest_idle_container() {
        let pool = FunctionPool::new("f", 10);
        pool.complete_cold_start(idle("c1", 3)).await;
        pool.complete_cold_start(idle("c2", 4)).await;

        let picked = pool.try_warm_reuse(Strategy::Mru, None).await.unwrap();
        assert_eq!(picked.id, "c2");
    }

    #[tokio::test]
    async fn ties_break_by_container_id() {
        let pool = FunctionPool::new("f", 10);
        pool.complete_cold_start(idle("c2", 5)).await;
        pool.complete_cold_start(idle("c1", 5)).await;

        let picked = pool.try_warm_reuse(Strategy::Lcs, None).await.unwrap();
        assert_eq!(picked.id, "c1");
    }

    #[tokio::test]
    async fn cold_start_admission_respects_limit_including_in_flight_starts() {
        let pool = FunctionPool::new("f", 1);
        assert!(pool.try_reserve_cold_start().await);
        // A second concurrent cold start must not be admitted while the
        // first is still "starting" (count=0, starting=1, limit=1).
        assert!(!pool.try_reserve_cold_start().await);

        pool.complete_cold_start(Container::new_executing(
            "c1".to_string(),
            "f".to_string(),
            "ep".to_string(),
        ))
        .await;
        assert_eq!(pool.count().await, 1);
        assert!(!pool.try_reserve_cold_start().await);
    }

    #[tokio::test]
    async fn reap_expired_uses_inclusive_boundary() {
        let pool = FunctionPool::new("f", 10);
        pool.complete_cold_start(idle("c1", 0)).await;

        assert!(pool.reap_expired(9, 10).await.is_empty());
        let expired = pool.reap_expired(10, 10).await;
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "c1");
        assert_eq!(expired[0].state, ContainerState::Released);
        assert_eq!(pool.count().await, 0);
    }

    #[tokio::test]
    async fn reap_never_touches_executing_containers() {
        let pool = FunctionPool::new("f", 10);
        pool.complete_cold_start(Container::new_executing(
            "c1".to_string(),
            "f".to_string(),
            "ep".to_string(),
        ))
        .await;
        let expired = pool.reap_expired(1_000_000, 10).await;
        assert!(expired.is_empty());
        assert_eq!(pool.count().await, 1);
    }

    #[tokio::test]
    async fn tick_transition_hands_a_finishing_container_the_next_queued_request() {
        let pool = FunctionPool::new("f", 1);
        let mut c1 = Container::new_executing("c1".to_string(), "f".to_string(), "ep".to_string());
        c1.execution_end_time = Some(2);
        pool.complete_cold_start(c1).await;
        pool.enqueue(Request {
            function_id: "f".to_string(),
            arrival_time: 1,
            exec_time: 2.0,
        })
        .await;

        let outcome = pool.tick_transition(2, 10).await;
        assert!(outcome.expired.is_empty());
        assert_eq!(outcome.drained, 1);
        let snapshot = pool.snapshot_containers().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].state, ContainerState::Executing);
        assert_eq!(snapshot[0].execution_end_time, Some(4));
        assert_eq!(pool.queue_len().await, 0);
    }

    #[tokio::test]
    async fn tick_transition_goes_idle_when_queue_is_empty() {
        let pool = FunctionPool::new("f", 1);
        let mut c1 = Container::new_executing("c1".to_string(), "f".to_string(), "ep".to_string());
        c1.execution_end_time = Some(2);
        pool.complete_cold_start(c1).await;

        let outcome = pool.tick_transition(2, 10).await;
        assert!(outcome.expired.is_empty());
        assert_eq!(outcome.drained, 0);
        let snapshot = pool.snapshot_containers().await;
        assert_eq!(snapshot[0].state, ContainerState::Idle);
        assert_eq!(snapshot[0].last_used_time, 2);
    }

    #[tokio::test]
    async fn tick_transition_releases_idle_containers_past_deadline_same_tick() {
        let pool = FunctionPool::new("f", 10);
        pool.complete_cold_start(idle("c1", 0)).await;

        let outcome = pool.tick_transition(10, 10).await;
        assert_eq!(outcome.expired.len(), 1);
        assert_eq!(outcome.expired[0].id, "c1");
        assert_eq!(pool.count().await, 0);
    }
}
