//! End-to-end tests driving `Scheduler` through `StubRuntime`.

use std::sync::Arc;
use std::time::Duration;

use faas_scheduler::{InvokeOutcome, Reaper, Scheduler, SchedulerSettings, SteppedClock, Strategy, StubRuntime};

fn scheduler() -> (Arc<SteppedClock>, Scheduler<SteppedClock, StubRuntime>) {
    let clock = Arc::new(SteppedClock::new(0));
    let runtime = Arc::new(StubRuntime::new());
    let scheduler = Scheduler::new(clock.clone(), runtime, SchedulerSettings::default());
    (clock, scheduler)
}

#[tokio::test]
async fn first_request_cold_starts_then_a_quick_second_request_warms() {
    let (_clock, scheduler) = scheduler();

    let first = scheduler.invoke("f", Duration::from_millis(5)).await;
    assert!(matches!(first, InvokeOutcome::Executed { .. }));

    // Give the drainer spawned by `execute_on` a chance to mark the
    // container idle once its (empty) queue drains.
    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = scheduler.invoke("f", Duration::from_millis(5)).await;
    assert!(matches!(second, InvokeOutcome::Executed { .. }));

    let snapshot = scheduler.stats_snapshot().await;
    assert_eq!(snapshot.global.cold_starts, 1);
    assert_eq!(snapshot.global.warm_starts, 1);
}

#[tokio::test]
async fn requests_past_the_limit_queue_and_are_later_drained() {
    let clock = Arc::new(SteppedClock::new(0));
    let runtime = Arc::new(StubRuntime::new());
    let settings = SchedulerSettings {
        default_limit: 1,
        ..SchedulerSettings::default()
    };
    let scheduler = Scheduler::new(clock, runtime, settings);

    // First request occupies the only slot for a while.
    let exec = Duration::from_millis(80);
    let scheduler = Arc::new(scheduler);
    let s1 = scheduler.clone();
    let handle = tokio::spawn(async move { s1.invoke("f", exec).await });

    // Give the first call time to win the cold-start race.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let second = scheduler.invoke("f", Duration::from_millis(5)).await;
    assert_eq!(second, InvokeOutcome::Queued);

    let first = handle.await.unwrap();
    assert!(matches!(first, InvokeOutcome::Executed { .. }));

    // The drainer picks the queued request up once the first finishes,
    // which counts as a warm start (spec §8 scenario 5).
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = scheduler.stats_snapshot().await;
    assert_eq!(snapshot.global.requests_queued, 1);
    assert_eq!(snapshot.global.cold_starts, 1);
    assert_eq!(snapshot.global.warm_starts, 1);
}

#[tokio::test]
async fn reaper_releases_idle_containers_past_warm_time() {
    let clock = Arc::new(SteppedClock::new(0));
    let runtime = Arc::new(StubRuntime::new());
    let scheduler = Scheduler::new(clock.clone(), runtime.clone(), SchedulerSettings::default());

    scheduler.invoke("f", Duration::from_millis(1)).await;
    tokio::time::sleep(Duration::from_millis(20)).await; // let it go idle

    let reaper = Reaper::new(clock.clone(), runtime.clone(), Duration::from_secs(10), Duration::from_secs(1));
    clock.advance_to(5);
    reaper.sweep(&scheduler.pools_handle()).await;
    assert_eq!(runtime.live_count().await, 1); // not yet expired

    clock.advance_to(10);
    reaper.sweep(&scheduler.pools_handle()).await;
    assert_eq!(runtime.live_count().await, 0); // expired and stopped
}

#[tokio::test]
async fn set_strategy_changes_which_idle_container_is_reused() {
    let (_clock, scheduler) = scheduler();
    assert_eq!(scheduler.current_strategy().await, Strategy::Lcs);
    scheduler.set_strategy(Strategy::Mru).await;
    assert_eq!(scheduler.current_strategy().await, Strategy::Mru);
    scheduler.set_strategy(Strategy::Mru).await;
    assert_eq!(scheduler.current_strategy().await, Strategy::Mru);
}
