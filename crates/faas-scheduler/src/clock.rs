//! `Clock` implementations (spec §2, component 1).

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use faas_common::Clock;

/// Real wall clock, seconds since the Unix epoch. Used by the production
/// `Scheduler`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before the Unix epoch")
            .as_secs() as i64
    }
}

/// Stepped integer clock driven by the simulation loop (spec §4.6).
///
/// `advance_to` is the only way the tick moves; nothing else in the
/// scheduler advances it, which is what makes simulation runs
/// reproducible.
#[derive(Debug, Default)]
pub struct SteppedClock {
    tick: AtomicI64,
}

impl SteppedClock {
    pub fn new(start: i64) -> Self {
        Self {
            tick: AtomicI64::new(start),
        }
    }

    pub fn advance_to(&self, tick: i64) {
        self.tick.store(tick, Ordering::SeqCst);
    }
}

impl Clock for SteppedClock {
    fn now(&self) -> i64 {
        self.tick.load(Ordering::SeqCst)
    }
}
