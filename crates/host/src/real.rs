//! Real-time implementation of the host primitives, backed by tokio.
//!
//! Timers are local tasks on the host's `LocalSet`, so every method that
//! schedules work must be called from inside the host runtime.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use raytrack_common::{wall_clock_ms, TimerId};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;

use crate::host::UnhandledErrors;
use crate::source::{sanitize_delay, Callback, FrameCallback, TimeSource};

/// Real display cadence used for animation-frame requests.
pub const REAL_FRAME_INTERVAL_MS: f64 = 1000.0 / 60.0;

/// Shortest real interval period; tokio intervals cannot tick at zero.
const MIN_INTERVAL_MS: f64 = 1.0;

pub struct RealTimeSource {
    epoch: Instant,
    pending: Rc<RefCell<HashMap<TimerId, AbortHandle>>>,
    errors: UnhandledErrors,
}

impl RealTimeSource {
    pub fn new(errors: UnhandledErrors) -> Self {
        Self {
            epoch: Instant::now(),
            pending: Rc::new(RefCell::new(HashMap::new())),
            errors,
        }
    }

    fn cancel(&self, id: TimerId) {
        if let Some(handle) = self.pending.borrow_mut().remove(&id) {
            handle.abort();
        }
    }
}

impl TimeSource for RealTimeSource {
    fn now_ms(&self) -> f64 {
        wall_clock_ms()
    }

    fn high_res_now_ms(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1_000.0
    }

    fn set_timeout(&self, callback: Callback, delay_ms: f64) -> TimerId {
        let id = TimerId::next();
        let delay = sanitize_delay(delay_ms);
        let pending = Rc::clone(&self.pending);
        let errors = self.errors.clone();

        let handle = tokio::task::spawn_local(async move {
            if delay > 0.0 {
                tokio::time::sleep(Duration::from_secs_f64(delay / 1_000.0)).await;
            }
            pending.borrow_mut().remove(&id);
            errors.dispatch(callback());
        });
        self.pending.borrow_mut().insert(id, handle.abort_handle());
        id
    }

    fn clear_timeout(&self, id: TimerId) {
        self.cancel(id);
    }

    fn set_interval(&self, callback: Callback, period_ms: f64) -> TimerId {
        let id = TimerId::next();
        let period_ms = sanitize_delay(period_ms).max(MIN_INTERVAL_MS);
        let period = Duration::from_secs_f64(period_ms / 1_000.0);
        let errors = self.errors.clone();

        let handle = tokio::task::spawn_local(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                errors.dispatch(callback());
            }
        });
        self.pending.borrow_mut().insert(id, handle.abort_handle());
        id
    }

    fn clear_interval(&self, id: TimerId) {
        self.cancel(id);
    }

    fn request_animation_frame(&self, callback: FrameCallback) {
        let epoch = self.epoch;
        let errors = self.errors.clone();
        tokio::task::spawn_local(async move {
            tokio::time::sleep(Duration::from_secs_f64(REAL_FRAME_INTERVAL_MS / 1_000.0)).await;
            let timestamp = epoch.elapsed().as_secs_f64() * 1_000.0;
            errors.dispatch(callback(timestamp));
        });
    }
}
