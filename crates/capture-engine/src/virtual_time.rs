//! Host time primitives answered from simulated time.
//!
//! Installed on the host for the duration of a capture. Nothing registered
//! here runs by itself: the frame scheduler advances the clock and collects
//! whatever became due.

use std::cell::RefCell;

use raytrack_common::{process_start_wall_ms, TimerId, VirtualClock};
use raytrack_host::{Callback, FrameCallback, TimeSource};

use crate::timers::{ScheduledCallback, TimerKind, TimerRegistry};

#[derive(Default)]
pub struct VirtualTime {
    clock: RefCell<VirtualClock>,
    timers: RefCell<TimerRegistry>,
    frame_callbacks: RefCell<Vec<FrameCallback>>,
    verbose: bool,
}

impl VirtualTime {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            ..Self::default()
        }
    }

    /// Anchor simulated time to the given real readings.
    pub fn begin(&self, start_offset_ms: f64, real_wall_ms: f64, real_high_res_ms: f64) {
        self.clock
            .borrow_mut()
            .begin(start_offset_ms, real_wall_ms, real_high_res_ms);
    }

    pub fn advance_to(&self, elapsed_ms: f64) {
        self.clock.borrow_mut().advance_to(elapsed_ms);
    }

    /// Snapshot of the clock.
    pub fn clock(&self) -> VirtualClock {
        self.clock.borrow().clone()
    }

    /// Remove and return the timers due at the current simulated time.
    pub fn take_due_timers(&self) -> Vec<ScheduledCallback> {
        let now = self.clock.borrow().now();
        self.timers.borrow_mut().due_at(now)
    }

    /// Take every pending animation-frame callback, leaving the list empty.
    pub fn take_frame_callbacks(&self) -> Vec<FrameCallback> {
        std::mem::take(&mut *self.frame_callbacks.borrow_mut())
    }

    /// Timestamp handed to animation-frame callbacks: simulated wall time
    /// relative to when the process started.
    pub fn frame_timestamp(&self) -> f64 {
        self.clock.borrow().now() - process_start_wall_ms()
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    pub fn pending_frame_callbacks(&self) -> usize {
        self.frame_callbacks.borrow().len()
    }

    fn schedule(&self, kind: TimerKind, callback: Callback, delay_ms: f64) -> TimerId {
        let now = self.clock.borrow().now();
        let id = self
            .timers
            .borrow_mut()
            .schedule(kind, callback, delay_ms, now);
        if self.verbose {
            tracing::debug!(%id, ?kind, delay_ms, "Simulated timer registered");
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        let removed = self.timers.borrow_mut().cancel(id);
        if removed && self.verbose {
            tracing::debug!(%id, "Simulated timer cleared");
        }
    }
}

impl TimeSource for VirtualTime {
    fn now_ms(&self) -> f64 {
        self.clock.borrow().now()
    }

    fn high_res_now_ms(&self) -> f64 {
        self.clock.borrow().high_res_now()
    }

    fn set_timeout(&self, callback: Callback, delay_ms: f64) -> TimerId {
        self.schedule(TimerKind::OneShot, callback, delay_ms)
    }

    fn clear_timeout(&self, id: TimerId) {
        self.cancel(id);
    }

    fn set_interval(&self, callback: Callback, period_ms: f64) -> TimerId {
        self.schedule(TimerKind::Periodic, callback, period_ms)
    }

    fn clear_interval(&self, id: TimerId) {
        self.cancel(id);
    }

    fn request_animation_frame(&self, callback: FrameCallback) {
        self.frame_callbacks.borrow_mut().push(callback);
    }
}
