//! Deferred and periodic callbacks registered against simulated time.

use raytrack_common::TimerId;
use raytrack_host::{sanitize_delay, Callback};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    OneShot,
    Periodic,
}

/// A callback waiting for simulated time to reach its trigger.
#[derive(Clone)]
pub struct ScheduledCallback {
    pub id: TimerId,
    pub kind: TimerKind,
    pub callback: Callback,

    /// Delay for one-shots, period for periodic timers.
    pub delay_ms: f64,

    /// Absolute simulated time of the next firing.
    pub trigger_time_at_ms: f64,
}

impl std::fmt::Debug for ScheduledCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledCallback")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("delay_ms", &self.delay_ms)
            .field("trigger_time_at_ms", &self.trigger_time_at_ms)
            .finish_non_exhaustive()
    }
}

/// Timers keyed by absolute simulated trigger time.
///
/// One-shots and periodics are kept in separate lists, each in registration
/// order, so [`TimerRegistry::due_at`] can hand them out one-shots first.
#[derive(Default)]
pub struct TimerRegistry {
    one_shots: Vec<ScheduledCallback>,
    periodics: Vec<ScheduledCallback>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` to fire `delay_ms` after `now_ms`.
    pub fn schedule(
        &mut self,
        kind: TimerKind,
        callback: Callback,
        delay_ms: f64,
        now_ms: f64,
    ) -> TimerId {
        let delay_ms = sanitize_delay(delay_ms);
        let entry = ScheduledCallback {
            id: TimerId::next(),
            kind,
            callback,
            delay_ms,
            trigger_time_at_ms: now_ms + delay_ms,
        };
        let id = entry.id;
        match kind {
            TimerKind::OneShot => self.one_shots.push(entry),
            TimerKind::Periodic => self.periodics.push(entry),
        }
        id
    }

    /// Remove a pending timer. Returns whether anything was removed; unknown
    /// and already-fired ids are ignored.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.len();
        self.one_shots.retain(|t| t.id != id);
        self.periodics.retain(|t| t.id != id);
        self.len() != before
    }

    /// Everything due at `time_ms`: one-shots (removed) then periodics
    /// (rescheduled one period later), each group in registration order.
    pub fn due_at(&mut self, time_ms: f64) -> Vec<ScheduledCallback> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.one_shots)
            .into_iter()
            .partition(|t| t.trigger_time_at_ms <= time_ms);
        self.one_shots = pending;

        let mut fired = due;
        for timer in &mut self.periodics {
            if timer.trigger_time_at_ms <= time_ms {
                fired.push(timer.clone());
                timer.trigger_time_at_ms += timer.delay_ms;
            }
        }
        fired
    }

    /// Next trigger time of a pending timer.
    pub fn trigger_time_of(&self, id: TimerId) -> Option<f64> {
        self.one_shots
            .iter()
            .chain(&self.periodics)
            .find(|t| t.id == id)
            .map(|t| t.trigger_time_at_ms)
    }

    pub fn len(&self) -> usize {
        self.one_shots.len() + self.periodics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    fn noop() -> Callback {
        Rc::new(|| Ok(()))
    }

    #[test]
    fn test_one_shots_fire_once_in_registration_order() {
        let mut registry = TimerRegistry::new();
        let late = registry.schedule(TimerKind::OneShot, noop(), 50.0, 0.0);
        let first = registry.schedule(TimerKind::OneShot, noop(), 10.0, 0.0);
        let second = registry.schedule(TimerKind::OneShot, noop(), 20.0, 0.0);

        let due: Vec<_> = registry.due_at(20.0).iter().map(|t| t.id).collect();
        assert_eq!(due, vec![first, second]);
        assert!(registry.due_at(20.0).is_empty());
        assert_eq!(registry.trigger_time_of(late), Some(50.0));
    }

    #[test]
    fn test_one_shots_precede_periodics() {
        let mut registry = TimerRegistry::new();
        let periodic = registry.schedule(TimerKind::Periodic, noop(), 10.0, 0.0);
        let one_shot = registry.schedule(TimerKind::OneShot, noop(), 10.0, 0.0);

        let due = registry.due_at(10.0);
        assert_eq!(due.iter().map(|t| t.id).collect::<Vec<_>>(), vec![one_shot, periodic]);
        assert_eq!(due[1].kind, TimerKind::Periodic);
    }

    #[test]
    fn test_periodic_advances_by_its_own_period() {
        let mut registry = TimerRegistry::new();
        let id = registry.schedule(TimerKind::Periodic, noop(), 30.0, 100.0);

        // Frames land late; the trigger stays on the 30ms grid.
        assert_eq!(registry.due_at(133.0).len(), 1);
        assert_eq!(registry.trigger_time_of(id), Some(160.0));
        assert!(registry.due_at(150.0).is_empty());
        assert_eq!(registry.due_at(166.0).len(), 1);
        assert_eq!(registry.trigger_time_of(id), Some(190.0));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut registry = TimerRegistry::new();
        let keep = registry.schedule(TimerKind::OneShot, noop(), 5.0, 0.0);
        let dropped = registry.schedule(TimerKind::Periodic, noop(), 5.0, 0.0);

        assert!(registry.cancel(dropped));
        assert!(!registry.cancel(dropped));
        assert!(!registry.cancel(TimerId::next()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.due_at(5.0)[0].id, keep);
        assert!(!registry.cancel(keep));
    }

    #[test]
    fn test_invalid_delay_fires_immediately() {
        let mut registry = TimerRegistry::new();
        registry.schedule(TimerKind::OneShot, noop(), f64::NAN, 7.0);
        registry.schedule(TimerKind::OneShot, noop(), -3.0, 7.0);
        assert_eq!(registry.due_at(7.0).len(), 2);
    }
}
