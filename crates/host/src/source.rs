//! The table of time primitives a host exposes.

use std::rc::Rc;

use raytrack_common::TimerId;

/// Outcome of a host callback. Errors go to the host's unhandled-error channel.
pub type CallbackResult = anyhow::Result<()>;

/// Deferred or periodic callback.
pub type Callback = Rc<dyn Fn() -> CallbackResult>;

/// Animation-frame callback, given a millisecond timestamp.
pub type FrameCallback = Rc<dyn Fn(f64) -> CallbackResult>;

/// Clock and scheduling primitives.
///
/// A capture session swaps the host's implementation of this trait for one
/// backed by simulated time, so animation code written against it cannot tell
/// the difference.
pub trait TimeSource {
    /// Wall-clock milliseconds since the Unix epoch.
    fn now_ms(&self) -> f64;

    /// Monotonic high-resolution milliseconds.
    fn high_res_now_ms(&self) -> f64;

    /// Run `callback` once after `delay_ms`.
    fn set_timeout(&self, callback: Callback, delay_ms: f64) -> TimerId;

    /// Cancel a pending one-shot timer. Unknown ids are ignored.
    fn clear_timeout(&self, id: TimerId);

    /// Run `callback` every `period_ms`.
    fn set_interval(&self, callback: Callback, period_ms: f64) -> TimerId;

    /// Cancel a periodic timer. Unknown ids are ignored.
    fn clear_interval(&self, id: TimerId);

    /// Run `callback` before the next frame is produced.
    fn request_animation_frame(&self, callback: FrameCallback);
}

/// Clamp non-finite and negative delays to zero.
pub fn sanitize_delay(delay_ms: f64) -> f64 {
    if delay_ms.is_finite() && delay_ms > 0.0 {
        delay_ms
    } else {
        0.0
    }
}
