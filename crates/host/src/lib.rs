//! Raytrack Host
//!
//! The host is the single cooperative execution context that animation code
//! runs in. Everything that asks "what time is it?" or "call me later" goes
//! through a [`Host`] handle, which forwards to whichever [`TimeSource`] is
//! currently installed.
//!
//! ```text
//! animation code ──► Host ──► installed TimeSource
//!                               │
//!                   ┌───────────┴────────────┐
//!                   ▼                        ▼
//!            RealTimeSource         simulated source
//!          (tokio timers,         (installed by a capture
//!           wall clock)            session via TimeSourceOverride)
//! ```

pub mod host;
pub mod media;
pub mod real;
pub mod source;
pub mod time_override;

pub use host::{Host, HostRuntime, UnhandledErrors};
pub use media::{MediaSource, Surface};
pub use real::RealTimeSource;
pub use source::{sanitize_delay, Callback, CallbackResult, FrameCallback, TimeSource};
pub use time_override::TimeSourceOverride;
