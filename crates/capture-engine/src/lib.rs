//! Raytrack Capture Engine
//!
//! Records time-driven content frame by frame, with every frame landing on an
//! exact, reproducible instant of simulated time no matter how long rendering
//! or encoding takes in real time.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    CaptureSession                     │
//! │                                                       │
//! │  capture(surface) ──► MotionBlurAccumulator ──┐       │
//! │         │               (blur only)           ▼       │
//! │         └───────────────────────────────────► Encoder │
//! │                                                 │     │
//! │                                   step complete │     │
//! │                                                 ▼     │
//! │  FrameScheduler ◄──── real set_timeout(0) ◄─────┘     │
//! │     │  advance VirtualTime, sync media, check limits  │
//! │     ▼                                                 │
//! │  due timers + frame callbacks ──► real set_timeout(0) │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! While a session is capturing, the host's clocks and timers are answered by
//! [`VirtualTime`], installed through a scoped
//! [`TimeSourceOverride`](raytrack_host::TimeSourceOverride).

pub mod motion_blur;
pub mod scheduler;
pub mod session;
pub mod timers;
pub mod virtual_time;

pub use motion_blur::MotionBlurAccumulator;
pub use scheduler::{FrameScheduler, FrameTimingHistory, TimeUpdate, TIMING_HISTORY_CAPACITY};
pub use session::{CaptureOptions, CaptureSession, SessionState};
pub use timers::{ScheduledCallback, TimerKind, TimerRegistry};
pub use virtual_time::VirtualTime;
