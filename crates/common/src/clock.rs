//! Clock utilities for deterministic capture.
//!
//! A capture session replaces real time with a [`VirtualClock`]. The clock is
//! anchored to the real wall-clock and high-resolution readings taken when the
//! session begins and afterwards moves only when the frame scheduler says so.

use std::sync::OnceLock;

static PROCESS_START_WALL_MS: OnceLock<f64> = OnceLock::new();

/// Real wall-clock time in milliseconds since the Unix epoch.
pub fn wall_clock_ms() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000.0
}

/// Wall-clock time captured the first time any Raytrack component asked for it.
///
/// Animation-frame callbacks receive timestamps relative to this value rather
/// than to the start of the session that produced them.
pub fn process_start_wall_ms() -> f64 {
    *PROCESS_START_WALL_MS.get_or_init(wall_clock_ms)
}

/// Simulated wall-clock and high-resolution time for one capture session.
///
/// Both readings are non-decreasing for the lifetime of the session.
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    simulated_time_ms: f64,
    simulated_high_res_time_ms: f64,
    origin_wall_time_ms: f64,
    origin_high_res_ms: f64,
    start_offset_ms: f64,
}

impl VirtualClock {
    /// Anchor the clock to the given real readings and apply the start offset.
    pub fn begin(&mut self, start_offset_ms: f64, real_wall_ms: f64, real_high_res_ms: f64) {
        self.origin_wall_time_ms = real_wall_ms;
        self.origin_high_res_ms = real_high_res_ms;
        self.start_offset_ms = start_offset_ms;
        self.simulated_time_ms = real_wall_ms + start_offset_ms;
        self.simulated_high_res_time_ms = real_high_res_ms + start_offset_ms;
    }

    /// Move both simulated readings to `origin + start offset + elapsed_ms`.
    ///
    /// A target behind the current reading leaves the clock where it is.
    pub fn advance_to(&mut self, elapsed_ms: f64) {
        let wall = self.origin_wall_time_ms + self.start_offset_ms + elapsed_ms;
        let high_res = self.origin_high_res_ms + self.start_offset_ms + elapsed_ms;
        if wall >= self.simulated_time_ms {
            self.simulated_time_ms = wall;
        }
        if high_res >= self.simulated_high_res_time_ms {
            self.simulated_high_res_time_ms = high_res;
        }
    }

    /// Simulated wall-clock milliseconds.
    pub fn now(&self) -> f64 {
        self.simulated_time_ms
    }

    /// Simulated high-resolution milliseconds.
    pub fn high_res_now(&self) -> f64 {
        self.simulated_high_res_time_ms
    }

    pub fn origin_wall_time_ms(&self) -> f64 {
        self.origin_wall_time_ms
    }

    pub fn origin_high_res_ms(&self) -> f64 {
        self.origin_high_res_ms
    }

    /// Simulated milliseconds elapsed since the session began, offset excluded.
    pub fn elapsed_ms(&self) -> f64 {
        self.simulated_time_ms - self.origin_wall_time_ms - self.start_offset_ms
    }
}

/// Format elapsed seconds as `HH:MM:SS`, wrapping at 24 hours.
pub fn format_elapsed(seconds: f64) -> String {
    let whole = if seconds.is_finite() && seconds > 0.0 {
        (seconds.floor() as u64 % 86_400) as u32
    } else {
        0
    };
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(whole, 0)
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "00:00:00".to_string())
}
