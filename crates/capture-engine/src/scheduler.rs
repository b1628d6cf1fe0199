//! Frame-step arithmetic, stop conditions and progress estimation.

use std::collections::VecDeque;

use raytrack_common::config::CaptureConfig;
use raytrack_common::format_elapsed;

/// Samples kept for the remaining-time estimate.
pub const TIMING_HISTORY_CAPACITY: usize = 120;

/// Ring buffer of real per-frame processing durations with a running sum.
#[derive(Debug, Clone)]
pub struct FrameTimingHistory {
    samples: VecDeque<f64>,
    sum: f64,
    capacity: usize,
}

impl FrameTimingHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity),
            sum: 0.0,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, duration_ms: f64) {
        if !duration_ms.is_finite() {
            return;
        }
        if self.samples.len() == self.capacity {
            if let Some(oldest) = self.samples.pop_front() {
                self.sum -= oldest;
            }
        }
        self.samples.push_back(duration_ms);
        self.sum += duration_ms;
    }

    /// Mean of the retained samples.
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            None
        } else {
            Some(self.sum / self.samples.len() as f64)
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Default for FrameTimingHistory {
    fn default() -> Self {
        Self::new(TIMING_HISTORY_CAPACITY)
    }
}

/// Progress report delivered once per frame step.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeUpdate {
    pub frame_count: u64,
    pub intermediate_frame_count: u32,

    /// Output duration so far as `HH:MM:SS`.
    pub formatted_elapsed_time: String,

    /// `None` when there is no limit to count down to or no timing data yet.
    pub estimated_seconds_remaining: Option<f64>,
}

/// Maps frame and sub-frame counts onto simulated time.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    fps: u32,
    step_ms: f64,
    blur_factor: u32,
    frame_limit: u64,
    time_limit: f64,
    history: FrameTimingHistory,
}

impl FrameScheduler {
    pub fn new(config: &CaptureConfig) -> Self {
        let fps = config.fps.max(1);
        Self {
            fps,
            step_ms: 1_000.0 / fps as f64,
            blur_factor: 2 * config.motion_blur_frames.max(1),
            frame_limit: config.frame_limit,
            time_limit: config.time_limit,
            history: FrameTimingHistory::default(),
        }
    }

    /// Simulated milliseconds per output frame.
    pub fn step_ms(&self) -> f64 {
        self.step_ms
    }

    /// Twice the configured sub-frame count.
    pub fn blur_factor(&self) -> u32 {
        self.blur_factor
    }

    /// Simulated time since capture start for the given progress.
    pub fn frame_offset_ms(&self, frame_count: u64, sub_frame_count: u32) -> f64 {
        (frame_count as f64 + sub_frame_count as f64 / self.blur_factor as f64) * self.step_ms
    }

    /// Whether enough sub-frames were accumulated to emit a blended frame.
    pub fn flush_due(&self, sub_frame_count: u32) -> bool {
        sub_frame_count as f64 >= 0.5 * self.blur_factor as f64
    }

    /// Output seconds represented by `frame_count` frames.
    pub fn output_seconds(&self, frame_count: u64) -> f64 {
        frame_count as f64 / self.fps as f64
    }

    pub fn limit_reached(&self, frame_count: u64) -> bool {
        (self.frame_limit > 0 && frame_count >= self.frame_limit)
            || (self.time_limit > 0.0 && self.output_seconds(frame_count) >= self.time_limit)
    }

    pub fn record_processing_time(&mut self, duration_ms: f64) {
        self.history.push(duration_ms);
    }

    pub fn history(&self) -> &FrameTimingHistory {
        &self.history
    }

    /// Real seconds the remaining frames should take at the observed pace.
    pub fn estimate_seconds_remaining(&self, frame_count: u64) -> Option<f64> {
        let target = if self.time_limit > 0.0 {
            self.time_limit * self.fps as f64
        } else if self.frame_limit > 0 {
            self.frame_limit as f64
        } else {
            return None;
        };
        let remaining = (target - frame_count as f64).max(0.0);
        let average_ms = self.history.average()?;
        Some(remaining * average_ms / 1_000.0)
    }

    pub fn time_update(&self, frame_count: u64, sub_frame_count: u32) -> TimeUpdate {
        TimeUpdate {
            frame_count,
            intermediate_frame_count: sub_frame_count,
            formatted_elapsed_time: format_elapsed(self.output_seconds(frame_count)),
            estimated_seconds_remaining: self.estimate_seconds_remaining(frame_count),
        }
    }
}
