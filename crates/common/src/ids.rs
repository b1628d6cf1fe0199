//! Identifier generation for timers and output artifacts.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_TIMER_ID: AtomicU64 = AtomicU64::new(1);

/// Handle returned by timer registration, accepted by timer cancellation.
///
/// Ids are unique within the process, across real and simulated timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimerId(u64);

impl TimerId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(NEXT_TIMER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A random base name for artifacts when none was configured.
pub fn generate_file_name() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Zero-pad a part number to seven digits.
pub fn pad_part(part: u32) -> String {
    format!("{part:07}")
}
