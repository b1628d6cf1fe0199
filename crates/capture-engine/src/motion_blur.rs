//! Sub-frame accumulation for motion blur.

use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_host::Surface;

/// Sums the colour channels of successive sub-frames and averages them into
/// one output frame.
///
/// Alpha is not accumulated; the blended frame keeps the alpha of the most
/// recent sample.
pub struct MotionBlurAccumulator {
    samples_per_frame: u32,
    sums: Vec<u32>,
    blended: Surface,
    sub_frame_count: u32,
}

impl MotionBlurAccumulator {
    pub fn new(samples_per_frame: u32) -> Self {
        Self {
            samples_per_frame: samples_per_frame.max(1),
            sums: Vec::new(),
            blended: Surface::new(0, 0),
            sub_frame_count: 0,
        }
    }

    /// Samples added since the last flush.
    pub fn sub_frame_count(&self) -> u32 {
        self.sub_frame_count
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.blended.dimensions()
    }

    /// Resize to `width`x`height`, discarding anything accumulated.
    fn reset(&mut self, width: u32, height: u32) -> RaytrackResult<()> {
        let len = width as usize * height as usize * 4;
        let mut sums = Vec::new();
        sums.try_reserve_exact(len).map_err(|e| {
            RaytrackError::resource_init(format!(
                "Cannot allocate {width}x{height} blend buffer: {e}"
            ))
        })?;
        sums.resize(len, 0);
        self.sums = sums;
        self.blended = Surface::new(width, height);
        tracing::debug!(width, height, "Motion blur buffer resized");
        Ok(())
    }

    /// Add one sub-frame sample.
    pub fn accumulate(&mut self, surface: &Surface) -> RaytrackResult<()> {
        if surface.dimensions() != self.blended.dimensions() {
            let (width, height) = surface.dimensions();
            self.reset(width, height)?;
        }

        self.blended.copy_from_slice(surface.as_raw());
        for (sum, value) in self.sums.chunks_exact_mut(4).zip(surface.as_raw().chunks_exact(4)) {
            sum[0] += u32::from(value[0]);
            sum[1] += u32::from(value[1]);
            sum[2] += u32::from(value[2]);
        }
        self.sub_frame_count += 1;
        Ok(())
    }

    /// Average the accumulated samples into the blended frame and start over.
    pub fn flush(&mut self) -> &Surface {
        let n = self.samples_per_frame;
        for (sum, pixel) in self.sums.chunks_exact_mut(4).zip(self.blended.chunks_exact_mut(4)) {
            for channel in 0..3 {
                pixel[channel] = average_half_even(sum[channel], n);
                sum[channel] = 0;
            }
        }
        self.sub_frame_count = 0;
        &self.blended
    }
}

/// `sum / n` rounded to nearest, ties to even, clamped to a channel value.
fn average_half_even(sum: u32, n: u32) -> u8 {
    let (quotient, remainder) = (sum / n, sum % n);
    let rounded = match (2 * remainder).cmp(&n) {
        std::cmp::Ordering::Less => quotient,
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal => quotient + (quotient & 1),
    };
    rounded.min(255) as u8
}
