//! Contracts for things the host renders or plays.

/// The drawable surface a caller renders into: 8-bit RGBA, row-major.
pub type Surface = image::RgbaImage;

/// A playable media element whose position can be set to an arbitrary time,
/// so audio or video can be kept in step with simulated time.
pub trait MediaSource {
    fn is_paused(&self) -> bool;

    fn pause(&self);

    /// Seek to `seconds` from the start of the media.
    fn set_current_time(&self, seconds: f64);

    fn current_time(&self) -> f64;
}
