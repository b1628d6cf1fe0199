//! Animated PNG container writer.
//!
//! APNG needs the frame count in its header, so frames are buffered and the
//! whole file is written on `complete`.

use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_host::Surface;

use crate::muxing::{ContainerWriter, WriterFactory};

pub struct ApngWriter {
    fps: u16,
    frames: Vec<Surface>,
}

impl ApngWriter {
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.clamp(1, u16::MAX as u32) as u16,
            frames: Vec::new(),
        }
    }

    pub fn factory(fps: u32) -> WriterFactory {
        Box::new(move || Box::new(ApngWriter::new(fps)))
    }

    fn encode(&self) -> Result<Vec<u8>, png::EncodingError> {
        let (width, height) = self.frames[0].dimensions();
        let mut bytes = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut bytes, width, height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_animated(self.frames.len() as u32, 0)?;
            encoder.set_frame_delay(1, self.fps)?;

            let mut writer = encoder.write_header()?;
            for frame in &self.frames {
                writer.write_image_data(frame.as_raw())?;
            }
            writer.finish()?;
        }
        Ok(bytes)
    }
}

impl ContainerWriter for ApngWriter {
    fn add_frame(&mut self, frame: &Surface) -> RaytrackResult<()> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(RaytrackError::frame_encode("Cannot encode an empty surface"));
        }
        if let Some(first) = self.frames.first() {
            if first.dimensions() != frame.dimensions() {
                return Err(RaytrackError::frame_encode(format!(
                    "Frame size {:?} differs from animation size {:?}",
                    frame.dimensions(),
                    first.dimensions()
                )));
            }
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frames.len() as u64
    }

    fn complete(&mut self) -> RaytrackResult<Option<Vec<u8>>> {
        if self.frames.is_empty() {
            return Ok(None);
        }
        let bytes = self
            .encode()
            .map_err(|e| RaytrackError::frame_encode(format!("APNG encoding failed: {e}")))?;
        tracing::debug!(frames = self.frames.len(), bytes = bytes.len(), "APNG finalized");
        self.frames.clear();
        Ok(Some(bytes))
    }
}
