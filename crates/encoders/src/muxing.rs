//! Container-muxing encoder with time-based auto-split.

use std::rc::Rc;

use raytrack_common::config::CaptureConfig;
use raytrack_common::error::RaytrackResult;
use raytrack_host::Surface;

use crate::artifact::{part_file_name, Artifact, ArtifactSink};
use crate::encoder::{OutputName, StepNotifier};

/// Assembles frames into a single container artifact.
pub trait ContainerWriter {
    fn add_frame(&mut self, frame: &Surface) -> RaytrackResult<()>;

    fn frame_count(&self) -> u64;

    /// Finish the container. Returns `None` when no frame was added.
    fn complete(&mut self) -> RaytrackResult<Option<Vec<u8>>>;
}

/// Creates a fresh writer; called on start and after every finished segment.
pub type WriterFactory = Box<dyn Fn() -> Box<dyn ContainerWriter>>;

pub struct MuxingEncoder {
    name: OutputName,
    fps: u32,
    auto_save_time: f64,
    writer: Box<dyn ContainerWriter>,
    new_writer: WriterFactory,
    frames: u64,
    part: u32,
    sink: Rc<dyn ArtifactSink>,
    notifier: Option<StepNotifier>,
}

impl MuxingEncoder {
    pub fn new(
        config: &CaptureConfig,
        extension: &'static str,
        mime_type: &'static str,
        new_writer: WriterFactory,
        sink: Rc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            name: OutputName::new(config, extension, mime_type),
            fps: config.fps.max(1),
            auto_save_time: config.auto_save_time,
            writer: new_writer(),
            new_writer,
            frames: 0,
            part: 1,
            sink,
            notifier: None,
        }
    }

    pub(crate) fn output_name(&self) -> &OutputName {
        &self.name
    }

    /// Frames buffered in the current segment.
    pub fn buffered_frames(&self) -> u64 {
        self.frames
    }

    /// Number of the part the next split will produce.
    pub fn part(&self) -> u32 {
        self.part
    }

    pub fn start(&mut self, notifier: StepNotifier) -> RaytrackResult<()> {
        self.notifier = Some(notifier);
        self.dispose();
        Ok(())
    }

    pub fn add_frame(&mut self, frame: &Surface) -> RaytrackResult<()> {
        self.writer.add_frame(frame)?;

        // The threshold is checked against the frames buffered before this
        // one, so a split part carries one frame past the threshold.
        if self.auto_save_time > 0.0 && self.frames as f64 / self.fps as f64 >= self.auto_save_time
        {
            self.split_part()?;
        } else {
            self.frames += 1;
        }

        if let Some(notifier) = &self.notifier {
            notifier.complete();
        }
        Ok(())
    }

    /// Finalize the buffered segment as the next numbered part and hand it to
    /// the sink.
    fn split_part(&mut self) -> RaytrackResult<()> {
        self.name.current = part_file_name(&self.name.base, self.part);
        if let Some(artifact) = self.save()? {
            let file_name = format!("{}{}", self.name.current, self.name.extension);
            self.sink.persist(&artifact, &file_name, self.name.mime_type)?;
            tracing::info!(
                part = self.part,
                frames = artifact.frames,
                file = %file_name,
                "Auto-saved output part"
            );
        }
        self.part += 1;
        self.name.current = part_file_name(&self.name.base, self.part);
        Ok(())
    }

    pub fn stop(&mut self) -> RaytrackResult<()> {
        Ok(())
    }

    pub fn save(&mut self) -> RaytrackResult<Option<Artifact>> {
        let frames = self.writer.frame_count();
        let bytes = self.writer.complete()?;
        self.dispose();
        Ok(bytes.map(|bytes| Artifact { bytes, frames }))
    }

    pub fn dispose(&mut self) {
        self.frames = 0;
        self.writer = (self.new_writer)();
    }
}
