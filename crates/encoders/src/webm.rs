//! WebM (VP8) container writer backed by a GStreamer pipeline.
//!
//! Frames are pushed into an `appsrc` with explicit timestamps, so output
//! timing follows the frame index and never the wall clock. The muxed stream
//! is collected from an `appsink` when the writer completes.

use std::sync::OnceLock;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_host::Surface;

use crate::muxing::{ContainerWriter, WriterFactory};

struct ActivePipeline {
    pipeline: gst::Pipeline,
    src: gst_app::AppSrc,
    sink: gst_app::AppSink,
    width: u32,
    height: u32,
}

pub struct GstWebmWriter {
    fps: u32,
    quality: u8,
    active: Option<ActivePipeline>,
    frames: u64,
}

impl GstWebmWriter {
    pub fn new(fps: u32, quality: u8) -> Self {
        Self {
            fps: fps.max(1),
            quality: quality.min(100),
            active: None,
            frames: 0,
        }
    }

    pub fn factory(fps: u32, quality: u8) -> WriterFactory {
        Box::new(move || Box::new(GstWebmWriter::new(fps, quality)))
    }

    /// vp8enc constant-quality level; 0 is best, 63 is worst.
    fn cq_level(&self) -> u32 {
        63 - u32::from(self.quality) * 63 / 100
    }

    fn launch_line(&self, width: u32, height: u32) -> String {
        format!(
            "appsrc name=src format=time \
             caps=video/x-raw,format=RGBA,width={width},height={height},framerate={fps}/1 \
             ! videoconvert ! vp8enc deadline=1 end-usage=cq cq-level={cq} \
             ! webmmux streamable=true ! appsink name=sink sync=false",
            fps = self.fps,
            cq = self.cq_level(),
        )
    }

    fn build(&self, width: u32, height: u32) -> RaytrackResult<ActivePipeline> {
        init_gstreamer()?;

        let element = gst::parse::launch(&self.launch_line(width, height)).map_err(|e| {
            RaytrackError::resource_init(format!("Failed to build webm pipeline: {e}"))
        })?;
        let pipeline = element.dynamic_cast::<gst::Pipeline>().map_err(|_| {
            RaytrackError::resource_init("Launch string did not produce a pipeline")
        })?;

        let src = pipeline
            .by_name("src")
            .and_then(|e| e.dynamic_cast::<gst_app::AppSrc>().ok())
            .ok_or_else(|| RaytrackError::resource_init("webm pipeline has no appsrc"))?;
        let sink = pipeline
            .by_name("sink")
            .and_then(|e| e.dynamic_cast::<gst_app::AppSink>().ok())
            .ok_or_else(|| RaytrackError::resource_init("webm pipeline has no appsink"))?;

        pipeline.set_state(gst::State::Playing).map_err(|e| {
            RaytrackError::resource_init(format!("Failed to start webm pipeline: {e:?}"))
        })?;
        tracing::debug!(width, height, fps = self.fps, "webm pipeline started");

        Ok(ActivePipeline {
            pipeline,
            src,
            sink,
            width,
            height,
        })
    }

    fn timestamp(&self, index: u64) -> gst::ClockTime {
        gst::ClockTime::from_nseconds(index * 1_000_000_000 / u64::from(self.fps))
    }

    fn drain(active: &ActivePipeline) -> RaytrackResult<Vec<u8>> {
        active.src.end_of_stream().map_err(|e| {
            RaytrackError::frame_encode(format!("Failed to end webm stream: {e:?}"))
        })?;

        let mut bytes = Vec::new();
        // pull_sample fails once EOS has reached the sink.
        while let Ok(sample) = active.sink.pull_sample() {
            if let Some(buffer) = sample.buffer() {
                let map = buffer.map_readable().map_err(|e| {
                    RaytrackError::frame_encode(format!("Unreadable webm buffer: {e}"))
                })?;
                bytes.extend_from_slice(map.as_slice());
            }
        }
        Ok(bytes)
    }
}

impl ContainerWriter for GstWebmWriter {
    fn add_frame(&mut self, frame: &Surface) -> RaytrackResult<()> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(RaytrackError::frame_encode("Cannot encode an empty surface"));
        }
        if self.active.is_none() {
            self.active = Some(self.build(width, height)?);
        }

        let pts = self.timestamp(self.frames);
        let duration = self.timestamp(self.frames + 1) - pts;
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| RaytrackError::resource_init("webm pipeline unavailable"))?;
        if (active.width, active.height) != (width, height) {
            return Err(RaytrackError::frame_encode(format!(
                "Frame size {width}x{height} differs from video size {}x{}",
                active.width, active.height
            )));
        }

        let mut buffer = gst::Buffer::from_mut_slice(frame.as_raw().clone());
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(pts);
            buffer.set_duration(duration);
        }
        active.src.push_buffer(buffer).map_err(|e| {
            RaytrackError::frame_encode(format!("Failed to push frame into webm pipeline: {e:?}"))
        })?;
        self.frames += 1;
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn complete(&mut self) -> RaytrackResult<Option<Vec<u8>>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        let result = Self::drain(&active);
        if let Err(e) = active.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to stop webm pipeline");
        }
        let bytes = result?;
        tracing::debug!(frames = self.frames, bytes = bytes.len(), "webm finalized");
        self.frames = 0;
        Ok(Some(bytes))
    }
}

impl Drop for GstWebmWriter {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.pipeline.set_state(gst::State::Null);
        }
    }
}

fn init_gstreamer() -> RaytrackResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(RaytrackError::resource_init(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}
