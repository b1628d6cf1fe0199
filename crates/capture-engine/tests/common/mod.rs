//! Shared fixtures for capture-engine integration tests.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use image::Rgba;
use raytrack_capture_engine::CaptureSession;
use raytrack_common::config::CaptureConfig;
use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_encoders::{ArtifactSink, ContainerWriter, Encoder, MuxingEncoder, WriterFactory};
use raytrack_host::{CallbackResult, Host, MediaSource, Surface};

/// Writer that keeps every frame it is given.
pub struct RecordingWriter {
    frames: Rc<RefCell<Vec<Surface>>>,
    count: u64,
}

impl ContainerWriter for RecordingWriter {
    fn add_frame(&mut self, frame: &Surface) -> RaytrackResult<()> {
        self.frames.borrow_mut().push(frame.clone());
        self.count += 1;
        Ok(())
    }

    fn frame_count(&self) -> u64 {
        self.count
    }

    fn complete(&mut self) -> RaytrackResult<Option<Vec<u8>>> {
        if self.count == 0 {
            return Ok(None);
        }
        let bytes = self.count.to_le_bytes().to_vec();
        self.count = 0;
        Ok(Some(bytes))
    }
}

/// Writer whose every frame fails to encode.
pub struct FailingWriter;

impl ContainerWriter for FailingWriter {
    fn add_frame(&mut self, _frame: &Surface) -> RaytrackResult<()> {
        Err(RaytrackError::frame_encode("no image data"))
    }

    fn frame_count(&self) -> u64 {
        0
    }

    fn complete(&mut self) -> RaytrackResult<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// A muxing encoder backed by [`RecordingWriter`], plus the frames it sees.
pub fn recording_encoder(
    config: &CaptureConfig,
    sink: Rc<dyn ArtifactSink>,
) -> (Encoder, Rc<RefCell<Vec<Surface>>>) {
    let frames = Rc::new(RefCell::new(Vec::new()));
    let shared = Rc::clone(&frames);
    let factory: WriterFactory = Box::new(move || {
        Box::new(RecordingWriter {
            frames: Rc::clone(&shared),
            count: 0,
        })
    });
    let encoder = MuxingEncoder::new(config, ".png", "image/apng", factory, sink);
    (Encoder::Muxing(encoder), frames)
}

pub fn failing_encoder(config: &CaptureConfig, sink: Rc<dyn ArtifactSink>) -> Encoder {
    let factory: WriterFactory = Box::new(|| Box::new(FailingWriter));
    Encoder::Muxing(MuxingEncoder::new(config, ".png", "image/apng", factory, sink))
}

/// Media element that only tracks position and pause state.
#[derive(Default)]
pub struct FakeMedia {
    pub paused: Cell<bool>,
    pub pause_calls: Cell<u32>,
    pub position: Cell<f64>,
}

impl MediaSource for FakeMedia {
    fn is_paused(&self) -> bool {
        self.paused.get()
    }

    fn pause(&self) {
        self.paused.set(true);
        self.pause_calls.set(self.pause_calls.get() + 1);
    }

    fn set_current_time(&self, seconds: f64) {
        self.position.set(seconds);
    }

    fn current_time(&self) -> f64 {
        self.position.get()
    }
}

/// Drives a session the way an animation loop would: one frame per
/// animation-frame callback, for as long as the session is capturing.
#[derive(Clone)]
pub struct RenderLoop {
    /// Simulated time of every capture, relative to the capture start.
    pub capture_times: Rc<RefCell<Vec<f64>>>,
    pub media: Vec<Rc<dyn MediaSource>>,
    draw: Rc<dyn Fn(usize) -> Surface>,
}

impl RenderLoop {
    /// `draw` receives the 1-based index of the frame being rendered.
    pub fn new(draw: impl Fn(usize) -> Surface + 'static) -> Self {
        Self {
            capture_times: Rc::new(RefCell::new(Vec::new())),
            media: Vec::new(),
            draw: Rc::new(draw),
        }
    }

    pub fn with_media(mut self, media: Rc<dyn MediaSource>) -> Self {
        self.media.push(media);
        self
    }

    pub fn capture_times(&self) -> Vec<f64> {
        self.capture_times.borrow().clone()
    }

    /// Render and capture one frame, then ask for the next one.
    pub fn run(&self, host: &Host, session: &CaptureSession) -> CallbackResult {
        if !session.is_capturing() {
            return Ok(());
        }
        self.capture_times.borrow_mut().push(session.elapsed_ms());
        let surface = (self.draw)(self.capture_times.borrow().len());

        let (next, next_host, next_session) = (self.clone(), host.clone(), session.clone());
        host.request_animation_frame(Rc::new(move |_timestamp| {
            next.run(&next_host, &next_session)
        }));

        session.capture(&surface, &self.media)?;
        Ok(())
    }
}

/// A solid surface whose red channel is `red`.
pub fn solid(red: u8) -> Surface {
    Surface::from_pixel(4, 4, Rgba([red, 0, 0, 255]))
}

pub fn assert_times_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-3, "{actual:?} vs {expected:?}");
    }
}
