//! The closed set of encoder variants a session can drive.

use std::rc::Rc;

use raytrack_common::config::{CaptureConfig, Format};
use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_common::generate_file_name;
use raytrack_host::{Host, Surface};

use crate::apng::ApngWriter;
use crate::artifact::{Artifact, ArtifactSink};
use crate::muxing::MuxingEncoder;
use crate::streaming::{FrameTransport, StreamingEncoder, TcpFrameTransport};

/// Tells the session that the encoder is done with a frame.
///
/// `complete` lets the scheduler advance; `fail` aborts the session.
#[derive(Clone)]
pub struct StepNotifier {
    on_complete: Rc<dyn Fn()>,
    on_failure: Rc<dyn Fn(RaytrackError)>,
}

impl StepNotifier {
    pub fn new(
        on_complete: impl Fn() + 'static,
        on_failure: impl Fn(RaytrackError) + 'static,
    ) -> Self {
        Self {
            on_complete: Rc::new(on_complete),
            on_failure: Rc::new(on_failure),
        }
    }

    pub fn complete(&self) {
        (self.on_complete)();
    }

    pub fn fail(&self, err: RaytrackError) {
        (self.on_failure)(err);
    }
}

/// File naming shared by both variants.
#[derive(Debug, Clone)]
pub(crate) struct OutputName {
    pub base: String,
    pub current: String,
    pub extension: &'static str,
    pub mime_type: &'static str,
}

impl OutputName {
    pub fn new(config: &CaptureConfig, extension: &'static str, mime_type: &'static str) -> Self {
        let base = config
            .file_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(generate_file_name);
        Self {
            current: base.clone(),
            base,
            extension,
            mime_type,
        }
    }
}

/// Frame sink selected by the configured [`Format`].
pub enum Encoder {
    /// Buffers frames into a container, optionally split into parts.
    Muxing(MuxingEncoder),
    /// Sends every frame over a persistent connection.
    Streaming(StreamingEncoder),
}

impl Encoder {
    /// Build the encoder for `config.format` with the default collaborators.
    pub fn from_config(
        host: &Host,
        config: &CaptureConfig,
        sink: Rc<dyn ArtifactSink>,
    ) -> RaytrackResult<Self> {
        match config.format {
            Format::Apng => Ok(Encoder::Muxing(MuxingEncoder::new(
                config,
                ".png",
                "image/apng",
                ApngWriter::factory(config.fps),
                sink,
            ))),
            Format::Webm => webm_encoder(config, sink),
            Format::Socket => {
                let transport = TcpFrameTransport::new(config.stream_address.clone());
                Ok(Self::streaming(host, config, Box::new(transport)))
            }
        }
    }

    /// A streaming encoder over a caller-supplied transport.
    pub fn streaming(
        host: &Host,
        config: &CaptureConfig,
        transport: Box<dyn FrameTransport>,
    ) -> Self {
        Encoder::Streaming(StreamingEncoder::new(host, config, transport))
    }

    pub fn start(&mut self, notifier: StepNotifier) -> RaytrackResult<()> {
        match self {
            Encoder::Muxing(e) => e.start(notifier),
            Encoder::Streaming(e) => e.start(notifier),
        }
    }

    /// Accept one finished frame. Step completion is signalled through the
    /// notifier given to [`Encoder::start`].
    pub fn add_frame(&mut self, frame: &Surface) -> RaytrackResult<()> {
        match self {
            Encoder::Muxing(e) => e.add_frame(frame),
            Encoder::Streaming(e) => e.add_frame(frame),
        }
    }

    pub fn stop(&mut self) -> RaytrackResult<()> {
        match self {
            Encoder::Muxing(e) => e.stop(),
            Encoder::Streaming(e) => e.stop(),
        }
    }

    /// Finalize buffered output. Streaming encoders never produce an artifact.
    pub fn save(&mut self) -> RaytrackResult<Option<Artifact>> {
        match self {
            Encoder::Muxing(e) => e.save(),
            Encoder::Streaming(e) => e.save(),
        }
    }

    /// Drop buffered state without producing output.
    pub fn dispose(&mut self) {
        match self {
            Encoder::Muxing(e) => e.dispose(),
            Encoder::Streaming(e) => e.dispose(),
        }
    }

    fn name(&self) -> &OutputName {
        match self {
            Encoder::Muxing(e) => e.output_name(),
            Encoder::Streaming(e) => e.output_name(),
        }
    }

    /// Current artifact name, without extension.
    pub fn file_name(&self) -> &str {
        &self.name().current
    }

    pub fn base_file_name(&self) -> &str {
        &self.name().base
    }

    pub fn extension(&self) -> &'static str {
        self.name().extension
    }

    pub fn mime_type(&self) -> &'static str {
        self.name().mime_type
    }
}

#[cfg(feature = "gstreamer")]
fn webm_encoder(config: &CaptureConfig, sink: Rc<dyn ArtifactSink>) -> RaytrackResult<Encoder> {
    Ok(Encoder::Muxing(MuxingEncoder::new(
        config,
        ".webm",
        "video/webm",
        crate::webm::GstWebmWriter::factory(config.fps, config.quality),
        sink,
    )))
}

#[cfg(not(feature = "gstreamer"))]
fn webm_encoder(_config: &CaptureConfig, _sink: Rc<dyn ArtifactSink>) -> RaytrackResult<Encoder> {
    Err(RaytrackError::config(
        "webm output requires raytrack-encoders to be built with the `gstreamer` feature",
    ))
}
