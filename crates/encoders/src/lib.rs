//! Raytrack Encoders
//!
//! Sinks that receive finished frames from a capture session.
//!
//! ```text
//!                    ┌──────────────────────────────┐
//!   frame ──► Encoder│ Muxing                       │──► ContainerWriter ──► Artifact
//!                    │  (auto-split every N seconds) │                          │
//!                    │                              │                          ▼
//!                    │ Streaming                    │                    ArtifactSink
//!                    │  (PNG per frame)             │──► FrameTransport ──► remote
//!                    └──────────────────────────────┘
//! ```
//!
//! Every `add_frame` eventually calls the session's [`StepNotifier`], which is
//! what lets the next frame be scheduled.

pub mod apng;
pub mod artifact;
pub mod encoder;
pub mod muxing;
pub mod streaming;
#[cfg(feature = "gstreamer")]
pub mod webm;

pub use apng::ApngWriter;
pub use artifact::{
    part_file_name, Artifact, ArtifactSink, DirectorySink, MemorySink, StoredArtifact,
};
pub use encoder::{Encoder, StepNotifier};
pub use muxing::{ContainerWriter, MuxingEncoder, WriterFactory};
pub use streaming::{
    encode_png, ChannelTransport, FrameTransport, StreamingEncoder, TcpFrameTransport,
};
