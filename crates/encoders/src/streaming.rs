//! Per-frame streaming over a persistent connection.
//!
//! Each frame is encoded as a standalone PNG and sent as one length-delimited
//! message. The step completes once the send has been acknowledged by the
//! transport, so a slow receiver naturally throttles the capture.

use std::cell::Cell;
use std::io::Cursor;
use std::rc::Rc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use raytrack_common::config::CaptureConfig;
use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_host::{Host, Surface};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::artifact::Artifact;
use crate::encoder::{OutputName, StepNotifier};

/// Encode a surface as a standalone PNG image.
pub fn encode_png(frame: &Surface) -> RaytrackResult<Bytes> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(RaytrackError::frame_encode("Cannot encode an empty surface"));
    }
    let mut cursor = Cursor::new(Vec::new());
    frame
        .write_to(&mut cursor, image::ImageFormat::Png)
        .map_err(|e| RaytrackError::frame_encode(format!("PNG encoding failed: {e}")))?;
    Ok(Bytes::from(cursor.into_inner()))
}

/// Delivers encoded frames to a remote receiver.
#[async_trait(?Send)]
pub trait FrameTransport {
    async fn send(&mut self, frame: Bytes) -> RaytrackResult<()>;

    /// Flush and release the connection. Further sends fail.
    async fn close(&mut self) -> RaytrackResult<()>;
}

type FramedStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Length-delimited frames over TCP. Connects on the first send.
pub struct TcpFrameTransport {
    address: String,
    framed: Option<FramedStream>,
    closed: bool,
}

impl TcpFrameTransport {
    pub fn new(address: String) -> Self {
        Self {
            address,
            framed: None,
            closed: false,
        }
    }

    async fn connection(&mut self) -> RaytrackResult<&mut FramedStream> {
        if self.closed {
            return Err(RaytrackError::transport("Connection already closed"));
        }
        if self.framed.is_none() {
            let stream = TcpStream::connect(&self.address).await.map_err(|e| {
                RaytrackError::transport(format!("Failed to connect to {}: {e}", self.address))
            })?;
            tracing::info!(address = %self.address, "Frame stream connected");
            self.framed = Some(Framed::new(stream, LengthDelimitedCodec::new()));
        }
        self.framed
            .as_mut()
            .ok_or_else(|| RaytrackError::transport("Connection unavailable"))
    }
}

#[async_trait(?Send)]
impl FrameTransport for TcpFrameTransport {
    async fn send(&mut self, frame: Bytes) -> RaytrackResult<()> {
        let address = self.address.clone();
        let framed = self.connection().await?;
        framed.send(frame).await.map_err(|e| {
            RaytrackError::transport(format!("Failed to send frame to {address}: {e}"))
        })
    }

    async fn close(&mut self) -> RaytrackResult<()> {
        self.closed = true;
        if let Some(mut framed) = self.framed.take() {
            SinkExt::<Bytes>::close(&mut framed)
                .await
                .map_err(|e| RaytrackError::transport(format!("Failed to close stream: {e}")))?;
            tracing::info!(address = %self.address, "Frame stream closed");
        }
        Ok(())
    }
}

/// In-process transport feeding an unbounded channel.
pub struct ChannelTransport {
    tx: Option<UnboundedSender<Bytes>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }
}

#[async_trait(?Send)]
impl FrameTransport for ChannelTransport {
    async fn send(&mut self, frame: Bytes) -> RaytrackResult<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| RaytrackError::transport("Channel already closed"))?;
        tx.send(frame)
            .map_err(|_| RaytrackError::transport("Frame receiver dropped"))
    }

    async fn close(&mut self) -> RaytrackResult<()> {
        self.tx = None;
        Ok(())
    }
}

type SharedTransport = Rc<Mutex<Box<dyn FrameTransport>>>;

pub struct StreamingEncoder {
    name: OutputName,
    host: Host,
    transport: SharedTransport,
    notifier: Option<StepNotifier>,
    frames_sent: Rc<Cell<u64>>,
}

impl StreamingEncoder {
    pub fn new(host: &Host, config: &CaptureConfig, transport: Box<dyn FrameTransport>) -> Self {
        Self {
            name: OutputName::new(config, ".png", "image/png"),
            host: host.clone(),
            transport: Rc::new(Mutex::new(transport)),
            notifier: None,
            frames_sent: Rc::new(Cell::new(0)),
        }
    }

    pub(crate) fn output_name(&self) -> &OutputName {
        &self.name
    }

    /// Frames the transport has accepted so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.get()
    }

    pub fn start(&mut self, notifier: StepNotifier) -> RaytrackResult<()> {
        self.notifier = Some(notifier);
        Ok(())
    }

    /// Encode `frame` now and send it on a host task.
    ///
    /// Must be called on the host runtime.
    pub fn add_frame(&mut self, frame: &Surface) -> RaytrackResult<()> {
        let payload = encode_png(frame)?;
        let transport = Rc::clone(&self.transport);
        let notifier = self.notifier.clone();
        let frames_sent = Rc::clone(&self.frames_sent);

        self.host.spawn_local(async move {
            let result = transport.lock().await.send(payload).await;
            match result {
                Ok(()) => {
                    frames_sent.set(frames_sent.get() + 1);
                    if let Some(notifier) = notifier {
                        notifier.complete();
                    }
                }
                Err(err) => {
                    tracing::error!(error = %err, "Frame send failed");
                    if let Some(notifier) = notifier {
                        notifier.fail(err);
                    }
                }
            }
        });
        Ok(())
    }

    pub fn stop(&mut self) -> RaytrackResult<()> {
        Ok(())
    }

    /// Close the connection once queued frames are sent. Never yields an
    /// artifact.
    pub fn save(&mut self) -> RaytrackResult<Option<Artifact>> {
        let transport = Rc::clone(&self.transport);
        let host = self.host.clone();
        self.host.spawn_local(async move {
            if let Err(err) = transport.lock().await.close().await {
                host.report_error(err.into());
            }
        });
        Ok(None)
    }

    pub fn dispose(&mut self) {}
}
