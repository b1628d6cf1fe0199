//! Capture session state machine.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use raytrack_common::config::CaptureConfig;
use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_encoders::{Artifact, ArtifactSink, DirectorySink, Encoder, StepNotifier};
use raytrack_host::{CallbackResult, Host, MediaSource, Surface, TimeSource, TimeSourceOverride};

use crate::motion_blur::MotionBlurAccumulator;
use crate::scheduler::{FrameScheduler, TimeUpdate};
use crate::virtual_time::VirtualTime;

/// Configuration plus the callbacks a session reports through.
#[derive(Clone, Default)]
pub struct CaptureOptions {
    pub config: CaptureConfig,

    /// Invoked once when a frame or time limit stops the session.
    pub on_done: Option<Rc<dyn Fn()>>,

    /// Invoked on every frame step.
    pub on_update_time: Option<Rc<dyn Fn(&TimeUpdate)>>,
}

impl CaptureOptions {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn on_done(mut self, callback: impl Fn() + 'static) -> Self {
        self.on_done = Some(Rc::new(callback));
        self
    }

    pub fn on_update_time(mut self, callback: impl Fn(&TimeUpdate) + 'static) -> Self {
        self.on_update_time = Some(Rc::new(callback));
        self
    }
}

impl fmt::Debug for CaptureOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureOptions")
            .field("config", &self.config)
            .field("on_done", &self.on_done.is_some())
            .field("on_update_time", &self.on_update_time.is_some())
            .finish()
    }
}

/// State of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Constructed, encoder selected.
    Idle,
    /// Time sources overridden, encoder starting.
    Armed,
    /// Accepting frames.
    Capturing,
    /// Real time restored; the artifact has not been taken yet.
    Stopped,
    /// The final artifact was taken.
    Finalized,
}

struct Core {
    state: SessionState,
    frame_count: u64,
    encoder: Encoder,
    accumulator: Option<MotionBlurAccumulator>,
    scheduler: FrameScheduler,
    media: Vec<Rc<dyn MediaSource>>,
    time_override: Option<TimeSourceOverride>,
    real: Option<Rc<dyn TimeSource>>,
    notifier: Option<StepNotifier>,
    capture_mark_ms: Option<f64>,
}

impl Core {
    fn sub_frame_count(&self) -> u32 {
        self.accumulator
            .as_ref()
            .map_or(0, MotionBlurAccumulator::sub_frame_count)
    }

    fn capture_frame(
        &mut self,
        surface: &Surface,
        media: &[Rc<dyn MediaSource>],
        verbose: bool,
    ) -> RaytrackResult<()> {
        if let Some(accumulator) = self.accumulator.as_mut() {
            accumulator.accumulate(surface)?;
            if self.scheduler.flush_due(accumulator.sub_frame_count()) {
                let frame = accumulator.flush();
                self.encoder.add_frame(frame)?;
                self.frame_count += 1;
                if verbose {
                    tracing::debug!(frame = self.frame_count, "Motion blur frame");
                }
            } else if let Some(notifier) = &self.notifier {
                notifier.complete();
            }
            return Ok(());
        }

        self.media = media.to_vec();
        for source in &self.media {
            if !source.is_paused() {
                source.pause();
            }
        }
        self.encoder.add_frame(surface)?;
        self.frame_count += 1;
        if verbose {
            tracing::debug!(frame = self.frame_count, "Full frame");
        }
        Ok(())
    }
}

struct Shared {
    host: Host,
    options: CaptureOptions,
    sink: Rc<dyn ArtifactSink>,
    virtual_time: Rc<VirtualTime>,
    core: RefCell<Core>,
}

/// Records time-driven content deterministically.
///
/// While capturing, the host's clocks and timers are answered from simulated
/// time that advances exactly one frame step per captured frame. Callbacks
/// that came due are handed back to the real scheduler, so the host keeps
/// running them one at a time without the call stack growing.
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct CaptureSession {
    shared: Rc<Shared>,
}

impl CaptureSession {
    /// Create a session whose artifacts are written to the configured output
    /// directory.
    pub fn new(host: &Host, options: CaptureOptions) -> RaytrackResult<Self> {
        options.config.validate()?;
        let sink: Rc<dyn ArtifactSink> =
            Rc::new(DirectorySink::new(options.config.output_dir.clone()));
        let encoder = Encoder::from_config(host, &options.config, Rc::clone(&sink))?;
        Self::with_encoder(host, options, encoder, sink)
    }

    /// Create a session around an already constructed encoder.
    pub fn with_encoder(
        host: &Host,
        options: CaptureOptions,
        encoder: Encoder,
        sink: Rc<dyn ArtifactSink>,
    ) -> RaytrackResult<Self> {
        options.config.validate()?;
        let config = &options.config;
        let accumulator = config
            .motion_blur_enabled()
            .then(|| MotionBlurAccumulator::new(config.motion_blur_frames));

        let core = Core {
            state: SessionState::Idle,
            frame_count: 0,
            scheduler: FrameScheduler::new(config),
            encoder,
            accumulator,
            media: Vec::new(),
            time_override: None,
            real: None,
            notifier: None,
            capture_mark_ms: None,
        };
        tracing::debug!(
            fps = config.fps,
            format = %config.format,
            motion_blur_frames = config.motion_blur_frames,
            "Capture session created"
        );

        Ok(Self {
            shared: Rc::new(Shared {
                host: host.clone(),
                virtual_time: Rc::new(VirtualTime::new(config.verbose)),
                options,
                sink,
                core: RefCell::new(core),
            }),
        })
    }

    pub fn state(&self) -> SessionState {
        self.shared.core.borrow().state
    }

    pub fn is_capturing(&self) -> bool {
        self.state() == SessionState::Capturing
    }

    /// Output frames handed to the encoder so far.
    pub fn frame_count(&self) -> u64 {
        self.shared.core.borrow().frame_count
    }

    /// Motion-blur samples waiting for the next flush.
    pub fn sub_frame_count(&self) -> u32 {
        self.shared.core.borrow().sub_frame_count()
    }

    /// Simulated milliseconds since the capture started.
    pub fn elapsed_ms(&self) -> f64 {
        self.shared.virtual_time.clock().elapsed_ms()
    }

    /// Name the next artifact will be saved under, extension included.
    pub fn file_name(&self) -> String {
        let core = self.shared.core.borrow();
        format!("{}{}", core.encoder.file_name(), core.encoder.extension())
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.shared.options.config
    }

    /// Take over the host's time sources and start the encoder.
    pub fn start(&self) -> RaytrackResult<()> {
        let shared = &self.shared;
        let mut core = shared.core.borrow_mut();
        if core.state != SessionState::Idle {
            return Err(RaytrackError::unsupported(format!(
                "Capture session cannot start from {:?}",
                core.state
            )));
        }

        let replacement: Rc<dyn TimeSource> = shared.virtual_time.clone();
        let guard = TimeSourceOverride::acquire(&shared.host, replacement)?;
        let real = guard.original();
        shared.virtual_time.begin(
            shared.options.config.start_time,
            real.now_ms(),
            real.high_res_now_ms(),
        );
        core.state = SessionState::Armed;

        let notifier = step_notifier(Rc::downgrade(shared), Rc::clone(&real));
        if let Err(err) = core.encoder.start(notifier.clone()) {
            guard.release();
            core.state = SessionState::Idle;
            return Err(err);
        }

        core.time_override = Some(guard);
        core.real = Some(real);
        core.notifier = Some(notifier);
        core.state = SessionState::Capturing;
        tracing::info!(
            file = %format!("{}{}", core.encoder.file_name(), core.encoder.extension()),
            fps = shared.options.config.fps,
            "Capture started"
        );
        Ok(())
    }

    /// Record one frame of `surface`. A no-op unless capturing.
    ///
    /// `media` are the playable sources that should follow simulated time.
    /// A failure aborts the session.
    pub fn capture(&self, surface: &Surface, media: &[Rc<dyn MediaSource>]) -> RaytrackResult<()> {
        let result = {
            let mut core = self.shared.core.borrow_mut();
            if core.state != SessionState::Capturing {
                return Ok(());
            }
            core.capture_mark_ms = core.real.as_ref().map(|real| real.high_res_now_ms());
            core.capture_frame(surface, media, self.shared.options.config.verbose)
        };

        if let Err(err) = result {
            tracing::error!(error = %err, "Frame capture failed; aborting session");
            if let Err(stop_err) = self.stop() {
                tracing::warn!(error = %stop_err, "Encoder stop failed during abort");
            }
            return Err(err);
        }
        Ok(())
    }

    /// Stop capturing and restore real time. A no-op unless armed or
    /// capturing.
    ///
    /// The time sources are restored even when the encoder fails to stop.
    pub fn stop(&self) -> RaytrackResult<()> {
        let mut core = self.shared.core.borrow_mut();
        if !matches!(core.state, SessionState::Armed | SessionState::Capturing) {
            return Ok(());
        }
        core.state = SessionState::Stopped;
        let result = core.encoder.stop();
        if let Some(guard) = core.time_override.take() {
            guard.release();
        }
        tracing::info!(frames = core.frame_count, "Capture stopped");
        result
    }

    /// Finalize output and hand it to the artifact sink.
    ///
    /// While capturing this yields the current segment and keeps going; after
    /// [`CaptureSession::stop`] it yields the final artifact once.
    pub fn save(&self) -> RaytrackResult<Option<Artifact>> {
        let (artifact, file_name, mime_type) = {
            let mut core = self.shared.core.borrow_mut();
            match core.state {
                SessionState::Idle | SessionState::Armed | SessionState::Finalized => {
                    return Ok(None)
                }
                SessionState::Capturing => {}
                SessionState::Stopped => core.state = SessionState::Finalized,
            }
            let artifact = core.encoder.save()?;
            let file_name = format!("{}{}", core.encoder.file_name(), core.encoder.extension());
            (artifact, file_name, core.encoder.mime_type())
        };

        if let Some(artifact) = &artifact {
            self.shared.sink.persist(artifact, &file_name, mime_type)?;
            tracing::info!(
                file = %file_name,
                frames = artifact.frames,
                bytes = artifact.len(),
                "Capture saved"
            );
        }
        Ok(artifact)
    }

    /// Advance simulated time to the current frame and release whatever came
    /// due. Runs once per encoder step.
    fn process_step(&self) -> CallbackResult {
        let shared = &self.shared;
        let verbose = shared.options.config.verbose;

        let (update, limit_reached) = {
            let core = shared.core.borrow();
            if core.state != SessionState::Capturing {
                return Ok(());
            }
            let sub_frame_count = core.sub_frame_count();
            let offset_ms = core.scheduler.frame_offset_ms(core.frame_count, sub_frame_count);
            shared.virtual_time.advance_to(offset_ms);
            for source in &core.media {
                source.set_current_time(offset_ms / 1_000.0);
            }
            if verbose {
                tracing::debug!(
                    frame = core.frame_count,
                    sub_frame = sub_frame_count,
                    offset_ms,
                    "Frame step"
                );
            }
            (
                core.scheduler.time_update(core.frame_count, sub_frame_count),
                core.scheduler.limit_reached(core.frame_count),
            )
        };

        if limit_reached {
            tracing::info!(frames = update.frame_count, "Capture limit reached");
            if let Err(err) = self.stop() {
                shared.host.report_error(err.into());
            }
            if let Err(err) = self.save() {
                shared.host.report_error(err.into());
            }
            if let Some(on_done) = &shared.options.on_done {
                on_done();
            }
        }

        if let Some(on_update_time) = &shared.options.on_update_time {
            on_update_time(&update);
        }

        self.dispatch_due_callbacks();

        let mut core = shared.core.borrow_mut();
        if let (Some(mark), Some(real)) = (core.capture_mark_ms.take(), core.real.clone()) {
            core.scheduler.record_processing_time(real.high_res_now_ms() - mark);
        }
        Ok(())
    }

    /// Hand due timers, then animation-frame callbacks, to the real scheduler.
    fn dispatch_due_callbacks(&self) {
        let Some(real) = self.shared.core.borrow().real.clone() else {
            return;
        };
        let virtual_time = &self.shared.virtual_time;

        let timers = virtual_time.take_due_timers();
        let frame_callbacks = virtual_time.take_frame_callbacks();
        let timestamp = virtual_time.frame_timestamp();
        if self.shared.options.config.verbose && !(timers.is_empty() && frame_callbacks.is_empty())
        {
            tracing::debug!(
                timers = timers.len(),
                frame_callbacks = frame_callbacks.len(),
                "Dispatching due callbacks"
            );
        }

        for timer in timers {
            real.set_timeout(timer.callback, 0.0);
        }
        for callback in frame_callbacks {
            real.set_timeout(Rc::new(move || callback(timestamp)), 0.0);
        }
    }

    /// Stop after an asynchronous encoder failure and surface the error.
    fn abort(&self, err: RaytrackError) {
        tracing::error!(error = %err, "Encoder step failed; aborting session");
        if let Err(stop_err) = self.stop() {
            tracing::warn!(error = %stop_err, "Encoder stop failed during abort");
        }
        self.shared.host.report_error(err.into());
    }
}

/// Encoder step callbacks. Each completed step schedules the next frame step
/// through the real scheduler.
fn step_notifier(session: Weak<Shared>, real: Rc<dyn TimeSource>) -> StepNotifier {
    let on_failure = session.clone();
    StepNotifier::new(
        move || {
            let session = session.clone();
            real.set_timeout(
                Rc::new(move || match session.upgrade() {
                    Some(shared) => CaptureSession { shared }.process_step(),
                    None => Ok(()),
                }),
                0.0,
            );
        },
        move |err| {
            if let Some(shared) = on_failure.upgrade() {
                CaptureSession { shared }.abort(err);
            }
        },
    )
}
