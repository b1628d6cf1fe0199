//! The host handle and its runtime.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use raytrack_common::error::{RaytrackError, RaytrackResult};
use raytrack_common::{process_start_wall_ms, TimerId};
use tokio::task::LocalSet;

use crate::real::RealTimeSource;
use crate::source::{Callback, CallbackResult, FrameCallback, TimeSource};

/// Where callback errors end up when nobody handles them.
///
/// Errors are logged and retained; they never stop the host.
#[derive(Clone, Default)]
pub struct UnhandledErrors {
    errors: Rc<RefCell<Vec<anyhow::Error>>>,
}

impl UnhandledErrors {
    pub fn report(&self, err: anyhow::Error) {
        let message = format!("{err:#}");
        tracing::error!(error = %message, "Unhandled callback error");
        self.errors.borrow_mut().push(err);
    }

    pub fn dispatch(&self, result: CallbackResult) {
        if let Err(err) = result {
            self.report(err);
        }
    }

    pub fn take(&self) -> Vec<anyhow::Error> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }
}

struct HostInner {
    installed: RefCell<Rc<dyn TimeSource>>,
    overridden: Cell<bool>,
    errors: UnhandledErrors,
}

/// Shared handle to the host's time primitives.
///
/// Cloning is cheap; all clones see the same installed [`TimeSource`].
#[derive(Clone)]
pub struct Host {
    inner: Rc<HostInner>,
}

impl Host {
    /// Create a host with real time sources installed.
    pub fn new() -> Self {
        // Pin the process-wide origin before any session can read it.
        process_start_wall_ms();

        let errors = UnhandledErrors::default();
        let real: Rc<dyn TimeSource> = Rc::new(RealTimeSource::new(errors.clone()));
        Self {
            inner: Rc::new(HostInner {
                installed: RefCell::new(real),
                overridden: Cell::new(false),
                errors,
            }),
        }
    }

    /// The time source currently answering host calls.
    pub fn time_source(&self) -> Rc<dyn TimeSource> {
        Rc::clone(&self.inner.installed.borrow())
    }

    /// Whether a capture session currently owns the time sources.
    pub fn is_overridden(&self) -> bool {
        self.inner.overridden.get()
    }

    /// Swap in `source`, returning the one it replaces.
    pub(crate) fn install(&self, source: Rc<dyn TimeSource>) -> Rc<dyn TimeSource> {
        self.inner.installed.replace(source)
    }

    pub(crate) fn set_overridden(&self, overridden: bool) {
        self.inner.overridden.set(overridden);
    }

    pub fn now_ms(&self) -> f64 {
        self.time_source().now_ms()
    }

    pub fn high_res_now_ms(&self) -> f64 {
        self.time_source().high_res_now_ms()
    }

    pub fn set_timeout(&self, callback: Callback, delay_ms: f64) -> TimerId {
        self.time_source().set_timeout(callback, delay_ms)
    }

    pub fn clear_timeout(&self, id: TimerId) {
        self.time_source().clear_timeout(id)
    }

    pub fn set_interval(&self, callback: Callback, period_ms: f64) -> TimerId {
        self.time_source().set_interval(callback, period_ms)
    }

    pub fn clear_interval(&self, id: TimerId) {
        self.time_source().clear_interval(id)
    }

    pub fn request_animation_frame(&self, callback: FrameCallback) {
        self.time_source().request_animation_frame(callback)
    }

    /// Run a future on the host's execution context.
    pub fn spawn_local<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        tokio::task::spawn_local(future);
    }

    pub fn errors(&self) -> &UnhandledErrors {
        &self.inner.errors
    }

    pub fn report_error(&self, err: anyhow::Error) {
        self.inner.errors.report(err);
    }

    /// Drain the errors callbacks have raised so far.
    pub fn take_unhandled_errors(&self) -> Vec<anyhow::Error> {
        self.inner.errors.take()
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new()
    }
}

/// A current-thread tokio runtime plus the `LocalSet` the host runs on.
pub struct HostRuntime {
    runtime: tokio::runtime::Runtime,
    local: LocalSet,
    host: Host,
}

impl HostRuntime {
    pub fn new() -> RaytrackResult<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                RaytrackError::resource_init(format!("Failed to build host runtime: {e}"))
            })?;

        Ok(Self {
            runtime,
            local: LocalSet::new(),
            host: Host::new(),
        })
    }

    pub fn host(&self) -> Host {
        self.host.clone()
    }

    /// Queue `task` to run on the host once the runtime is driven.
    pub fn spawn<F>(&self, task: F)
    where
        F: FnOnce(Host) -> CallbackResult + 'static,
    {
        let host = self.host.clone();
        self.local.spawn_local(async move {
            let errors = host.errors().clone();
            errors.dispatch(task(host));
        });
    }

    /// Queue a future to run on the host once the runtime is driven.
    pub fn spawn_future<F>(&self, future: F)
    where
        F: Future<Output = ()> + 'static,
    {
        self.local.spawn_local(future);
    }

    /// Drive the host until every task and timer has finished.
    ///
    /// A periodic timer that is never cleared keeps the host alive.
    pub fn run_until_idle(self) -> Host {
        let HostRuntime {
            runtime,
            local,
            host,
        } = self;
        runtime.block_on(local);
        host
    }
}
