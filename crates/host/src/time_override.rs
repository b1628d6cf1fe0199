//! Scoped replacement of the host's time primitives.

use std::rc::Rc;

use raytrack_common::error::{RaytrackError, RaytrackResult};

use crate::host::Host;
use crate::source::TimeSource;

/// Exclusive hold on a host's time sources.
///
/// While the guard is alive every host call is answered by the replacement.
/// Releasing (explicitly or by dropping the guard) reinstalls exactly the
/// source that was installed at acquire time.
pub struct TimeSourceOverride {
    host: Host,
    original: Rc<dyn TimeSource>,
    active: bool,
}

impl TimeSourceOverride {
    /// Install `replacement` on `host`.
    ///
    /// Fails with [`RaytrackError::OverrideActive`] if another guard already
    /// holds the host.
    pub fn acquire(host: &Host, replacement: Rc<dyn TimeSource>) -> RaytrackResult<Self> {
        if host.is_overridden() {
            return Err(RaytrackError::OverrideActive);
        }
        let original = host.install(replacement);
        host.set_overridden(true);
        tracing::debug!("Host time sources overridden");

        Ok(Self {
            host: host.clone(),
            original,
            active: true,
        })
    }

    /// The source that was installed before this guard took over.
    pub fn original(&self) -> Rc<dyn TimeSource> {
        Rc::clone(&self.original)
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Restore the original source.
    pub fn release(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        if !self.active {
            return;
        }
        self.host.install(Rc::clone(&self.original));
        self.host.set_overridden(false);
        self.active = false;
        tracing::debug!("Host time sources restored");
    }
}

impl Drop for TimeSourceOverride {
    fn drop(&mut self) {
        self.restore();
    }
}
