//! The UI attachment: a weak, nullable handle to whichever UI surface is
//! currently visible. The delivery path reads it; the UI lifecycle sets and
//! clears it. Nothing here keeps a UI alive.

use std::{
    fmt,
    sync::{Arc, Mutex, Weak},
};

use log::debug;

use crate::lock;

/// Callbacks the daemon makes into the UI. Delivery is fire-and-forget.
pub trait UiSurface: Send + Sync {
    fn on_timer_complete(&self, enable_alarm: bool, timer_duration_minutes: i32);

    fn on_ambient_complete(&self, file_name: &str);
}

#[derive(Clone, Default)]
pub struct UiAttachment {
    slot: Arc<Mutex<Option<Weak<dyn UiSurface>>>>,
}

impl fmt::Debug for UiAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiAttachment")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl UiAttachment {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever surface was attached before.
    pub fn attach(&self, surface: &Arc<dyn UiSurface>) {
        *lock(&self.slot) = Some(Arc::downgrade(surface));
        debug!("ui attached");
    }

    pub fn detach(&self) {
        *lock(&self.slot) = None;
        debug!("ui detached");
    }

    /// Detaches only if `surface` is the one attached, so a stale surface
    /// going away can't clear a newer attachment.
    pub fn detach_if(&self, surface: &Arc<dyn UiSurface>) {
        let mut slot = lock(&self.slot);
        let attached = slot
            .as_ref()
            .is_some_and(|weak| std::ptr::addr_eq(weak.as_ptr(), Arc::as_ptr(surface)));
        if attached {
            *slot = None;
            debug!("ui detached");
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Arc<dyn UiSurface>> {
        lock(&self.slot).as_ref().and_then(Weak::upgrade)
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.current().is_some()
    }
}
