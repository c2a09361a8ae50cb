//! Platform backends for a desktop session: desktop notifications through
//! `notify-rust`, an in-process audio focus arbiter, and no vibration motor.

use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    thread,
};

use crossbeam_channel::Sender;
use log::{debug, info, warn};

use crate::{
    error::{NotifyError, VibrationError},
    intent::Intent,
    lock,
    platform::{
        AudioFocus, AudioStream, FocusGain, Notification, Notifier, Priority, Vibrator, Waveform,
    },
};

/// Desktops have no vibration motor.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoVibrator;

impl Vibrator for NoVibrator {
    fn has_vibrator(&self) -> bool {
        false
    }

    fn vibrate(&self, _: &Waveform) -> Result<(), VibrationError> {
        Err(VibrationError::NoVibrator)
    }

    fn cancel(&self) {}
}

/// Grants focus to whoever asks last. There is no system-wide arbiter on a
/// desktop, so this only keeps the daemon's own streams in order.
#[derive(Debug, Default)]
pub struct FocusArbiter {
    holder: Mutex<Option<(AudioStream, FocusGain)>>,
}

impl FocusArbiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn holder(&self) -> Option<AudioStream> {
        lock(&self.holder).map(|(stream, _)| stream)
    }
}

impl AudioFocus for FocusArbiter {
    fn request(&self, stream: AudioStream, gain: FocusGain) -> bool {
        let previous = lock(&self.holder).replace((stream, gain));
        if let Some((other, _)) = previous.filter(|(other, _)| *other != stream) {
            debug!("{stream:?} takes audio focus from {other:?}");
        }
        true
    }

    fn abandon(&self, stream: AudioStream) {
        let mut holder = lock(&self.holder);
        if holder.is_some_and(|(current, _)| current == stream) {
            *holder = None;
        }
    }
}

/// Notification ids that have a thread waiting for the user to pick one of
/// their actions.
#[derive(Debug, Default, Clone)]
struct ActionWatchers(Arc<Mutex<HashSet<u32>>>);

/// Held by the waiting thread; releases the id when the wait ends.
#[derive(Debug)]
struct WatchGuard {
    watchers: ActionWatchers,
    id: u32,
}

#[cfg_attr(not(all(unix, not(target_os = "macos"))), allow(dead_code))]
impl ActionWatchers {
    /// `None` while another thread is already waiting on `id`.
    fn claim(&self, id: u32) -> Option<WatchGuard> {
        lock(&self.0).insert(id).then(|| WatchGuard {
            watchers: self.clone(),
            id,
        })
    }
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        lock(&self.watchers.0).remove(&self.id);
    }
}

/// Shows notifications on the freedesktop notification bus (or whatever
/// `notify-rust` uses on this platform). Chosen actions are delivered as
/// intents on `actions`.
#[derive(Debug)]
pub struct DesktopNotifier {
    app_name: String,
    permitted: bool,
    actions: Sender<Intent>,
    watchers: ActionWatchers,
}

impl DesktopNotifier {
    #[must_use]
    pub fn new(app_name: impl Into<String>, permitted: bool, actions: Sender<Intent>) -> Self {
        Self {
            app_name: app_name.into(),
            permitted,
            actions,
            watchers: ActionWatchers::default(),
        }
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        if !self.permitted {
            return Err(NotifyError::PermissionDenied);
        }
        let mut shown = notify_rust::Notification::new();
        shown
            .summary(&notification.title)
            .body(&notification.body)
            .appname(&self.app_name)
            .icon("alarm-clock");
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            shown.id(notification.id);
            if notification.priority == Priority::High {
                shown
                    .urgency(notify_rust::Urgency::Critical)
                    .timeout(notify_rust::Timeout::Never);
            }
            if let Some(category) = &notification.category {
                shown.hint(notify_rust::Hint::Category(category.clone()));
            }
            for action in &notification.actions {
                shown.action(&action.key, &action.label);
            }
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        if notification.priority == Priority::High {
            debug!("notification priority not supported here");
        }

        let handle = shown
            .show()
            .map_err(|e| NotifyError::Backend(e.to_string()))?;

        #[cfg(all(unix, not(target_os = "macos")))]
        if !notification.actions.is_empty() {
            let id = notification.id;
            // a replaced notification keeps its id, so the thread already
            // waiting on it hears the new one's actions too
            let Some(guard) = self.watchers.claim(id) else {
                debug!("already watching notification {id} for actions");
                return Ok(());
            };
            let actions = notification.actions.clone();
            let sender = self.actions.clone();
            let spawned = thread::Builder::new()
                .name(format!("lullaby-notification-{id}"))
                .spawn(move || {
                    let _guard = guard;
                    handle.wait_for_action(|chosen| {
                        match actions.iter().find(|action| action.key == chosen) {
                            Some(action) => {
                                info!("notification {id}: {} chosen", action.label);
                                if sender.send(action.intent.clone()).is_err() {
                                    warn!("delivery queue closed, dropping notification action");
                                }
                            }
                            None => debug!("notification {id} closed ({chosen})"),
                        }
                    });
                });
            if let Err(e) = spawned {
                warn!("couldn't watch notification actions: {e}");
            }
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        {
            let _ = (handle, &self.actions, &self.watchers);
            if !notification.actions.is_empty() {
                debug!("notification actions not supported here");
            }
        }
        Ok(())
    }

    fn cancel(&self, id: u32) {
        if !self.permitted {
            return;
        }
        // replacing the notification by id is the only portable way to retract it
        #[cfg(all(unix, not(target_os = "macos")))]
        {
            let result = notify_rust::Notification::new()
                .id(id)
                .summary("Alarm dismissed")
                .appname(&self.app_name)
                .icon("alarm-clock")
                .timeout(notify_rust::Timeout::Milliseconds(1500))
                .show();
            if let Err(e) = result {
                debug!("couldn't retract notification {id}: {e}");
            }
        }
        #[cfg(not(all(unix, not(target_os = "macos"))))]
        debug!("notification {id} left for the user to close");
    }
}
