//! The seams between the daemon and the machine it runs on.
//!
//! Everything the players and the service touch on the host (the audio
//! device, audio focus, a vibration motor, the notification tray) sits behind
//! one of these traits, so the delivery path can be driven by fakes in tests.

use std::path::Path;

use crate::{
    error::{AudioError, NotifyError, VibrationError},
    intent::Intent,
    sound::SoundSource,
};

pub mod desktop;
pub mod rodio_backend;

/// Tells one started sound apart from every other start on the same output.
pub type PlaybackId = u64;

/// One playback channel of an audio device.
pub trait AudioOutput: Send + std::fmt::Debug {
    /// Checks that `path` exists and decodes, without playing it.
    ///
    /// # Errors
    /// The reason the file can't be played.
    fn probe(&self, path: &Path) -> Result<(), AudioError>;

    /// Replaces whatever this channel was playing. The returned id is the
    /// one a later completion report for this sound carries.
    ///
    /// # Errors
    /// Fails if the source can't be opened or the device is gone.
    fn start(
        &mut self,
        source: &SoundSource,
        volume: f32,
        looping: bool,
    ) -> Result<PlaybackId, AudioError>;

    /// Stopping a silent channel is not an error.
    ///
    /// # Errors
    /// Fails only if the device is gone.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// # Errors
    /// Fails only if the device is gone.
    fn pause(&mut self) -> Result<(), AudioError>;

    /// # Errors
    /// Fails only if the device is gone.
    fn resume(&mut self) -> Result<(), AudioError>;

    /// # Errors
    /// Fails only if the device is gone.
    fn is_playing(&self) -> Result<bool, AudioError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioStream {
    Alarm,
    Music,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusGain {
    Gain,
    GainTransient,
}

pub trait AudioFocus: Send + Sync + std::fmt::Debug {
    /// Returns whether focus was granted.
    fn request(&self, stream: AudioStream, gain: FocusGain) -> bool;

    fn abandon(&self, stream: AudioStream);
}

/// Alternating off/on durations in milliseconds, starting with "off".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waveform {
    pub timings: Vec<u64>,
    /// Index to loop back to after the last timing, or `None` for one shot.
    pub repeat: Option<usize>,
}

impl Waveform {
    #[must_use]
    pub fn repeating(timings: &[u64], repeat: usize) -> Self {
        Self {
            timings: timings.to_vec(),
            repeat: Some(repeat),
        }
    }

    #[must_use]
    pub fn one_shot(timings: &[u64]) -> Self {
        Self {
            timings: timings.to_vec(),
            repeat: None,
        }
    }
}

pub trait Vibrator: Send + Sync + std::fmt::Debug {
    fn has_vibrator(&self) -> bool;

    /// # Errors
    /// Fails if there is no device or the device refuses.
    fn vibrate(&self, waveform: &Waveform) -> Result<(), VibrationError>;

    /// Cancelling an idle vibrator is not an error.
    fn cancel(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Default,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationAction {
    pub key: String,
    pub label: String,
    /// Delivered when the action is chosen.
    pub intent: Intent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u32,
    pub title: String,
    pub body: String,
    pub category: Option<String>,
    pub priority: Priority,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    #[must_use]
    pub fn new(id: u32, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            body: body.into(),
            category: None,
            priority: Priority::Default,
            actions: Vec::new(),
        }
    }

    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    #[must_use]
    pub const fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn action(mut self, action: NotificationAction) -> Self {
        self.actions.push(action);
        self
    }
}

pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Shows `notification`, replacing one already shown with the same id.
    ///
    /// # Errors
    /// Fails if notifications aren't permitted or the backend refuses.
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Best effort; not every backend can retract a notification.
    fn cancel(&self, id: u32);
}
