//! The ambient player: background sound for a meditation session, on its
//! own channel so it can play underneath an alarm.

use std::{path::PathBuf, sync::Arc};

use log::{debug, info, warn};

use crate::{
    platform::{AudioFocus, AudioOutput, AudioStream, FocusGain, PlaybackId},
    sound::{locate, SoundSource, AMBIENT_SOUND_RESOLVERS},
};

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientSession {
    pub playback: PlaybackId,
    pub file_name: String,
    pub path: PathBuf,
    pub volume: f32,
    pub looping: bool,
    pub paused: bool,
}

#[derive(Debug)]
pub struct AmbientPlayer {
    assets_dir: PathBuf,
    output: Box<dyn AudioOutput>,
    focus: Arc<dyn AudioFocus>,
    session: Option<AmbientSession>,
}

/// Clamps to `0.0..=1.0`; anything that isn't a number plays at full volume.
fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        1.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

impl AmbientPlayer {
    #[must_use]
    pub fn new(
        assets_dir: PathBuf,
        output: Box<dyn AudioOutput>,
        focus: Arc<dyn AudioFocus>,
    ) -> Self {
        Self {
            assets_dir,
            output,
            focus,
            session: None,
        }
    }

    /// Plays `file_name`, replacing whatever was playing. There is no
    /// fallback sound: a file that can't be found or played gives `false`.
    pub fn play(&mut self, file_name: &str, volume: f32, looping: bool) -> bool {
        self.stop();
        let Some(path) = locate(
            &*self.output,
            &self.assets_dir,
            file_name,
            &AMBIENT_SOUND_RESOLVERS,
        ) else {
            warn!("ambient sound {file_name} not found under {}", self.assets_dir.display());
            return false;
        };

        if !self.focus.request(AudioStream::Music, FocusGain::Gain) {
            warn!("audio focus refused, playing anyway");
        }
        let volume = clamp_volume(volume);
        let playback = match self
            .output
            .start(&SoundSource::File(path.clone()), volume, looping)
        {
            Ok(playback) => playback,
            Err(e) => {
                warn!("couldn't play ambient sound {file_name}: {e}");
                self.focus.abandon(AudioStream::Music);
                return false;
            }
        };
        info!("playing {file_name} (volume {volume}, looping {looping})");
        self.session = Some(AmbientSession {
            playback,
            file_name: file_name.to_string(),
            path,
            volume,
            looping,
            paused: false,
        });
        true
    }

    pub fn stop(&mut self) -> bool {
        let stopped = match self.output.stop() {
            Ok(()) => true,
            Err(e) => {
                warn!("couldn't stop ambient playback: {e}");
                false
            }
        };
        if let Some(session) = self.session.take() {
            debug!("stopped {}", session.file_name);
            self.focus.abandon(AudioStream::Music);
        }
        stopped
    }

    /// `false` when nothing is playing.
    pub fn pause(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match self.output.pause() {
            Ok(()) => {
                session.paused = true;
                true
            }
            Err(e) => {
                warn!("couldn't pause ambient playback: {e}");
                false
            }
        }
    }

    /// `false` when nothing was paused or playing.
    pub fn resume(&mut self) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        match self.output.resume() {
            Ok(()) => {
                session.paused = false;
                true
            }
            Err(e) => {
                warn!("couldn't resume ambient playback: {e}");
                false
            }
        }
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.session.as_ref().is_some_and(|session| !session.paused)
            && self.output.is_playing().unwrap_or_else(|e| {
                warn!("couldn't query ambient playback: {e}");
                false
            })
    }

    /// Called when the output reports that `playback` ran out. Ends the
    /// session if it is the one playing `playback` and doesn't loop, and
    /// returns the name of the file that finished.
    pub fn on_completion(&mut self, playback: PlaybackId) -> Option<String> {
        let current = self.session.as_ref()?;
        if current.playback != playback {
            debug!("ignoring completion of {playback}, {} is playing", current.playback);
            return None;
        }
        if current.looping {
            debug!("ignoring completion of a looping ambient sound");
            return None;
        }
        let session = self.session.take()?;
        self.focus.abandon(AudioStream::Music);
        info!("{} finished", session.file_name);
        Some(session.file_name)
    }

    #[must_use]
    pub const fn session(&self) -> Option<&AmbientSession> {
        self.session.as_ref()
    }
}
