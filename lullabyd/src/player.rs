//! The alarm audio player: at most one looping alarm session, with optional
//! vibration. Nothing in here returns an error to its caller; failures are
//! logged and reported as `false`.

use std::{path::PathBuf, sync::Arc};

use log::{debug, error, info, warn};

use crate::{
    config::Permissions,
    platform::{AudioFocus, AudioOutput, AudioStream, FocusGain, Vibrator, Waveform},
    sound::{locate, SoundSource, ALARM_SOUND_RESOLVERS},
};

/// Off/on timings of the alarm vibration, repeated from the start.
pub const ALARM_VIBRATION_PATTERN: [u64; 5] = [0, 500, 500, 500, 500];
pub const TEST_VIBRATION_PATTERN: [u64; 4] = [0, 500, 200, 500];

const ALARM_VOLUME: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSession {
    pub source: SoundSource,
    pub looping: bool,
    /// The waveform the vibrator was started with, if it was.
    pub vibration: Option<Waveform>,
}

#[derive(Debug)]
pub struct AlarmAudioPlayer {
    assets_dir: PathBuf,
    output: Box<dyn AudioOutput>,
    focus: Arc<dyn AudioFocus>,
    vibrator: Arc<dyn Vibrator>,
    permissions: Permissions,
    session: Option<PlaybackSession>,
}

impl AlarmAudioPlayer {
    #[must_use]
    pub fn new(
        assets_dir: PathBuf,
        output: Box<dyn AudioOutput>,
        focus: Arc<dyn AudioFocus>,
        vibrator: Arc<dyn Vibrator>,
        permissions: Permissions,
    ) -> Self {
        Self {
            assets_dir,
            output,
            focus,
            vibrator,
            permissions,
            session: None,
        }
    }

    /// Starts a looping alarm, replacing any alarm already sounding.
    ///
    /// `selector` is looked up under the assets directory; when it can't be
    /// found or played, the system alarm sound plays instead.
    pub fn play_alarm(&mut self, selector: &str, enable_vibration: bool) -> bool {
        self.stop_alarm();

        if !self
            .focus
            .request(AudioStream::Alarm, FocusGain::GainTransient)
        {
            warn!("audio focus refused, ringing anyway");
        }

        let Some(source) = self.start(selector) else {
            self.focus.abandon(AudioStream::Alarm);
            return false;
        };
        let vibration = if enable_vibration {
            self.start_vibration()
        } else {
            None
        };
        info!(
            "alarm ringing ({source:?}, vibration {})",
            vibration.is_some()
        );
        self.session = Some(PlaybackSession {
            source,
            looping: true,
            vibration,
        });
        true
    }

    fn start(&mut self, selector: &str) -> Option<SoundSource> {
        let selected = locate(
            &*self.output,
            &self.assets_dir,
            selector,
            &ALARM_SOUND_RESOLVERS,
        );
        if let Some(path) = selected {
            let source = SoundSource::File(path);
            match self.output.start(&source, ALARM_VOLUME, true) {
                Ok(_) => return Some(source),
                Err(e) => warn!("couldn't play {selector}: {e}"),
            }
        } else if !selector.trim().is_empty() {
            warn!("alarm sound {selector} not found under {}", self.assets_dir.display());
        }

        match self
            .output
            .start(&SoundSource::SystemDefault, ALARM_VOLUME, true)
        {
            Ok(_) => Some(SoundSource::SystemDefault),
            Err(e) => {
                error!("couldn't play the default alarm sound either: {e}");
                None
            }
        }
    }

    fn start_vibration(&self) -> Option<Waveform> {
        if !self.permissions.vibrate {
            warn!("vibration not permitted");
            return None;
        }
        if !self.vibrator.has_vibrator() {
            debug!("no vibrator, ringing without vibration");
            return None;
        }
        let waveform = Waveform::repeating(&ALARM_VIBRATION_PATTERN, 0);
        match self.vibrator.vibrate(&waveform) {
            Ok(()) => Some(waveform),
            Err(e) => {
                warn!("couldn't start vibration: {e}");
                None
            }
        }
    }

    /// Silences the alarm. Safe to call when nothing is ringing.
    pub fn stop_alarm(&mut self) -> bool {
        let stopped = match self.output.stop() {
            Ok(()) => true,
            Err(e) => {
                error!("couldn't stop alarm playback: {e}");
                false
            }
        };
        self.vibrator.cancel();
        self.focus.abandon(AudioStream::Alarm);
        if self.session.take().is_some() {
            info!("alarm stopped");
        }
        stopped
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.session.is_some()
            && self.output.is_playing().unwrap_or_else(|e| {
                warn!("couldn't query alarm playback: {e}");
                false
            })
    }

    /// A short buzz so the user can feel what the alarm will do. Leaves any
    /// ringing alarm alone.
    #[must_use]
    pub fn test_vibration(&self) -> bool {
        if !self.permissions.vibrate {
            warn!("vibration not permitted");
            return false;
        }
        if !self.vibrator.has_vibrator() {
            debug!("no vibrator to test");
            return false;
        }
        match self
            .vibrator
            .vibrate(&Waveform::one_shot(&TEST_VIBRATION_PATTERN))
        {
            Ok(()) => true,
            Err(e) => {
                warn!("test vibration failed: {e}");
                false
            }
        }
    }

    #[must_use]
    pub const fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lock,
        platform::tests::{FakeFocus, FakeOutput, FakeVibrator},
    };

    struct Rig {
        output: FakeOutput,
        focus: Arc<FakeFocus>,
        vibrator: Arc<FakeVibrator>,
        player: AlarmAudioPlayer,
    }

    fn setup(files: &[&str], vibrator: FakeVibrator, permissions: Permissions) -> Rig {
        let output = FakeOutput::with_files(files);
        let focus = Arc::new(FakeFocus::default());
        let vibrator = Arc::new(vibrator);
        let player = AlarmAudioPlayer::new(
            PathBuf::from("/assets"),
            Box::new(output.clone()),
            focus.clone(),
            vibrator.clone(),
            permissions,
        );
        Rig {
            output,
            focus,
            vibrator,
            player,
        }
    }

    #[test]
    fn plays_selected_sound_looping_with_vibration() {
        let mut rig = setup(
            &["/assets/sounds/3.mp3"],
            FakeVibrator::default(),
            Permissions::default(),
        );
        assert!(rig.player.play_alarm("3.mp3", true));
        assert!(rig.player.is_playing());

        let session = rig.player.session().unwrap();
        assert_eq!(
            session.source,
            SoundSource::File(PathBuf::from("/assets/sounds/3.mp3"))
        );
        assert!(session.looping);
        assert_eq!(
            session.vibration,
            Some(Waveform::repeating(&ALARM_VIBRATION_PATTERN, 0))
        );
        assert_eq!(
            *lock(&rig.focus.requests),
            vec![(AudioStream::Alarm, FocusGain::GainTransient)]
        );
        assert!(rig.output.state().started.iter().all(|(_, _, looping)| *looping));
    }

    #[test]
    fn refused_focus_still_rings() {
        let output = FakeOutput::with_files(&["/assets/sounds/3.mp3"]);
        let focus = Arc::new(FakeFocus {
            deny: true,
            ..FakeFocus::default()
        });
        let vibrator = Arc::new(FakeVibrator::default());
        let mut player = AlarmAudioPlayer::new(
            PathBuf::from("/assets"),
            Box::new(output.clone()),
            focus.clone(),
            vibrator.clone(),
            Permissions::default(),
        );

        assert!(player.play_alarm("3.mp3", true));
        assert!(player.is_playing());
        assert_eq!(lock(&focus.requests).len(), 1);
        assert_eq!(
            output.state().started[0].0,
            SoundSource::File(PathBuf::from("/assets/sounds/3.mp3"))
        );
        assert_eq!(lock(&vibrator.waveforms).len(), 1);
    }

    #[test]
    fn missing_sound_falls_back_to_system_default() {
        let mut rig = setup(&[], FakeVibrator::default(), Permissions::default());
        assert!(rig.player.play_alarm("nope.mp3", false));
        assert_eq!(
            rig.player.session().unwrap().source,
            SoundSource::SystemDefault
        );
        assert_eq!(rig.player.session().unwrap().vibration, None);
        assert!(lock(&rig.vibrator.waveforms).is_empty());
    }

    #[test]
    fn empty_selector_plays_default() {
        let mut rig = setup(&[], FakeVibrator::default(), Permissions::default());
        assert!(rig.player.play_alarm("", false));
        assert_eq!(
            rig.player.session().unwrap().source,
            SoundSource::SystemDefault
        );
    }

    #[test]
    fn nothing_playable_reports_false() {
        let mut rig = setup(&[], FakeVibrator::default(), Permissions::default());
        rig.output.state().default_broken = true;
        assert!(!rig.player.play_alarm("nope.mp3", true));
        assert!(!rig.player.is_playing());
        assert!(rig.player.session().is_none());
        assert_eq!(*lock(&rig.focus.abandoned).last().unwrap(), AudioStream::Alarm);
    }

    #[test]
    fn second_play_replaces_the_first() {
        let mut rig = setup(
            &["/assets/a.mp3", "/assets/b.mp3"],
            FakeVibrator::default(),
            Permissions::default(),
        );
        assert!(rig.player.play_alarm("a.mp3", true));
        assert!(rig.player.play_alarm("b.mp3", true));
        assert_eq!(
            rig.player.session().unwrap().source,
            SoundSource::File(PathBuf::from("/assets/b.mp3"))
        );
        // the first session was torn down before the second started
        assert!(rig.output.state().stops >= 2);
        assert!(rig.vibrator.cancel_count() >= 2);
    }

    #[test]
    fn stop_is_idempotent() {
        let mut rig = setup(&["/assets/a.mp3"], FakeVibrator::default(), Permissions::default());
        assert!(rig.player.stop_alarm());
        assert!(rig.player.play_alarm("a.mp3", true));
        assert!(rig.player.stop_alarm());
        assert!(rig.player.stop_alarm());
        assert!(!rig.player.is_playing());
        assert!(rig.player.session().is_none());
        assert_eq!(rig.vibrator.cancel_count(), 4);
    }

    #[test]
    fn vibration_needs_device_and_permission() {
        let mut rig = setup(&["/assets/a.mp3"], FakeVibrator::absent(), Permissions::default());
        assert!(rig.player.play_alarm("a.mp3", true));
        assert_eq!(rig.player.session().unwrap().vibration, None);
        assert!(!rig.player.test_vibration());

        let denied = Permissions {
            vibrate: false,
            ..Permissions::default()
        };
        let mut rig = setup(&["/assets/a.mp3"], FakeVibrator::default(), denied);
        assert!(rig.player.play_alarm("a.mp3", true));
        assert_eq!(rig.player.session().unwrap().vibration, None);
        assert!(!rig.player.test_vibration());
        assert!(lock(&rig.vibrator.waveforms).is_empty());
    }

    #[test]
    fn test_vibration_leaves_session_alone() {
        let mut rig = setup(&["/assets/a.mp3"], FakeVibrator::default(), Permissions::default());
        assert!(rig.player.play_alarm("a.mp3", false));
        assert!(rig.player.test_vibration());
        assert!(rig.player.is_playing());
        assert_eq!(
            *lock(&rig.vibrator.waveforms),
            vec![Waveform::one_shot(&TEST_VIBRATION_PATTERN)]
        );
    }

    #[test]
    fn broken_vibrator_is_reported() {
        let vibrator = FakeVibrator {
            broken: true,
            ..FakeVibrator::default()
        };
        let mut rig = setup(&["/assets/a.mp3"], vibrator, Permissions::default());
        assert!(!rig.player.test_vibration());
        // the alarm still rings
        assert!(rig.player.play_alarm("a.mp3", true));
        assert_eq!(rig.player.session().unwrap().vibration, None);
    }

    #[test]
    fn is_playing_survives_a_dead_output() {
        let mut rig = setup(&["/assets/a.mp3"], FakeVibrator::default(), Permissions::default());
        assert!(rig.player.play_alarm("a.mp3", false));
        rig.output.state().gone = true;
        assert!(!rig.player.is_playing());
    }
}
