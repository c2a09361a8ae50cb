//! Wires the pieces together: timer service, delivery dispatcher, service
//! host, players and the bridge.

use std::{
    io,
    sync::{Arc, Mutex},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, info};

use crate::{
    ambient::AmbientPlayer,
    attachment::UiAttachment,
    bridge::Bridge,
    config::Config,
    intent::{Intent, ACTION_ALARM_TRIGGER, ACTION_STOP_ALARM, ACTION_TIMER_TRIGGER},
    lock,
    platform::{
        rodio_backend::{AudioEvent, Channel},
        AudioFocus, AudioOutput, Notifier, Vibrator,
    },
    player::AlarmAudioPlayer,
    receiver::{AlarmReceiver, Dispatcher, ServiceCommandReceiver, TimerReceiver},
    scheduler::{Clock, TimerService},
    service::ServiceHost,
    trigger::{AlarmTrigger, TimerTrigger},
};

/// The queue fired and chosen intents travel on. The sending half is handed
/// to whatever produces intents (the timer service, notification actions).
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    pub sender: Sender<Intent>,
    pub receiver: Receiver<Intent>,
}

impl DeliveryQueue {
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        Self { sender, receiver }
    }
}

impl Default for DeliveryQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// The host-specific backends the daemon runs on.
#[derive(Debug)]
pub struct Platform {
    pub alarm_output: Box<dyn AudioOutput>,
    pub ambient_output: Box<dyn AudioOutput>,
    pub focus: Arc<dyn AudioFocus>,
    pub vibrator: Arc<dyn Vibrator>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug)]
pub struct Daemon {
    bridge: Arc<Bridge>,
    scheduler: Arc<TimerService>,
    host: Arc<ServiceHost>,
    ambient: Arc<Mutex<AmbientPlayer>>,
    attachment: UiAttachment,
}

impl Daemon {
    /// Builds the daemon and starts its timer and delivery threads.
    ///
    /// # Errors
    /// Fails if a thread can't be spawned.
    pub fn start(
        config: &Config,
        platform: Platform,
        clock: Arc<dyn Clock>,
        queue: DeliveryQueue,
    ) -> io::Result<Self> {
        let scheduler = Arc::new(TimerService::new(clock.clone(), queue.sender));
        scheduler.spawn()?;

        let attachment = UiAttachment::new();
        let player = Arc::new(Mutex::new(AlarmAudioPlayer::new(
            config.assets_dir.clone(),
            platform.alarm_output,
            platform.focus.clone(),
            platform.vibrator,
            config.permissions,
        )));
        let ambient = Arc::new(Mutex::new(AmbientPlayer::new(
            config.assets_dir.clone(),
            platform.ambient_output,
            platform.focus,
        )));
        let host = Arc::new(ServiceHost::new(
            player.clone(),
            platform.notifier.clone(),
            config,
        ));

        Dispatcher::new()
            .register(ACTION_ALARM_TRIGGER, AlarmReceiver::new(host.clone()))
            .register(
                ACTION_TIMER_TRIGGER,
                TimerReceiver::new(host.clone(), attachment.clone()),
            )
            .register(ACTION_STOP_ALARM, ServiceCommandReceiver::new(host.clone()))
            .spawn(queue.receiver)?;

        let bridge = Arc::new(Bridge::new(
            AlarmTrigger::new(scheduler.clone(), clock.clone()),
            TimerTrigger::new(scheduler.clone(), clock),
            player,
            ambient.clone(),
            host.clone(),
            platform.notifier,
            attachment.clone(),
            config.permissions,
        ));
        info!("daemon started (assets in {})", config.assets_dir.display());

        Ok(Self {
            bridge,
            scheduler,
            host,
            ambient,
            attachment,
        })
    }

    #[must_use]
    pub const fn bridge(&self) -> &Arc<Bridge> {
        &self.bridge
    }

    #[must_use]
    pub const fn scheduler(&self) -> &Arc<TimerService> {
        &self.scheduler
    }

    #[must_use]
    pub const fn host(&self) -> &Arc<ServiceHost> {
        &self.host
    }

    #[must_use]
    pub const fn attachment(&self) -> &UiAttachment {
        &self.attachment
    }

    /// Reacts to the audio thread reporting that a sound ran out.
    pub fn on_audio_event(&self, event: AudioEvent) {
        audio_event(&self.ambient, &self.attachment, event);
    }

    /// Forwards audio events on a thread of their own until the audio
    /// thread goes away.
    ///
    /// # Errors
    /// Fails if the thread can't be spawned.
    pub fn spawn_audio_events(&self, events: Receiver<AudioEvent>) -> io::Result<JoinHandle<()>> {
        let ambient = self.ambient.clone();
        let attachment = self.attachment.clone();
        thread::Builder::new()
            .name("lullaby-audio-events".to_string())
            .spawn(move || {
                for event in events {
                    audio_event(&ambient, &attachment, event);
                }
            })
    }
}

fn audio_event(ambient: &Mutex<AmbientPlayer>, attachment: &UiAttachment, event: AudioEvent) {
    match event {
        AudioEvent::Finished(Channel::Ambient, playback) => {
            let Some(file_name) = lock(ambient).on_completion(playback) else {
                return;
            };
            match attachment.current() {
                Some(surface) => surface.on_ambient_complete(&file_name),
                None => debug!("no ui attached for ambient completion of {file_name}"),
            }
        }
        AudioEvent::Finished(Channel::Alarm, _) => debug!("alarm sound ran out"),
    }
}
