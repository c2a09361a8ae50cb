//! The alarm service: a long-lived owner of the ringing alarm.
//!
//! While started it keeps a high-priority notification up whose dismiss
//! action routes back to [`ServiceHost`]. Destroying the service always
//! silences the alarm, including when it is dropped during unwinding.

use std::sync::{Arc, Mutex};

use log::{debug, info, warn};

use crate::{
    config::{Config, NotificationText},
    intent::{Intent, ACTION_START_ALARM_SERVICE, ACTION_STOP_ALARM, EXTRA_ENABLE_VIBRATION},
    lock,
    platform::{Notification, NotificationAction, Notifier, Priority},
    player::AlarmAudioPlayer,
    receiver::ServiceLauncher,
};

pub const NOTIFICATION_ID: u32 = 1;
pub const NOTIFICATION_CATEGORY: &str = "alarm";
pub const DISMISS_ACTION_KEY: &str = "dismiss";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Created,
    Started,
    Destroyed,
}

#[derive(Debug)]
pub struct AlarmService {
    state: ServiceState,
    player: Arc<Mutex<AlarmAudioPlayer>>,
    notifier: Arc<dyn Notifier>,
    alarm_sound: String,
    text: NotificationText,
}

impl AlarmService {
    #[must_use]
    pub fn on_create(
        player: Arc<Mutex<AlarmAudioPlayer>>,
        notifier: Arc<dyn Notifier>,
        alarm_sound: String,
        text: NotificationText,
    ) -> Self {
        debug!("alarm service created");
        Self {
            state: ServiceState::Created,
            player,
            notifier,
            alarm_sound,
            text,
        }
    }

    /// Goes to the foreground and rings. Returns whether playback started.
    pub fn on_start_command(&mut self, intent: &Intent) -> bool {
        let enable_vibration = intent.bool_extra(EXTRA_ENABLE_VIBRATION, true);
        if let Err(e) = self.notifier.notify(&self.notification()) {
            warn!("couldn't show the alarm notification: {e}");
        }
        self.state = ServiceState::Started;
        info!("alarm service started");
        lock(&self.player).play_alarm(&self.alarm_sound, enable_vibration)
    }

    /// Stops playback and drops the notification. Only the first call does
    /// anything.
    pub fn on_destroy(&mut self) {
        if self.state == ServiceState::Destroyed {
            return;
        }
        lock(&self.player).stop_alarm();
        self.notifier.cancel(NOTIFICATION_ID);
        self.state = ServiceState::Destroyed;
        info!("alarm service destroyed");
    }

    #[must_use]
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    fn notification(&self) -> Notification {
        Notification::new(NOTIFICATION_ID, &self.text.title, &self.text.body)
            .category(NOTIFICATION_CATEGORY)
            .priority(Priority::High)
            .action(NotificationAction {
                key: DISMISS_ACTION_KEY.to_string(),
                label: "Dismiss".to_string(),
                intent: Intent::new(ACTION_STOP_ALARM),
            })
    }
}

impl Drop for AlarmService {
    fn drop(&mut self) {
        self.on_destroy();
    }
}

/// Owns at most one [`AlarmService`] and routes start and stop intents to it.
#[derive(Debug)]
pub struct ServiceHost {
    service: Mutex<Option<AlarmService>>,
    player: Arc<Mutex<AlarmAudioPlayer>>,
    notifier: Arc<dyn Notifier>,
    alarm_sound: String,
    text: NotificationText,
}

impl ServiceHost {
    #[must_use]
    pub fn new(
        player: Arc<Mutex<AlarmAudioPlayer>>,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Self {
        Self {
            service: Mutex::new(None),
            player,
            notifier,
            alarm_sound: config.alarm_sound.clone(),
            text: config.notification.clone(),
        }
    }

    /// Destroys the running service. Returns `false` if none was running.
    pub fn stop_service(&self) -> bool {
        let service = lock(&self.service).take();
        service.map_or(false, |mut service| {
            service.on_destroy();
            true
        })
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state() == Some(ServiceState::Started)
    }

    #[must_use]
    pub fn state(&self) -> Option<ServiceState> {
        lock(&self.service).as_ref().map(AlarmService::state)
    }
}

impl ServiceLauncher for ServiceHost {
    fn start_foreground_service(&self, intent: Intent) {
        if intent.has_action(ACTION_STOP_ALARM) {
            if !self.stop_service() {
                debug!("dismiss with no alarm service running");
            }
            return;
        }
        if !intent.has_action(ACTION_START_ALARM_SERVICE) {
            warn!("alarm service ignoring {:?}", intent.action());
            return;
        }
        let mut service = lock(&self.service);
        let service = service.get_or_insert_with(|| {
            AlarmService::on_create(
                self.player.clone(),
                self.notifier.clone(),
                self.alarm_sound.clone(),
                self.text.clone(),
            )
        });
        if !service.on_start_command(&intent) {
            warn!("alarm service started but nothing is ringing");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::{
        config::Permissions,
        platform::tests::{FakeFocus, FakeNotifier, FakeOutput, FakeVibrator},
        receiver::alarm_service_intent,
        sound::SoundSource,
    };

    struct Rig {
        output: FakeOutput,
        vibrator: Arc<FakeVibrator>,
        notifier: Arc<FakeNotifier>,
        player: Arc<Mutex<AlarmAudioPlayer>>,
        host: ServiceHost,
    }

    fn setup(notifier: FakeNotifier) -> Rig {
        let output = FakeOutput::with_files(&["/assets/sounds/3.mp3"]);
        let vibrator = Arc::new(FakeVibrator::default());
        let notifier = Arc::new(notifier);
        let player = Arc::new(Mutex::new(AlarmAudioPlayer::new(
            PathBuf::from("/assets"),
            Box::new(output.clone()),
            Arc::new(FakeFocus::default()),
            vibrator.clone(),
            Permissions::default(),
        )));
        let host = ServiceHost::new(player.clone(), notifier.clone(), &Config::default());
        Rig {
            output,
            vibrator,
            notifier,
            player,
            host,
        }
    }

    #[test]
    fn start_notifies_then_rings_configured_sound() {
        let rig = setup(FakeNotifier::default());
        rig.host.start_foreground_service(alarm_service_intent(true));

        assert!(rig.host.is_running());
        assert!(lock(&rig.player).is_playing());
        assert_eq!(
            lock(&rig.player).session().unwrap().source,
            SoundSource::File(PathBuf::from("/assets/sounds/3.mp3"))
        );
        assert_eq!(lock(&rig.vibrator.waveforms).len(), 1);

        let shown = lock(&rig.notifier.shown);
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0].id, NOTIFICATION_ID);
        assert_eq!(shown[0].priority, Priority::High);
        assert_eq!(shown[0].category.as_deref(), Some(NOTIFICATION_CATEGORY));
        assert!(shown[0].actions[0].intent.has_action(ACTION_STOP_ALARM));
    }

    #[test]
    fn restart_reuses_the_running_service() {
        let rig = setup(FakeNotifier::default());
        rig.host.start_foreground_service(alarm_service_intent(true));
        rig.host.start_foreground_service(alarm_service_intent(false));
        assert!(rig.host.is_running());
        assert_eq!(lock(&rig.player).session().unwrap().vibration, None);
        assert!(lock(&rig.notifier.cancelled).is_empty());
    }

    #[test]
    fn dismiss_action_stops_everything() {
        let rig = setup(FakeNotifier::default());
        rig.host.start_foreground_service(alarm_service_intent(true));
        let dismiss = lock(&rig.notifier.shown)[0].actions[0].intent.clone();
        rig.host.start_foreground_service(dismiss);

        assert!(!rig.host.is_running());
        assert_eq!(rig.host.state(), None);
        assert!(!lock(&rig.player).is_playing());
        assert_eq!(*lock(&rig.notifier.cancelled), vec![NOTIFICATION_ID]);
        assert!(!rig.host.stop_service());
    }

    #[test]
    fn refused_notification_still_rings() {
        let rig = setup(FakeNotifier {
            refuse: true,
            ..FakeNotifier::default()
        });
        rig.host.start_foreground_service(alarm_service_intent(false));
        assert!(rig.host.is_running());
        assert!(lock(&rig.player).is_playing());
    }

    #[test]
    fn dropping_the_host_silences_the_alarm() {
        let rig = setup(FakeNotifier::default());
        rig.host.start_foreground_service(alarm_service_intent(true));
        let Rig {
            output,
            vibrator,
            host,
            ..
        } = rig;
        drop(host);
        assert!(!output.state().playing);
        assert!(vibrator.cancel_count() >= 2);
    }

    #[test]
    fn destroy_runs_once() {
        let rig = setup(FakeNotifier::default());
        let mut service = AlarmService::on_create(
            rig.player.clone(),
            rig.notifier.clone(),
            "sounds/3.mp3".to_string(),
            NotificationText::default(),
        );
        assert_eq!(service.state(), ServiceState::Created);
        assert!(service.on_start_command(&alarm_service_intent(true)));
        assert_eq!(service.state(), ServiceState::Started);
        service.on_destroy();
        service.on_destroy();
        drop(service);
        assert_eq!(*lock(&rig.notifier.cancelled), vec![NOTIFICATION_ID]);
    }

    #[test]
    fn foreign_intents_do_not_start_the_service() {
        let rig = setup(FakeNotifier::default());
        rig.host
            .start_foreground_service(Intent::new(crate::intent::ACTION_ALARM_TRIGGER));
        assert_eq!(rig.host.state(), None);
        assert!(rig.output.state().started.is_empty());
    }
}
