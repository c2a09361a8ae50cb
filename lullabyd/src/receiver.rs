//! Delivery receivers and the dispatcher that routes fired intents to them.
//!
//! Receivers run on the dispatcher thread and must stay short: they read the
//! intent, maybe poke the UI attachment, and ask the service launcher to start
//! the alarm service. All real work happens in the service.

use std::{
    fmt, io,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
};

use crossbeam_channel::Receiver;
use log::{debug, error, info, warn};

use crate::{
    attachment::UiAttachment,
    intent::{
        Intent, ACTION_ALARM_TRIGGER, ACTION_START_ALARM_SERVICE, ACTION_STOP_ALARM,
        ACTION_TIMER_TRIGGER, EXTRA_ENABLE_ALARM, EXTRA_ENABLE_VIBRATION, EXTRA_TIMER_DURATION,
    },
};

pub trait BroadcastReceiver: Send {
    fn on_receive(&self, intent: &Intent);
}

/// Starts (or commands) the alarm service on behalf of a receiver.
pub trait ServiceLauncher: Send + Sync + fmt::Debug {
    fn start_foreground_service(&self, intent: Intent);
}

/// The intent that starts the alarm service.
#[must_use]
pub fn alarm_service_intent(enable_vibration: bool) -> Intent {
    Intent::new(ACTION_START_ALARM_SERVICE).with_bool(EXTRA_ENABLE_VIBRATION, enable_vibration)
}

#[derive(Debug)]
pub struct AlarmReceiver {
    launcher: Arc<dyn ServiceLauncher>,
}

impl AlarmReceiver {
    #[must_use]
    pub fn new(launcher: Arc<dyn ServiceLauncher>) -> Self {
        Self { launcher }
    }
}

impl BroadcastReceiver for AlarmReceiver {
    fn on_receive(&self, intent: &Intent) {
        if !intent.has_action(ACTION_ALARM_TRIGGER) {
            debug!("alarm receiver ignoring {:?}", intent.action());
            return;
        }
        let enable_vibration = intent.bool_extra(EXTRA_ENABLE_VIBRATION, true);
        info!("alarm time reached, starting alarm service");
        self.launcher
            .start_foreground_service(alarm_service_intent(enable_vibration));
    }
}

#[derive(Debug)]
pub struct TimerReceiver {
    launcher: Arc<dyn ServiceLauncher>,
    attachment: UiAttachment,
}

impl TimerReceiver {
    #[must_use]
    pub fn new(launcher: Arc<dyn ServiceLauncher>, attachment: UiAttachment) -> Self {
        Self {
            launcher,
            attachment,
        }
    }
}

impl BroadcastReceiver for TimerReceiver {
    fn on_receive(&self, intent: &Intent) {
        if !intent.has_action(ACTION_TIMER_TRIGGER) {
            debug!("timer receiver ignoring {:?}", intent.action());
            return;
        }
        let enable_alarm = intent.bool_extra(EXTRA_ENABLE_ALARM, false);
        let enable_vibration = intent.bool_extra(EXTRA_ENABLE_VIBRATION, true);
        let timer_duration = intent.int_extra(EXTRA_TIMER_DURATION, 0);
        info!(
            "session timer finished (alarm {enable_alarm}, vibration {enable_vibration}, {timer_duration} min)"
        );

        match self.attachment.current() {
            Some(surface) => surface.on_timer_complete(enable_alarm, timer_duration),
            None => warn!("no ui attached, timer completion not delivered"),
        }

        if enable_alarm {
            info!("timer cascades into the alarm");
            self.launcher
                .start_foreground_service(alarm_service_intent(enable_vibration));
        }
    }
}

/// Forwards service commands (the notification's dismiss action) to the
/// launcher that owns the service.
#[derive(Debug)]
pub struct ServiceCommandReceiver {
    launcher: Arc<dyn ServiceLauncher>,
}

impl ServiceCommandReceiver {
    #[must_use]
    pub fn new(launcher: Arc<dyn ServiceLauncher>) -> Self {
        Self { launcher }
    }
}

impl BroadcastReceiver for ServiceCommandReceiver {
    fn on_receive(&self, intent: &Intent) {
        if intent.has_action(ACTION_STOP_ALARM) {
            info!("dismiss requested from notification");
            self.launcher.start_foreground_service(intent.clone());
        }
    }
}

/// Routes intents by action string. Intents nobody registered for are dropped.
#[derive(Default)]
pub struct Dispatcher {
    routes: Vec<(&'static str, Box<dyn BroadcastReceiver>)>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field(
                "actions",
                &self.routes.iter().map(|(action, _)| action).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn register(
        mut self,
        action: &'static str,
        receiver: impl BroadcastReceiver + 'static,
    ) -> Self {
        self.routes.push((action, Box::new(receiver)));
        self
    }

    /// Delivers `intent` to every receiver registered for its action and
    /// returns how many got it. A panicking receiver is logged and skipped.
    pub fn dispatch(&self, intent: &Intent) -> usize {
        let Some(action) = intent.action() else {
            warn!("dropping intent without an action");
            return 0;
        };
        let mut delivered = 0;
        for (_, receiver) in self.routes.iter().filter(|(route, _)| *route == action) {
            let result = panic::catch_unwind(AssertUnwindSafe(|| receiver.on_receive(intent)));
            match result {
                Ok(()) => delivered += 1,
                Err(_) => error!("receiver for {action} panicked"),
            }
        }
        if delivered == 0 {
            warn!("no receiver for {action}");
        }
        delivered
    }

    /// Drains `queue` until every sender is gone.
    pub fn run(&self, queue: &Receiver<Intent>) {
        for intent in queue {
            self.dispatch(&intent);
        }
        debug!("delivery queue closed");
    }

    /// # Errors
    /// Fails if the thread can't be spawned.
    pub fn spawn(self, queue: Receiver<Intent>) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("lullaby-delivery".to_string())
            .spawn(move || self.run(&queue))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{
        attachment::{tests::RecordingSurface, UiSurface},
        lock,
    };

    #[derive(Debug, Default)]
    pub(crate) struct RecordingLauncher {
        pub(crate) started: Mutex<Vec<Intent>>,
    }

    impl RecordingLauncher {
        pub(crate) fn count(&self) -> usize {
            lock(&self.started).len()
        }
    }

    impl ServiceLauncher for RecordingLauncher {
        fn start_foreground_service(&self, intent: Intent) {
            lock(&self.started).push(intent);
        }
    }

    fn timer_intent(enable_alarm: bool, enable_vibration: bool, minutes: i32) -> Intent {
        Intent::new(ACTION_TIMER_TRIGGER)
            .with_bool(EXTRA_ENABLE_ALARM, enable_alarm)
            .with_bool(EXTRA_ENABLE_VIBRATION, enable_vibration)
            .with_int(EXTRA_TIMER_DURATION, minutes)
    }

    #[test]
    fn alarm_receiver_defaults_vibration_on() {
        let launcher = Arc::new(RecordingLauncher::default());
        let receiver = AlarmReceiver::new(launcher.clone());
        receiver.on_receive(&Intent::new(ACTION_ALARM_TRIGGER));
        let started = lock(&launcher.started);
        assert_eq!(started.len(), 1);
        assert!(started[0].has_action(ACTION_START_ALARM_SERVICE));
        assert!(started[0].bool_extra(EXTRA_ENABLE_VIBRATION, false));
    }

    #[test]
    fn alarm_receiver_ignores_foreign_intents() {
        let launcher = Arc::new(RecordingLauncher::default());
        let receiver = AlarmReceiver::new(launcher.clone());
        receiver.on_receive(&Intent::new("somebody.ELSE"));
        receiver.on_receive(&Intent::without_action());
        assert_eq!(launcher.count(), 0);
    }

    #[test]
    fn timer_without_alarm_never_starts_service() {
        let launcher = Arc::new(RecordingLauncher::default());
        let receiver = TimerReceiver::new(launcher.clone(), UiAttachment::new());
        receiver.on_receive(&timer_intent(false, true, 30));
        assert_eq!(launcher.count(), 0);
    }

    #[test]
    fn timer_with_alarm_starts_service_without_ui() {
        let launcher = Arc::new(RecordingLauncher::default());
        let receiver = TimerReceiver::new(launcher.clone(), UiAttachment::new());
        receiver.on_receive(&timer_intent(true, false, 30));
        let started = lock(&launcher.started);
        assert_eq!(started.len(), 1);
        assert!(!started[0].bool_extra(EXTRA_ENABLE_VIBRATION, true));
    }

    #[test]
    fn timer_notifies_ui_and_starts_service_in_one_delivery() {
        let launcher = Arc::new(RecordingLauncher::default());
        let attachment = UiAttachment::new();
        let recorder = Arc::new(RecordingSurface::default());
        let surface: Arc<dyn UiSurface> = recorder.clone();
        attachment.attach(&surface);

        let receiver = TimerReceiver::new(launcher.clone(), attachment);
        receiver.on_receive(&timer_intent(true, true, 20));

        assert_eq!(*lock(&recorder.timers), vec![(true, 20)]);
        assert_eq!(launcher.count(), 1);
    }

    #[test]
    fn timer_defaults_when_extras_missing() {
        let launcher = Arc::new(RecordingLauncher::default());
        let attachment = UiAttachment::new();
        let recorder = Arc::new(RecordingSurface::default());
        let surface: Arc<dyn UiSurface> = recorder.clone();
        attachment.attach(&surface);

        TimerReceiver::new(launcher.clone(), attachment)
            .on_receive(&Intent::new(ACTION_TIMER_TRIGGER));

        assert_eq!(*lock(&recorder.timers), vec![(false, 0)]);
        assert_eq!(launcher.count(), 0);
    }

    struct Panicking;

    impl BroadcastReceiver for Panicking {
        fn on_receive(&self, _: &Intent) {
            panic!("receiver blew up");
        }
    }

    #[test]
    fn dispatcher_routes_by_action_and_survives_panics() {
        let launcher = Arc::new(RecordingLauncher::default());
        let dispatcher = Dispatcher::new()
            .register(ACTION_ALARM_TRIGGER, Panicking)
            .register(ACTION_ALARM_TRIGGER, AlarmReceiver::new(launcher.clone()))
            .register(ACTION_STOP_ALARM, ServiceCommandReceiver::new(launcher.clone()));

        assert_eq!(dispatcher.dispatch(&Intent::new(ACTION_ALARM_TRIGGER)), 1);
        assert_eq!(dispatcher.dispatch(&Intent::new(ACTION_TIMER_TRIGGER)), 0);
        assert_eq!(dispatcher.dispatch(&Intent::without_action()), 0);
        assert_eq!(dispatcher.dispatch(&Intent::new(ACTION_STOP_ALARM)), 1);

        let started = lock(&launcher.started);
        assert!(started[0].has_action(ACTION_START_ALARM_SERVICE));
        assert!(started[1].has_action(ACTION_STOP_ALARM));
    }
}
