//! The UI-facing boundary. Every operation answers with a plain `bool` (or a
//! string for the version); no error or panic gets past this module.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
};

use log::{error, warn};

use crate::{
    ambient::AmbientPlayer,
    attachment::{UiAttachment, UiSurface},
    config::Permissions,
    lock,
    platform::{Notification, Notifier},
    player::AlarmAudioPlayer,
    service::ServiceHost,
    trigger::{AlarmTrigger, TimerTrigger},
    ClientMessage, ServerMessage,
};

/// Id for notifications the UI sends itself, distinct from the alarm's.
pub const UI_NOTIFICATION_ID: u32 = 2;

#[derive(Debug)]
pub struct Bridge {
    alarm: AlarmTrigger,
    timer: TimerTrigger,
    player: Arc<Mutex<AlarmAudioPlayer>>,
    ambient: Arc<Mutex<AmbientPlayer>>,
    host: Arc<ServiceHost>,
    notifier: Arc<dyn Notifier>,
    attachment: UiAttachment,
    permissions: Permissions,
}

/// Runs `f`, turning a panic into `fallback`.
fn guarded<T>(op: &str, fallback: T, f: impl FnOnce() -> T) -> T {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        error!("{op} panicked");
        fallback
    })
}

impl Bridge {
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        alarm: AlarmTrigger,
        timer: TimerTrigger,
        player: Arc<Mutex<AlarmAudioPlayer>>,
        ambient: Arc<Mutex<AmbientPlayer>>,
        host: Arc<ServiceHost>,
        notifier: Arc<dyn Notifier>,
        attachment: UiAttachment,
        permissions: Permissions,
    ) -> Self {
        Self {
            alarm,
            timer,
            player,
            ambient,
            host,
            notifier,
            attachment,
            permissions,
        }
    }

    pub fn schedule_alarm(&self, delay_seconds: u32, enable_vibration: bool) -> bool {
        guarded("scheduleAlarm", false, || {
            self.alarm.schedule(delay_seconds, enable_vibration)
        })
    }

    pub fn cancel_alarm(&self) -> bool {
        guarded("cancelAlarm", false, || self.alarm.cancel())
    }

    pub fn is_alarm_set(&self) -> bool {
        guarded("isAlarmSet", false, || self.alarm.is_scheduled())
    }

    /// Rings the alarm right away, outside the alarm service.
    pub fn play_alarm(&self, sound: &str, enable_vibration: bool) -> bool {
        guarded("playAlarm", false, || {
            if !self.permissions.audio {
                warn!("audio playback not permitted");
                return false;
            }
            lock(&self.player).play_alarm(sound, enable_vibration)
        })
    }

    /// Silences the alarm wherever it was started from, ending the alarm
    /// service if it is running.
    pub fn stop_alarm(&self) -> bool {
        guarded("stopAlarm", false, || {
            self.host.stop_service();
            lock(&self.player).stop_alarm()
        })
    }

    /// Same path as the notification's dismiss action.
    pub fn dismiss_alarm(&self) -> bool {
        guarded("dismissAlarm", false, || {
            let was_running = self.host.stop_service();
            let stopped = lock(&self.player).stop_alarm();
            was_running || stopped
        })
    }

    pub fn is_playing(&self) -> bool {
        guarded("isPlaying", false, || lock(&self.player).is_playing())
    }

    pub fn test_vibration(&self) -> bool {
        guarded("testVibration", false, || lock(&self.player).test_vibration())
    }

    pub fn schedule_timer(
        &self,
        delay_seconds: u32,
        enable_alarm: bool,
        enable_vibration: bool,
        timer_duration_minutes: i32,
    ) -> bool {
        guarded("scheduleTimer", false, || {
            self.timer.schedule(
                delay_seconds,
                enable_alarm,
                enable_vibration,
                timer_duration_minutes,
            )
        })
    }

    pub fn cancel_timer(&self) -> bool {
        guarded("cancelTimer", false, || self.timer.cancel())
    }

    pub fn is_timer_set(&self) -> bool {
        guarded("isTimerSet", false, || self.timer.is_scheduled())
    }

    pub fn send_notification(&self, title: &str, body: &str) -> bool {
        guarded("sendNotification", false, || {
            match self
                .notifier
                .notify(&Notification::new(UI_NOTIFICATION_ID, title, body))
            {
                Ok(()) => true,
                Err(e) => {
                    warn!("couldn't send notification: {e}");
                    false
                }
            }
        })
    }

    pub fn has_permissions(&self) -> bool {
        self.permissions.all_granted()
    }

    #[must_use]
    pub fn app_version(&self) -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    pub fn play_ambient(&self, file_name: &str, volume: f32, looping: bool) -> bool {
        guarded("playAmbient", false, || {
            if !self.permissions.audio {
                warn!("audio playback not permitted");
                return false;
            }
            lock(&self.ambient).play(file_name, volume, looping)
        })
    }

    pub fn stop_ambient(&self) -> bool {
        guarded("stopAmbient", false, || lock(&self.ambient).stop())
    }

    pub fn pause_ambient(&self) -> bool {
        guarded("pauseAmbient", false, || lock(&self.ambient).pause())
    }

    pub fn resume_ambient(&self) -> bool {
        guarded("resumeAmbient", false, || lock(&self.ambient).resume())
    }

    pub fn is_ambient_playing(&self) -> bool {
        guarded("isAmbientPlaying", false, || lock(&self.ambient).is_playing())
    }

    pub fn attach(&self, surface: &Arc<dyn UiSurface>) {
        self.attachment.attach(surface);
    }

    pub fn detach(&self, surface: &Arc<dyn UiSurface>) {
        self.attachment.detach_if(surface);
    }

    /// Answers a request from a client. `Attach` and `Detach` are tied to a
    /// connection and are handled by the server, so they get no answer here.
    pub fn handle(&self, message: &ClientMessage) -> Option<ServerMessage> {
        let status = match message {
            ClientMessage::ScheduleAlarm {
                delay_seconds,
                enable_vibration,
            } => self.schedule_alarm(*delay_seconds, *enable_vibration),
            ClientMessage::CancelAlarm => self.cancel_alarm(),
            ClientMessage::IsAlarmSet => self.is_alarm_set(),
            ClientMessage::PlayAlarm {
                sound,
                enable_vibration,
            } => self.play_alarm(sound, *enable_vibration),
            ClientMessage::StopAlarm => self.stop_alarm(),
            ClientMessage::DismissAlarm => self.dismiss_alarm(),
            ClientMessage::IsPlaying => self.is_playing(),
            ClientMessage::TestVibration => self.test_vibration(),
            ClientMessage::ScheduleTimer {
                delay_seconds,
                enable_alarm,
                enable_vibration,
                timer_duration_minutes,
            } => self.schedule_timer(
                *delay_seconds,
                *enable_alarm,
                *enable_vibration,
                *timer_duration_minutes,
            ),
            ClientMessage::CancelTimer => self.cancel_timer(),
            ClientMessage::IsTimerSet => self.is_timer_set(),
            ClientMessage::SendNotification { title, body } => self.send_notification(title, body),
            ClientMessage::HasPermissions => self.has_permissions(),
            ClientMessage::GetAppVersion => return Some(ServerMessage::Version(self.app_version())),
            ClientMessage::PlayAmbient {
                file_name,
                volume,
                looping,
            } => self.play_ambient(file_name, *volume, *looping),
            ClientMessage::StopAmbient => self.stop_ambient(),
            ClientMessage::PauseAmbient => self.pause_ambient(),
            ClientMessage::ResumeAmbient => self.resume_ambient(),
            ClientMessage::IsAmbientPlaying => self.is_ambient_playing(),
            ClientMessage::Attach | ClientMessage::Detach => return None,
        };
        Some(ServerMessage::Status(status))
    }
}
