#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(clippy::use_self, rust_2018_idioms)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! The UI side of lullaby: every bridge operation as a call on a
//! [`Companion`], plus the callbacks the daemon sends an attached UI.

use std::io::{BufRead, Write};

use log::{error, warn};
use lullabyd::{error::WireError, ClientMessage, ServerMessage};
use thiserror::Error;

pub mod communication;

use communication::Connection;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("daemon closed the connection")]
    Closed,
}

/// A callback from the daemon to an attached UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    TimerComplete {
        enable_alarm: bool,
        timer_duration_minutes: i32,
    },
    AmbientComplete {
        file_name: String,
    },
}

impl UiEvent {
    /// Splits callbacks from answers; an answer comes back as the `Err`.
    ///
    /// # Errors
    /// Returns `message` unchanged when it isn't a callback.
    pub fn from_message(message: ServerMessage) -> Result<Self, ServerMessage> {
        match message {
            ServerMessage::TimerComplete {
                enable_alarm,
                timer_duration_minutes,
            } => Ok(Self::TimerComplete {
                enable_alarm,
                timer_duration_minutes,
            }),
            ServerMessage::AmbientComplete { file_name } => Ok(Self::AmbientComplete { file_name }),
            other => Err(other),
        }
    }
}

/// The operations a UI can ask of the daemon. Like the daemon's own
/// boundary, none of them fail: problems are logged and answered `false`.
#[derive(Debug)]
pub struct Companion<R, W> {
    conn: Connection<R, W>,
}

impl<R: BufRead, W: Write> Companion<R, W> {
    pub const fn new(conn: Connection<R, W>) -> Self {
        Self { conn }
    }

    fn status(&mut self, message: &ClientMessage) -> bool {
        match self.conn.request(message) {
            Ok(ServerMessage::Status(status)) => status,
            Ok(ServerMessage::Error(e)) => {
                warn!("daemon rejected {message:?}: {e}");
                false
            }
            Ok(other) => {
                warn!("unexpected answer to {message:?}: {other:?}");
                false
            }
            Err(e) => {
                error!("couldn't reach the daemon: {e}");
                false
            }
        }
    }

    pub fn schedule_alarm(&mut self, delay_seconds: u32, enable_vibration: bool) -> bool {
        self.status(&ClientMessage::ScheduleAlarm {
            delay_seconds,
            enable_vibration,
        })
    }

    pub fn cancel_alarm(&mut self) -> bool {
        self.status(&ClientMessage::CancelAlarm)
    }

    pub fn is_alarm_set(&mut self) -> bool {
        self.status(&ClientMessage::IsAlarmSet)
    }

    pub fn play_alarm(&mut self, sound: &str, enable_vibration: bool) -> bool {
        self.status(&ClientMessage::PlayAlarm {
            sound: sound.to_string(),
            enable_vibration,
        })
    }

    pub fn stop_alarm(&mut self) -> bool {
        self.status(&ClientMessage::StopAlarm)
    }

    pub fn dismiss_alarm(&mut self) -> bool {
        self.status(&ClientMessage::DismissAlarm)
    }

    pub fn is_playing(&mut self) -> bool {
        self.status(&ClientMessage::IsPlaying)
    }

    pub fn test_vibration(&mut self) -> bool {
        self.status(&ClientMessage::TestVibration)
    }

    pub fn schedule_timer(
        &mut self,
        delay_seconds: u32,
        enable_alarm: bool,
        enable_vibration: bool,
        timer_duration_minutes: i32,
    ) -> bool {
        self.status(&ClientMessage::ScheduleTimer {
            delay_seconds,
            enable_alarm,
            enable_vibration,
            timer_duration_minutes,
        })
    }

    pub fn cancel_timer(&mut self) -> bool {
        self.status(&ClientMessage::CancelTimer)
    }

    pub fn is_timer_set(&mut self) -> bool {
        self.status(&ClientMessage::IsTimerSet)
    }

    pub fn send_notification(&mut self, title: &str, body: &str) -> bool {
        self.status(&ClientMessage::SendNotification {
            title: title.to_string(),
            body: body.to_string(),
        })
    }

    pub fn has_permissions(&mut self) -> bool {
        self.status(&ClientMessage::HasPermissions)
    }

    /// `None` if the daemon couldn't be asked.
    pub fn app_version(&mut self) -> Option<String> {
        match self.conn.request(&ClientMessage::GetAppVersion) {
            Ok(ServerMessage::Version(version)) => Some(version),
            Ok(other) => {
                warn!("unexpected answer to version request: {other:?}");
                None
            }
            Err(e) => {
                error!("couldn't reach the daemon: {e}");
                None
            }
        }
    }

    pub fn play_ambient(&mut self, file_name: &str, volume: f32, looping: bool) -> bool {
        self.status(&ClientMessage::PlayAmbient {
            file_name: file_name.to_string(),
            volume,
            looping,
        })
    }

    pub fn stop_ambient(&mut self) -> bool {
        self.status(&ClientMessage::StopAmbient)
    }

    pub fn pause_ambient(&mut self) -> bool {
        self.status(&ClientMessage::PauseAmbient)
    }

    pub fn resume_ambient(&mut self) -> bool {
        self.status(&ClientMessage::ResumeAmbient)
    }

    pub fn is_ambient_playing(&mut self) -> bool {
        self.status(&ClientMessage::IsAmbientPlaying)
    }

    /// Makes this connection the UI that receives callbacks.
    pub fn attach(&mut self) -> bool {
        self.status(&ClientMessage::Attach)
    }

    pub fn detach(&mut self) -> bool {
        self.status(&ClientMessage::Detach)
    }

    /// Waits for the next callback. `Ok(None)` once the daemon hangs up.
    ///
    /// # Errors
    /// Fails if the connection breaks.
    pub fn next_event(&mut self) -> Result<Option<UiEvent>, ClientError> {
        self.conn.next_event()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use lullabyd::{receive, send};

    use super::*;

    fn answers(messages: &[ServerMessage]) -> Cursor<Vec<u8>> {
        let mut buf = Vec::new();
        for message in messages {
            send(&mut buf, message).unwrap();
        }
        Cursor::new(buf)
    }

    fn sent(companion: Companion<Cursor<Vec<u8>>, Vec<u8>>) -> Vec<ClientMessage> {
        let Companion { conn } = companion;
        let mut written = Cursor::new(conn.into_parts().1);
        let mut sent = Vec::new();
        while let Some(message) = receive(&mut written).unwrap() {
            sent.push(message);
        }
        sent
    }

    #[test]
    fn operations_map_to_messages_and_statuses() {
        let mut companion = Companion::new(Connection::new(
            answers(&[
                ServerMessage::Status(true),
                ServerMessage::Status(false),
                ServerMessage::Version("0.1.0".to_string()),
            ]),
            Vec::new(),
        ));
        assert!(companion.schedule_timer(600, true, false, 10));
        assert!(!companion.is_alarm_set());
        assert_eq!(companion.app_version(), Some("0.1.0".to_string()));
        // the daemon has hung up
        assert!(!companion.stop_alarm());

        assert_eq!(
            sent(companion),
            vec![
                ClientMessage::ScheduleTimer {
                    delay_seconds: 600,
                    enable_alarm: true,
                    enable_vibration: false,
                    timer_duration_minutes: 10,
                },
                ClientMessage::IsAlarmSet,
                ClientMessage::GetAppVersion,
                ClientMessage::StopAlarm,
            ]
        );
    }

    #[test]
    fn callbacks_during_a_request_are_held() {
        let mut companion = Companion::new(Connection::new(
            answers(&[
                ServerMessage::Status(true),
                ServerMessage::TimerComplete {
                    enable_alarm: true,
                    timer_duration_minutes: 20,
                },
                ServerMessage::Status(true),
                ServerMessage::AmbientComplete {
                    file_name: "rain.mp3".to_string(),
                },
            ]),
            Vec::new(),
        ));
        assert!(companion.attach());
        assert!(companion.is_playing());
        assert_eq!(
            companion.next_event().unwrap(),
            Some(UiEvent::TimerComplete {
                enable_alarm: true,
                timer_duration_minutes: 20
            })
        );
        assert_eq!(
            companion.next_event().unwrap(),
            Some(UiEvent::AmbientComplete {
                file_name: "rain.mp3".to_string()
            })
        );
        assert_eq!(companion.next_event().unwrap(), None);
    }

    #[test]
    fn daemon_errors_read_as_false() {
        let mut companion = Companion::new(Connection::new(
            answers(&[
                ServerMessage::Error("malformed".to_string()),
                ServerMessage::Version("0.1.0".to_string()),
            ]),
            Vec::new(),
        ));
        assert!(!companion.play_ambient("rain.mp3", 0.5, true));
        assert!(!companion.pause_ambient());
    }
}
