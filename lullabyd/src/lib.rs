#![warn(clippy::pedantic, clippy::nursery, clippy::cargo)]
#![deny(
    clippy::use_self,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::missing_panics_doc
)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

use std::{
    io::{self, BufRead, ErrorKind, Write},
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde::{Deserialize, Serialize};

use crate::error::WireError;

pub mod ambient;
pub mod attachment;
pub mod bridge;
pub mod config;
pub mod daemon;
pub mod error;
pub mod intent;
pub mod platform;
pub mod player;
pub mod receiver;
pub mod scheduler;
pub mod server;
pub mod service;
pub mod sound;
pub mod trigger;

/// Name of the daemon's local socket when the config doesn't override it.
pub const DEFAULT_SOCKET_NAME: &str = "lullabyd.sock";

/// What a client can ask of the daemon. One variant per bridge operation,
/// plus attaching the connection as the UI.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ClientMessage {
    ScheduleAlarm {
        delay_seconds: u32,
        enable_vibration: bool,
    },
    CancelAlarm,
    IsAlarmSet,
    PlayAlarm {
        sound: String,
        enable_vibration: bool,
    },
    StopAlarm,
    DismissAlarm,
    IsPlaying,
    TestVibration,
    ScheduleTimer {
        delay_seconds: u32,
        enable_alarm: bool,
        enable_vibration: bool,
        timer_duration_minutes: i32,
    },
    CancelTimer,
    IsTimerSet,
    SendNotification {
        title: String,
        body: String,
    },
    HasPermissions,
    GetAppVersion,
    PlayAmbient {
        file_name: String,
        volume: f32,
        looping: bool,
    },
    StopAmbient,
    PauseAmbient,
    ResumeAmbient,
    IsAmbientPlaying,
    Attach,
    Detach,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// The answer to every operation that reports success or a probe.
    Status(bool),
    Version(String),
    TimerComplete {
        enable_alarm: bool,
        timer_duration_minutes: i32,
    },
    AmbientComplete {
        file_name: String,
    },
    Error(String),
}

impl ServerMessage {
    /// Callbacks arrive unprompted; everything else answers a request.
    #[must_use]
    pub const fn is_callback(&self) -> bool {
        matches!(self, Self::TimerComplete { .. } | Self::AmbientComplete { .. })
    }
}

/// Writes `message` as one JSON line and flushes.
///
/// # Errors
/// Fails on serialization or write errors.
pub fn send<W: Write + ?Sized, T: Serialize>(w: &mut W, message: &T) -> Result<(), WireError> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    w.write_all(&line)?;
    w.flush()?;
    Ok(())
}

/// Reads the next JSON line. Returns `Ok(None)` once the peer has closed the
/// connection; blank lines are skipped.
///
/// # Errors
/// Fails on read errors or a line that isn't a valid message.
pub fn receive<R: BufRead + ?Sized, T: for<'de> Deserialize<'de>>(
    r: &mut R,
) -> Result<Option<T>, WireError> {
    let mut line = String::new();
    loop {
        line.clear();
        match r.read_line(&mut line) {
            Ok(0) => return Ok(None),
            Ok(_) if line.trim().is_empty() => {}
            Ok(_) => return Ok(Some(serde_json::from_str(line.trim_end())?)),
            Err(ref e) if is_interrupted(e) => {}
            Err(e) => return Err(e.into()),
        }
    }
}

pub(crate) fn is_interrupted(e: &io::Error) -> bool {
    e.kind() == ErrorKind::Interrupted
}

/// Locks `mutex`, recovering the data if another thread panicked while
/// holding it.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
