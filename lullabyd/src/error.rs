//! Error types for every fallible concern of the daemon.
//!
//! Inside the daemon everything is a `Result`; only the [`crate::bridge`]
//! boundary flattens these into the `bool` answers the UI expects.

use std::{io, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("wake scheduler has shut down")]
    Shutdown,
    #[error("fire time overflows the wall clock (now {now}, delay {delay_seconds}s)")]
    FireTimeOverflow { now: i64, delay_seconds: u32 },
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no sound at {}", .0.display())]
    NotFound(PathBuf),
    #[error("couldn't open sound {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't decode sound {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("audio engine has stopped")]
    EngineGone,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VibrationError {
    #[error("no vibration device present")]
    NoVibrator,
    #[error("vibration permission denied")]
    PermissionDenied,
    #[error("vibration device error: {0}")]
    Device(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification permission denied")]
    PermissionDenied,
    #[error("notification backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("couldn't determine the lullaby project directories")]
    NoProjectDirs,
    #[error("couldn't read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("couldn't parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Error)]
pub enum WireError {
    #[error("connection error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed")]
    Closed,
}
