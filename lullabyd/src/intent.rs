//! Intents are the messages that travel from the wake scheduler to the
//! receivers and from the receivers to the alarm service.
//!
//! An intent carries an action string and a small bag of typed extras.
//! Readers always supply a default, so a missing or wrongly typed extra never
//! faults the delivery path.

use std::collections::BTreeMap;

pub const ACTION_ALARM_TRIGGER: &str = "lullaby.ALARM_TRIGGER";
pub const ACTION_TIMER_TRIGGER: &str = "lullaby.TIMER_TRIGGER";
pub const ACTION_START_ALARM_SERVICE: &str = "lullaby.START_ALARM_SERVICE";
pub const ACTION_STOP_ALARM: &str = "lullaby.STOP_ALARM";

pub const EXTRA_ENABLE_VIBRATION: &str = "enableVibration";
pub const EXTRA_ENABLE_ALARM: &str = "enableAlarm";
pub const EXTRA_TIMER_DURATION: &str = "timerDuration";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extra {
    Bool(bool),
    Int(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Intent {
    action: Option<String>,
    extras: BTreeMap<String, Extra>,
}

impl Intent {
    #[must_use]
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            extras: BTreeMap::new(),
        }
    }

    /// An intent without an action, as delivered by a misbehaving sender.
    #[must_use]
    pub fn without_action() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    #[must_use]
    pub fn has_action(&self, action: &str) -> bool {
        self.action() == Some(action)
    }

    #[must_use]
    pub fn with_bool(mut self, key: &str, value: bool) -> Self {
        self.extras.insert(key.to_string(), Extra::Bool(value));
        self
    }

    #[must_use]
    pub fn with_int(mut self, key: &str, value: i32) -> Self {
        self.extras.insert(key.to_string(), Extra::Int(value));
        self
    }

    #[must_use]
    pub fn bool_extra(&self, key: &str, default: bool) -> bool {
        match self.extras.get(key) {
            Some(Extra::Bool(value)) => *value,
            _ => default,
        }
    }

    #[must_use]
    pub fn int_extra(&self, key: &str, default: i32) -> i32 {
        match self.extras.get(key) {
            Some(Extra::Int(value)) => *value,
            _ => default,
        }
    }
}

/// Identifies a pending wake request. Two requests with the same code and
/// action are the same request; registering one replaces the other.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestKey {
    pub request_code: i32,
    pub action: Option<String>,
}

/// An intent bound to the request code it was registered under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingIntent {
    pub request_code: i32,
    pub intent: Intent,
}

impl PendingIntent {
    #[must_use]
    pub const fn new(request_code: i32, intent: Intent) -> Self {
        Self {
            request_code,
            intent,
        }
    }

    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey {
            request_code: self.request_code,
            action: self.intent.action.clone(),
        }
    }
}
