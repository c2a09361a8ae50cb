//! The two persistent triggers: the alarm trigger and the session timer
//! trigger. Each kind has exactly one outstanding request at a time,
//! identified by a fixed request code.

use std::sync::Arc;

use log::{debug, error, info};

use crate::{
    error::ScheduleError,
    intent::{
        Intent, PendingIntent, RequestKey, ACTION_ALARM_TRIGGER, ACTION_TIMER_TRIGGER,
        EXTRA_ENABLE_ALARM, EXTRA_ENABLE_VIBRATION, EXTRA_TIMER_DURATION,
    },
    scheduler::{Clock, WakeScheduler},
};

pub const ALARM_REQUEST_CODE: i32 = 1001;
pub const TIMER_REQUEST_CODE: i32 = 2001;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Alarm,
    Timer,
}

impl TriggerKind {
    #[must_use]
    pub const fn request_code(self) -> i32 {
        match self {
            Self::Alarm => ALARM_REQUEST_CODE,
            Self::Timer => TIMER_REQUEST_CODE,
        }
    }

    #[must_use]
    pub const fn action(self) -> &'static str {
        match self {
            Self::Alarm => ACTION_ALARM_TRIGGER,
            Self::Timer => ACTION_TIMER_TRIGGER,
        }
    }

    #[must_use]
    pub fn key(self) -> RequestKey {
        RequestKey {
            request_code: self.request_code(),
            action: Some(self.action().to_string()),
        }
    }
}

/// What a trigger carries to its receiver. The scheduler never looks inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPayload {
    Alarm {
        enable_vibration: bool,
    },
    Timer {
        enable_alarm: bool,
        enable_vibration: bool,
        timer_duration_minutes: i32,
    },
}

impl TriggerPayload {
    #[must_use]
    pub const fn kind(&self) -> TriggerKind {
        match self {
            Self::Alarm { .. } => TriggerKind::Alarm,
            Self::Timer { .. } => TriggerKind::Timer,
        }
    }

    #[must_use]
    pub fn into_intent(self) -> Intent {
        let intent = Intent::new(self.kind().action());
        match self {
            Self::Alarm { enable_vibration } => {
                intent.with_bool(EXTRA_ENABLE_VIBRATION, enable_vibration)
            }
            Self::Timer {
                enable_alarm,
                enable_vibration,
                timer_duration_minutes,
            } => intent
                .with_bool(EXTRA_ENABLE_ALARM, enable_alarm)
                .with_bool(EXTRA_ENABLE_VIBRATION, enable_vibration)
                .with_int(EXTRA_TIMER_DURATION, timer_duration_minutes),
        }
    }
}

/// Shared mechanics of both triggers.
#[derive(Debug, Clone)]
pub struct Trigger {
    kind: TriggerKind,
    scheduler: Arc<dyn WakeScheduler>,
    clock: Arc<dyn Clock>,
}

impl Trigger {
    #[must_use]
    pub fn new(
        kind: TriggerKind,
        scheduler: Arc<dyn WakeScheduler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            kind,
            scheduler,
            clock,
        }
    }

    /// Cancels the outstanding request of this kind, then registers a new one
    /// `delay_seconds` from now. Returns the absolute fire time.
    ///
    /// # Errors
    /// Propagates scheduler failures; a failed cancel aborts the schedule.
    pub fn schedule(
        &self,
        delay_seconds: u32,
        payload: TriggerPayload,
    ) -> Result<i64, ScheduleError> {
        self.cancel()?;
        let now = self.clock.now_millis();
        let fire_at = now
            .checked_add(i64::from(delay_seconds) * 1000)
            .ok_or(ScheduleError::FireTimeOverflow {
                now,
                delay_seconds,
            })?;
        self.scheduler.set_exact_and_allow_while_idle(
            fire_at,
            PendingIntent::new(self.kind.request_code(), payload.into_intent()),
        )?;
        Ok(fire_at)
    }

    /// # Errors
    /// Propagates scheduler failures.
    pub fn cancel(&self) -> Result<(), ScheduleError> {
        self.scheduler.cancel(&self.kind.key())
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduler.is_pending(&self.kind.key())
    }

    #[must_use]
    pub const fn kind(&self) -> TriggerKind {
        self.kind
    }
}

fn fire_time(millis: i64) -> String {
    chrono::DateTime::<chrono::Utc>::from_timestamp_millis(millis).map_or_else(
        || format!("{millis}ms"),
        |time| {
            time.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}

/// Wakes the machine to ring the alarm.
#[derive(Debug, Clone)]
pub struct AlarmTrigger(Trigger);

impl AlarmTrigger {
    #[must_use]
    pub fn new(scheduler: Arc<dyn WakeScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self(Trigger::new(TriggerKind::Alarm, scheduler, clock))
    }

    pub fn schedule(&self, delay_seconds: u32, enable_vibration: bool) -> bool {
        match self
            .0
            .schedule(delay_seconds, TriggerPayload::Alarm { enable_vibration })
        {
            Ok(fire_at) => {
                info!(
                    "alarm set for {} ({delay_seconds}s, vibration {enable_vibration})",
                    fire_time(fire_at)
                );
                true
            }
            Err(e) => {
                error!("couldn't set alarm: {e}");
                false
            }
        }
    }

    pub fn cancel(&self) -> bool {
        match self.0.cancel() {
            Ok(()) => {
                debug!("alarm cancelled");
                true
            }
            Err(e) => {
                error!("couldn't cancel alarm: {e}");
                false
            }
        }
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.0.is_scheduled()
    }
}

/// Wakes the machine when a meditation session ends, optionally cascading
/// into the alarm.
#[derive(Debug, Clone)]
pub struct TimerTrigger(Trigger);

impl TimerTrigger {
    #[must_use]
    pub fn new(scheduler: Arc<dyn WakeScheduler>, clock: Arc<dyn Clock>) -> Self {
        Self(Trigger::new(TriggerKind::Timer, scheduler, clock))
    }

    pub fn schedule(
        &self,
        delay_seconds: u32,
        enable_alarm: bool,
        enable_vibration: bool,
        timer_duration_minutes: i32,
    ) -> bool {
        let payload = TriggerPayload::Timer {
            enable_alarm,
            enable_vibration,
            timer_duration_minutes,
        };
        match self.0.schedule(delay_seconds, payload) {
            Ok(fire_at) => {
                info!(
                    "timer set for {} ({delay_seconds}s, alarm {enable_alarm}, vibration {enable_vibration}, {timer_duration_minutes} min session)",
                    fire_time(fire_at)
                );
                true
            }
            Err(e) => {
                error!("couldn't set timer: {e}");
                false
            }
        }
    }

    pub fn cancel(&self) -> bool {
        match self.0.cancel() {
            Ok(()) => {
                debug!("timer cancelled");
                true
            }
            Err(e) => {
                error!("couldn't cancel timer: {e}");
                false
            }
        }
    }

    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.0.is_scheduled()
    }
}
