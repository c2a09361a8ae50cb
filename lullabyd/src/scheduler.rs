//! The wake scheduler: an in-process stand-in for the OS alarm manager.
//!
//! Requests are keyed by [`RequestKey`]. At most one request per key is ever
//! pending: registering a request replaces whatever was pending under that
//! key, inside a single critical section, so a cancelled request and its
//! replacement can never both fire.
//!
//! Fire times are absolute wall-clock milliseconds. The worker thread never
//! sleeps longer than [`MAX_IDLE`] between clock reads, so a wall clock that
//! jumps forward (suspend/resume, NTP correction) is noticed promptly and the
//! overdue request fires on wake-up instead of being lost.

use std::{
    collections::BTreeMap,
    fmt, io,
    sync::{Arc, Mutex, Weak},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError};
use log::{debug, error, info};

use crate::{
    error::ScheduleError,
    intent::{Intent, PendingIntent, RequestKey},
    lock,
};

/// Longest the worker waits before re-reading the wall clock.
pub const MAX_IDLE: Duration = Duration::from_secs(1);

pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// What the triggers need from a scheduler.
pub trait WakeScheduler: Send + Sync + fmt::Debug {
    /// Registers `pending` to be delivered at `fire_at_millis`, exactly and
    /// even while the machine is idle, replacing any request with the same key.
    fn set_exact_and_allow_while_idle(
        &self,
        fire_at_millis: i64,
        pending: PendingIntent,
    ) -> Result<(), ScheduleError>;

    /// Removes the request under `key`. Removing nothing is not an error.
    fn cancel(&self, key: &RequestKey) -> Result<(), ScheduleError>;

    /// Probes for a pending request without creating one.
    fn is_pending(&self, key: &RequestKey) -> bool;
}

#[derive(Debug, Clone)]
struct Entry {
    fire_at: i64,
    intent: Intent,
}

/// Fires pending intents into the delivery queue when they come due.
#[derive(Debug)]
pub struct TimerService {
    clock: Arc<dyn Clock>,
    pending: Mutex<BTreeMap<RequestKey, Entry>>,
    delivery: Sender<Intent>,
    nudge: Sender<()>,
    nudged: Mutex<Option<Receiver<()>>>,
}

impl TimerService {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, delivery: Sender<Intent>) -> Self {
        // a single slot is enough: one pending nudge already forces a re-scan
        let (nudge, nudged) = crossbeam_channel::bounded(1);
        Self {
            clock,
            pending: Mutex::new(BTreeMap::new()),
            delivery,
            nudge,
            nudged: Mutex::new(Some(nudged)),
        }
    }

    /// Starts the worker thread. The worker holds only a weak reference and
    /// exits once every strong reference to the service is gone.
    ///
    /// # Errors
    /// Fails if the worker was already started or the thread can't be spawned.
    pub fn spawn(self: &Arc<Self>) -> io::Result<JoinHandle<()>> {
        let nudged = lock(&self.nudged).take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::AlreadyExists, "timer worker already running")
        })?;
        let service = Arc::downgrade(self);
        thread::Builder::new()
            .name("lullaby-timer".to_string())
            .spawn(move || run_worker(&service, &nudged))
    }

    /// Delivers every request whose fire time has passed and returns how many
    /// were delivered. Each request is removed before it is delivered, so a
    /// request fires at most once even if several threads call this.
    pub fn fire_due(&self) -> usize {
        let now = self.clock.now_millis();
        let due: Vec<(RequestKey, Entry)> = {
            let mut pending = lock(&self.pending);
            let keys: Vec<RequestKey> = pending
                .iter()
                .filter(|(_, entry)| entry.fire_at <= now)
                .map(|(key, _)| key.clone())
                .collect();
            keys.into_iter()
                .filter_map(|key| pending.remove(&key).map(|entry| (key, entry)))
                .collect()
        };
        let mut delivered = 0;
        for (key, entry) in due {
            info!(
                "request {} ({:?}) fired {}ms after its fire time",
                key.request_code,
                key.action,
                now - entry.fire_at
            );
            if self.delivery.send(entry.intent).is_err() {
                error!("delivery queue closed, dropping request {}", key.request_code);
            } else {
                delivered += 1;
            }
        }
        delivered
    }

    /// The fire time of the request under `key`, if one is pending.
    #[must_use]
    pub fn fire_time(&self, key: &RequestKey) -> Option<i64> {
        lock(&self.pending).get(key).map(|entry| entry.fire_at)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    fn next_wait(&self) -> Duration {
        let now = self.clock.now_millis();
        lock(&self.pending)
            .values()
            .map(|entry| entry.fire_at)
            .min()
            .map_or(MAX_IDLE, |fire_at| {
                let millis = u64::try_from(fire_at.saturating_sub(now)).unwrap_or(0);
                Duration::from_millis(millis).min(MAX_IDLE)
            })
    }

    fn wake_worker(&self) {
        match self.nudge.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => {}
            Err(TrySendError::Disconnected(())) => debug!("timer worker not running"),
        }
    }
}

fn run_worker(service: &Weak<TimerService>, nudged: &Receiver<()>) {
    debug!("timer worker started");
    loop {
        let Some(wait) = service.upgrade().map(|service| service.next_wait()) else {
            break;
        };
        match nudged.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        match service.upgrade() {
            Some(service) => {
                service.fire_due();
            }
            None => break,
        }
    }
    debug!("timer worker stopped");
}

impl WakeScheduler for TimerService {
    fn set_exact_and_allow_while_idle(
        &self,
        fire_at_millis: i64,
        pending: PendingIntent,
    ) -> Result<(), ScheduleError> {
        let key = pending.key();
        let replaced = lock(&self.pending).insert(
            key.clone(),
            Entry {
                fire_at: fire_at_millis,
                intent: pending.intent,
            },
        );
        if replaced.is_some() {
            debug!("request {} replaced", key.request_code);
        }
        self.wake_worker();
        Ok(())
    }

    fn cancel(&self, key: &RequestKey) -> Result<(), ScheduleError> {
        if lock(&self.pending).remove(key).is_some() {
            debug!("request {} cancelled", key.request_code);
            self.wake_worker();
        }
        Ok(())
    }

    fn is_pending(&self, key: &RequestKey) -> bool {
        lock(&self.pending).contains_key(key)
    }
}
