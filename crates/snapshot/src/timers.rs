//! Auto-refresh and reconnect timers.
//!
//! Timers only emit [`Tick`]s on a channel; the owner decides what a tick
//! does. Auto-refresh runs iff it is enabled and the client is online.
//! Reconnect runs iff the client is offline.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Default reconnect period while offline.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(30);

/// What a timer fired for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Refresh,
    Reconnect,
}

/// Refresh period that backs off once the user stops interacting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptiveInterval {
    pub active: Duration,
    pub idle: Duration,
    /// Inactivity after which `idle` applies
    pub idle_after: Duration,
}

impl Default for AdaptiveInterval {
    fn default() -> Self {
        Self {
            active: Duration::from_secs(5),
            idle: Duration::from_secs(30),
            idle_after: Duration::from_secs(60),
        }
    }
}

impl AdaptiveInterval {
    pub fn interval_for(&self, since_interaction: Duration) -> Duration {
        if since_interaction >= self.idle_after {
            self.idle
        } else {
            self.active
        }
    }
}

/// Last time the user did something.
#[derive(Debug, Clone)]
pub struct ActivityTracker(Arc<Mutex<Instant>>);

impl Default for ActivityTracker {
    fn default() -> Self {
        Self(Arc::new(Mutex::new(Instant::now())))
    }
}

impl ActivityTracker {
    pub fn touch(&self) {
        *self.0.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }
}

/// A spawned timer task, aborted when dropped.
#[derive(Debug)]
pub struct TimerHandle(JoinHandle<()>);

impl TimerHandle {
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Owns the refresh and reconnect timers.
#[derive(Debug)]
pub struct RefreshScheduler {
    interval: AdaptiveInterval,
    reconnect_every: Duration,
    activity: ActivityTracker,
    tx: mpsc::UnboundedSender<Tick>,
    refresh: Option<TimerHandle>,
    reconnect: Option<TimerHandle>,
    inputs: Option<(bool, bool)>,
}

impl RefreshScheduler {
    /// Create a scheduler and the receiver its ticks arrive on.
    pub fn new(
        interval: AdaptiveInterval,
        reconnect_every: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<Tick>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            interval,
            reconnect_every,
            activity: ActivityTracker::default(),
            tx,
            refresh: None,
            reconnect: None,
            inputs: None,
        };
        (scheduler, rx)
    }

    /// Handle for recording user interaction.
    pub fn activity(&self) -> ActivityTracker {
        self.activity.clone()
    }

    pub fn is_refresh_active(&self) -> bool {
        self.refresh.is_some()
    }

    pub fn is_reconnect_active(&self) -> bool {
        self.reconnect.is_some()
    }

    /// Recreate timers for the given inputs. No-op when they are unchanged.
    ///
    /// Must be called from within a tokio runtime.
    pub fn reconfigure(&mut self, enabled: bool, offline: bool) {
        if self.inputs == Some((enabled, offline)) {
            return;
        }
        self.inputs = Some((enabled, offline));
        self.refresh = None;
        self.reconnect = None;

        if enabled && !offline {
            log::debug!("Starting auto-refresh timer");
            self.refresh = Some(self.spawn_refresh());
        }
        if offline {
            log::debug!("Starting reconnect timer ({}s)", self.reconnect_every.as_secs());
            self.reconnect = Some(self.spawn_reconnect());
        }
    }

    fn spawn_refresh(&self) -> TimerHandle {
        let tx = self.tx.clone();
        let interval = self.interval;
        let activity = self.activity.clone();
        TimerHandle(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval.interval_for(activity.idle_for())).await;
                if tx.send(Tick::Refresh).is_err() {
                    break;
                }
            }
        }))
    }

    fn spawn_reconnect(&self) -> TimerHandle {
        let tx = self.tx.clone();
        let period = self.reconnect_every;
        TimerHandle(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if tx.send(Tick::Reconnect).is_err() {
                    break;
                }
            }
        }))
    }
}
