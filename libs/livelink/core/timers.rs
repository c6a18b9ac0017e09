//! Single-slot timers
//!
//! The state machine owns three timers, each with cancel-and-replace
//! semantics: arming a slot cancels whatever was pending in it. A timer
//! firing comes back through the mailbox as `Input::TimerFired` carrying
//! the slot id; ids that no longer match the slot are stale and ignored,
//! which covers the window between `abort()` and a send already queued.

use super::command::Input;
use std::fmt;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::AbortHandle;
use tracing::debug;

/// The three timers the state machine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Re-opens the transport after an unexpected drop
    Reconnect,
    /// Declares the connection dead when no activity arrives in time
    Watchdog,
    /// Delays the "connection truly lost" announcement
    Debounce,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::Reconnect => write!(f, "reconnect"),
            TimerKind::Watchdog => write!(f, "watchdog"),
            TimerKind::Debounce => write!(f, "debounce"),
        }
    }
}

/// Cancellable handle to one scheduled firing
#[derive(Debug)]
pub struct TimerHandle {
    id: u64,
    abort: Option<AbortHandle>,
}

impl TimerHandle {
    pub fn new(id: u64, abort: Option<AbortHandle>) -> Self {
        Self { id, abort }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn cancel(self) {
        if let Some(abort) = self.abort {
            abort.abort();
        }
    }
}

/// Schedules `Input::TimerFired { kind, id }` after a delay
pub trait TimerScheduler: Send {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle;
}

/// Scheduler backed by sleeping tokio tasks
pub struct TokioScheduler {
    next_id: u64,
    mailbox: UnboundedSender<Input>,
}

impl TokioScheduler {
    pub fn new(mailbox: UnboundedSender<Input>) -> Self {
        Self { next_id: 1, mailbox }
    }
}

impl TimerScheduler for TokioScheduler {
    fn schedule(&mut self, kind: TimerKind, delay: Duration) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;

        let deadline = tokio::time::Instant::now() + delay;
        let mailbox = self.mailbox.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let _ = mailbox.send(Input::TimerFired { kind, id });
        });

        TimerHandle::new(id, Some(task.abort_handle()))
    }
}

/// One pending handle per timer kind
#[derive(Debug, Default)]
pub struct TimerSlots {
    reconnect: Option<TimerHandle>,
    watchdog: Option<TimerHandle>,
    debounce: Option<TimerHandle>,
}

impl TimerSlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<TimerHandle> {
        match kind {
            TimerKind::Reconnect => &mut self.reconnect,
            TimerKind::Watchdog => &mut self.watchdog,
            TimerKind::Debounce => &mut self.debounce,
        }
    }

    /// Cancel the pending timer of `kind`, if any, and schedule a new one
    pub fn arm(&mut self, scheduler: &mut dyn TimerScheduler, kind: TimerKind, delay: Duration) {
        self.cancel(kind);
        debug!("Arming {} timer for {:?}", kind, delay);
        let handle = scheduler.schedule(kind, delay);
        *self.slot(kind) = Some(handle);
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(handle) = self.slot(kind).take() {
            debug!("Cancelled {} timer", kind);
            handle.cancel();
        }
    }

    pub fn cancel_all(&mut self) {
        self.cancel(TimerKind::Reconnect);
        self.cancel(TimerKind::Watchdog);
        self.cancel(TimerKind::Debounce);
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        match kind {
            TimerKind::Reconnect => self.reconnect.is_some(),
            TimerKind::Watchdog => self.watchdog.is_some(),
            TimerKind::Debounce => self.debounce.is_some(),
        }
    }

    /// Claim a firing: true (and the slot is cleared) only if `id` is the
    /// handle currently pending for `kind`
    pub fn take_fired(&mut self, kind: TimerKind, id: u64) -> bool {
        let current = matches!(self.slot(kind), Some(handle) if handle.id() == id);
        if current {
            *self.slot(kind) = None;
        }
        current
    }
}
