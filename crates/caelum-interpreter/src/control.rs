//! Cooperative execution control: stop/pause flags and the idle gate.

use caelum_core::ScriptError;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// Stop and pause flags honored by workers at step boundaries.
pub struct ExecutionControl {
    stop: AtomicBool,
    pause_tx: watch::Sender<bool>,
    stop_notify: Notify,
}

impl ExecutionControl {
    pub fn new() -> Self {
        let (pause_tx, _) = watch::channel(false);
        Self {
            stop: AtomicBool::new(false),
            pause_tx,
            stop_notify: Notify::new(),
        }
    }

    /// Requests a cooperative stop and wakes paused or waiting workers.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        let _ = self.pause_tx.send(false);
        self.stop_notify.notify_waiters();
    }

    /// Clears stop and pause state before a fresh execution.
    pub fn clear(&self) {
        self.stop.store(false, Ordering::SeqCst);
        let _ = self.pause_tx.send(false);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        let _ = self.pause_tx.send(true);
    }

    pub fn resume(&self) {
        let _ = self.pause_tx.send(false);
    }

    pub fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }

    /// Resolves when a stop is requested.
    pub async fn stopped(&self) {
        while !self.is_stopped() {
            self.stop_notify.notified().await;
        }
    }

    /// Step-boundary check: fails once stopped, blocks while paused.
    pub async fn checkpoint(&self) -> Result<(), ScriptError> {
        if self.is_stopped() {
            return Err(ScriptError::Stopped);
        }
        let mut rx = self.pause_tx.subscribe();
        while *rx.borrow() {
            if rx.changed().await.is_err() {
                break;
            }
        }
        if self.is_stopped() {
            return Err(ScriptError::Stopped);
        }
        Ok(())
    }
}

impl Default for ExecutionControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks live workers so external readers can wait for quiescence.
///
/// `get_variable`/`set_variable` on the interpreter block until no worker is
/// active, giving hosts a quiescent-snapshot view between steps.
pub struct ActivityGate {
    active: AtomicUsize,
    idle: Notify,
}

impl ActivityGate {
    pub fn new() -> Self {
        Self {
            active: AtomicUsize::new(0),
            idle: Notify::new(),
        }
    }

    /// Marks a worker active for the lifetime of the returned guard.
    pub fn enter(self: &Arc<Self>) -> ActivityGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ActivityGuard {
            gate: Arc::clone(self),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.active.load(Ordering::SeqCst) == 0
    }

    /// Blocks until no worker is active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ActivityGate {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard returned by [`ActivityGate::enter`].
pub struct ActivityGuard {
    gate: Arc<ActivityGate>,
}

impl Drop for ActivityGuard {
    fn drop(&mut self) {
        if self.gate.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.gate.idle.notify_waiters();
        }
    }
}
