//! Driver process supervisor.
//!
//! Owns at most one external driver process: spawns it with piped
//! stdin/stdout, writes commands to it, and runs a background worker that
//! polls for exit (restarting the driver when it dies) and drains its stdout
//! while listening. The wire protocol is opaque bytes; nothing is framed or
//! parsed here.

use caelum_core::{driver_log, DriverError};
use parking_lot::RwLock;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

/// Callback receiving chunks of driver stdout while listening.
pub type OutputHandler = Arc<dyn Fn(&str, &[u8]) + Send + Sync>;

/// Supervisor tuning.
#[derive(Clone, Debug)]
pub struct SupervisorOptions {
    /// Monitor loop cadence.
    pub poll_interval: Duration,
    /// Bytes read from the driver's stdout per tick.
    pub read_chunk: usize,
    /// Restart a driver that exits while supervised.
    pub auto_restart: bool,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            read_chunk: 1024,
            auto_restart: true,
        }
    }
}

/// A running driver and its pipe ends.
struct Driver {
    name: String,
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
}

/// Snapshot of the supervised driver for inspection.
#[derive(Clone, Debug)]
pub struct DriverStatus {
    pub name: String,
    pub pid: Option<u32>,
    pub listening: bool,
    pub restarts: u64,
}

struct SupervisorState {
    driver: Mutex<Option<Driver>>,
    listening: AtomicBool,
    stop: AtomicBool,
    stop_notify: Notify,
    restarts: AtomicU64,
    last_exit: RwLock<Option<std::process::ExitStatus>>,
    handler: RwLock<Option<OutputHandler>>,
    options: SupervisorOptions,
}

/// Spawns, monitors, and restarts one external driver process.
pub struct DriverSupervisor {
    state: Arc<SupervisorState>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DriverSupervisor {
    pub fn new(options: SupervisorOptions) -> Self {
        Self {
            state: Arc::new(SupervisorState {
                driver: Mutex::new(None),
                listening: AtomicBool::new(false),
                stop: AtomicBool::new(false),
                stop_notify: Notify::new(),
                restarts: AtomicU64::new(0),
                last_exit: RwLock::new(None),
                handler: RwLock::new(None),
                options,
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(SupervisorOptions::default())
    }

    /// Installs the handler receiving driver stdout chunks.
    pub fn set_output_handler<F>(&self, handler: F)
    where
        F: Fn(&str, &[u8]) + Send + Sync + 'static,
    {
        *self.state.handler.write() = Some(Arc::new(handler));
    }

    /// Spawns `name` as the supervised driver and starts the monitor worker.
    ///
    /// A failed spawn records no process.
    pub async fn start(&self, name: &str) -> Result<(), DriverError> {
        let driver = spawn_driver(name).await?;
        driver_log!(
            info,
            driver = %name,
            pid = driver.child.id(),
            "Driver started"
        );
        *self.state.driver.lock().await = Some(driver);

        let mut worker = self.worker.lock().await;
        if worker.is_none() {
            self.state.stop.store(false, Ordering::SeqCst);
            let state = Arc::clone(&self.state);
            *worker = Some(tokio::spawn(run_loop(state)));
        }
        Ok(())
    }

    /// Stops the monitor worker, terminates the driver, and reaps it.
    pub async fn stop(&self) {
        self.state.stop.store(true, Ordering::SeqCst);
        self.state.stop_notify.notify_waiters();
        if let Some(worker) = self.worker.lock().await.take() {
            let _ = worker.await;
        }
        if let Some(mut driver) = self.state.driver.lock().await.take() {
            let _ = driver.child.start_kill();
            let _ = driver.child.wait().await;
            driver_log!(info, driver = %driver.name, "Driver terminated");
        }
    }

    /// Writes bytes to the driver's stdin.
    pub async fn send(&self, message: &[u8]) -> Result<(), DriverError> {
        let mut guard = self.state.driver.lock().await;
        let driver = guard.as_mut().ok_or(DriverError::NotRunning)?;
        driver.stdin.write_all(message).await?;
        driver.stdin.flush().await?;
        Ok(())
    }

    /// Flips the listening flag.
    pub fn listen(&self, toggle: bool) {
        self.state.listening.store(toggle, Ordering::SeqCst);
        tracing::info!(
            target: "caelum::driver",
            listening = toggle,
            "Driver listening toggled"
        );
    }

    /// Logs and returns the current driver state.
    pub async fn status(&self) -> Option<DriverStatus> {
        let guard = self.state.driver.lock().await;
        let status = guard.as_ref().map(|driver| DriverStatus {
            name: driver.name.clone(),
            pid: driver.child.id(),
            listening: self.state.listening.load(Ordering::SeqCst),
            restarts: self.state.restarts.load(Ordering::SeqCst),
        });
        match &status {
            Some(s) => tracing::info!(
                target: "caelum::driver",
                driver = %s.name,
                pid = ?s.pid,
                listening = s.listening,
                restarts = s.restarts,
                "Driver status"
            ),
            None => tracing::info!(target: "caelum::driver", "No driver running"),
        }
        status
    }

    /// Times the supervised driver has been restarted after an exit.
    pub fn restart_count(&self) -> u64 {
        self.state.restarts.load(Ordering::SeqCst)
    }

    /// Exit status observed at the most recent driver exit.
    pub fn last_exit(&self) -> Option<std::process::ExitStatus> {
        *self.state.last_exit.read()
    }

    /// The current driver's process id.
    pub async fn pid(&self) -> Option<u32> {
        self.state.driver.lock().await.as_ref().and_then(|d| d.child.id())
    }
}

async fn spawn_driver(name: &str) -> Result<Driver, DriverError> {
    let mut child = Command::new(name)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| DriverError::Spawn {
            name: name.to_string(),
            source,
        })?;
    let stdin = child.stdin.take().ok_or(DriverError::NotRunning)?;
    let stdout = child.stdout.take().ok_or(DriverError::NotRunning)?;
    Ok(Driver {
        name: name.to_string(),
        child,
        stdin,
        stdout,
    })
}

/// Background worker: monitor, drain output, sleep, until stopped.
async fn run_loop(state: Arc<SupervisorState>) {
    loop {
        if state.stop.load(Ordering::SeqCst) {
            break;
        }
        monitor_driver(&state).await;
        process_messages(&state).await;

        tokio::select! {
            _ = state.stop_notify.notified() => {}
            _ = tokio::time::sleep(state.options.poll_interval) => {}
        }
    }
    tracing::debug!(target: "caelum::driver", "Supervisor worker exited");
}

/// Non-blocking exit check; a dead driver is restarted in place.
async fn monitor_driver(state: &Arc<SupervisorState>) {
    let mut guard = state.driver.lock().await;
    let Some(driver) = guard.as_mut() else {
        return;
    };
    match driver.child.try_wait() {
        Ok(None) => {}
        Ok(Some(exit)) => {
            tracing::info!(
                target: "caelum::driver",
                driver = %driver.name,
                exit = %exit,
                "Driver exited"
            );
            *state.last_exit.write() = Some(exit);
            let name = driver.name.clone();
            if state.options.auto_restart {
                match spawn_driver(&name).await {
                    Ok(fresh) => {
                        tracing::info!(
                            target: "caelum::driver",
                            driver = %name,
                            pid = fresh.child.id(),
                            "Driver restarted"
                        );
                        *guard = Some(fresh);
                        state.restarts.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(e) => {
                        tracing::error!(
                            target: "caelum::driver",
                            driver = %name,
                            error = %e,
                            "Driver restart failed"
                        );
                        *guard = None;
                    }
                }
            } else {
                *guard = None;
            }
        }
        Err(e) => {
            tracing::error!(
                target: "caelum::driver",
                driver = %driver.name,
                error = %e,
                "Failed to poll driver"
            );
        }
    }
}

/// While listening, reads up to one chunk of driver stdout per tick.
async fn process_messages(state: &Arc<SupervisorState>) {
    if !state.listening.load(Ordering::SeqCst) {
        return;
    }
    let mut guard = state.driver.lock().await;
    let Some(driver) = guard.as_mut() else {
        return;
    };
    let mut buffer = vec![0u8; state.options.read_chunk];
    let read = tokio::time::timeout(
        Duration::from_millis(1),
        driver.stdout.read(&mut buffer),
    )
    .await;
    if let Ok(Ok(n)) = read {
        if n > 0 {
            let handler = state.handler.read().clone();
            match handler {
                Some(handler) => handler(&driver.name, &buffer[..n]),
                None => tracing::info!(
                    target: "caelum::driver",
                    driver = %driver.name,
                    bytes = n,
                    output = %String::from_utf8_lossy(&buffer[..n]),
                    "Driver output"
                ),
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use parking_lot::Mutex as SyncMutex;

    fn fast_options() -> SupervisorOptions {
        SupervisorOptions {
            poll_interval: Duration::from_millis(10),
            read_chunk: 1024,
            auto_restart: true,
        }
    }

    #[tokio::test]
    async fn test_spawn_failure_records_nothing() {
        let supervisor = DriverSupervisor::with_defaults();
        let err = supervisor.start("/definitely/not/a/driver").await.unwrap_err();
        assert!(matches!(err, DriverError::Spawn { .. }));
        assert!(supervisor.status().await.is_none());
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_restart_on_exit_changes_pid() {
        // A driver that exits immediately must be restarted with a new pid.
        let supervisor = DriverSupervisor::new(fast_options());
        supervisor.start("true").await.unwrap();
        let first_pid = supervisor.pid().await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(supervisor.restart_count() >= 1);
        assert!(supervisor.last_exit().is_some_and(|s| s.success()));
        let current_pid = supervisor.pid().await;
        if let (Some(first), Some(current)) = (first_pid, current_pid) {
            assert_ne!(first, current);
        }
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn test_send_and_listen_round_trip() {
        let supervisor = DriverSupervisor::new(fast_options());
        let collected: Arc<SyncMutex<Vec<u8>>> = Arc::new(SyncMutex::new(Vec::new()));
        let sink = Arc::clone(&collected);
        supervisor.set_output_handler(move |_, bytes| {
            sink.lock().extend_from_slice(bytes);
        });

        supervisor.start("cat").await.unwrap();
        supervisor.listen(true);
        supervisor.send(b"hello driver\n").await.unwrap();

        // Give the worker a few ticks to drain the echo.
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !collected.lock().is_empty() {
                break;
            }
        }
        supervisor.stop().await;
        let output = collected.lock().clone();
        assert_eq!(String::from_utf8_lossy(&output), "hello driver\n");
    }

    #[tokio::test]
    async fn test_stop_halts_monitoring() {
        let supervisor = DriverSupervisor::new(fast_options());
        supervisor.start("true").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        supervisor.stop().await;
        let after_stop = supervisor.restart_count();
        tokio::time::sleep(Duration::from_millis(100)).await;
        // Neither monitoring nor restarting runs after stop().
        assert_eq!(supervisor.restart_count(), after_stop);
        assert!(supervisor.status().await.is_none());
    }

    #[tokio::test]
    async fn test_send_without_driver() {
        let supervisor = DriverSupervisor::with_defaults();
        assert!(matches!(
            supervisor.send(b"ping").await.unwrap_err(),
            DriverError::NotRunning
        ));
    }
}
