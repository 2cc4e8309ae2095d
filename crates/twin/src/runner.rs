use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use procura_ai::AnomalyGate;

use crate::engine::DigitalTwin;
use crate::store::TwinStore;

/// Cadence for the background step loop.
#[derive(Debug, Clone)]
pub struct SimulationRunner {
    pub interval: Duration,
}

impl Default for SimulationRunner {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
        }
    }
}

/// Handle for the running scheduler thread.
///
/// Dropping the handle stops the thread too; `shutdown` makes that explicit.
#[derive(Debug)]
pub struct SimulationRunnerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl SimulationRunnerHandle {
    /// Gracefully stop the runner thread and wait for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for SimulationRunnerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl SimulationRunner {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Spawn the scheduler.
    ///
    /// - Steps once per `interval` while the twin's running flag is set
    /// - A panicking step is caught, logged and recorded; the loop goes on
    pub fn spawn<S, G>(&self, name: &'static str, twin: Arc<DigitalTwin<S, G>>) -> std::io::Result<SimulationRunnerHandle>
    where
        S: TwinStore + 'static,
        G: AnomalyGate + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let interval = self.interval.max(Duration::from_millis(1));

        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner_loop(name, interval, shutdown_rx, twin))?;

        Ok(SimulationRunnerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn runner_loop<S, G>(name: &'static str, interval: Duration, shutdown_rx: mpsc::Receiver<()>, twin: Arc<DigitalTwin<S, G>>)
where
    S: TwinStore,
    G: AnomalyGate,
{
    info!(runner = name, interval_ms = interval.as_millis() as u64, "simulation runner started");

    let mut next_tick = Instant::now() + interval;

    loop {
        let wait = next_tick.saturating_duration_since(Instant::now());
        match shutdown_rx.recv_timeout(wait) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        // Keep a stable cadence even if we were delayed.
        let now = Instant::now();
        while next_tick <= now {
            next_tick += interval;
        }

        if !twin.is_running() {
            continue;
        }

        match catch_unwind(AssertUnwindSafe(|| twin.step())) {
            Ok(outcome) if !outcome.committed => {
                warn!(runner = name, date = %outcome.date, error = ?outcome.error, "step rolled back");
            }
            Ok(_) => {}
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                let day = twin.abort_day(format!("Step aborted: {message}"));
                error!(runner = name, date = %day, panic = %message, "simulation step panicked");
            }
        }
    }

    info!(runner = name, "simulation runner stopped");
}
