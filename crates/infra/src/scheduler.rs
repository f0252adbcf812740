//! Periodic auto-release runner on a background thread.

use std::io;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::EngineError;
use crate::reconciler::AutoReleaseReport;

/// Scheduler runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchedulerStats {
    pub runs: u64,
    /// Orders released across all runs.
    pub released: u64,
    /// Per-order errors across all runs.
    pub errors: u64,
    /// Runs that failed as a whole.
    pub failed_runs: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub uptime_secs: u64,
}

impl SchedulerStats {
    fn record(&mut self, result: &Result<AutoReleaseReport, EngineError>) {
        self.runs += 1;
        self.last_run_at = Some(Utc::now());
        match result {
            Ok(report) => {
                self.released += report.released as u64;
                self.errors += report.errors.len() as u64;
            }
            Err(_) => self.failed_runs += 1,
        }
    }
}

/// Handle to control a running scheduler.
#[derive(Debug)]
pub struct AutoReleaseHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<SchedulerStats>>,
}

impl AutoReleaseHandle {
    /// Request graceful shutdown and wait for the current run to finish.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct AutoReleaseScheduler {
    interval: Duration,
    name: String,
}

impl AutoReleaseScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            name: "auto-release".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Spawn the scheduler thread. `run` is invoked once per interval.
    pub fn spawn<F>(self, run: F) -> io::Result<AutoReleaseHandle>
    where
        F: FnMut() -> Result<AutoReleaseReport, EngineError> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(SchedulerStats::default()));
        let thread_stats = Arc::clone(&stats);

        let join = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || scheduler_loop(self, run, shutdown_rx, thread_stats))?;

        Ok(AutoReleaseHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn scheduler_loop<F>(
    scheduler: AutoReleaseScheduler,
    mut run: F,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<SchedulerStats>>,
) where
    F: FnMut() -> Result<AutoReleaseReport, EngineError>,
{
    info!(scheduler = %scheduler.name, interval_secs = scheduler.interval.as_secs(), "scheduler started");
    let started = Instant::now();

    loop {
        match shutdown_rx.recv_timeout(scheduler.interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        let result = run();
        match &result {
            Ok(report) if report.errors.is_empty() => {
                info!(scheduler = %scheduler.name, released = report.released, "auto-release run finished");
            }
            Ok(report) => {
                warn!(
                    scheduler = %scheduler.name,
                    released = report.released,
                    errors = report.errors.len(),
                    "auto-release run finished with errors"
                );
            }
            Err(e) => {
                error!(scheduler = %scheduler.name, error = %e, "auto-release run failed");
            }
        }

        if let Ok(mut s) = stats.lock() {
            s.record(&result);
            s.uptime_secs = started.elapsed().as_secs();
        }
    }

    info!(scheduler = %scheduler.name, "scheduler stopped");
}
