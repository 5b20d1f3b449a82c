// Background reconcile loop -- probes devices and syncs the inventory forever.
//
// The loop thread spawns once at startup and lives until stopped or the
// process exits. Each cycle opens a short-lived store, reconciles once, and
// drops the store before sleeping. A failed or panicking cycle is logged and
// skipped; the thread never dies from one.

use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rusqlite::Connection;

use super::{reconcile_once, ReconcileSummary};
use crate::camera::InventoryStore;
use crate::constants::RECONCILE_THREAD_NAME;
use crate::error::Result;
use crate::probe::DeviceEnumerator;

/// Opens a fresh store for each cycle.
pub trait SessionFactory: Send + 'static {
    type Store: InventoryStore;

    fn open(&self) -> Result<Self::Store>;
}

/// Short-lived SQLite connections to an already-migrated database.
#[derive(Debug, Clone)]
pub struct SqliteSessionFactory {
    db_path: PathBuf,
}

impl SqliteSessionFactory {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self { db_path: db_path.into() }
    }
}

impl SessionFactory for SqliteSessionFactory {
    type Store = Connection;

    fn open(&self) -> Result<Connection> {
        Ok(crate::db::open_db_connection(&self.db_path)?)
    }
}

/// Stop flag the loop sleeps on, so stopping interrupts the interval wait.
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    cv: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        let mut stopped = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        *stopped = true;
        self.cv.notify_all();
    }

    /// Sleep up to `timeout`; returns true if a stop was requested.
    fn wait(&self, timeout: Duration) -> bool {
        let guard = self.stopped.lock().unwrap_or_else(|e| e.into_inner());
        let (guard, _) = self
            .cv
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(|e| e.into_inner());
        *guard
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Default)]
struct LoopCounters {
    cycles: AtomicU64,
    failures: AtomicU64,
}

/// Handle to the running loop. Dropping it (or `detach`) leaves the loop running.
pub struct LoopHandle {
    stop: Arc<StopSignal>,
    counters: Arc<LoopCounters>,
    thread: JoinHandle<()>,
}

impl LoopHandle {
    /// Cycles attempted so far, successful or not
    pub fn cycles(&self) -> u64 {
        self.counters.cycles.load(Ordering::Relaxed)
    }

    /// Cycles that ended in an error or panic
    pub fn failures(&self) -> u64 {
        self.counters.failures.load(Ordering::Relaxed)
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Request a stop and wait for the current cycle to finish.
    pub fn stop(self) -> thread::Result<()> {
        self.stop.stop();
        self.thread.join()
    }

    /// Block until the loop exits (which only happens after a stop).
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }

    /// Let the loop run for the life of the process.
    pub fn detach(self) {}
}

/// Spawn the reconcile loop thread. Call once during startup.
pub fn start_reconciliation_loop<F, E>(
    factory: F,
    enumerator: E,
    interval: Duration,
) -> io::Result<LoopHandle>
where
    F: SessionFactory,
    E: DeviceEnumerator + Send + 'static,
{
    let stop = Arc::new(StopSignal::default());
    let counters = Arc::new(LoopCounters::default());

    let thread = {
        let stop = Arc::clone(&stop);
        let counters = Arc::clone(&counters);
        thread::Builder::new()
            .name(RECONCILE_THREAD_NAME.into())
            .spawn(move || reconcile_loop(factory, enumerator, interval, &stop, &counters))?
    };

    Ok(LoopHandle { stop, counters, thread })
}

fn reconcile_loop<F, E>(
    factory: F,
    enumerator: E,
    interval: Duration,
    stop: &StopSignal,
    counters: &LoopCounters,
) where
    F: SessionFactory,
    E: DeviceEnumerator,
{
    log::info!("Camera reconcile loop started (interval: {}s)", interval.as_secs_f64());

    while !stop.is_stopped() {
        let result = catch_unwind(AssertUnwindSafe(|| run_cycle(&factory, &enumerator)));
        counters.cycles.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok(Ok(summary)) => log::debug!(
                "Reconcile cycle: observed {}, created {}, refreshed {}, reconnected {}, disconnected {}, untouched {}",
                summary.observed,
                summary.created,
                summary.refreshed,
                summary.reconnected,
                summary.disconnected,
                summary.untouched
            ),
            Ok(Err(e)) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                log::error!("Camera reconcile cycle failed: {}", e);
            }
            Err(_) => {
                counters.failures.fetch_add(1, Ordering::Relaxed);
                log::error!("Camera reconcile cycle panicked (recovered)");
            }
        }

        if stop.wait(interval) {
            break;
        }
    }

    log::info!("Camera reconcile loop stopped");
}

fn run_cycle<F, E>(factory: &F, enumerator: &E) -> Result<ReconcileSummary>
where
    F: SessionFactory,
    E: DeviceEnumerator,
{
    let store = factory.open()?;
    reconcile_once(&store, enumerator)
}
