//! Fixed-interval sweep loop with drift correction and cooperative stop.
//!
//! The loop runs on its own thread. After each sweep it sleeps for the
//! remainder of the interval so wake-ups stay on the nominal cadence even
//! when a sweep takes longer than one interval. A failed or panicking sweep
//! ends the loop; there is no retry.
//!
//! ```text
//!   Idle ──start()──▶ Running ──stop()──▶ Stopping ──▶ Stopped
//!    │                   │                              ▲
//!    │                   └────────── sweep failed ──────┤
//!    └─────────────────────stop()───────────────────────┘
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, error, info};

use crate::agent::Sweep;

/// Sentinel for "no sweep started yet".
const NO_SWEEP: i64 = i64::MIN;

/// Loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Running,
    /// Stop requested; the loop exits at its next check.
    Stopping,
    Stopped,
}

/// How the loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// Stopped on request.
    Stopped,
    /// A sweep failed or panicked; carries the error message.
    Failed(String),
}

/// Error starting the loop.
#[derive(Debug)]
pub enum ScheduleError {
    /// `start()` was already called.
    AlreadyStarted,
    /// The sweep thread could not be spawned.
    Spawn(std::io::Error),
}

impl std::fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScheduleError::AlreadyStarted => write!(f, "scheduler already started"),
            ScheduleError::Spawn(e) => write!(f, "failed to spawn sweep thread: {}", e),
        }
    }
}

impl std::error::Error for ScheduleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScheduleError::AlreadyStarted => None,
            ScheduleError::Spawn(e) => Some(e),
        }
    }
}

/// Point-in-time view of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    pub interval: Duration,
    /// Start of the most recent sweep, unix seconds.
    pub last_sweep_start: Option<i64>,
    /// True until a stop is requested or the loop ends.
    pub keep_running: bool,
    /// True while the loop thread is alive.
    pub alive: bool,
}

/// Control surface offered to a hosting environment.
pub trait Lifecycle {
    fn start(&self) -> Result<(), ScheduleError>;

    /// Requests a stop and blocks until the loop has ended.
    fn stop(&self);

    fn is_running(&self) -> bool;
}

/// Time to sleep after a sweep that took `runtime_secs`.
///
/// Negative runtimes (clock stepped backwards) count by magnitude. A zero
/// runtime sleeps the full interval.
pub fn sleep_duration(interval_secs: u64, runtime_secs: i64) -> Duration {
    if interval_secs == 0 {
        return Duration::ZERO;
    }
    let runtime = runtime_secs.unsigned_abs();
    if runtime == 0 {
        Duration::from_secs(interval_secs)
    } else {
        Duration::from_secs(interval_secs - runtime % interval_secs)
    }
}

struct Control {
    phase: Phase,
    exit: Option<Exit>,
}

struct Shared {
    control: Mutex<Control>,
    changed: Condvar,
    last_sweep_start: AtomicI64,
}

impl Shared {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn keep_running(&self) -> bool {
        self.control().phase == Phase::Running
    }

    /// Sleeps for `pause` unless a stop arrives first. Returns whether the
    /// loop should continue.
    fn sleep(&self, pause: Duration) -> bool {
        let guard = self.control();
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, pause, |c| c.phase == Phase::Running)
            .unwrap_or_else(PoisonError::into_inner);
        guard.phase == Phase::Running
    }

    fn finish(&self, exit: Exit) {
        let mut control = self.control();
        control.phase = Phase::Stopped;
        control.exit = Some(exit);
        self.changed.notify_all();
    }

    fn wait_stopped(&self) -> Exit {
        let guard = self.control();
        let control = self
            .changed
            .wait_while(guard, |c| c.phase != Phase::Stopped)
            .unwrap_or_else(PoisonError::into_inner);
        control.exit.clone().unwrap_or(Exit::Stopped)
    }
}

/// Drives a [`Sweep`] every `interval`.
pub struct Scheduler<S: Sweep + 'static> {
    interval: Duration,
    stack_size: Option<usize>,
    shared: Arc<Shared>,
    /// Taken by the loop thread once it runs.
    sweep: Arc<Mutex<Option<S>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Sweep + 'static> Scheduler<S> {
    /// Creates an idle scheduler. Intervals are whole seconds.
    pub fn new(interval: Duration, sweep: S) -> Self {
        Self {
            interval,
            stack_size: None,
            shared: Arc::new(Shared {
                control: Mutex::new(Control {
                    phase: Phase::Idle,
                    exit: None,
                }),
                changed: Condvar::new(),
                last_sweep_start: AtomicI64::new(NO_SWEEP),
            }),
            sweep: Arc::new(Mutex::new(Some(sweep))),
            handle: Mutex::new(None),
        }
    }

    /// Sets the stack size of the sweep thread.
    pub fn with_stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub fn phase(&self) -> Phase {
        self.shared.control().phase
    }

    pub fn state(&self) -> ScheduleState {
        let phase = self.phase();
        let last = self.shared.last_sweep_start.load(Ordering::SeqCst);
        ScheduleState {
            interval: self.interval,
            last_sweep_start: (last != NO_SWEEP).then_some(last),
            keep_running: phase == Phase::Running,
            alive: matches!(phase, Phase::Running | Phase::Stopping),
        }
    }

    /// Blocks until the loop ends, then reports why.
    ///
    /// Returns immediately with [`Exit::Stopped`] if the scheduler was
    /// stopped before it started.
    pub fn wait(&self) -> Exit {
        let exit = self.shared.wait_stopped();
        self.join();
        exit
    }

    fn join(&self) {
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle
            && handle.join().is_err()
        {
            error!("Sweep thread panicked");
        }
    }
}

impl<S: Sweep + 'static> Lifecycle for Scheduler<S> {
    fn start(&self) -> Result<(), ScheduleError> {
        let mut control = self.shared.control();
        if control.phase != Phase::Idle {
            return Err(ScheduleError::AlreadyStarted);
        }

        let shared = Arc::clone(&self.shared);
        let slot = Arc::clone(&self.sweep);
        let interval = self.interval;
        let mut builder = thread::Builder::new().name("cdagent-sweep".into());
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        // The sweep leaves its slot only once the thread runs.
        let handle = builder
            .spawn(move || {
                let sweep = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
                match sweep {
                    Some(sweep) => run(&shared, interval, sweep),
                    None => shared.finish(Exit::Stopped),
                }
            })
            .map_err(ScheduleError::Spawn)?;

        control.phase = Phase::Running;
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!("Sweep loop started, interval={}s", interval.as_secs());
        Ok(())
    }

    fn stop(&self) {
        {
            let mut control = self.shared.control();
            match control.phase {
                Phase::Idle => {
                    control.phase = Phase::Stopped;
                    control.exit = Some(Exit::Stopped);
                }
                Phase::Running => control.phase = Phase::Stopping,
                Phase::Stopping | Phase::Stopped => {}
            }
            self.shared.changed.notify_all();
        }
        self.shared.wait_stopped();
        self.join();
    }

    fn is_running(&self) -> bool {
        self.state().alive
    }
}

fn run<S: Sweep>(shared: &Shared, interval: Duration, mut sweep: S) {
    let interval_secs = interval.as_secs();

    let exit = loop {
        if !shared.keep_running() {
            break Exit::Stopped;
        }

        let start = Utc::now().timestamp();
        shared.last_sweep_start.store(start, Ordering::SeqCst);
        match panic::catch_unwind(AssertUnwindSafe(|| sweep.sweep(start))) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                error!("Sweep failed, stopping: {}", e);
                break Exit::Failed(e.to_string());
            }
            Err(payload) => {
                let reason = format!("sweep panicked: {}", panic_message(payload.as_ref()));
                error!("{}, stopping", reason);
                break Exit::Failed(reason);
            }
        }
        let runtime = Utc::now().timestamp() - start;

        let pause = sleep_duration(interval_secs, runtime);
        debug!("Sweep took {}s, sleeping {:?}", runtime, pause);
        if !shared.sleep(pause) {
            break Exit::Stopped;
        }
    };

    info!("Sweep loop ended: {:?}", exit);
    shared.finish(exit);
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic"
    }
}
