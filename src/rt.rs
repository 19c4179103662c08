//! Periodic timer and delayed calls on the tokio runtime.
//!
//! Same contract as [`Timer`](crate::Timer), with tasks running as tokio
//! tasks instead of dedicated threads and `stop` awaited instead of blocking.

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use tokio::{
    runtime::Handle,
    sync::Notify,
    task::{self, Id},
};
use tracing::{debug, error, warn};

use crate::error::TimerError;

static NEXT_RUN: AtomicU64 = AtomicU64::new(1);

type Drained = Shared<BoxFuture<'static, ()>>;

struct Run {
    id: u64,
    task_id: Id,
    interval: Duration,
    stop: Arc<AtomicBool>,
    //wakes a sleeping loop when the timer is dropped
    dropped: Arc<Notify>,
    //set once the loop future is gone, however it went
    ended: Arc<AtomicBool>,
    drained: Drained,
}

impl Run {
    fn is_live(&self) -> bool {
        !self.ended.load(Ordering::Acquire)
    }
}

/// Repeating task timer driven by a single tokio task per run.
///
/// Dropping a running `AsyncTimer` cannot wait for the loop. It ends the run
/// immediately if the loop is sleeping, or right after the invocation in
/// flight otherwise.
pub struct AsyncTimer {
    slot: Mutex<Option<Run>>,
}

impl AsyncTimer {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Start awaiting `task()` every `interval` on the current runtime.
    ///
    /// Returns `Ok(false)` if a run is already active or draining.
    pub fn start<F, Fut>(&self, interval: Duration, task: F) -> Result<bool, TimerError>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if interval.is_zero() {
            return Err(TimerError::ZeroInterval);
        }
        let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;

        let mut slot = lock(&self.slot);
        //a run whose loop is gone (finished or dropped with its runtime) counts as idle
        if slot.as_ref().is_some_and(Run::is_live) {
            debug!(?interval, "async timer already running, start ignored");
            return Ok(false);
        }

        let id = NEXT_RUN.fetch_add(1, Ordering::Relaxed);
        let stop = Arc::new(AtomicBool::new(false));
        let dropped = Arc::new(Notify::new());
        let ended = Arc::new(AtomicBool::new(false));
        let handle = runtime.spawn(run_loop(
            EndOnDrop(Arc::clone(&ended)),
            id,
            interval,
            Arc::clone(&stop),
            Arc::clone(&dropped),
            task,
        ));
        let task_id = handle.id();

        *slot = Some(Run {
            id,
            task_id,
            interval,
            stop,
            dropped,
            ended,
            drained: handle.map(|_| ()).boxed().shared(),
        });
        debug!(run_id = id, ?interval, "async timer started");
        Ok(true)
    }

    /// Request a stop and wait until the loop has exited.
    ///
    /// Concurrent callers all wait on the same drain. Called from inside the
    /// task, the stop is only requested.
    pub async fn stop(&self) {
        let (id, drained) = {
            let slot = lock(&self.slot);
            let Some(run) = slot.as_ref().filter(|run| run.is_live()) else {
                return;
            };

            if !run.stop.swap(true, Ordering::AcqRel) {
                debug!(run_id = run.id, "async timer stop requested");
            } else {
                debug!(run_id = run.id, "async timer stop already in flight, waiting");
            }

            if task::try_id() == Some(run.task_id) {
                warn!(run_id = run.id, "stop called from the timer task, not waiting for exit");
                return;
            }
            (run.id, run.drained.clone())
        };

        drained.await;
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(|run| run.id == id) {
            *slot = None;
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.slot).as_ref().is_some_and(Run::is_live)
    }

    pub fn interval(&self) -> Option<Duration> {
        lock(&self.slot)
            .as_ref()
            .filter(|run| run.is_live())
            .map(|run| run.interval)
    }

    /// See [`run_after`].
    pub async fn run_after<Fut>(&self, delay: Duration, fut: Fut)
    where
        Fut: Future,
    {
        run_after(delay, fut).await;
    }

    /// See [`spawn_after`].
    pub fn spawn_after<Fut>(&self, delay: Duration, fut: Fut) -> Result<(), TimerError>
    where
        Fut: Future + Send + 'static,
    {
        spawn_after(delay, fut)
    }
}

impl Default for AsyncTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AsyncTimer {
    fn drop(&mut self) {
        if let Some(run) = lock(&self.slot).as_ref().filter(|run| run.is_live()) {
            run.stop.store(true, Ordering::Release);
            //stores a permit if the loop is mid-task
            run.dropped.notify_one();
            debug!(run_id = run.id, "async timer dropped while running");
        }
    }
}

/// Wait `delay`, then await `fut` in the calling task. Its output is dropped.
pub async fn run_after<Fut>(delay: Duration, fut: Fut)
where
    Fut: Future,
{
    tokio::time::sleep(delay).await;
    let _ = fut.await;
}

/// Run `fut` after `delay` on a detached tokio task.
///
/// The task is not tracked and cannot be cancelled.
pub fn spawn_after<Fut>(delay: Duration, fut: Fut) -> Result<(), TimerError>
where
    Fut: Future + Send + 'static,
{
    let runtime = Handle::try_current().map_err(|_| TimerError::NoRuntime)?;
    runtime.spawn(run_after(delay, fut));
    debug!(?delay, "scheduled detached delayed task");
    Ok(())
}

///Marks the run ended when the loop future is dropped, including when its
///runtime shuts down before the loop finishes or is ever polled.
struct EndOnDrop(Arc<AtomicBool>);

impl Drop for EndOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

async fn run_loop<F, Fut>(
    end: EndOnDrop,
    id: u64,
    interval: Duration,
    stop: Arc<AtomicBool>,
    dropped: Arc<Notify>,
    mut task: F,
) where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    while !stop.load(Ordering::Acquire) {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = dropped.notified() => break,
        }

        let outcome = AssertUnwindSafe(async { task().await }).catch_unwind().await;
        if outcome.is_err() {
            error!(run_id = id, "async timer task panicked, ending run");
            break;
        }
    }
    drop(task);
    drop(end);
    debug!(run_id = id, "async timer run ended");
}

fn lock(slot: &Mutex<Option<Run>>) -> MutexGuard<'_, Option<Run>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
