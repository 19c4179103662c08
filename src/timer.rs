use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, error, warn};

use crate::{delay, error::TimerError, options::TimerOptions, state::Shared};

/// Repeating task timer backed by one dedicated thread per run.
///
/// A run sleeps for the interval, calls the task, and repeats until stopped.
/// [`stop`](Timer::stop) blocks until the worker thread has exited, and
/// dropping the timer stops it the same way.
///
/// ```no_run
/// use std::time::Duration;
/// use metronome::Timer;
///
/// let timer = Timer::new();
/// timer.start(Duration::from_millis(100), || println!("tick"))?;
/// std::thread::sleep(Duration::from_millis(350));
/// timer.stop();
/// # Ok::<(), metronome::TimerError>(())
/// ```
pub struct Timer {
    shared: Arc<Shared>,
    options: TimerOptions,
}

impl Timer {
    pub fn new() -> Self {
        Self::with_options(TimerOptions::default())
    }

    pub fn with_options(options: TimerOptions) -> Self {
        Self {
            shared: Arc::new(Shared::new()),
            options,
        }
    }

    /// Start calling `task` every `interval` on a background thread.
    ///
    /// The first call happens one full interval after this returns. Returns
    /// `Ok(false)` without touching the current run if the timer is already
    /// running or still draining a stop.
    pub fn start<F>(&self, interval: Duration, task: F) -> Result<bool, TimerError>
    where
        F: FnMut() + Send + 'static,
    {
        if interval.is_zero() {
            return Err(TimerError::ZeroInterval);
        }

        let mut state = self.shared.lock();
        if state.running {
            debug!(?interval, "timer already running, start ignored");
            return Ok(false);
        }

        //a run that ended on its own (panic or stop from the task) is still unjoined
        if let Some(worker) = state.worker.take() {
            join_worker(worker);
        }

        let run_id = state.run_id.wrapping_add(1);
        let shared = Arc::clone(&self.shared);
        let worker = self
            .options
            .builder(None)
            .spawn(move || run_loop(&shared, run_id, interval, task))?;

        //the worker cannot report exit before we release the lock
        state.run_id = run_id;
        state.running = true;
        state.interval = Some(interval);
        state.worker = Some(worker);
        debug!(run_id, ?interval, "timer started");
        Ok(true)
    }

    /// Stop the current run and wait for its thread to exit.
    ///
    /// Returns at once when idle. A caller arriving while another stop is in
    /// flight waits for the same drain. When called from inside the task the
    /// stop is only requested, since the thread cannot wait for itself.
    pub fn stop(&self) {
        let state = self.shared.lock();
        if !state.running {
            let mut state = state;
            if let Some(worker) = state.worker.take() {
                join_worker(worker);
            }
            return;
        }

        let run_id = state.run_id;
        let on_worker = state
            .worker
            .as_ref()
            .is_some_and(|worker| worker.thread().id() == thread::current().id());
        if on_worker {
            self.shared.request_stop();
            warn!(run_id, "stop called from the timer thread, not waiting for exit");
            return;
        }

        if self.shared.request_stop() {
            debug!(run_id, "timer stop requested");
        } else {
            debug!(run_id, "timer stop already in flight, waiting");
        }

        let mut state = self.shared.wait_exited(state, run_id);
        if state.run_id == run_id {
            if let Some(worker) = state.worker.take() {
                join_worker(worker);
            }
        }
        debug!(run_id, "timer stopped");
    }

    /// Same as [`stop`](Timer::stop).
    pub fn expire(&self) {
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    ///interval of the current run, `None` when idle
    pub fn interval(&self) -> Option<Duration> {
        self.shared.lock().interval
    }

    /// Sleep `delay` on the calling thread, then call `f`.
    ///
    /// Needs no started run; see [`delay::run_after`].
    pub fn run_after_blocking<F, R>(&self, delay: Duration, f: F)
    where
        F: FnOnce() -> R,
    {
        delay::run_after(delay, f);
    }

    /// Call `f` after `delay` on a detached thread named after this timer.
    ///
    /// Not tracked by the timer: [`stop`](Timer::stop) does not wait for it
    /// and it keeps going after the timer is dropped.
    pub fn run_after_async<F, R>(&self, delay: Duration, f: F) -> Result<(), TimerError>
    where
        F: FnOnce() -> R + Send + 'static,
    {
        delay::spawn_after_with(&self.options, delay, f)
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<F>(shared: &Shared, run_id: u64, interval: Duration, mut task: F)
where
    F: FnMut(),
{
    //task is dropped inside the closure, before stoppers are released
    let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
        while !shared.stop_requested() {
            thread::sleep(interval);
            task();
        }
    }));

    if outcome.is_err() {
        error!(run_id, "timer task panicked, ending run");
    } else {
        debug!(run_id, "timer loop observed stop");
    }
    shared.mark_exited();
}

fn join_worker(worker: JoinHandle<()>) {
    //the last handle may be dropped on the worker itself, it is already finishing
    if worker.thread().id() == thread::current().id() {
        return;
    }
    if worker.join().is_err() {
        error!("timer worker thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn new_timer_is_idle() {
        let timer = Timer::new();
        assert!(!timer.is_running());
        assert_eq!(timer.interval(), None);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let timer = Timer::new();
        let result = timer.start(Duration::ZERO, || {});
        assert!(matches!(result, Err(TimerError::ZeroInterval)));
        assert!(!timer.is_running());
    }

    #[test]
    fn start_reports_acceptance() {
        let timer = Timer::new();
        assert!(timer.start(Duration::from_millis(20), || {}).unwrap());
        assert!(!timer.start(Duration::from_millis(5), || {}).unwrap());
        assert_eq!(timer.interval(), Some(Duration::from_millis(20)));
        timer.stop();
        assert!(!timer.is_running());
        assert_eq!(timer.interval(), None);
    }

    #[test]
    fn worker_uses_configured_name() {
        let names = Arc::new(std::sync::Mutex::new(Vec::new()));
        let timer = Timer::with_options(TimerOptions::new().thread_name("ticker"));
        {
            let names = Arc::clone(&names);
            timer
                .start(Duration::from_millis(10), move || {
                    let name = thread::current().name().map(str::to_string);
                    names.lock().unwrap().push(name);
                })
                .unwrap();
        }
        thread::sleep(Duration::from_millis(60));
        timer.stop();

        let names = names.lock().unwrap();
        assert!(!names.is_empty());
        assert!(names.iter().all(|n| n.as_deref() == Some("ticker")));
    }

    #[test]
    fn expire_stops_run() {
        let count = Arc::new(AtomicUsize::new(0));
        let timer = Timer::new();
        {
            let count = Arc::clone(&count);
            timer
                .start(Duration::from_millis(10), move || {
                    count.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        thread::sleep(Duration::from_millis(35));
        timer.expire();
        let seen = count.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(count.load(Ordering::SeqCst), seen);
    }
}
