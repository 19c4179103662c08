use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Condvar, Mutex, MutexGuard, PoisonError,
    },
    thread::JoinHandle,
    time::Duration,
};

///Flags guarded by the state mutex
#[derive(Debug, Default)]
pub(crate) struct RunState {
    ///true from an accepted start until the worker loop has exited
    pub running: bool,
    ///bumped on every accepted start
    pub run_id: u64,
    pub interval: Option<Duration>,
    ///worker of the current (or last, not yet joined) run
    pub worker: Option<JoinHandle<()>>,
}

/// State shared between a [`Timer`](crate::Timer) and its worker thread.
///
/// The stop request is read by the worker without locking; the mutex and
/// condvar only carry the "worker has exited" handoff back to stoppers.
pub(crate) struct Shared {
    stop_requested: AtomicBool,
    state: Mutex<RunState>,
    exited: Condvar,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            stop_requested: AtomicBool::new(false),
            state: Mutex::new(RunState::default()),
            exited: Condvar::new(),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }

    ///raise the stop flag, returns false if it was already raised
    pub fn request_stop(&self) -> bool {
        !self.stop_requested.swap(true, Ordering::AcqRel)
    }

    ///called once by the worker after its loop has ended
    pub fn mark_exited(&self) {
        let mut state = self.lock();
        state.running = false;
        state.interval = None;
        self.stop_requested.store(false, Ordering::Release);
        self.exited.notify_all();
    }

    ///block until run `run_id` has exited (or been replaced by a newer run)
    pub fn wait_exited<'a>(
        &self,
        guard: MutexGuard<'a, RunState>,
        run_id: u64,
    ) -> MutexGuard<'a, RunState> {
        self.exited
            .wait_while(guard, |state| state.running && state.run_id == run_id)
            .unwrap_or_else(PoisonError::into_inner)
    }
}
