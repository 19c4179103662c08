//! One-shot delayed calls.
//!
//! Arguments are bound by capturing them in the closure at call time. Any
//! value the closure returns is dropped; capture a slot or channel to get a
//! result back.

use std::{thread, time::Duration};

use tracing::debug;

use crate::{error::TimerError, options::TimerOptions};

/// Sleep `delay` on the calling thread, then call `f` on it.
pub fn run_after<F, R>(delay: Duration, f: F)
where
    F: FnOnce() -> R,
{
    if !delay.is_zero() {
        thread::sleep(delay);
    }
    let _ = f();
}

/// Call `f` after `delay` on a new detached thread and return immediately.
///
/// The spawned thread is never tracked: it cannot be cancelled and nothing
/// waits for it, including [`Timer::stop`](crate::Timer::stop).
pub fn spawn_after<F, R>(delay: Duration, f: F) -> Result<(), TimerError>
where
    F: FnOnce() -> R + Send + 'static,
{
    spawn_after_with(&TimerOptions::default(), delay, f)
}

pub(crate) fn spawn_after_with<F, R>(
    options: &TimerOptions,
    delay: Duration,
    f: F,
) -> Result<(), TimerError>
where
    F: FnOnce() -> R + Send + 'static,
{
    //dropping the join handle detaches the thread
    let _detached = options
        .builder(Some("delay"))
        .spawn(move || run_after(delay, f))?;
    debug!(?delay, "scheduled detached delayed call");
    Ok(())
}
