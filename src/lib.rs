//! Periodic task timer with a synchronous stop, plus one-shot delayed calls.
//!
//! [`Timer`] runs a task on its own thread every interval until stopped;
//! [`rt::AsyncTimer`] does the same as a tokio task. Both can also run a
//! closure once after a delay, inline or detached.

pub mod delay;
pub mod error;
pub mod options;
pub mod rt;
mod state;
pub mod timer;

pub use error::TimerError;
pub use options::TimerOptions;
pub use rt::AsyncTimer;
pub use timer::Timer;
