use thiserror::Error;

/// Errors returned by timer operations.
///
/// Starting a timer that is already running and stopping an idle one are
/// not errors; both are silently ignored.
#[derive(Debug, Error)]
pub enum TimerError {
    ///interval passed to start was zero
    #[error("timer interval must be greater than zero")]
    ZeroInterval,
    ///the OS refused to create a thread
    #[error("failed to spawn timer thread: {0}")]
    Spawn(#[from] std::io::Error),
    ///async operation called outside a tokio runtime
    #[error("no tokio runtime is available on this thread")]
    NoRuntime,
}
