use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use metronome::{Timer, TimerError, TimerOptions};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), TimerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metronome=debug")),
        )
        .init();

    let beats = Arc::new(AtomicU32::new(0));
    let timer = Timer::with_options(TimerOptions::new().thread_name("heartbeat"));

    let counter = beats.clone();
    timer.start(Duration::from_millis(250), move || {
        let beat = counter.fetch_add(1, Ordering::SeqCst) + 1;
        println!("beat {beat}");
    })?;

    //a second start is ignored while the first run is active
    timer.start(Duration::from_millis(10), || println!("never printed"))?;

    timer.run_after_async(Duration::from_millis(600), || println!("one-shot fired"))?;
    timer.run_after_blocking(Duration::from_millis(100), || println!("blocking call done"));

    thread::sleep(Duration::from_secs(1));
    timer.stop();
    println!("stopped after {} beats", beats.load(Ordering::SeqCst));

    Ok(())
}
