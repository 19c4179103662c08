/// Settings for the threads a [`Timer`](crate::Timer) spawns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerOptions {
    ///name given to the periodic worker thread
    pub thread_name: String,
    ///stack size for spawned threads, platform default when `None`
    pub stack_size: Option<usize>,
}

impl TimerOptions {
    ///defaults: `metronome-timer` threads, platform stack size
    pub fn new() -> Self {
        Self {
            thread_name: "metronome-timer".to_string(),
            stack_size: None,
        }
    }

    ///set the worker thread name, delayed calls append `-delay`
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    ///set the stack size in bytes for every spawned thread
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    pub(crate) fn builder(&self, suffix: Option<&str>) -> std::thread::Builder {
        let name = match suffix {
            Some(suffix) => format!("{}-{}", self.thread_name, suffix),
            None => self.thread_name.clone(),
        };
        let builder = std::thread::Builder::new().name(name);
        match self.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self::new()
    }
}
