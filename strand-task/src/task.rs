use std::panic::Location;
use std::time::Duration;

/// A single schedulable unit of work.
///
/// A [`Task`] owns its callback exclusively; whichever container currently
/// holds the task (poster, sequence, or the worker executing it) owns it.
/// Running a task consumes it, so a callback can be invoked at most once.
pub struct Task {
    callback: Option<Box<dyn FnOnce() + Send>>,
    location: &'static Location<'static>,
    delay: Duration,
    queue_time: Option<u64>,
    delayed_run_time: Option<u64>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("location", &self.location)
            .field("delay", &self.delay)
            .field("delayed_run_time", &self.delayed_run_time)
            .finish()
    }
}

impl Task {
    /// Create an undelayed task from a callback.
    ///
    /// The caller's source location is captured for diagnostics.
    #[track_caller]
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self::with_delay(callback, Duration::ZERO)
    }

    /// Create a task that must not run before `delay` has elapsed.
    ///
    /// The concrete deadline is computed against the scheduler clock when the
    /// task reaches the delayed-task manager.
    #[track_caller]
    pub fn with_delay(callback: impl FnOnce() + Send + 'static, delay: Duration) -> Self {
        Self {
            callback: Some(Box::new(callback)),
            location: Location::caller(),
            delay,
            queue_time: None,
            delayed_run_time: None,
        }
    }

    /// The source location the task was created at. Diagnostics only.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// The delay requested at creation.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Returns true if the task was created with a non-zero delay.
    pub fn is_delayed(&self) -> bool {
        !self.delay.is_zero()
    }

    /// The tick at which the task was admitted by the tracker, if any.
    pub fn queue_time(&self) -> Option<u64> {
        self.queue_time
    }

    /// Record the admission tick. Set once by the tracker.
    pub fn set_queue_time(&mut self, tick: u64) {
        self.queue_time = Some(tick);
    }

    /// The tick before which the task must not run, if one was computed.
    pub fn delayed_run_time(&self) -> Option<u64> {
        self.delayed_run_time
    }

    /// Record the computed run deadline. Set once by the delayed-task manager.
    pub fn set_delayed_run_time(&mut self, tick: u64) {
        self.delayed_run_time = Some(tick);
    }

    /// Run the task's callback, consuming the task.
    ///
    /// ### Panics
    /// Panics if the callback was already taken out of the task.
    pub fn run(mut self) {
        let callback = self
            .callback
            .take()
            .expect("task callback already taken");
        callback();
    }
}
