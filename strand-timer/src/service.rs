use crate::Error;

/// Callback invoked when a requested wake-up fires.
pub type WakeCallback = Box<dyn FnOnce() + Send>;

/// A runner capable of delivering "run this at or after tick T" wake-ups.
///
/// The delayed-task manager uses this seam to be woken once its earliest
/// deadline has elapsed. A deadline at or before the current tick asks for a
/// prompt wake-up. The runner decides which thread the callback fires on.
pub trait ServiceTaskRunner: Send + Sync {
    /// Request that `wake` be invoked at or after `deadline` ticks.
    ///
    /// Returns an error if the runner is shutting down and will not deliver
    /// the wake-up; the callback is dropped in that case.
    fn schedule_wake(&self, deadline: u64, wake: WakeCallback) -> Result<(), Error>;
}
