use std::sync::Arc;

use log::{debug, trace};
use parking_lot::{Condvar, Mutex};
use strand_task::{Sequence, ShutdownBehavior, Task};
use strand_timer::Clock;

use crate::context::{self, ExecutionContext};
use crate::state::{
    CompleteShutdownResult, FinishedAction, PostTaskResult, RegisterResult, SourceDoneAction,
    State, TaskAction,
};
use crate::MetricsSink;

const LOG: &str = "strand_tracker::tracker";

type FlushCallback = Box<dyn FnOnce() + Send>;

/// The admission-control and shutdown-coordination core.
///
/// A [`TaskTracker`] decides whether a task may be posted given the current
/// shutdown phase, runs tasks with the ambient execution context installed
/// and torn down around each callback, and coordinates an at-most-once
/// shutdown that blocks exactly until every admitted `BlockShutdown` task has
/// run.
///
/// Trackers are constructed and owned by their caller; cloning yields another
/// handle to the same instance. There is no process-wide singleton and no
/// reset hook: tests build a fresh tracker each.
#[derive(Clone)]
pub struct TaskTracker {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for TaskTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskTracker").finish()
    }
}

struct Shared {
    clock: Clock,
    metrics: Option<Arc<dyn MetricsSink>>,
    inner: Mutex<Inner>,
    shutdown_cv: Condvar,
    flush_cv: Condvar,
}

struct Inner {
    state: State,
    flush_callback: Option<FlushCallback>,
}

impl TaskTracker {
    /// Create a tracker that reads time from `clock`.
    pub fn new(clock: Clock) -> Self {
        Self::build(clock, None)
    }

    /// Create a tracker that reports post-to-run latency to `metrics`.
    pub fn with_metrics(clock: Clock, metrics: Arc<dyn MetricsSink>) -> Self {
        Self::build(clock, Some(metrics))
    }

    fn build(clock: Clock, metrics: Option<Arc<dyn MetricsSink>>) -> Self {
        Self {
            shared: Arc::new(Shared {
                clock,
                metrics,
                inner: Mutex::new(Inner {
                    state: State::new(),
                    flush_callback: None,
                }),
                shutdown_cv: Condvar::new(),
                flush_cv: Condvar::new(),
            }),
        }
    }

    /// Decide whether `task` may be posted, stamping its queue time on
    /// admission.
    ///
    /// Must be called exactly once per task, before the task is pushed into a
    /// sequence. Returns false when the task will never run (shutdown has
    /// started and the behavior is not `BlockShutdown`), in which case the
    /// caller must discard the task.
    ///
    /// ### Panics
    /// Panics if `behavior` is `BlockShutdown` and shutdown has already
    /// completed.
    pub fn will_post_task(&self, task: &mut Task, behavior: ShutdownBehavior) -> bool {
        let result = self.shared.inner.lock().state.will_post_task(behavior);
        match result {
            PostTaskResult::Allowed => {
                task.set_queue_time(self.shared.clock.tick());
                true
            }
            PostTaskResult::Rejected => {
                trace!(target: LOG, "rejected {behavior:?} task posted during shutdown");
                false
            }
        }
    }

    /// Accept `sequence` for execution, returning the capability token a
    /// worker needs to run its tasks.
    ///
    /// Returns `None` if the sequence's tasks would not be allowed to run
    /// under the current shutdown phase (the admission logic of
    /// [`TaskTracker::will_post_task`], evaluated against the sequence).
    pub fn register_task_source(&self, sequence: Arc<Sequence>) -> Option<RegisteredTaskSource> {
        let behavior = sequence.traits().shutdown_behavior();
        let result = self.shared.inner.lock().state.register_task_source(behavior);
        match result {
            RegisterResult::Registered => Some(RegisteredTaskSource {
                shared: Arc::clone(&self.shared),
                sequence,
                will_run: false,
                released: false,
            }),
            RegisterResult::Refused => {
                trace!(target: LOG, "refused {behavior:?} sequence during shutdown");
                None
            }
        }
    }

    /// Pop one task from the front of the source's sequence and run it, with
    /// the ambient execution context installed for the callback's duration.
    ///
    /// The queue transaction is released before the callback is invoked, so a
    /// task that re-enters the scheduler cannot deadlock. If shutdown has
    /// completed, or has started and the task is not `BlockShutdown`, the
    /// task is discarded without running.
    ///
    /// Returns the source back if the sequence still has pending tasks and
    /// should be rescheduled; otherwise the registration is released and
    /// flush waiters are notified.
    ///
    /// ### Panics
    /// Panics if [`RegisteredTaskSource::will_run_task`] was not called since
    /// the source was obtained or last run, or if the sequence is empty.
    pub fn run_and_pop_next_task(
        &self,
        mut task_source: RegisteredTaskSource,
    ) -> Option<RegisteredTaskSource> {
        assert!(
            Arc::ptr_eq(&task_source.shared, &self.shared),
            "task source belongs to a different tracker"
        );
        assert!(
            std::mem::take(&mut task_source.will_run),
            "will_run_task() was not called before running"
        );

        let sequence = Arc::clone(&task_source.sequence);
        let task = sequence
            .begin_transaction()
            .take_front()
            .expect("registered sequence has no task to pop");
        let behavior = sequence.traits().shutdown_behavior();

        let action = self.shared.inner.lock().state.should_run_task(behavior);
        match action {
            TaskAction::Run => self.run_task(task, &sequence),
            TaskAction::Discard => {
                trace!(
                    target: LOG,
                    "discarding {behavior:?} task from {} during shutdown",
                    task.location()
                );
                drop(task);
            }
        }

        {
            let mut inner = self.shared.inner.lock();
            if let FinishedAction::NotifyShutdown = inner.state.task_finished(behavior) {
                self.shared.shutdown_cv.notify_all();
            }
        }

        let has_more_tasks = !sequence.begin_transaction().is_empty();
        if has_more_tasks {
            Some(task_source)
        } else {
            task_source.release();
            None
        }
    }

    fn run_task(&self, task: Task, sequence: &Sequence) {
        if let (Some(metrics), Some(queue_time)) = (&self.shared.metrics, task.queue_time()) {
            let now = self.shared.clock.tick();
            metrics.record_task_latency(
                sequence.traits().priority(),
                self.shared.clock.tick_to_duration(now.saturating_sub(queue_time)),
            );
        }
        // The guard tears the context down on every exit path, including a
        // panicking callback.
        let _context = context::enter(ExecutionContext::for_sequence(sequence));
        task.run();
    }

    /// Enter the shutdown-started phase.
    ///
    /// From this point on, only `BlockShutdown` tasks are admitted, and tasks
    /// already queued with other behaviors are discarded when popped.
    ///
    /// ### Panics
    /// Panics if called more than once.
    pub fn start_shutdown(&self) {
        debug!(target: LOG, "shutdown started");
        self.shared.inner.lock().state.start_shutdown();
    }

    /// Block until every admitted `BlockShutdown` task has run, then enter
    /// the terminal shutdown-complete phase.
    ///
    /// Pending flush waiters are released: once shutdown completes there is
    /// nothing left worth waiting for.
    ///
    /// ### Panics
    /// Panics if shutdown was not started, or was already completed.
    pub fn complete_shutdown(&self) {
        let callback = {
            let mut inner = self.shared.inner.lock();
            loop {
                match inner.state.try_complete_shutdown() {
                    CompleteShutdownResult::Complete => break,
                    CompleteShutdownResult::MustWait => {
                        self.shared.shutdown_cv.wait(&mut inner);
                    }
                }
            }
            self.shared.take_flush_callback_locked(&mut inner)
        };
        debug!(target: LOG, "shutdown complete");
        if let Some(callback) = callback {
            callback();
        }
    }

    /// True once [`TaskTracker::start_shutdown`] has been called.
    pub fn has_shutdown_started(&self) -> bool {
        self.shared.inner.lock().state.has_shutdown_started()
    }

    /// True once [`TaskTracker::complete_shutdown`] has returned.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shared.inner.lock().state.is_shutdown_complete()
    }

    /// Block until no registered task source remains, or shutdown completes,
    /// whichever comes first.
    pub fn flush_for_testing(&self) {
        let mut inner = self.shared.inner.lock();
        while !inner.state.is_flushed() {
            self.shared.flush_cv.wait(&mut inner);
        }
    }

    /// Invoke `callback` once no registered task source remains or shutdown
    /// completes; synchronously if that already holds.
    ///
    /// ### Panics
    /// Panics if a previously armed callback has not been invoked yet.
    pub fn flush_async_for_testing(&self, callback: impl FnOnce() + Send + 'static) {
        {
            let mut inner = self.shared.inner.lock();
            if !inner.state.is_flushed() {
                inner.state.arm_flush();
                inner.flush_callback = Some(Box::new(callback));
                return;
            }
        }
        callback();
    }
}

impl Shared {
    /// Wake flush waiters and disarm the async callback, if any.
    ///
    /// Call only once the flushed condition holds.
    fn take_flush_callback_locked(&self, inner: &mut Inner) -> Option<FlushCallback> {
        self.flush_cv.notify_all();
        let callback = inner.flush_callback.take();
        if callback.is_some() {
            inner.state.disarm_flush();
        }
        callback
    }
}

/// Capability token proving a [`Sequence`] is currently tracked by the
/// scheduler and safe to run.
///
/// Returned by [`TaskTracker::register_task_source`] and consumed by
/// [`TaskTracker::run_and_pop_next_task`]. The registration is released on
/// every exit path: explicitly via [`RegisteredTaskSource::unregister`], by
/// the tracker when the sequence drains, or by dropping the token.
pub struct RegisteredTaskSource {
    shared: Arc<Shared>,
    sequence: Arc<Sequence>,
    will_run: bool,
    released: bool,
}

impl std::fmt::Debug for RegisteredTaskSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredTaskSource")
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl RegisteredTaskSource {
    /// Signal that the caller is about to run the next task.
    ///
    /// Must be called before each [`TaskTracker::run_and_pop_next_task`].
    pub fn will_run_task(&mut self) {
        self.will_run = true;
    }

    /// The sequence this registration tracks.
    pub fn sequence(&self) -> &Arc<Sequence> {
        &self.sequence
    }

    /// Release the registration without running anything.
    pub fn unregister(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let callback = {
            let mut inner = self.shared.inner.lock();
            match inner.state.task_source_done() {
                SourceDoneAction::NotifyFlush => self.shared.take_flush_callback_locked(&mut inner),
                SourceDoneAction::None => None,
            }
        };
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl Drop for RegisteredTaskSource {
    fn drop(&mut self) {
        self.release();
    }
}
