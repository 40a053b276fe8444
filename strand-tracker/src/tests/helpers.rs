use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use strand_task::{ExecutionMode, Sequence, ShutdownBehavior, Task, TaskTraits};
use strand_timer::Clock;

use crate::{RegisteredTaskSource, TaskTracker};

pub(super) const ALL_BEHAVIORS: [ShutdownBehavior; 3] = [
    ShutdownBehavior::ContinueOnShutdown,
    ShutdownBehavior::SkipOnShutdown,
    ShutdownBehavior::BlockShutdown,
];

/// How long to wait before concluding a blocked thread stays blocked.
pub(super) const TINY_TIMEOUT: Duration = Duration::from_millis(50);

pub(super) fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(super) fn test_tracker() -> TaskTracker {
    init_logging();
    TaskTracker::new(Clock::simulated())
}

/// Runs a closure on its own thread and records when it returned.
///
/// Used to observe that `complete_shutdown` or `flush_for_testing` is
/// blocked: spawn it here, sleep a tiny timeout, and check
/// [`CallbackThread::has_returned`].
pub(super) struct CallbackThread {
    handle: thread::JoinHandle<()>,
    returned: Arc<AtomicBool>,
}

impl CallbackThread {
    pub(super) fn spawn(f: impl FnOnce() + Send + 'static) -> Self {
        let returned = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&returned);
        let handle = thread::spawn(move || {
            f();
            flag.store(true, Ordering::SeqCst);
        });
        Self { handle, returned }
    }

    pub(super) fn has_returned(&self) -> bool {
        self.returned.load(Ordering::SeqCst)
    }

    /// Assert the closure is still blocked after [`TINY_TIMEOUT`].
    pub(super) fn expect_blocked(&self) {
        thread::sleep(TINY_TIMEOUT);
        assert!(!self.has_returned());
    }

    pub(super) fn join(self) {
        let Self { handle, returned } = self;
        handle.join().unwrap();
        assert!(returned.load(Ordering::SeqCst));
    }
}

/// Shared counter of executed test tasks.
#[derive(Clone, Default)]
pub(super) struct TaskCounter {
    count: Arc<AtomicUsize>,
}

impl TaskCounter {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn make_task(&self) -> Task {
        let count = Arc::clone(&self.count);
        Task::new(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
    }

    pub(super) fn executed(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Post `task`, queue it on a fresh sequence, and register the sequence.
///
/// Mirrors the poster-side protocol: `will_post_task`, push under a
/// transaction, then `register_task_source`. Returns `None` if either
/// admission step refused.
pub(super) fn will_post_and_queue(
    tracker: &TaskTracker,
    mut task: Task,
    traits: TaskTraits,
) -> Option<RegisteredTaskSource> {
    if !tracker.will_post_task(&mut task, traits.shutdown_behavior()) {
        return None;
    }
    let sequence = Arc::new(Sequence::new(traits, ExecutionMode::Parallel));
    sequence.begin_transaction().push_task(task);
    tracker.register_task_source(sequence)
}

/// Run one task from `source` after arming the eligibility hook.
pub(super) fn run_and_pop(
    tracker: &TaskTracker,
    mut source: RegisteredTaskSource,
) -> Option<RegisteredTaskSource> {
    source.will_run_task();
    tracker.run_and_pop_next_task(source)
}

/// Start shutdown and complete it, asserting the terminal phase.
pub(super) fn shutdown_tracker(tracker: &TaskTracker) {
    tracker.start_shutdown();
    tracker.complete_shutdown();
    assert!(tracker.is_shutdown_complete());
}
