use std::cell::RefCell;
use std::sync::Arc;

use strand_task::{ExecutionMode, Sequence, SequenceToken, ShutdownBehavior, TaskRunner};

thread_local! {
    static CURRENT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

/// Ambient state installed around a task callback.
///
/// Constructed by the tracker immediately before a task runs and torn down
/// unconditionally when the [`ContextGuard`] drops, including on panic.
pub(crate) struct ExecutionContext {
    token: SequenceToken,
    sequenced_runner: Option<Arc<dyn TaskRunner>>,
    thread_runner: Option<Arc<dyn TaskRunner>>,
    singleton_allowed: bool,
    blocking_allowed: bool,
}

impl ExecutionContext {
    /// Build the context for a task of `sequence`.
    ///
    /// Which runner handles are installed follows the sequence's execution
    /// mode; the single-thread runner also serves as the sequenced handle.
    /// Singleton access is denied to `ContinueOnShutdown` tasks, which may
    /// outlive the teardown of process-wide state.
    pub(crate) fn for_sequence(sequence: &Sequence) -> Self {
        let traits = sequence.traits();
        let (sequenced_runner, thread_runner) = match sequence.execution_mode() {
            ExecutionMode::Parallel => (None, None),
            ExecutionMode::Sequenced => (sequence.runner(), None),
            ExecutionMode::SingleThread => (sequence.runner(), sequence.runner()),
        };
        Self {
            token: sequence.token(),
            sequenced_runner,
            thread_runner,
            singleton_allowed: traits.shutdown_behavior() != ShutdownBehavior::ContinueOnShutdown,
            blocking_allowed: traits.may_block(),
        }
    }
}

pub(crate) fn enter(context: ExecutionContext) -> ContextGuard {
    CURRENT.with(|current| {
        let mut slot = current.borrow_mut();
        assert!(slot.is_none(), "execution context already set");
        *slot = Some(context);
    });
    ContextGuard { _private: () }
}

#[derive(Debug)]
pub(crate) struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|current| {
            let mut slot = current.borrow_mut();
            assert!(slot.is_some(), "execution context not set");
            *slot = None;
        });
    }
}

fn with_current<R>(f: impl FnOnce(&ExecutionContext) -> R) -> Option<R> {
    CURRENT.with(|current| current.borrow().as_ref().map(f))
}

/// The token of the sequence whose task is running on this thread, if any.
pub fn current_sequence_token() -> Option<SequenceToken> {
    with_current(|context| context.token)
}

/// The runner of the sequence whose task is running on this thread.
///
/// Set for `Sequenced` and `SingleThread` sequences that carry a runner
/// identity; `None` for `Parallel` sequences and outside task scope.
pub fn current_sequenced_runner() -> Option<Arc<dyn TaskRunner>> {
    with_current(|context| context.sequenced_runner.clone()).flatten()
}

/// The runner bound to this thread, set only while a `SingleThread`
/// sequence's task is running.
pub fn current_thread_runner() -> Option<Arc<dyn TaskRunner>> {
    with_current(|context| context.thread_runner.clone()).flatten()
}

/// Assert that the running task is allowed to perform blocking calls.
///
/// A no-op outside task scope.
///
/// ### Panics
/// Panics when called from a task whose traits carry neither `MAY_BLOCK`
/// nor `WITH_SYNC_PRIMITIVES`.
pub fn assert_blocking_allowed() {
    let allowed = with_current(|context| context.blocking_allowed);
    assert!(
        allowed.unwrap_or(true),
        "blocking call from a task whose traits do not allow blocking"
    );
}

/// Assert that the running task is allowed to use process-wide singletons.
///
/// A no-op outside task scope.
///
/// ### Panics
/// Panics when called from a `ContinueOnShutdown` task.
pub fn assert_singleton_allowed() {
    let allowed = with_current(|context| context.singleton_allowed);
    assert!(
        allowed.unwrap_or(true),
        "singleton access from a ContinueOnShutdown task"
    );
}
