//! Tracker state transitions.

use strand_task::ShutdownBehavior;

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    struct Flags: u8 {
        /// StartShutdown has been called.
        const SHUTDOWN_STARTED  = 1 << 0;
        /// CompleteShutdown has returned.
        const SHUTDOWN_COMPLETE = 1 << 1;
        /// An async flush callback is armed and not yet invoked.
        const FLUSH_PENDING     = 1 << 2;
    }
}

/// Combined shutdown and flush accounting for a tracker instance.
///
/// [`State`] is pure data mutated under the tracker's lock. The scheduler
/// relies on these transitions to uphold its shutdown contract, so any
/// invalid transition is a caller bug and aborts via `assert!`/`panic!`
/// rather than continuing in an inconsistent state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct State {
    flags: Flags,
    /// `BlockShutdown` tasks admitted but not yet run or discarded.
    num_tasks_blocking_shutdown: usize,
    /// Sequences registered but not yet drained or unregistered.
    num_incomplete_task_sources: usize,
}

impl State {
    pub(crate) fn new() -> Self {
        Self {
            flags: Flags::empty(),
            num_tasks_blocking_shutdown: 0,
            num_incomplete_task_sources: 0,
        }
    }

    #[inline]
    pub(crate) fn has_shutdown_started(&self) -> bool {
        self.flags.contains(Flags::SHUTDOWN_STARTED)
    }

    #[inline]
    pub(crate) fn is_shutdown_complete(&self) -> bool {
        self.flags.contains(Flags::SHUTDOWN_COMPLETE)
    }

    #[inline]
    pub(crate) fn has_incomplete_task_sources(&self) -> bool {
        self.num_incomplete_task_sources > 0
    }

    /// Decide whether a task about to be posted is admitted.
    ///
    /// Admitted `BlockShutdown` tasks are counted as blocking shutdown until
    /// they finish.
    ///
    /// ### Panics
    /// Panics if a `BlockShutdown` task is posted after shutdown completed;
    /// posting blocking work to a tracker that already finished shutting
    /// down is a caller bug, not a recoverable condition.
    #[inline]
    pub(crate) fn will_post_task(&mut self, behavior: ShutdownBehavior) -> PostTaskResult {
        if behavior == ShutdownBehavior::BlockShutdown {
            assert!(
                !self.is_shutdown_complete(),
                "posted a BlockShutdown task after shutdown completed"
            );
            self.num_tasks_blocking_shutdown += 1;
            return PostTaskResult::Allowed;
        }
        if self.has_shutdown_started() {
            return PostTaskResult::Rejected;
        }
        PostTaskResult::Allowed
    }

    /// Decide whether a sequence may be registered for execution.
    ///
    /// Mirrors [`State::will_post_task`]'s admission logic, evaluated against
    /// the sequence for the case where its tasks were posted before shutdown
    /// but the sequence was not yet queued. Registered sequences are counted
    /// until drained or unregistered.
    #[inline]
    pub(crate) fn register_task_source(&mut self, behavior: ShutdownBehavior) -> RegisterResult {
        let allowed = match behavior {
            ShutdownBehavior::BlockShutdown => !self.is_shutdown_complete(),
            _ => !self.has_shutdown_started(),
        };
        if !allowed {
            return RegisterResult::Refused;
        }
        self.num_incomplete_task_sources += 1;
        RegisterResult::Registered
    }

    /// Decide whether the next popped task runs or is discarded.
    #[inline]
    pub(crate) fn should_run_task(&self, behavior: ShutdownBehavior) -> TaskAction {
        if self.is_shutdown_complete() {
            return TaskAction::Discard;
        }
        if self.has_shutdown_started() && behavior != ShutdownBehavior::BlockShutdown {
            return TaskAction::Discard;
        }
        TaskAction::Run
    }

    /// Record that an admitted task finished (ran or was discarded).
    ///
    /// Returns whether the thread blocked in `complete_shutdown` must be
    /// woken.
    #[inline]
    pub(crate) fn task_finished(&mut self, behavior: ShutdownBehavior) -> FinishedAction {
        if behavior != ShutdownBehavior::BlockShutdown {
            return FinishedAction::None;
        }
        assert!(self.num_tasks_blocking_shutdown > 0);
        self.num_tasks_blocking_shutdown -= 1;
        if self.num_tasks_blocking_shutdown == 0 && self.has_shutdown_started() {
            FinishedAction::NotifyShutdown
        } else {
            FinishedAction::None
        }
    }

    /// Record that a registered task source was drained or unregistered.
    ///
    /// Returns whether flush waiters must be woken.
    #[inline]
    pub(crate) fn task_source_done(&mut self) -> SourceDoneAction {
        assert!(self.num_incomplete_task_sources > 0);
        self.num_incomplete_task_sources -= 1;
        if self.num_incomplete_task_sources == 0 {
            SourceDoneAction::NotifyFlush
        } else {
            SourceDoneAction::None
        }
    }

    /// Enter the shutdown-started phase.
    ///
    /// ### Panics
    /// Panics if shutdown was already started.
    #[inline]
    pub(crate) fn start_shutdown(&mut self) {
        assert!(
            !self.has_shutdown_started(),
            "shutdown was already started"
        );
        self.flags.insert(Flags::SHUTDOWN_STARTED);
    }

    /// Attempt to finish shutting down.
    ///
    /// Succeeds once no admitted `BlockShutdown` task remains; otherwise the
    /// caller must wait and retry.
    ///
    /// ### Panics
    /// Panics if shutdown was not started, or already completed.
    #[inline]
    pub(crate) fn try_complete_shutdown(&mut self) -> CompleteShutdownResult {
        assert!(self.has_shutdown_started(), "shutdown was not started");
        assert!(!self.is_shutdown_complete(), "shutdown already completed");
        if self.num_tasks_blocking_shutdown > 0 {
            return CompleteShutdownResult::MustWait;
        }
        self.flags.insert(Flags::SHUTDOWN_COMPLETE);
        CompleteShutdownResult::Complete
    }

    /// True once flush waiters have nothing left to wait for.
    #[inline]
    pub(crate) fn is_flushed(&self) -> bool {
        !self.has_incomplete_task_sources() || self.is_shutdown_complete()
    }

    /// Arm the async flush callback slot.
    ///
    /// ### Panics
    /// Panics if a previous async flush is still pending; overlapping
    /// flushes are a caller bug.
    #[inline]
    pub(crate) fn arm_flush(&mut self) {
        assert!(
            !self.flags.contains(Flags::FLUSH_PENDING),
            "an async flush is already pending"
        );
        self.flags.insert(Flags::FLUSH_PENDING);
    }

    /// Disarm the async flush callback slot.
    #[inline]
    pub(crate) fn disarm_flush(&mut self) {
        assert!(self.flags.contains(Flags::FLUSH_PENDING));
        self.flags.remove(Flags::FLUSH_PENDING);
    }
}

#[must_use = "this `PostTaskResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum PostTaskResult {
    Allowed,
    Rejected,
}

#[must_use = "this `RegisterResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum RegisterResult {
    Registered,
    Refused,
}

#[must_use = "this `TaskAction` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum TaskAction {
    Run,
    Discard,
}

#[must_use = "this `FinishedAction` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum FinishedAction {
    NotifyShutdown,
    None,
}

#[must_use = "this `SourceDoneAction` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum SourceDoneAction {
    NotifyFlush,
    None,
}

#[must_use = "this `CompleteShutdownResult` must be handled"]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CompleteShutdownResult {
    Complete,
    MustWait,
}
