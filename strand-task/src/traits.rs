bitflags::bitflags! {
    /// Permission flags carried by [`TaskTraits`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct TraitFlags: u8 {
        /// The task may perform blocking calls (file or network I/O, etc).
        const MAY_BLOCK            = 1 << 0;
        /// The task may wait on synchronization primitives.
        const WITH_SYNC_PRIMITIVES = 1 << 1;
    }
}

/// Policy tag controlling how a task interacts with tracker shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShutdownBehavior {
    /// Never blocks shutdown; may keep running after shutdown completes and
    /// is not guaranteed to finish.
    ContinueOnShutdown,
    /// Discarded if not started when shutdown begins; shutdown waits for it
    /// if it is already running.
    SkipOnShutdown,
    /// Must run to completion before shutdown can complete.
    BlockShutdown,
}

/// Coarse priority bucket.
///
/// Only used to key latency metrics; it never affects scheduling decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskPriority {
    /// Work that can run whenever there is nothing better to do.
    BestEffort,
    /// Work the user can observe but is not waiting on.
    UserVisible,
    /// Work the user is actively waiting on.
    UserBlocking,
}

/// Admission and permission metadata shared by every task of a sequence.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskTraits {
    priority: TaskPriority,
    shutdown_behavior: ShutdownBehavior,
    flags: TraitFlags,
}

impl TaskTraits {
    /// Construct traits with the given shutdown behavior and default
    /// priority.
    pub fn new(shutdown_behavior: ShutdownBehavior) -> Self {
        Self {
            priority: TaskPriority::UserVisible,
            shutdown_behavior,
            flags: TraitFlags::empty(),
        }
    }

    /// Replace the priority bucket.
    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Add permission flags.
    pub fn with_flags(mut self, flags: TraitFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// The priority bucket.
    pub fn priority(&self) -> TaskPriority {
        self.priority
    }

    /// The shutdown behavior.
    pub fn shutdown_behavior(&self) -> ShutdownBehavior {
        self.shutdown_behavior
    }

    /// The raw permission flags.
    pub fn flags(&self) -> TraitFlags {
        self.flags
    }

    /// True if tasks with these traits may perform blocking calls.
    ///
    /// Waiting on a synchronization primitive implies blocking the thread,
    /// so `WITH_SYNC_PRIMITIVES` grants the same ambient permission.
    pub fn may_block(&self) -> bool {
        self.flags
            .intersects(TraitFlags::MAY_BLOCK | TraitFlags::WITH_SYNC_PRIMITIVES)
    }
}

impl Default for TaskTraits {
    fn default() -> Self {
        Self::new(ShutdownBehavior::SkipOnShutdown)
    }
}

impl From<ShutdownBehavior> for TaskTraits {
    fn from(shutdown_behavior: ShutdownBehavior) -> Self {
        Self::new(shutdown_behavior)
    }
}
