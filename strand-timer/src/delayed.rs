use std::cmp;
use std::collections::BinaryHeap;
use std::sync::{Arc, Weak};

use log::{debug, trace, warn};
use parking_lot::Mutex;
use strand_task::{Task, TaskRunner};

use crate::{Clock, ServiceTaskRunner, WakeCallback};

const LOG: &str = "strand_timer::delayed";

/// Callback that hands a ripe task to its destination.
///
/// Invoked with the task and the runner it was originally destined for;
/// typically it re-enters the tracker's admission path.
pub type ForwardTask = Box<dyn FnOnce(Task, Arc<dyn TaskRunner>) + Send>;

/// Holds tasks that must not run before a tick deadline and forwards each to
/// its destination exactly once, once both the manager has been started and
/// the deadline has elapsed on the shared [`Clock`].
///
/// The manager never executes a task callback itself. When started, it asks
/// the [`ServiceTaskRunner`] to wake it at the earliest pending deadline; on
/// waking it forwards every ripe task and re-arms for the next deadline.
pub struct DelayedTaskManager {
    clock: Clock,
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for DelayedTaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelayedTaskManager")
            .field("clock", &self.clock)
            .finish()
    }
}

struct Inner {
    service: Option<Arc<dyn ServiceTaskRunner>>,
    heap: BinaryHeap<DelayedEntry>,
    next_sequence_num: u64,
    /// Deadline of the wake-up currently armed with the service runner.
    armed_wake: Option<u64>,
}

struct DelayedEntry {
    deadline: u64,
    sequence_num: u64,
    task: Task,
    forward: ForwardTask,
    runner: Arc<dyn TaskRunner>,
}

// BinaryHeap is a max-heap; order entries by reversed (deadline, insertion
// number) so the earliest deadline surfaces first and ties pop in insertion
// order.
impl Ord for DelayedEntry {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        (other.deadline, other.sequence_num).cmp(&(self.deadline, self.sequence_num))
    }
}

impl PartialOrd for DelayedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for DelayedEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == cmp::Ordering::Equal
    }
}

impl Eq for DelayedEntry {}

impl DelayedTaskManager {
    /// Create a manager that reads time from `clock`.
    pub fn new(clock: Clock) -> Arc<Self> {
        Arc::new(Self {
            clock,
            inner: Mutex::new(Inner {
                service: None,
                heap: BinaryHeap::new(),
                next_sequence_num: 0,
                armed_wake: None,
            }),
        })
    }

    /// The clock deadlines are computed against.
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// Add a task to be forwarded to `runner` through `forward` once its
    /// deadline has elapsed.
    ///
    /// The deadline is the task's `delayed_run_time` if already computed,
    /// otherwise the current tick plus the task's delay (recorded back onto
    /// the task). May be called from any thread, before or after
    /// [`DelayedTaskManager::start`].
    pub fn add_delayed_task(
        self: &Arc<Self>,
        mut task: Task,
        forward: ForwardTask,
        runner: Arc<dyn TaskRunner>,
    ) {
        let deadline = match task.delayed_run_time() {
            Some(deadline) => deadline,
            None => {
                let deadline = self.clock.tick()
                    + u64::try_from(task.delay().as_millis())
                        .expect("Duration too far into the future");
                task.set_delayed_run_time(deadline);
                deadline
            }
        };
        trace!(target: LOG, "add_delayed_task deadline={deadline}");

        let arm = {
            let mut inner = self.inner.lock();
            let sequence_num = inner.next_sequence_num;
            inner.next_sequence_num += 1;
            inner.heap.push(DelayedEntry {
                deadline,
                sequence_num,
                task,
                forward,
                runner,
            });
            self.next_arm_locked(&mut inner)
        };
        self.schedule_armed_wake(arm);
    }

    /// Transition the manager to its started state, capturing the runner
    /// used to deliver wake-ups.
    ///
    /// Arms a wake-up for the earliest pending deadline; deadlines already in
    /// the past are woken promptly. Tasks added before `start` are neither
    /// lost nor duplicated.
    ///
    /// ### Panics
    /// Panics if the manager was already started.
    pub fn start(self: &Arc<Self>, service: Arc<dyn ServiceTaskRunner>) {
        debug!(target: LOG, "start");
        let arm = {
            let mut inner = self.inner.lock();
            assert!(inner.service.is_none(), "delayed task manager already started");
            inner.service = Some(service);
            self.next_arm_locked(&mut inner)
        };
        self.schedule_armed_wake(arm);
    }

    /// Number of tasks currently held back. Tests and diagnostics only.
    pub fn num_pending(&self) -> usize {
        self.inner.lock().heap.len()
    }

    /// Pop and forward every ripe task, then re-arm for the next deadline.
    fn process_ripe_tasks(self: &Arc<Self>) {
        let now = self.clock.tick();
        let (ripe, arm) = {
            let mut inner = self.inner.lock();
            inner.armed_wake = None;
            let mut ripe = Vec::new();
            while inner
                .heap
                .peek()
                .is_some_and(|entry| entry.deadline <= now)
            {
                ripe.push(inner.heap.pop().unwrap());
            }
            let arm = self.next_arm_locked(&mut inner);
            (ripe, arm)
        };
        self.schedule_armed_wake(arm);

        // Forward outside the lock: forward callbacks may re-enter
        // add_delayed_task.
        for entry in ripe {
            trace!(target: LOG, "forwarding task deadline={}", entry.deadline);
            (entry.forward)(entry.task, entry.runner);
        }
    }

    /// Decide, under the lock, whether a new wake-up must be armed.
    ///
    /// Returns the service runner and deadline to arm with, or `None` when
    /// the manager is not started, the heap is empty, or an earlier wake-up
    /// is already armed.
    fn next_arm_locked(&self, inner: &mut Inner) -> Option<(Arc<dyn ServiceTaskRunner>, u64)> {
        let service = inner.service.clone()?;
        let earliest = inner.heap.peek()?.deadline;
        if inner.armed_wake.is_some_and(|armed| armed <= earliest) {
            return None;
        }
        inner.armed_wake = Some(earliest);
        Some((service, earliest))
    }

    /// Issue the wake-up request decided by [`Self::next_arm_locked`].
    ///
    /// Runs without holding the lock so a service runner that delivers
    /// wake-ups synchronously cannot deadlock against the manager.
    fn schedule_armed_wake(self: &Arc<Self>, arm: Option<(Arc<dyn ServiceTaskRunner>, u64)>) {
        let Some((service, deadline)) = arm else {
            return;
        };
        let weak = Arc::downgrade(self);
        let wake: WakeCallback = Box::new(move || {
            if let Some(manager) = Weak::upgrade(&weak) {
                manager.process_ripe_tasks();
            }
        });
        if let Err(err) = service.schedule_wake(deadline, wake) {
            warn!(target: LOG, "failed to arm wake-up at {deadline}: {err}");
            let mut inner = self.inner.lock();
            if inner.armed_wake == Some(deadline) {
                inner.armed_wake = None;
            }
        }
    }
}
