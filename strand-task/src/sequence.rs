use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::{SequenceToken, Task, TaskRunner, TaskTraits};

/// How tasks of a sequence map onto worker threads.
///
/// The mode decides which ambient runner handles the tracker installs while a
/// task of the sequence runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// Tasks may run on any worker with no mutual exclusion between
    /// sequences. No ambient runner handle is installed.
    Parallel,
    /// Tasks run one at a time in FIFO order. The sequenced runner handle is
    /// installed.
    Sequenced,
    /// Tasks run one at a time on a dedicated thread. Both the thread and
    /// the sequenced runner handles are installed.
    SingleThread,
}

/// An ordered, mutually-exclusive queue of tasks.
///
/// All tasks of a sequence share one [`TaskTraits`] and one
/// [`ExecutionMode`]. The queue is only mutated through a [`Transaction`],
/// which provides the single mutation point for pushing tasks and popping
/// the front task atomically with respect to other queue observers.
///
/// At most one task of a sequence executes at any time system-wide; the
/// tracker enforces this by handing out a single run capability per
/// registered sequence.
pub struct Sequence {
    token: SequenceToken,
    traits: TaskTraits,
    mode: ExecutionMode,
    runner: Option<Arc<dyn TaskRunner>>,
    queue: Mutex<VecDeque<Task>>,
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("token", &self.token)
            .field("traits", &self.traits)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Sequence {
    /// Create an empty sequence.
    pub fn new(traits: TaskTraits, mode: ExecutionMode) -> Self {
        Self {
            token: SequenceToken::create(),
            traits,
            mode,
            runner: None,
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Create an empty sequence carrying the identity of the runner that
    /// posts to it.
    ///
    /// The runner is not used to execute anything; it is what the ambient
    /// runner-handle accessors return while a task of this sequence runs.
    pub fn with_runner(
        traits: TaskTraits,
        mode: ExecutionMode,
        runner: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            runner: Some(runner),
            ..Self::new(traits, mode)
        }
    }

    /// The sequence's process-unique token.
    pub fn token(&self) -> SequenceToken {
        self.token
    }

    /// The traits shared by every task in the sequence.
    pub fn traits(&self) -> TaskTraits {
        self.traits
    }

    /// The execution mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        self.mode
    }

    /// The posting runner's identity, if one was attached.
    pub fn runner(&self) -> Option<Arc<dyn TaskRunner>> {
        self.runner.clone()
    }

    /// Acquire exclusive mutation rights over the queue.
    ///
    /// Blocks until no other transaction on this sequence is open. The
    /// transaction ends when the returned guard is dropped.
    pub fn begin_transaction(&self) -> Transaction<'_> {
        Transaction {
            queue: self.queue.lock(),
        }
    }
}

/// Scoped exclusive access to a [`Sequence`]'s queue.
pub struct Transaction<'a> {
    queue: MutexGuard<'a, VecDeque<Task>>,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("len", &self.queue.len())
            .finish()
    }
}

impl Transaction<'_> {
    /// Append a task to the back of the queue.
    pub fn push_task(&mut self, task: Task) {
        self.queue.push_back(task);
    }

    /// Remove and return the front task, if any.
    pub fn take_front(&mut self) -> Option<Task> {
        self.queue.pop_front()
    }

    /// True if the queue holds no tasks.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    #[test]
    fn fifo_order() {
        let sequence = Sequence::new(TaskTraits::default(), ExecutionMode::Sequenced);
        let order = Arc::new(Mutex::new(Vec::new()));
        {
            let mut txn = sequence.begin_transaction();
            for i in 0..3 {
                let order = Arc::clone(&order);
                txn.push_task(Task::new(move || order.lock().push(i)));
            }
            assert_eq!(txn.len(), 3);
        }
        loop {
            let task = sequence.begin_transaction().take_front();
            match task {
                Some(task) => task.run(),
                None => break,
            }
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn empty_after_draining() {
        let sequence = Sequence::new(TaskTraits::default(), ExecutionMode::Parallel);
        sequence.begin_transaction().push_task(Task::new(|| {}));
        let mut txn = sequence.begin_transaction();
        assert!(!txn.is_empty());
        drop(txn.take_front());
        assert!(txn.is_empty());
        assert!(txn.take_front().is_none());
    }

    #[test]
    fn transactions_are_exclusive() {
        let sequence = Arc::new(Sequence::new(TaskTraits::default(), ExecutionMode::Sequenced));
        let observed_len = Arc::new(AtomicUsize::new(usize::MAX));

        let txn = sequence.begin_transaction();
        let other = Arc::clone(&sequence);
        let observed = Arc::clone(&observed_len);
        let thread = std::thread::spawn(move || {
            // Blocks until the main thread's transaction commits.
            let txn = other.begin_transaction();
            observed.store(txn.len(), Ordering::SeqCst);
        });
        std::thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(observed_len.load(Ordering::SeqCst), usize::MAX);
        drop(txn);
        thread.join().unwrap();
        assert_eq!(observed_len.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn runner_identity_is_preserved() {
        struct Sink;
        impl TaskRunner for Sink {
            fn post_task(&self, _task: Task) -> bool {
                true
            }
        }
        let runner: Arc<dyn TaskRunner> = Arc::new(Sink);
        let sequence = Sequence::with_runner(
            TaskTraits::default(),
            ExecutionMode::SingleThread,
            Arc::clone(&runner),
        );
        assert!(Arc::ptr_eq(&sequence.runner().unwrap(), &runner));
        let plain = Sequence::new(TaskTraits::default(), ExecutionMode::Parallel);
        assert!(plain.runner().is_none());
    }
}
