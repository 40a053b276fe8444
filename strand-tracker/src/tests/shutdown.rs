use std::sync::Arc;

use strand_task::{ExecutionMode, Sequence, ShutdownBehavior, Task, TaskTraits};

use super::helpers::{
    run_and_pop, shutdown_tracker, test_tracker, will_post_and_queue, CallbackThread,
    TaskCounter, ALL_BEHAVIORS,
};

#[test]
fn will_post_and_run_before_shutdown() {
    for behavior in ALL_BEHAVIORS {
        let tracker = test_tracker();
        let counter = TaskCounter::new();
        let source =
            will_post_and_queue(&tracker, counter.make_task(), TaskTraits::new(behavior)).unwrap();

        assert_eq!(counter.executed(), 0);
        assert!(run_and_pop(&tracker, source).is_none());
        assert_eq!(counter.executed(), 1);

        // Shutdown shouldn't block.
        shutdown_tracker(&tracker);
    }
}

#[test]
fn complete_shutdown_blocks_until_block_shutdown_task_runs() {
    let tracker = test_tracker();
    let counter = TaskCounter::new();
    let source = will_post_and_queue(
        &tracker,
        counter.make_task(),
        TaskTraits::new(ShutdownBehavior::BlockShutdown),
    )
    .unwrap();

    tracker.start_shutdown();
    let shutdown = {
        let tracker = tracker.clone();
        CallbackThread::spawn(move || tracker.complete_shutdown())
    };
    shutdown.expect_blocked();
    assert!(tracker.has_shutdown_started());
    assert!(!tracker.is_shutdown_complete());

    assert!(run_and_pop(&tracker, source).is_none());
    assert_eq!(counter.executed(), 1);
    shutdown.join();
    assert!(tracker.is_shutdown_complete());
}

#[test]
fn tasks_posted_before_shutdown_run_during_shutdown_only_if_blocking() {
    for behavior in ALL_BEHAVIORS {
        let tracker = test_tracker();
        let counter = TaskCounter::new();
        let source =
            will_post_and_queue(&tracker, counter.make_task(), TaskTraits::new(behavior)).unwrap();

        // A BlockShutdown task queued separately keeps shutdown from
        // completing while we observe the popped task's fate.
        let block_source = will_post_and_queue(
            &tracker,
            counter.make_task(),
            TaskTraits::new(ShutdownBehavior::BlockShutdown),
        )
        .unwrap();

        tracker.start_shutdown();
        let shutdown = {
            let tracker = tracker.clone();
            CallbackThread::spawn(move || tracker.complete_shutdown())
        };
        shutdown.expect_blocked();

        let should_run = behavior == ShutdownBehavior::BlockShutdown;
        assert!(run_and_pop(&tracker, source).is_none());
        assert_eq!(counter.executed(), usize::from(should_run));

        assert!(run_and_pop(&tracker, block_source).is_none());
        assert_eq!(counter.executed(), usize::from(should_run) + 1);
        shutdown.join();
    }
}

#[test]
fn sequences_queued_before_shutdown_register_during_shutdown_only_if_blocking() {
    for behavior in ALL_BEHAVIORS {
        let tracker = test_tracker();
        let counter = TaskCounter::new();

        // Post and queue before shutdown, but register only during it.
        let mut task = counter.make_task();
        assert!(tracker.will_post_task(&mut task, behavior));
        let sequence = Arc::new(Sequence::new(
            TaskTraits::new(behavior),
            ExecutionMode::Parallel,
        ));
        sequence.begin_transaction().push_task(task);

        let block_source = will_post_and_queue(
            &tracker,
            counter.make_task(),
            TaskTraits::new(ShutdownBehavior::BlockShutdown),
        )
        .unwrap();

        tracker.start_shutdown();
        let shutdown = {
            let tracker = tracker.clone();
            CallbackThread::spawn(move || tracker.complete_shutdown())
        };
        shutdown.expect_blocked();

        match tracker.register_task_source(Arc::clone(&sequence)) {
            Some(source) => {
                assert_eq!(behavior, ShutdownBehavior::BlockShutdown);
                assert!(run_and_pop(&tracker, source).is_none());
                assert_eq!(counter.executed(), 1);
            }
            None => assert_ne!(behavior, ShutdownBehavior::BlockShutdown),
        }

        assert!(run_and_pop(&tracker, block_source).is_none());
        shutdown.join();
    }
}

#[test]
fn posting_during_shutdown_is_admitted_only_for_blocking() {
    for behavior in ALL_BEHAVIORS {
        let tracker = test_tracker();
        let counter = TaskCounter::new();
        let block_source = will_post_and_queue(
            &tracker,
            counter.make_task(),
            TaskTraits::new(ShutdownBehavior::BlockShutdown),
        )
        .unwrap();

        tracker.start_shutdown();

        let source =
            will_post_and_queue(&tracker, counter.make_task(), TaskTraits::new(behavior));
        match source {
            Some(source) => {
                assert_eq!(behavior, ShutdownBehavior::BlockShutdown);
                assert!(run_and_pop(&tracker, source).is_none());
                assert_eq!(counter.executed(), 1);
            }
            None => assert_ne!(behavior, ShutdownBehavior::BlockShutdown),
        }

        let shutdown = {
            let tracker = tracker.clone();
            CallbackThread::spawn(move || tracker.complete_shutdown())
        };
        shutdown.expect_blocked();

        assert!(run_and_pop(&tracker, block_source).is_none());
        shutdown.join();
    }
}

#[test]
fn tasks_are_discarded_after_shutdown_completes() {
    for behavior in [
        ShutdownBehavior::ContinueOnShutdown,
        ShutdownBehavior::SkipOnShutdown,
    ] {
        let tracker = test_tracker();
        let counter = TaskCounter::new();
        let source =
            will_post_and_queue(&tracker, counter.make_task(), TaskTraits::new(behavior)).unwrap();

        shutdown_tracker(&tracker);

        // The task isn't allowed to run after shutdown.
        assert!(run_and_pop(&tracker, source).is_none());
        assert_eq!(counter.executed(), 0);
    }
}

#[test]
fn will_post_after_shutdown_returns_false_for_non_blocking() {
    for behavior in [
        ShutdownBehavior::ContinueOnShutdown,
        ShutdownBehavior::SkipOnShutdown,
    ] {
        let tracker = test_tracker();
        shutdown_tracker(&tracker);
        let mut task = Task::new(|| {});
        assert!(!tracker.will_post_task(&mut task, behavior));
    }
}

#[test]
#[should_panic(expected = "after shutdown completed")]
fn will_post_block_shutdown_after_shutdown_panics() {
    let tracker = test_tracker();
    shutdown_tracker(&tracker);
    let mut task = Task::new(|| {});
    let _ = tracker.will_post_task(&mut task, ShutdownBehavior::BlockShutdown);
}

#[test]
#[should_panic(expected = "shutdown was already started")]
fn double_start_shutdown_panics() {
    let tracker = test_tracker();
    tracker.start_shutdown();
    tracker.start_shutdown();
}

#[test]
#[should_panic(expected = "will_run_task() was not called")]
fn running_without_will_run_task_panics() {
    let tracker = test_tracker();
    let source = will_post_and_queue(&tracker, Task::new(|| {}), TaskTraits::default()).unwrap();
    let _ = tracker.run_and_pop_next_task(source);
}

#[test]
fn run_and_pop_returns_source_while_tasks_remain() {
    let tracker = test_tracker();
    let counter = TaskCounter::new();
    let sequence = Arc::new(Sequence::new(TaskTraits::default(), ExecutionMode::Sequenced));
    for _ in 0..2 {
        let mut task = counter.make_task();
        assert!(tracker.will_post_task(&mut task, ShutdownBehavior::SkipOnShutdown));
        sequence.begin_transaction().push_task(task);
    }

    let source = tracker.register_task_source(sequence).unwrap();
    let source = run_and_pop(&tracker, source).expect("one task left");
    assert_eq!(counter.executed(), 1);
    assert!(run_and_pop(&tracker, source).is_none());
    assert_eq!(counter.executed(), 2);
}

#[test]
fn tasks_can_repost_to_their_own_sequence() {
    let tracker = test_tracker();
    let counter = TaskCounter::new();
    let sequence = Arc::new(Sequence::new(TaskTraits::default(), ExecutionMode::Sequenced));

    let mut task = {
        let tracker = tracker.clone();
        let sequence = Arc::clone(&sequence);
        let counter = counter.clone();
        Task::new(move || {
            // Re-enter the scheduler from inside a running task. The queue
            // transaction must not still be held by the worker.
            let mut follow_up = counter.make_task();
            assert!(tracker.will_post_task(&mut follow_up, ShutdownBehavior::SkipOnShutdown));
            sequence.begin_transaction().push_task(follow_up);
        })
    };
    assert!(tracker.will_post_task(&mut task, ShutdownBehavior::SkipOnShutdown));
    sequence.begin_transaction().push_task(task);

    let source = tracker.register_task_source(Arc::clone(&sequence)).unwrap();
    let source = run_and_pop(&tracker, source).expect("the reposted task is pending");
    assert!(run_and_pop(&tracker, source).is_none());
    assert_eq!(counter.executed(), 1);
}

#[test]
fn posted_but_never_queued_non_blocking_tasks_do_not_block_shutdown() {
    for behavior in [
        ShutdownBehavior::ContinueOnShutdown,
        ShutdownBehavior::SkipOnShutdown,
    ] {
        let tracker = test_tracker();
        let mut task = Task::new(|| {});
        assert!(tracker.will_post_task(&mut task, behavior));
        // No sequence was registered; shutdown must not hang.
        shutdown_tracker(&tracker);
    }
}
