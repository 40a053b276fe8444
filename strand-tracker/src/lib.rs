//! Admission control and shutdown coordination for the strand scheduling
//! core.
//!
//! The [`TaskTracker`] is the single authority for whether a task may be
//! posted given the current shutdown phase, for running tasks with the
//! correct ambient execution context installed, and for coordinating a
//! blocking, at-most-once shutdown that waits exactly as long as necessary:
//! every `BlockShutdown` task posted before shutdown completes must run,
//! while `SkipOnShutdown` and `ContinueOnShutdown` work may be discarded or
//! left behind.
//!
//! # Components
//! - [`TaskTracker`]: admission, execution, shutdown, and flush coordination.
//! - [`RegisteredTaskSource`]: capability token for a tracked sequence.
//! - [`MetricsSink`]: optional post-to-run latency observer.
//! - Ambient accessors ([`current_sequence_token`],
//!   [`current_sequenced_runner`], [`current_thread_runner`],
//!   [`assert_blocking_allowed`], [`assert_singleton_allowed`]): the
//!   execution context installed around every task callback.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
mod context;
mod metrics;
mod state;
mod tracker;

#[cfg(test)]
mod tests;

pub use context::{
    assert_blocking_allowed, assert_singleton_allowed, current_sequence_token,
    current_sequenced_runner, current_thread_runner,
};
pub use metrics::MetricsSink;
pub use tracker::{RegisteredTaskSource, TaskTracker};
