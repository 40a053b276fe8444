//! Task and sequence model for the strand scheduling core.
//!
//! A [`Task`] is a single schedulable unit of work: a callback plus the
//! metadata the scheduler needs to admit, order, and observe it. A
//! [`Sequence`] is a FIFO queue of tasks that share [`TaskTraits`] and an
//! [`ExecutionMode`], mutated only through a [`Transaction`].
//!
//! # Components
//! - [`Task`]: callback, source location, delay, and scheduling timestamps.
//! - [`TaskTraits`], [`ShutdownBehavior`], [`TaskPriority`]: admission and
//!   permission metadata.
//! - [`Sequence`] and [`Transaction`]: transactional FIFO task queue.
//! - [`SequenceToken`]: process-unique sequence identity.
//! - [`TaskRunner`]: the downstream posting-sink trait.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
mod runner;
mod sequence;
mod task;
mod token;
mod traits;

pub use runner::TaskRunner;
pub use sequence::{ExecutionMode, Sequence, Transaction};
pub use task::Task;
pub use token::SequenceToken;
pub use traits::{ShutdownBehavior, TaskPriority, TaskTraits, TraitFlags};
