//! Clock source and delayed-task promotion for the strand scheduling core.
//!
//! The [`DelayedTaskManager`] holds tasks whose execution is deferred until a
//! tick deadline and forwards each one to its destination exactly once, no
//! earlier than its deadline. It never executes task callbacks itself; it
//! asks a [`ServiceTaskRunner`] to wake it at the earliest pending deadline
//! and hands ripe tasks off through a forwarding callback.
//!
//! Time comes from a [`Clock`], which can be simulated and fast-forwarded for
//! deterministic tests.
#![deny(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    clippy::missing_safety_doc
)]
mod clock;
mod delayed;
mod error;
mod service;

pub use clock::Clock;
pub use delayed::{DelayedTaskManager, ForwardTask};
pub use error::{Error, ErrorKind};
pub use service::{ServiceTaskRunner, WakeCallback};
