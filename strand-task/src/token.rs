use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Sequence`](crate::Sequence).
///
/// Tokens are handed out from a global counter at sequence creation and are
/// never reused within a process. While a task runs, the token of its
/// sequence is installed in the ambient execution context so that code deep
/// in a callback can ask "which sequence am I on".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SequenceToken(u64);

impl SequenceToken {
    pub(crate) fn create() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}
