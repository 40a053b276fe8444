use std::time::Duration;

use strand_task::TaskPriority;

/// Observer for per-task scheduling latency.
///
/// Notified with the time from task admission to the start of its execution,
/// keyed by the task's coarse priority bucket. Observability only: a sink
/// must never influence scheduling decisions, and the tracker works without
/// one.
pub trait MetricsSink: Send + Sync {
    /// Record that a task with `priority` started running `latency` after it
    /// was posted.
    fn record_task_latency(&self, priority: TaskPriority, latency: Duration);
}
