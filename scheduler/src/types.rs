//! Shared types used by the scheduler core.

use customer::model::{Slot, ToolEventKind};

/// Configuration knobs for the scheduler.
///
/// These are global limits and timing parameters; the slice bounds come
/// straight from the command line.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Minimum slice in milliseconds: a held tool is protected from
    /// preemption until its current session has run at least this long.
    pub min_slice_ms: u64,

    /// Maximum slice in milliseconds: once a session has run this long the
    /// tool must yield whenever anyone is waiting.
    pub max_slice_ms: u64,

    /// Number of interchangeable tools in the pool.
    pub tool_count: usize,

    /// Upper bound on concurrently connected customers. Connections past
    /// this are rejected; existing customers are unaffected.
    pub customer_capacity: usize,

    /// Whether a requester may evict a holder whose share equals its own.
    /// Off by default: the victim must have strictly more accumulated share.
    pub preempt_equal_share: bool,
}

impl SchedulerConfig {
    pub fn new(min_slice_ms: u64, max_slice_ms: u64, tool_count: usize) -> Self {
        Self {
            min_slice_ms,
            max_slice_ms,
            tool_count,
            customer_capacity: 1024,
            preempt_equal_share: false,
        }
    }
}

/// One exclusive resource. Lives for the whole server lifetime.
#[derive(Debug)]
pub struct Tool {
    pub id: usize,

    /// Milliseconds of use across all sessions.
    pub total_usage_ms: u64,

    /// Occupant's arena slot, or `None` when idle.
    pub current_user: Option<Slot>,

    /// Milliseconds elapsed in the in-progress session as of the last tick;
    /// zero when idle. Display value only: decisions recompute elapsed time
    /// from `session_start_ms`.
    pub current_usage_ms: u64,

    pub session_start_ms: u64,
}

impl Tool {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            total_usage_ms: 0,
            current_user: None,
            current_usage_ms: 0,
            session_start_ms: 0,
        }
    }
}

/// The three ways a customer stops holding a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    /// Requested duration exhausted.
    Completed,
    /// Preempted in favor of a needier customer.
    Evicted,
    /// Chose to rest, or disconnected.
    Left,
}

impl ReleaseKind {
    pub fn event(self) -> ToolEventKind {
        match self {
            ReleaseKind::Evicted => ToolEventKind::Evicted,
            ReleaseKind::Completed | ReleaseKind::Left => ToolEventKind::Finished,
        }
    }
}
