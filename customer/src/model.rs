use std::fmt;
use std::sync::Arc;

use tokio::sync::Notify;

/// Stable external identifier, assigned once per connection.
pub type CustomerId = u64;

/// Index into the customer arena. Valid only while the slot is allocated.
pub type Slot = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerState {
    Resting,
    Waiting,
    Using,
}

impl fmt::Display for CustomerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CustomerState::Resting => "Resting",
            CustomerState::Waiting => "Waiting",
            CustomerState::Using => "Using",
        };
        f.write_str(s)
    }
}

/// What happened to a customer's hold on a tool.
///
/// `Finished` covers both a completed request and a voluntary/implicit
/// departure; both render as "leaves" on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolEventKind {
    Assigned,
    Evicted,
    Finished,
}

/// A single outbound notification for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolEvent {
    pub kind: ToolEventKind,
    pub tool: usize,
}

#[derive(Debug)]
pub struct Customer {
    pub id: CustomerId,
    pub state: CustomerState,

    /// Cumulative tool-milliseconds consumed; the fairness metric.
    /// Monotonically non-decreasing for the lifetime of the record.
    pub share: f64,

    // Most recent request
    pub request_ms: u64,
    pub remaining_ms: u64,

    // Current bindings
    pub current_tool: Option<usize>,
    pub session_start_ms: u64,
    pub wait_start_ms: u64,

    /// Position in the waiting queue; `Some` iff state is `Waiting`.
    pub heap_index: Option<usize>,

    /// At most one pending notification; a newer event overwrites an
    /// undelivered older one, since every later transition re-notifies.
    pub pending: Option<ToolEvent>,

    /// Wakes this customer's notifier task.
    pub mailbox: Arc<Notify>,
}

impl Customer {
    pub fn new(id: CustomerId, initial_share: f64, mailbox: Arc<Notify>, now_ms: u64) -> Self {
        Self {
            id,
            state: CustomerState::Resting,
            share: initial_share,
            request_ms: 0,
            remaining_ms: 0,
            current_tool: None,
            session_start_ms: now_ms,
            wait_start_ms: now_ms,
            heap_index: None,
            pending: None,
            mailbox,
        }
    }

    /// Queue an event for the notifier and wake it.
    pub fn push_event(&mut self, kind: ToolEventKind, tool: usize) {
        self.pending = Some(ToolEvent { kind, tool });
        self.mailbox.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_customer(id: CustomerId) -> Customer {
        Customer::new(id, 0.0, Arc::new(Notify::new()), 1_000)
    }

    #[test]
    fn new_customer_rests_with_no_bindings() {
        let c = mk_customer(7);

        assert_eq!(c.state, CustomerState::Resting);
        assert_eq!(c.current_tool, None);
        assert_eq!(c.heap_index, None);
        assert_eq!(c.pending, None);
    }

    #[test]
    fn push_event_overwrites_pending() {
        let mut c = mk_customer(1);

        c.push_event(ToolEventKind::Assigned, 0);
        c.push_event(ToolEventKind::Evicted, 0);

        let ev = c.pending.expect("event should be pending");
        assert_eq!(ev.kind, ToolEventKind::Evicted, "newest event wins");
    }
}
