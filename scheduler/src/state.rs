//! The shared state store and the customer lifecycle.
//!
//! One `SchedulerState` holds everything the scheduler knows: the customer
//! arena, the tool table, the waiting queue, and the aggregate counters.
//! The server wraps it in a single `tokio::sync::Mutex`; every mutation
//! anywhere in this crate happens with that lock held.

use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{error, info};

use customer::arena::CustomerArena;
use customer::model::{Customer, CustomerId, CustomerState, Slot};

use crate::error::SchedulerError;
use crate::queue::WaitQueue;
use crate::types::{ReleaseKind, SchedulerConfig, Tool};

/// Aggregate counters, maintained incrementally so the mean share and the
/// report header are O(1).
#[derive(Debug, Default, Clone)]
pub struct Totals {
    pub total: usize,
    pub resting: usize,
    pub waiting: usize,

    /// Sum of all allocated customers' shares.
    pub share_sum: f64,
}

impl Totals {
    pub fn using(&self) -> usize {
        self.total - self.resting - self.waiting
    }

    pub fn mean_share(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.share_sum / self.total as f64
        }
    }
}

#[derive(Debug)]
pub struct SchedulerState {
    pub cfg: SchedulerConfig,
    pub customers: CustomerArena,
    pub tools: Vec<Tool>,
    pub queue: WaitQueue,
    pub totals: Totals,
}

impl SchedulerState {
    pub fn new(cfg: SchedulerConfig) -> Self {
        let customers = CustomerArena::new(cfg.customer_capacity);
        let tools = (0..cfg.tool_count).map(Tool::new).collect();
        let queue = WaitQueue::new(cfg.customer_capacity);

        Self {
            cfg,
            customers,
            tools,
            queue,
            totals: Totals::default(),
        }
    }

    /// Admit a new customer in the `Resting` state.
    ///
    /// The starting share is the mean of the existing shares: zero would let
    /// the newcomer leapfrog everyone, the maximum would handicap it for the
    /// rest of its life.
    pub fn connect(
        &mut self,
        id: CustomerId,
        mailbox: Arc<Notify>,
        now_ms: u64,
    ) -> Result<Slot, SchedulerError> {
        let share = self.totals.mean_share();
        let slot = self
            .customers
            .allocate(Customer::new(id, share, mailbox, now_ms))
            .map_err(|_| SchedulerError::CustomersFull(self.totals.total))?;

        self.totals.total += 1;
        self.totals.resting += 1;
        self.totals.share_sum += share;

        info!(customer = id, slot, share, "customer connected");
        Ok(slot)
    }

    /// Remove a customer entirely, releasing any tool it holds.
    ///
    /// A held tool goes back into circulation immediately; the head of the
    /// waiting queue gets it. The freed mailbox is signalled so the
    /// customer's notifier can observe the deallocation and exit.
    pub fn disconnect(&mut self, slot: Slot, now_ms: u64) {
        let Some(c) = self.customers.get(slot) else {
            return;
        };
        let (id, state, current_tool) = (c.id, c.state, c.current_tool);

        match state {
            CustomerState::Using => {
                if let Some(tool_id) = current_tool {
                    self.release_tool(tool_id, ReleaseKind::Left, now_ms);
                    self.grant_next_waiter(tool_id, now_ms);
                }
            }
            CustomerState::Waiting => {
                if let Err(err) = self.queue.delete(&mut self.customers, slot) {
                    error!(customer = id, %err, "waiting queue delete failed on disconnect");
                }
                self.totals.waiting -= 1;
            }
            CustomerState::Resting => self.totals.resting -= 1,
        }

        if let Some(gone) = self.customers.release(slot) {
            self.totals.total -= 1;
            self.totals.share_sum -= gone.share;
            gone.mailbox.notify_one();
        }

        info!(customer = id, "customer disconnected");
    }
}
