//! The fairness & preemption engine.
//!
//! Three entry points — `request`, `rest`, `tool_tick` — are invoked with
//! the global mutex held and an explicit `now_ms`, and decide whether an
//! event yields a free tool, a preemption, or a wait. Share accounting
//! happens on release: a session's elapsed time is added to the holder's
//! share, the tool's lifetime usage, and the aggregate share sum.

use tracing::{debug, error, warn};

use customer::model::{CustomerState, Slot, ToolEventKind};

use crate::policy;
use crate::state::SchedulerState;
use crate::types::ReleaseKind;

impl SchedulerState {
    /// A customer asks for any one tool for `duration_ms`.
    ///
    /// Placement order: the least-used free tool; else preemption of the
    /// longest-running session when the slice and share rules allow it;
    /// else the waiting queue. A request from a customer already holding a
    /// tool is invalid input and ignored.
    pub fn request(&mut self, slot: Slot, duration_ms: u64, now_ms: u64) {
        let Some(c) = self.customers.get(slot) else {
            warn!(slot, "request for unknown customer slot");
            return;
        };
        let (id, state) = (c.id, c.state);

        match state {
            CustomerState::Using => {
                debug!(customer = id, "request while holding a tool; ignored");
                return;
            }
            CustomerState::Resting => self.totals.resting -= 1,
            CustomerState::Waiting => {
                if let Err(err) = self.queue.delete(&mut self.customers, slot) {
                    error!(customer = id, %err, "waiting queue delete failed");
                }
                self.totals.waiting -= 1;
            }
        }

        if let Some(c) = self.customers.get_mut(slot) {
            c.request_ms = duration_ms;
            c.remaining_ms = duration_ms;
        }
        debug!(customer = id, duration_ms, "tool requested");

        if let Some(tool_id) = policy::pick_free_tool(&self.tools) {
            self.assign_tool(slot, tool_id, now_ms);
            return;
        }

        if let Some((tool_id, elapsed)) = policy::pick_preemption_candidate(&self.tools, now_ms) {
            if elapsed >= self.cfg.min_slice_ms && self.may_preempt(tool_id, slot) {
                if let Some(victim) = self.release_tool(tool_id, ReleaseKind::Evicted, now_ms) {
                    self.enqueue_waiter(victim, now_ms);
                }
                self.assign_tool(slot, tool_id, now_ms);
                return;
            }
        }

        self.enqueue_waiter(slot, now_ms);
    }

    /// A customer stops using or waiting for tools.
    pub fn rest(&mut self, slot: Slot, now_ms: u64) {
        let Some(c) = self.customers.get(slot) else {
            warn!(slot, "rest for unknown customer slot");
            return;
        };
        let (id, state, current_tool) = (c.id, c.state, c.current_tool);

        match state {
            CustomerState::Resting => {}
            CustomerState::Waiting => {
                if let Err(err) = self.queue.delete(&mut self.customers, slot) {
                    error!(customer = id, %err, "waiting queue delete failed");
                }
                self.totals.waiting -= 1;
                self.settle(slot);
                debug!(customer = id, "customer rests");
            }
            CustomerState::Using => {
                if let Some(tool_id) = current_tool {
                    self.release_tool(tool_id, ReleaseKind::Left, now_ms);
                    self.settle(slot);
                    self.grant_next_waiter(tool_id, now_ms);
                }
                debug!(customer = id, "customer rests");
            }
        }
    }

    /// Periodic poll of one tool. Idle tools are a no-op.
    ///
    /// In precedence order: completion of the requested duration; the hard
    /// slice bound `Q` when anyone is waiting; the soft slice bound `q`
    /// when the queue head has accumulated less share than the holder.
    pub fn tool_tick(&mut self, tool_id: usize, now_ms: u64) {
        let Some(tool) = self.tools.get_mut(tool_id) else {
            warn!(tool = tool_id, "tick for unknown tool");
            return;
        };
        let Some(slot) = tool.current_user else {
            return;
        };

        let elapsed = now_ms.saturating_sub(tool.session_start_ms);
        tool.current_usage_ms = elapsed;

        let Some(c) = self.customers.get_mut(slot) else {
            error!(tool = tool_id, slot, "tool occupant missing from arena");
            return;
        };
        c.remaining_ms = c.request_ms.saturating_sub(elapsed);
        let (request_ms, holder_share) = (c.request_ms, c.share);

        if elapsed >= request_ms {
            if let Some(done) = self.release_tool(tool_id, ReleaseKind::Completed, now_ms) {
                self.settle(done);
            }
            self.grant_next_waiter(tool_id, now_ms);
            return;
        }

        if self.queue.is_empty() {
            return;
        }

        let hard = elapsed >= self.cfg.max_slice_ms;
        let soft = !hard
            && elapsed >= self.cfg.min_slice_ms
            && self
                .queue
                .peek_min()
                .and_then(|s| self.customers.get(s))
                .is_some_and(|head| head.share < holder_share);

        if hard || soft {
            if let Some(victim) = self.release_tool(tool_id, ReleaseKind::Evicted, now_ms) {
                self.enqueue_waiter(victim, now_ms);
            }
            self.grant_next_waiter(tool_id, now_ms);
        }
    }

    /// Hand a freed tool to the head of the waiting queue, if any.
    pub fn grant_next_waiter(&mut self, tool_id: usize, now_ms: u64) {
        if let Some(next) = self.queue.pop_min(&mut self.customers) {
            self.totals.waiting -= 1;
            self.assign_tool(next, tool_id, now_ms);
        }
    }

    /// Bind a tool to a customer and start a fresh session on it.
    fn assign_tool(&mut self, slot: Slot, tool_id: usize, now_ms: u64) {
        let id = match self.customers.get_mut(slot) {
            Some(c) => {
                c.state = CustomerState::Using;
                c.current_tool = Some(tool_id);
                c.session_start_ms = now_ms;
                c.remaining_ms = c.request_ms;
                c.push_event(ToolEventKind::Assigned, tool_id);
                c.id
            }
            None => {
                error!(slot, tool = tool_id, "assignment target missing from arena");
                return;
            }
        };

        let tool = &mut self.tools[tool_id];
        tool.current_user = Some(slot);
        tool.current_usage_ms = 0;
        tool.session_start_ms = now_ms;

        debug!(customer = id, tool = tool_id, "tool assigned");
    }

    /// Unbind a tool from its occupant, crediting the session's usage to the
    /// occupant's share and the tool's lifetime total. Returns the former
    /// occupant's slot; its next state is the caller's business.
    pub(crate) fn release_tool(
        &mut self,
        tool_id: usize,
        kind: ReleaseKind,
        now_ms: u64,
    ) -> Option<Slot> {
        let (slot, usage) = {
            let tool = self.tools.get_mut(tool_id)?;
            let slot = tool.current_user.take()?;
            let usage = now_ms.saturating_sub(tool.session_start_ms);
            tool.total_usage_ms += usage;
            tool.current_usage_ms = 0;
            (slot, usage)
        };

        let Some(c) = self.customers.get_mut(slot) else {
            error!(tool = tool_id, slot, "released tool had no arena record");
            return None;
        };
        c.share += usage as f64;
        c.current_tool = None;
        c.push_event(kind.event(), tool_id);
        let id = c.id;

        self.totals.share_sum += usage as f64;

        debug!(customer = id, tool = tool_id, usage, ?kind, "tool released");
        Some(slot)
    }

    /// Put a customer into the waiting queue, keyed by its current share.
    fn enqueue_waiter(&mut self, slot: Slot, now_ms: u64) {
        if let Some(c) = self.customers.get_mut(slot) {
            c.state = CustomerState::Waiting;
            c.wait_start_ms = now_ms;
        }
        self.totals.waiting += 1;
        if let Err(err) = self.queue.insert(&mut self.customers, slot) {
            error!(slot, %err, "waiting queue insert failed");
        }
    }

    /// Transition a customer back to `Resting`.
    fn settle(&mut self, slot: Slot) {
        if let Some(c) = self.customers.get_mut(slot) {
            c.state = CustomerState::Resting;
        }
        self.totals.resting += 1;
    }

    /// Share rule for preemption: the holder must have accumulated strictly
    /// more share than the requester, or at least as much when the
    /// equal-share knob is on.
    fn may_preempt(&self, tool_id: usize, requester: Slot) -> bool {
        let Some(victim) = self.tools[tool_id]
            .current_user
            .and_then(|s| self.customers.get(s))
        else {
            return false;
        };
        let Some(req) = self.customers.get(requester) else {
            return false;
        };

        if self.cfg.preempt_equal_share {
            victim.share >= req.share
        } else {
            victim.share > req.share
        }
    }
}
