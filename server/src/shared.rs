use tokio::sync::{Mutex, Notify};

use scheduler::state::SchedulerState;
use scheduler::types::SchedulerConfig;

/// Everything the connection, notifier, and tool tasks share.
pub struct Shared {
    /// The single coarse lock over all scheduler state.
    pub state: Mutex<SchedulerState>,

    /// Poked after any state change that may unblock an idle tool.
    pub tool_wakeup: Notify,
}

impl Shared {
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            state: Mutex::new(SchedulerState::new(cfg)),
            tool_wakeup: Notify::new(),
        }
    }
}
