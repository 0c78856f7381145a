//! Per-tool tick tasks.
//!
//! Each tool owns one task. While a session runs it polls at a fixed small
//! cadence; while idle it parks on the wakeup broadcast with a bounded wait
//! so a quiesced system still polls about once a second.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use common::time::now_ms;

use crate::shared::Shared;

/// Poll cadence while a session is running.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Bound on the idle wait.
const IDLE_WAIT: Duration = Duration::from_secs(1);

pub async fn run(shared: Arc<Shared>, tool_id: usize, mut shutdown: watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        // Register wakeup interest before ticking, so an assignment that
        // lands right after the lock drops is not missed.
        let mut wakeup = pin!(shared.tool_wakeup.notified());
        wakeup.as_mut().enable();

        let busy = {
            let mut state = shared.state.lock().await;
            state.tool_tick(tool_id, now_ms());
            state.tools[tool_id].current_user.is_some()
        };

        if busy {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(TICK_INTERVAL) => {}
            }
        } else {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::timeout(IDLE_WAIT, wakeup) => {}
            }
        }
    }
    debug!(tool = tool_id, "tool task stopped");
}
