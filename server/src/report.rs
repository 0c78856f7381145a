//! Human-readable `REPORT` reply.

use std::fmt::Write;

use customer::model::CustomerState;
use scheduler::state::SchedulerState;

/// Render the multi-line status dump from a state snapshot.
///
/// Waiting customers come out sorted by share ascending; idle tools render
/// as `FREE`.
pub fn render(state: &SchedulerState, now_ms: u64) -> String {
    let totals = &state.totals;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "tools: {}  waiting: {}  resting: {}  total: {}",
        state.cfg.tool_count, totals.waiting, totals.resting, totals.total
    );
    let _ = writeln!(out, "average share: {:.2}", totals.mean_share());

    let _ = writeln!(out, "waiting customers:");
    let _ = writeln!(out, "{:<10} {:>10} {:>10}", "customer", "duration", "share");
    let mut waiters: Vec<_> = state
        .customers
        .iter()
        .map(|(_, c)| c)
        .filter(|c| c.state == CustomerState::Waiting)
        .collect();
    waiters.sort_by(|a, b| {
        a.share
            .partial_cmp(&b.share)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.wait_start_ms.cmp(&b.wait_start_ms))
    });
    for c in waiters {
        let _ = writeln!(
            out,
            "{:<10} {:>10} {:>10}",
            c.id,
            now_ms.saturating_sub(c.wait_start_ms),
            c.share as u64
        );
    }

    let _ = writeln!(out, "tools:");
    let _ = writeln!(
        out,
        "{:<4} {:>10} {:>12} {:>10} {:>10}",
        "id", "totaluse", "currentuser", "share", "duration"
    );
    for tool in &state.tools {
        match tool.current_user.and_then(|slot| state.customers.get(slot)) {
            Some(c) => {
                let _ = writeln!(
                    out,
                    "{:<4} {:>10} {:>12} {:>10} {:>10}",
                    tool.id,
                    tool.total_usage_ms,
                    c.id,
                    c.share as u64,
                    now_ms.saturating_sub(tool.session_start_ms)
                );
            }
            None => {
                let _ = writeln!(out, "{:<4} {:>10} {:>12}", tool.id, tool.total_usage_ms, "FREE");
            }
        }
    }

    out
}
