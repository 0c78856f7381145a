//! Selection predicates for tool placement.
//!
//! These are deliberately pure: no clock access, no state mutation. Both
//! scans iterate in ascending tool id with strict comparisons, so ties
//! resolve to the smallest id deterministically.

use crate::types::Tool;

/// Pick the free tool with the least lifetime use, if any tool is free.
pub fn pick_free_tool(tools: &[Tool]) -> Option<usize> {
    let mut best: Option<&Tool> = None;
    for tool in tools.iter().filter(|t| t.current_user.is_none()) {
        match best {
            Some(b) if tool.total_usage_ms >= b.total_usage_ms => {}
            _ => best = Some(tool),
        }
    }
    best.map(|t| t.id)
}

/// Pick the occupied tool whose current session has run the longest,
/// together with that elapsed time.
///
/// Elapsed time is recomputed from `session_start_ms`; the cached
/// `current_usage_ms` may be a tick stale.
pub fn pick_preemption_candidate(tools: &[Tool], now_ms: u64) -> Option<(usize, u64)> {
    let mut best: Option<(usize, u64)> = None;
    for tool in tools.iter().filter(|t| t.current_user.is_some()) {
        let elapsed = now_ms.saturating_sub(tool.session_start_ms);
        match best {
            Some((_, longest)) if elapsed <= longest => {}
            _ => best = Some((tool.id, elapsed)),
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mk_tool(id: usize, total_usage_ms: u64, user: Option<usize>, session_start_ms: u64) -> Tool {
        Tool {
            id,
            total_usage_ms,
            current_user: user,
            current_usage_ms: 0,
            session_start_ms,
        }
    }

    #[test]
    fn least_used_free_tool_wins() {
        let tools = vec![
            mk_tool(0, 500, None, 0),
            mk_tool(1, 200, None, 0),
            mk_tool(2, 100, Some(3), 0),
        ];
        assert_eq!(pick_free_tool(&tools), Some(1));
    }

    #[test]
    fn free_tool_ties_break_to_smallest_id() {
        let tools = vec![mk_tool(0, 0, None, 0), mk_tool(1, 0, None, 0)];
        assert_eq!(pick_free_tool(&tools), Some(0));
    }

    #[test]
    fn no_free_tool_yields_none() {
        let tools = vec![mk_tool(0, 0, Some(1), 0), mk_tool(1, 0, Some(2), 0)];
        assert_eq!(pick_free_tool(&tools), None);
    }

    #[test]
    fn longest_running_session_is_the_candidate() {
        let tools = vec![
            mk_tool(0, 0, Some(1), 900),
            mk_tool(1, 0, Some(2), 400),
            mk_tool(2, 0, None, 0),
        ];
        assert_eq!(pick_preemption_candidate(&tools, 1_000), Some((1, 600)));
    }

    #[test]
    fn candidate_ties_break_to_smallest_id() {
        let tools = vec![mk_tool(0, 0, Some(1), 500), mk_tool(1, 0, Some(2), 500)];
        assert_eq!(pick_preemption_candidate(&tools, 1_000), Some((0, 500)));
    }

    #[test]
    fn all_idle_yields_no_candidate() {
        let tools = vec![mk_tool(0, 0, None, 0)];
        assert_eq!(pick_preemption_candidate(&tools, 1_000), None);
    }
}
