use clap::Parser;

use scheduler::types::SchedulerConfig;

/// Fair-share tool scheduling server.
///
/// Multiplexes a fixed pool of tools among connected customers, preempting
/// by cumulative share between the two slice bounds.
#[derive(Debug, Parser)]
#[clap(name = "toolshare", version)]
pub struct Cli {
    /// Listen address: `ip:port`, or `@/path/to.sock` for a Unix socket.
    pub listen: String,

    /// Minimum slice (ms) protecting a running session from preemption.
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub min_slice_ms: u64,

    /// Maximum slice (ms) after which a session must yield to waiters.
    #[clap(value_parser = clap::value_parser!(u64).range(1..))]
    pub max_slice_ms: u64,

    /// Number of tools in the pool.
    #[clap(value_parser = clap::value_parser!(u64).range(1..=100))]
    pub tools: u64,
}

impl Cli {
    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::new(self.min_slice_ms, self.max_slice_ms, self.tools as usize)
    }
}
