//! Crawl scheduling and execution
//!
//! The scheduler is a single-concurrency round-robin: each configured
//! site holds one slot in a repeating queue, each turn is paced to an
//! equal share of the configured interval, and per-site `delay` counters
//! let slow-moving shops sit out turns. One full rotation therefore takes
//! about one interval regardless of how many sites are configured.

mod coordinator;
mod executor;
mod pacing;
mod queue;

pub use coordinator::{deliver_new_products, pace, run_cycle, Coordinator, PipelineCtx};
pub use executor::{execute, normalize_batch};
pub use pacing::{PacingState, PacingTable};
pub use queue::{Job, Queue};

use crate::config::Config;
use crate::Result;

/// Runs the perpetual crawl loop until shutdown
pub async fn run(config: Config) -> Result<()> {
    Coordinator::new(config).await?.run().await
}
