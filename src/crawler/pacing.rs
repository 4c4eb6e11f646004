//! Per-site pacing state
//!
//! Each pass of the round-robin offers every site a turn; a site's
//! configured `delay` says how many of those offers to decline between
//! real crawls. The counters live here, owned by the scheduler, so site
//! definitions stay immutable data.

use std::collections::HashMap;

/// Consecutive timeouts tolerated before the operator is notified
const TIMEOUT_REPORT_THRESHOLD: u32 = 4;

/// Divisor applied to a site's delay after a failed crawl, so the retry
/// comes sooner than a full pacing period
const FAILURE_RESET_DIVISOR: u32 = 10;

/// Skip counter and timeout-strike tally for one site
#[derive(Debug, Default, Clone)]
pub struct PacingState {
    skip: u32,
    strikes: u32,
}

impl PacingState {
    /// Consumes one round-robin turn
    ///
    /// Returns `true` when the site should actually be crawled this turn,
    /// in which case the skip counter is re-armed to `delay`.
    pub fn tick(&mut self, delay: u32) -> bool {
        if self.skip > 0 {
            self.skip -= 1;
            false
        } else {
            self.skip = delay;
            true
        }
    }

    /// Records a completed crawl, clearing the timeout tally
    pub fn on_success(&mut self) {
        self.strikes = 0;
    }

    /// Records a timed-out crawl
    ///
    /// Returns `true` when the strike tally reaches the reporting
    /// threshold; the tally resets so the next report needs a fresh run
    /// of consecutive timeouts.
    pub fn on_timeout(&mut self, delay: u32) -> bool {
        self.soft_reset(delay);
        self.strikes += 1;
        if self.strikes >= TIMEOUT_REPORT_THRESHOLD {
            self.strikes = 0;
            true
        } else {
            false
        }
    }

    /// Records a non-timeout failure
    pub fn on_failure(&mut self, delay: u32) {
        self.soft_reset(delay);
    }

    /// Shortens the wait before the next attempt without zeroing it
    fn soft_reset(&mut self, delay: u32) {
        self.skip = delay / FAILURE_RESET_DIVISOR;
    }
}

/// Scheduler-owned pacing table keyed by site slug
#[derive(Debug, Default)]
pub struct PacingTable {
    states: HashMap<String, PacingState>,
}

impl PacingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state_mut(&mut self, slug: &str) -> &mut PacingState {
        self.states.entry(slug.to_string()).or_default()
    }
}
