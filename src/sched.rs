//! Fixed-tick pacing for the control loop.
//!
//! The loop has a nominal tick (default 10 ms) but its effective rate is
//! gated by inference latency. `TickScheduler` makes that explicit: an
//! overrun resynchronizes the next deadline instead of bursting to catch
//! up, and the drift is reported so the daemon can log effective rate.
//! Overruns are expected operation, never a fault.

use std::thread;
use std::time::{Duration, Instant};

/// What happened at one tick boundary.
#[derive(Clone, Copy, Debug)]
pub struct TickReport {
    /// The previous cycle ran past its deadline.
    pub overrun: bool,
    /// How far past the deadline it ran (zero when on time).
    pub lag: Duration,
}

/// Running totals for rate logging.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    pub ticks: u64,
    pub overruns: u64,
    pub total_lag: Duration,
}

pub struct TickScheduler {
    period: Duration,
    deadline: Instant,
    stats: TickStats,
}

impl TickScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: Instant::now() + period,
            stats: TickStats::default(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Block until the next tick boundary.
    ///
    /// On time: sleeps the remainder and advances the deadline by one
    /// period. Late: advances the deadline from *now*; one long inference
    /// costs one long cycle, not a burst of frantic ones.
    pub fn wait(&mut self) -> TickReport {
        let now = Instant::now();
        self.stats.ticks += 1;

        if now >= self.deadline {
            let lag = now.duration_since(self.deadline);
            self.stats.overruns += 1;
            self.stats.total_lag += lag;
            self.deadline = now + self.period;
            return TickReport { overrun: true, lag };
        }

        thread::sleep(self.deadline.duration_since(now));
        self.deadline += self.period;
        TickReport {
            overrun: false,
            lag: Duration::ZERO,
        }
    }
}
