/*
 * Per-Process Timing Statistics
 *
 * Each process record carries a StatsCollector. It keeps the creation and
 * termination ticks plus three counters: time spent ready, running and
 * sleeping. Exactly one interval is open while the process is alive; every
 * lifecycle edge closes it (adding `now - start` to its counter) and opens
 * the next one.
 *
 * Ticks come from the platform's monotonic tick source. The collector
 * never reads the clock itself.
 */

use super::events::{Interval, Transition};

/// Snapshot handed back to `wait_with_stats`
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct ProcStats {
    /// Creation tick
    pub ctime: u64,
    /// Termination tick (0 while alive)
    pub ttime: u64,
    /// Ticks spent sleeping
    pub stime: u64,
    /// Ticks spent runnable, waiting for a CPU
    pub retime: u64,
    /// Ticks spent running
    pub rutime: u64,
}

impl ProcStats {
    /// Ticks between creation and termination
    pub fn turnaround(&self) -> u64 {
        self.ttime.saturating_sub(self.ctime)
    }
}

/// Interval bookkeeping of one process
#[derive(Debug, Default, Clone)]
pub struct StatsCollector {
    stats: ProcStats,
    created: bool,
    terminated: bool,
    open: Option<(Interval, u64)>,
}

impl StatsCollector {
    /// Empty collector for a freshly allocated record
    pub const fn new() -> Self {
        Self {
            stats: ProcStats {
                ctime: 0,
                ttime: 0,
                stime: 0,
                retime: 0,
                rutime: 0,
            },
            created: false,
            terminated: false,
            open: None,
        }
    }

    /// Apply a lifecycle edge at tick `now`
    ///
    /// # Panics
    /// If the edge does not close the interval that is currently open, or
    /// a write-once stamp would be written twice. Both mean the process
    /// table skipped a transition.
    pub fn record(&mut self, edge: Transition, now: u64) {
        match edge {
            Transition::Created => {
                crate::invariant!(!self.created, "stats: creation tick written twice");
                self.created = true;
                self.stats.ctime = now;
            }
            Transition::Exited => {
                crate::invariant!(!self.terminated, "stats: termination tick written twice");
                self.terminated = true;
                self.stats.ttime = now;
            }
            _ => {}
        }

        if let Some(expected) = edge.closes() {
            match self.open.take() {
                Some((interval, start)) if interval == expected => {
                    let delta = now.saturating_sub(start);
                    *self.counter(interval) += delta;
                }
                other => crate::fatal!(
                    "stats: {} edge found {:?} open, expected {:?}",
                    edge.name(),
                    other.map(|(interval, _)| interval),
                    expected
                ),
            }
        }

        self.open = edge.opens().map(|interval| (interval, now));
    }

    /// Current counters (closed intervals only)
    pub fn snapshot(&self) -> ProcStats {
        self.stats
    }

    /// Interval currently accumulating, if any
    pub fn open_interval(&self) -> Option<Interval> {
        self.open.map(|(interval, _)| interval)
    }

    fn counter(&mut self, interval: Interval) -> &mut u64 {
        match interval {
            Interval::Ready => &mut self.stats.retime,
            Interval::Running => &mut self.stats.rutime,
            Interval::Sleeping => &mut self.stats.stime,
        }
    }
}
