/*
 * Scheduler Configuration
 *
 * Compile-time capacities and the runtime knobs the scheduler is created
 * with. The capacities size the fixed ready structures; the runtime values
 * must stay within them.
 */

use crate::scheduler::{Policy, Priority};

/// Maximum number of process slots (size of the process arena)
pub const NPROC: usize = 64;

/// Maximum number of CPUs running the dispatch loop
pub const NCPU: usize = 8;

/// Every Kth scheduling decision under Extended-Priority runs the most
/// starved process instead of the lowest accumulator
pub const AGING_PERIOD: u64 = 100;

/// Accumulator value every process gets when Round-Robin becomes active,
/// and the fairness baseline when nothing is runnable or running
pub const ACCUMULATOR_BASELINE: i64 = 0;

/// Scheduler configuration
///
/// Passed to `Kernel::new`. The defaults match the values the kernel boots
/// with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedConfig {
    /// Number of usable process slots (1..=NPROC)
    pub max_processes: usize,

    /// Number of CPUs that will run the dispatch loop (1..=NCPU)
    pub cpu_count: usize,

    /// Policy active at boot
    pub initial_policy: Policy,

    /// Priority given to every newly created process
    pub default_priority: Priority,

    /// Scheduling-decision period of the Extended-Priority aging bypass
    pub aging_period: u64,
}

impl SchedConfig {
    /// Same configuration with a different boot policy
    pub fn with_policy(self, initial_policy: Policy) -> Self {
        Self {
            initial_policy,
            ..self
        }
    }

    /// Same configuration with a different CPU count
    pub fn with_cpus(self, cpu_count: usize) -> Self {
        Self { cpu_count, ..self }
    }

    /// Same configuration with a different number of process slots
    pub fn with_max_processes(self, max_processes: usize) -> Self {
        Self {
            max_processes,
            ..self
        }
    }

    /// Check the configuration against the compile-time capacities
    ///
    /// # Panics
    /// A configuration the scheduler cannot honour is fatal: the ready
    /// structures are sized from these values.
    pub fn validate(&self) {
        crate::invariant!(
            (1..=NPROC).contains(&self.max_processes),
            "config: max_processes {} outside 1..={}",
            self.max_processes,
            NPROC
        );
        crate::invariant!(
            (1..=NCPU).contains(&self.cpu_count),
            "config: cpu_count {} outside 1..={}",
            self.cpu_count,
            NCPU
        );
        crate::invariant!(
            !self.default_priority.is_unset(),
            "config: default priority must be 1..=10"
        );
        crate::invariant!(self.aging_period > 0, "config: aging period must be non-zero");
    }
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            max_processes: NPROC,
            cpu_count: 1,
            initial_policy: Policy::RoundRobin,
            default_priority: Priority::DEFAULT,
            aging_period: AGING_PERIOD,
        }
    }
}
