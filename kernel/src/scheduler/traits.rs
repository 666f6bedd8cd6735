/*
 * Scheduler Trait Definitions
 *
 * This module defines the two seams of the scheduler:
 *
 * - DispatchRule: the policy interface; one implementation per scheduling
 *   policy decides which runnable process to dispatch next
 * - Platform: the mechanism the scheduler needs from the rest of the
 *   kernel (tick source, context switching, per-process resources)
 *
 * This separation allows:
 * 1. Switching policies at runtime at a single dispatch site
 * 2. Testing the whole scheduler on the host with a thread-backed platform
 * 3. Clear ownership boundaries (rules never change lifecycle state)
 */

use core::fmt;

use super::process::{ProcArena, ProcessRecord};
use super::queues::{PriorityQueue, RoundRobinQueue};
use super::types::{CpuId, Pid, Policy, Slot};

/// What a dispatch rule may look at and take from
///
/// Built by the process table for a single decision, with the table lock
/// held. Rules only remove the process they select from its ready queue;
/// the table performs the Runnable -> Running transition.
pub struct DispatchCtx<'a> {
    /// All process records
    pub procs: &'a ProcArena,

    /// FIFO ready queue (Round-Robin)
    pub rr: &'a mut RoundRobinQueue,

    /// Accumulator-ordered ready queue (Priority policies)
    pub pq: &'a mut PriorityQueue,

    /// Scheduling-decision counter value for this decision
    pub decision: u64,

    /// Aging bypass period of Extended-Priority
    pub aging_period: u64,
}

/// Scheduling policy trait
///
/// Different policies implement this trait. The process table selects the
/// rule of the active policy at its single dispatch site.
pub trait DispatchRule: Sync {
    /// Which policy this rule implements
    fn policy(&self) -> Policy;

    /// Choose and dequeue the next process to run
    ///
    /// # Returns
    /// The selected process (already removed from its ready queue), or
    /// None when nothing is runnable
    fn select(&self, ctx: &mut DispatchCtx<'_>) -> Option<Slot>;

    /// Bookkeeping after a process handed its CPU back still Runnable
    ///
    /// Called with the table lock held, in the critical section of the
    /// process giving up the CPU.
    fn after_run(&self, _record: &mut ProcessRecord) {}

    /// Get the policy name for debugging
    fn name(&self) -> &'static str {
        self.policy().name()
    }
}

/// Failure of the platform to prepare a new process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceError;

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not duplicate process resources")
    }
}

/// Kernel mechanism interface used by the scheduler
///
/// The scheduler never touches registers, stacks, address spaces or file
/// tables. Whatever the kernel keeps per process is behind this trait.
///
/// `resume` and `suspend` are the two halves of a context switch. The
/// dispatcher on `cpu` calls `resume` and is blocked until the process
/// gives the CPU back by calling `suspend` from its own context. `suspend`
/// blocks the process until some dispatcher resumes it again, possibly on
/// another CPU, which it returns.
pub trait Platform: Send + Sync {
    /// Current value of the monotonic tick source
    fn ticks(&self) -> u64;

    /// Switch `cpu` to the process `pid` until it gives the CPU back
    fn resume(&self, cpu: CpuId, pid: Pid);

    /// Give `cpu` back to its dispatcher from inside process `pid`
    ///
    /// # Returns
    /// The CPU the process runs on after it has been resumed
    fn suspend(&self, cpu: CpuId, pid: Pid) -> CpuId;

    /// Give `child` a copy of `parent`'s process-local resources
    fn duplicate_resources(&self, parent: Pid, child: Pid) -> Result<(), ResourceError>;

    /// Release the process-local resources of an exiting process
    fn release_resources(&self, pid: Pid);
}
