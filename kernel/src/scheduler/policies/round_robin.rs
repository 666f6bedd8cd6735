/*
 * Round-Robin Scheduling Policy
 *
 * Runs runnable processes in FIFO order. A process that yields or wakes up
 * goes to the back of the queue, so every runnable process is dispatched
 * once before any is dispatched twice. Accumulators are ignored.
 */

use super::super::{
    process::ProcessRecord,
    traits::{DispatchCtx, DispatchRule},
    types::{Policy, Slot},
};

/// Round-Robin dispatch rule
pub struct RoundRobinRule;

impl DispatchRule for RoundRobinRule {
    fn policy(&self) -> Policy {
        Policy::RoundRobin
    }

    fn select(&self, ctx: &mut DispatchCtx<'_>) -> Option<Slot> {
        ctx.rr.dequeue()
    }

    fn after_run(&self, _record: &mut ProcessRecord) {
        // Round-robin doesn't charge anything for a run
    }
}
