/*
 * Priority Scheduling Policy
 *
 * Runs the runnable process with the lowest accumulator. After each run
 * that ends with the process still runnable its accumulator grows by its
 * priority, so priority 1 is charged least and dispatched most often.
 */

use super::super::{
    process::ProcessRecord,
    traits::{DispatchCtx, DispatchRule},
    types::{Policy, Slot},
};

/// Priority dispatch rule
pub struct PriorityRule;

impl DispatchRule for PriorityRule {
    fn policy(&self) -> Policy {
        Policy::Priority
    }

    fn select(&self, ctx: &mut DispatchCtx<'_>) -> Option<Slot> {
        ctx.pq.extract_min(ctx.procs)
    }

    fn after_run(&self, record: &mut ProcessRecord) {
        charge(record);
    }
}

/// Charge a process its priority for the run it just had
pub(super) fn charge(record: &mut ProcessRecord) {
    record.accumulator += record.priority.weight();
}
