/*
 * Extended-Priority Scheduling Policy
 *
 * Priority scheduling with an aging bypass: on every scheduling decision
 * whose number is a multiple of the aging period, the runnable process
 * that was dispatched longest ago runs instead of the lowest accumulator.
 * A process can therefore wait at most one aging period of decisions
 * before it is picked, whatever its accumulator.
 *
 * Priority 0 is legal here and means the process is never charged.
 */

use super::super::{
    process::{ProcState, ProcessRecord},
    traits::{DispatchCtx, DispatchRule},
    types::{Policy, Slot},
};
use super::priority::charge;

/// Extended-Priority dispatch rule
pub struct ExtendedPriorityRule;

impl DispatchRule for ExtendedPriorityRule {
    fn policy(&self) -> Policy {
        Policy::ExtendedPriority
    }

    fn select(&self, ctx: &mut DispatchCtx<'_>) -> Option<Slot> {
        if ctx.decision % ctx.aging_period == 0 {
            if let Some(slot) = most_starved(ctx) {
                if ctx.pq.extract_specific(slot) {
                    log::debug!(
                        "[Ext Policy] aging bypass at decision {} picks slot {}",
                        ctx.decision,
                        slot.index()
                    );
                    return Some(slot);
                }
            }
        }

        ctx.pq.extract_min(ctx.procs)
    }

    fn after_run(&self, record: &mut ProcessRecord) {
        charge(record);
    }
}

/// Runnable process with the oldest last-scheduled stamp (first in table order)
fn most_starved(ctx: &DispatchCtx<'_>) -> Option<Slot> {
    ctx.procs
        .iter()
        .filter(|(_, record)| record.state == ProcState::Runnable)
        .min_by_key(|(slot, record)| (record.last_scheduled, *slot))
        .map(|(slot, _)| slot)
}
