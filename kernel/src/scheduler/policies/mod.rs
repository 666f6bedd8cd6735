/*
 * Scheduling Policies Module
 *
 * This module contains the scheduling policy implementations and the
 * controller that switches between them at runtime.
 *
 * Available policies:
 * - RoundRobin: FIFO rotation
 * - Priority: lowest accumulator first, charged by priority after each run
 * - ExtendedPriority: Priority plus a periodic anti-starvation bypass
 *
 * Each policy is a stateless DispatchRule; all scheduling state lives in
 * the process table, so switching policy only has to move runnable
 * processes between the two ready queues.
 */

pub mod extended;
pub mod priority;
pub mod round_robin;

pub use extended::ExtendedPriorityRule;
pub use priority::PriorityRule;
pub use round_robin::RoundRobinRule;

use super::process::ProcArena;
use super::queues::{PriorityQueue, RoundRobinQueue};
use super::traits::DispatchRule;
use super::types::{Policy, Priority};

static ROUND_ROBIN: RoundRobinRule = RoundRobinRule;
static PRIORITY: PriorityRule = PriorityRule;
static EXTENDED_PRIORITY: ExtendedPriorityRule = ExtendedPriorityRule;

/// Dispatch rule of a policy
pub fn rule_for(policy: Policy) -> &'static dyn DispatchRule {
    match policy {
        Policy::RoundRobin => &ROUND_ROBIN,
        Policy::Priority => &PRIORITY,
        Policy::ExtendedPriority => &EXTENDED_PRIORITY,
    }
}

/// Active policy and the transitions between policies
pub struct PolicyController {
    current: Policy,
    rr_baseline: i64,
}

impl PolicyController {
    /// Controller starting in `initial`
    ///
    /// # Arguments
    /// * `initial` - Policy active at boot
    /// * `rr_baseline` - Accumulator every process gets on entering Round-Robin
    pub fn new(initial: Policy, rr_baseline: i64) -> Self {
        Self {
            current: initial,
            rr_baseline,
        }
    }

    /// Currently active policy
    pub fn current(&self) -> Policy {
        self.current
    }

    /// Rule of the active policy
    pub fn rule(&self) -> &'static dyn DispatchRule {
        rule_for(self.current)
    }

    /// Switch to `target`, moving runnable processes to its ready queue
    ///
    /// Must run under the table lock so no dispatch observes a half-moved
    /// queue.
    ///
    /// # Arguments
    /// * `target` - Policy to activate
    /// * `procs` - All process records
    /// * `rr` - FIFO ready queue
    /// * `pq` - Accumulator-ordered ready queue
    pub fn transition(
        &mut self,
        target: Policy,
        procs: &mut ProcArena,
        rr: &mut RoundRobinQueue,
        pq: &mut PriorityQueue,
    ) {
        let source = self.current;

        match target {
            Policy::RoundRobin => {
                // Drain while the accumulators still order the queue
                if source.uses_priority_queue() {
                    pq.drain_into(procs, rr);
                }
                for (_, record) in procs.iter_mut() {
                    record.accumulator = self.rr_baseline;
                }
                // Priority 0 is only legal under Extended-Priority
                remap_unset_priorities(procs);
            }
            Policy::ExtendedPriority => {
                if source == Policy::RoundRobin {
                    rr.drain_into(pq);
                }
            }
            Policy::Priority => {
                remap_unset_priorities(procs);
                if source == Policy::RoundRobin {
                    rr.drain_into(pq);
                }
            }
        }

        self.current = target;
        log::info!(
            "Scheduling policy: {} -> {}",
            rule_for(source).name(),
            self.rule().name()
        );
    }
}

fn remap_unset_priorities(procs: &mut ProcArena) {
    for (_, record) in procs.iter_mut() {
        if record.is_used() && record.priority.is_unset() {
            record.priority = Priority::MIN;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::process::ProcState;
    use crate::scheduler::types::{Pid, Slot};

    #[test]
    fn test_each_policy_has_its_own_rule() {
        for policy in [Policy::RoundRobin, Policy::Priority, Policy::ExtendedPriority] {
            assert_eq!(rule_for(policy).policy(), policy);
            assert_eq!(rule_for(policy).name(), policy.name());
        }
    }

    struct Fixture {
        procs: ProcArena,
        rr: RoundRobinQueue,
        pq: PriorityQueue,
    }

    fn runnable(count: usize) -> Fixture {
        let mut procs = ProcArena::new(count);
        for index in 0..count {
            let record = procs.get_mut(Slot(index));
            record.pid = Some(Pid(index as u32 + 1));
            record.state = ProcState::Runnable;
        }
        Fixture {
            procs,
            rr: RoundRobinQueue::new(),
            pq: PriorityQueue::new(),
        }
    }

    #[test]
    fn test_round_robin_to_priority_moves_queue() {
        let mut f = runnable(3);
        for index in 0..3 {
            f.rr.enqueue(Slot(index));
        }

        let mut controller = PolicyController::new(Policy::RoundRobin, 0);
        controller.transition(Policy::Priority, &mut f.procs, &mut f.rr, &mut f.pq);

        assert_eq!(controller.current(), Policy::Priority);
        assert!(f.rr.is_empty());
        assert_eq!(f.pq.len(), 3);
    }

    #[test]
    fn test_entering_round_robin_resets_accumulators() {
        let mut f = runnable(2);
        f.procs.get_mut(Slot(0)).accumulator = 40;
        f.procs.get_mut(Slot(1)).accumulator = 12;
        f.pq.put(Slot(0));
        f.pq.put(Slot(1));

        let mut controller = PolicyController::new(Policy::Priority, 0);
        controller.transition(Policy::RoundRobin, &mut f.procs, &mut f.rr, &mut f.pq);

        assert!(f.pq.is_empty());
        // Drained in extraction order (lowest accumulator first)
        assert_eq!(f.rr.iter().collect::<Vec<_>>(), vec![Slot(1), Slot(0)]);
        assert!(f.procs.iter().all(|(_, record)| record.accumulator == 0));
    }

    #[test]
    fn test_extended_from_priority_keeps_queue_and_sentinel() {
        let mut f = runnable(1);
        f.pq.put(Slot(0));

        let mut controller = PolicyController::new(Policy::Priority, 0);
        controller.transition(Policy::ExtendedPriority, &mut f.procs, &mut f.rr, &mut f.pq);
        f.procs.get_mut(Slot(0)).priority = Priority::UNSET;
        controller.transition(Policy::ExtendedPriority, &mut f.procs, &mut f.rr, &mut f.pq);

        assert_eq!(f.pq.len(), 1);
        assert!(f.procs.get(Slot(0)).priority.is_unset());
    }

    #[test]
    fn test_priority_remaps_sentinel() {
        let mut f = runnable(2);
        f.procs.get_mut(Slot(0)).priority = Priority::UNSET;
        f.pq.put(Slot(0));
        f.pq.put(Slot(1));

        let mut controller = PolicyController::new(Policy::ExtendedPriority, 0);
        controller.transition(Policy::Priority, &mut f.procs, &mut f.rr, &mut f.pq);

        assert_eq!(f.procs.get(Slot(0)).priority, Priority::MIN);
        assert_eq!(f.procs.get(Slot(1)).priority, Priority::DEFAULT);
        assert_eq!(f.pq.len(), 2);
    }
}
