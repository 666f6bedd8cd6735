/*
 * Running Set
 *
 * Processes currently executing on some CPU. Only needed for the fairness
 * baseline: a process that is running right now still competes for the
 * CPU and must count when a newcomer's accumulator is chosen.
 */

use heapless::Vec;

use super::super::process::ProcArena;
use super::super::types::Slot;
use crate::config::NCPU;

/// Set of running processes, at most one per CPU
pub struct RunningSet {
    slots: Vec<Slot, NCPU>,
}

impl RunningSet {
    /// Create an empty set
    pub const fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Record a process as running
    pub fn add(&mut self, slot: Slot) {
        crate::invariant!(
            !self.contains(slot),
            "slot {} is already running",
            slot.index()
        );
        if self.slots.push(slot).is_err() {
            crate::fatal!("more running processes than CPUs");
        }
    }

    /// Forget a process that handed its CPU back
    ///
    /// # Returns
    /// `false` if the process was not in the set
    pub fn remove(&mut self, slot: Slot) -> bool {
        match self.slots.iter().position(|&running| running == slot) {
            Some(index) => {
                self.slots.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Lowest accumulator among running processes
    pub fn min_accumulator(&self, procs: &ProcArena) -> Option<i64> {
        self.slots
            .iter()
            .map(|&slot| procs.get(slot).accumulator)
            .min()
    }

    /// Whether the process is running
    pub fn contains(&self, slot: Slot) -> bool {
        self.slots.contains(&slot)
    }

    /// Running processes
    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        self.slots.iter().copied()
    }

    /// Number of running processes
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no process is running
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for RunningSet {
    fn default() -> Self {
        Self::new()
    }
}
