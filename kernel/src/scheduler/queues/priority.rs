/*
 * Priority Ready Queue
 *
 * Runnable processes ordered by accumulator, lowest first; equal
 * accumulators leave in insertion order. Entries are arena handles tagged
 * with an insertion sequence number. The accumulator itself is read from
 * the process arena when the queue is queried, so the post-run charge
 * applied by the dispatcher never requires re-insertion.
 *
 * With at most NPROC entries a linear minimum search is cheaper than
 * keeping a heap in sync with keys that change underneath it.
 */

use heapless::Vec;

use super::super::process::ProcArena;
use super::super::types::Slot;
use super::RoundRobinQueue;
use crate::config::NPROC;

#[derive(Debug, Copy, Clone)]
struct Entry {
    slot: Slot,
    seq: u64,
}

/// Accumulator-ordered queue of runnable processes
pub struct PriorityQueue {
    entries: Vec<Entry, NPROC>,
    next_seq: u64,
}

impl PriorityQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
        }
    }

    /// Insert a process behind every entry inserted before it
    pub fn put(&mut self, slot: Slot) {
        let entry = Entry {
            slot,
            seq: self.next_seq,
        };
        if self.entries.push(entry).is_err() {
            crate::fatal!("priority queue overflow at slot {}", slot.index());
        }
        self.next_seq += 1;
    }

    /// Remove and return the process with the lowest accumulator
    pub fn extract_min(&mut self, procs: &ProcArena) -> Option<Slot> {
        let index = self.min_index(procs)?;
        Some(self.entries.swap_remove(index).slot)
    }

    /// Lowest accumulator among queued processes
    pub fn peek_min_accumulator(&self, procs: &ProcArena) -> Option<i64> {
        self.min_index(procs)
            .map(|index| procs.get(self.entries[index].slot).accumulator)
    }

    /// Remove a specific process wherever it sits in the queue
    ///
    /// # Returns
    /// `false` if the process was not queued
    pub fn extract_specific(&mut self, slot: Slot) -> bool {
        match self.entries.iter().position(|entry| entry.slot == slot) {
            Some(index) => {
                self.entries.swap_remove(index);
                true
            }
            None => false,
        }
    }

    /// Move every queued process into the FIFO queue, in extraction order
    pub fn drain_into(&mut self, procs: &ProcArena, rr: &mut RoundRobinQueue) {
        while let Some(slot) = self.extract_min(procs) {
            rr.enqueue(slot);
        }
        self.next_seq = 0;
    }

    /// Whether the process is queued
    pub fn contains(&self, slot: Slot) -> bool {
        self.entries.iter().any(|entry| entry.slot == slot)
    }

    /// Queued processes, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        self.entries.iter().map(|entry| entry.slot)
    }

    /// Number of queued processes
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn min_index(&self, procs: &ProcArena) -> Option<usize> {
        self.entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| (procs.get(entry.slot).accumulator, entry.seq))
            .map(|(index, _)| index)
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}
