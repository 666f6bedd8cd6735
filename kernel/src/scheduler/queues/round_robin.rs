/*
 * Round-Robin Ready Queue
 *
 * Strict FIFO of runnable processes. Capacity equals the process table, so
 * a push can only fail if the same process were queued twice, which the
 * table never does.
 */

use heapless::Deque;

use super::super::types::Slot;
use super::PriorityQueue;
use crate::config::NPROC;

/// FIFO queue of runnable processes
pub struct RoundRobinQueue {
    queue: Deque<Slot, NPROC>,
}

impl RoundRobinQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            queue: Deque::new(),
        }
    }

    /// Append a process at the tail
    pub fn enqueue(&mut self, slot: Slot) {
        if self.queue.push_back(slot).is_err() {
            crate::fatal!("round-robin queue overflow at slot {}", slot.index());
        }
    }

    /// Take the process at the head
    pub fn dequeue(&mut self) -> Option<Slot> {
        self.queue.pop_front()
    }

    /// Move every queued process into the priority queue, head first
    ///
    /// Insertion order into the priority queue is the FIFO order, so equal
    /// accumulators keep their round-robin order.
    pub fn drain_into(&mut self, pq: &mut PriorityQueue) {
        while let Some(slot) = self.dequeue() {
            pq.put(slot);
        }
    }

    /// Whether the process is queued
    pub fn contains(&self, slot: Slot) -> bool {
        self.queue.iter().any(|&queued| queued == slot)
    }

    /// Queued processes, head first
    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        self.queue.iter().copied()
    }

    /// Number of queued processes
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for RoundRobinQueue {
    fn default() -> Self {
        Self::new()
    }
}
