/*
 * Scheduler Type Definitions
 *
 * This module defines the core types used throughout the scheduler subsystem.
 * These types are designed to be lightweight, Copy-able, and suitable for
 * use in both the dispatch rules and the process table.
 */

use core::fmt;

/// Process identifier
///
/// Unique among all live (non-Free) process records. Allocated from a
/// monotonic counter starting at 1, so the root process is always Pid(1).
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// CPU identifier
///
/// Represents a logical CPU running the dispatch loop.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct CpuId(pub u32);

impl CpuId {
    /// Bootstrap processor (CPU 0)
    pub const BSP: CpuId = CpuId(0);

    /// Get the CPU ID as a usize for indexing
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Process priority
///
/// Valid priorities are 1..=10. Under the Priority policies a process is
/// charged its priority after every run, so a LOWER number is dispatched
/// MORE often. The sentinel 0 ("unset") is only legal while
/// Extended-Priority is active.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    /// Sentinel, legal only under Extended-Priority
    pub const UNSET: Priority = Priority(0);

    /// Minimum valid priority
    pub const MIN: Priority = Priority(1);

    /// Maximum valid priority
    pub const MAX: Priority = Priority(10);

    /// Priority of newly created processes
    pub const DEFAULT: Priority = Priority(5);

    /// Convert a raw value, accepting the sentinel
    ///
    /// Whether the sentinel is acceptable right now depends on the active
    /// policy; that check belongs to the caller.
    pub fn from_raw(value: i32) -> Option<Priority> {
        match value {
            0..=10 => Some(Priority(value as u8)),
            _ => None,
        }
    }

    /// Raw value
    pub fn get(self) -> u8 {
        self.0
    }

    /// Whether this is the "unset" sentinel
    pub fn is_unset(self) -> bool {
        self == Self::UNSET
    }

    /// Amount added to the accumulator after each run
    pub fn weight(self) -> i64 {
        i64::from(self.0)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Scheduling policy
///
/// The discriminants are the ids accepted by the `policy` syscall.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Policy {
    /// FIFO rotation, accumulators ignored
    RoundRobin = 1,
    /// Lowest accumulator first
    Priority = 2,
    /// Priority plus a periodic anti-starvation bypass
    ExtendedPriority = 3,
}

impl Policy {
    /// Map a syscall policy id
    pub fn from_id(id: i32) -> Option<Policy> {
        match id {
            1 => Some(Policy::RoundRobin),
            2 => Some(Policy::Priority),
            3 => Some(Policy::ExtendedPriority),
            _ => None,
        }
    }

    /// Syscall policy id
    pub fn id(self) -> i32 {
        self as i32
    }

    /// Human readable name for logs and process dumps
    pub fn name(self) -> &'static str {
        match self {
            Policy::RoundRobin => "round-robin",
            Policy::Priority => "priority",
            Policy::ExtendedPriority => "extended-priority",
        }
    }

    /// Whether runnable processes live in the priority-ordered queue
    pub fn uses_priority_queue(self) -> bool {
        !matches!(self, Policy::RoundRobin)
    }
}

/// What a sleeping process is waiting for
///
/// `Child(pid)` is the channel a parent sleeps on inside `wait`; exiting
/// children (and reparenting) wake it. `Token` is an opaque value chosen by
/// the caller of `sleep`/`wakeup`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    Child(Pid),
    Token(usize),
}

/// Arena handle of a process record
///
/// Queues and the running set hold these instead of references, so records
/// can be moved between structures and removed from the middle of a queue
/// without shared ownership.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(pub(crate) usize);

impl Slot {
    /// Index into the process arena
    pub fn index(self) -> usize {
        self.0
    }
}
