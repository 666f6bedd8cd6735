/*
 * Process Records
 *
 * This module implements the per-process record and the fixed-size arena
 * holding all of them. A record is the scheduler's whole view of a
 * process: identity, lifecycle state, scheduling fields, the kill flag,
 * the exit status, what it is sleeping on and its timing statistics.
 *
 * Records never move. Queues refer to them by `Slot` (the arena index),
 * so a record can be found, requeued or removed from the middle of a
 * queue without any shared ownership. Parent links are kept by pid, not by
 * slot, so a reaped-and-reused slot can never be mistaken for the parent.
 *
 * Why this is important:
 * - The arena bounds the number of processes at creation time
 * - A Free record has no pid, which keeps pid lookups unambiguous
 * - Everything here is only touched with the process-table lock held
 */

use alloc::vec::Vec;
use core::fmt;

use heapless::String;

use super::stats::{ProcStats, StatsCollector};
use super::types::{Channel, Pid, Priority, Slot};

/// Longest debug name kept for a process
pub const NAME_LEN: usize = 16;

/// Debug name of a process
pub type ProcName = String<NAME_LEN>;

/// Lifecycle state of a process record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    /// Slot is unused
    Free,
    /// Allocated, creation not finished yet
    Initializing,
    /// Waiting on a channel
    Sleeping,
    /// Waiting in a ready queue
    Runnable,
    /// Executing on some CPU
    Running,
    /// Exited, waiting to be reaped by its parent
    Zombie,
}

impl ProcState {
    /// Fixed-width name for the process dump
    pub fn name(self) -> &'static str {
        match self {
            ProcState::Free => "unused",
            ProcState::Initializing => "embryo",
            ProcState::Sleeping => "sleep ",
            ProcState::Runnable => "runble",
            ProcState::Running => "run   ",
            ProcState::Zombie => "zombie",
        }
    }
}

/// A single process record
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    /// Process id, None while Free
    pub pid: Option<Pid>,

    /// Parent process id, None for the root process
    pub parent: Option<Pid>,

    /// Debug name, inherited on fork
    pub name: ProcName,

    /// Current lifecycle state
    pub state: ProcState,

    /// Priority, charged to the accumulator after every run
    pub priority: Priority,

    /// Fairness counter, lowest runs first under the Priority policies
    pub accumulator: i64,

    /// Value of the scheduling-decision counter at the last dispatch
    pub last_scheduled: u64,

    /// Sticky kill request
    pub killed: bool,

    /// Exit status, valid once Zombie
    pub exit_status: i32,

    /// Position in the table-wide exit order, valid once Zombie
    pub exit_seq: u64,

    /// What the process sleeps on, Some only while Sleeping
    pub chan: Option<Channel>,

    /// Timing statistics
    pub stats: StatsCollector,
}

impl ProcessRecord {
    /// An unused record
    pub fn free() -> Self {
        Self {
            pid: None,
            parent: None,
            name: ProcName::new(),
            state: ProcState::Free,
            priority: Priority::DEFAULT,
            accumulator: 0,
            last_scheduled: 0,
            killed: false,
            exit_status: 0,
            exit_seq: 0,
            chan: None,
            stats: StatsCollector::new(),
        }
    }

    /// Whether the slot holds a process
    pub fn is_used(&self) -> bool {
        self.state != ProcState::Free
    }

    /// Pid of a used record
    ///
    /// # Panics
    /// On a Free record: callers only ask for pids of records they found
    /// through a queue or a pid lookup.
    pub fn expect_pid(&self) -> Pid {
        match self.pid {
            Some(pid) => pid,
            None => crate::fatal!("process record without pid in state {:?}", self.state),
        }
    }

    /// Public snapshot of the record
    pub fn info(&self) -> ProcInfo {
        ProcInfo {
            pid: self.expect_pid(),
            parent: self.parent,
            name: self.name.clone(),
            state: self.state,
            priority: self.priority,
            accumulator: self.accumulator,
            last_scheduled: self.last_scheduled,
            killed: self.killed,
            stats: self.stats.snapshot(),
        }
    }
}

/// Copy a name into a record-sized buffer, truncating at a char boundary
pub fn proc_name(name: &str) -> ProcName {
    let mut out = ProcName::new();
    for ch in name.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

/// Read-only view of a process, returned by queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    pub pid: Pid,
    pub parent: Option<Pid>,
    pub name: ProcName,
    pub state: ProcState,
    pub priority: Priority,
    pub accumulator: i64,
    pub last_scheduled: u64,
    pub killed: bool,
    pub stats: ProcStats,
}

impl fmt::Display for ProcInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} prio={} acc={} last={}",
            self.pid,
            self.state.name(),
            self.name,
            self.priority.get(),
            self.accumulator,
            self.last_scheduled
        )?;
        if self.killed {
            write!(f, " killed")?;
        }
        Ok(())
    }
}

/// Fixed-size arena of process records
pub struct ProcArena {
    records: Vec<ProcessRecord>,
}

impl ProcArena {
    /// Arena with `capacity` Free records
    pub fn new(capacity: usize) -> Self {
        let mut records = Vec::with_capacity(capacity);
        records.resize_with(capacity, ProcessRecord::free);
        Self { records }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Record behind a handle
    pub fn get(&self, slot: Slot) -> &ProcessRecord {
        &self.records[slot.0]
    }

    /// Mutable record behind a handle
    pub fn get_mut(&mut self, slot: Slot) -> &mut ProcessRecord {
        &mut self.records[slot.0]
    }

    /// First unused slot in table order
    pub fn first_free(&self) -> Option<Slot> {
        self.records
            .iter()
            .position(|record| !record.is_used())
            .map(Slot)
    }

    /// Slot of the live record with this pid
    pub fn find(&self, pid: Pid) -> Option<Slot> {
        self.records
            .iter()
            .position(|record| record.is_used() && record.pid == Some(pid))
            .map(Slot)
    }

    /// All records with their handles, in table order
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &ProcessRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| (Slot(index), record))
    }

    /// Mutable iteration over all records, in table order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Slot, &mut ProcessRecord)> {
        self.records
            .iter_mut()
            .enumerate()
            .map(|(index, record)| (Slot(index), record))
    }

    /// Slots of every used record matching `filter`, in table order
    pub fn select<F>(&self, filter: F) -> Vec<Slot>
    where
        F: Fn(&ProcessRecord) -> bool,
    {
        self.iter()
            .filter(|(_, record)| record.is_used() && filter(record))
            .map(|(slot, _)| slot)
            .collect()
    }
}
