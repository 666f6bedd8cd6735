/*
 * Process Table
 *
 * Everything the scheduler shares between CPUs, kept behind the single
 * table lock: the process arena, both ready queues, the running set, the
 * active policy and the scheduling-decision counter.
 *
 * Every operation here performs one complete lifecycle transition and
 * keeps queue membership in step with it:
 * - Runnable  => in exactly one ready queue (the active policy's)
 * - Running   => in the running set
 * - otherwise => in neither
 *
 * The only exception is the window between a process leaving the Running
 * state and `finish_dispatch`, which the process closes in the same
 * critical section before it gives up the CPU. `audit` checks all of this
 * and is what the tests call after every step.
 *
 * PROCESS LIFECYCLE:
 * ==================
 *
 *   Free -> Initializing -> Runnable <-> Running -> Zombie -> Free
 *                              ^            |
 *                              +- Sleeping <+
 */

use alloc::vec::Vec;
use core::fmt;

use super::events::Transition;
use super::policies::PolicyController;
use super::process::{ProcArena, ProcInfo, ProcState, proc_name};
use super::queues::{PriorityQueue, RoundRobinQueue, RunningSet, fairness_baseline};
use super::stats::ProcStats;
use super::traits::DispatchCtx;
use super::types::{Channel, CpuId, Pid, Policy, Priority, Slot};
use crate::config::{ACCUMULATOR_BASELINE, SchedConfig};
use crate::error::SchedError;

/// Exit information of a reaped child
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ChildExit {
    pub pid: Pid,
    pub status: i32,
}

/// Result of one reaping attempt
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reap {
    /// A zombie child was released
    Reaped(ChildExit, ProcStats),
    /// Children exist but none has exited yet
    Pending,
    /// The caller has no children at all
    NoChildren,
}

/// Broken table invariant found by `audit`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditError {
    /// Two live records share a pid
    DuplicatePid(Pid),
    /// A Free record still carries a pid
    FreeWithPid(Slot),
    /// A queue or the running set refers to a record in the wrong state
    Misplaced { slot: Slot, state: ProcState },
    /// A Runnable record is not in the active policy's queue
    NotQueued(Pid),
    /// A Running record is not in the running set
    NotInRunningSet(Pid),
    /// A record sits in a structure more than once
    Duplicated(Slot),
    /// Priority 0 while the active policy does not allow it
    UnsetPriority(Pid),
    /// A sleeping record without a channel, or a channel without sleeping
    Channel(Slot),
}

impl fmt::Display for AuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditError::DuplicatePid(pid) => write!(f, "pid {} used twice", pid),
            AuditError::FreeWithPid(slot) => write!(f, "free slot {} has a pid", slot.index()),
            AuditError::Misplaced { slot, state } => {
                write!(f, "slot {} queued in state {:?}", slot.index(), state)
            }
            AuditError::NotQueued(pid) => write!(f, "runnable pid {} not queued", pid),
            AuditError::NotInRunningSet(pid) => {
                write!(f, "running pid {} not in running set", pid)
            }
            AuditError::Duplicated(slot) => write!(f, "slot {} queued twice", slot.index()),
            AuditError::UnsetPriority(pid) => write!(f, "pid {} has priority 0", pid),
            AuditError::Channel(slot) => {
                write!(f, "slot {} sleep channel out of sync", slot.index())
            }
        }
    }
}

/// The lock-protected scheduler state
pub struct ProcessTable {
    procs: ProcArena,
    rr: RoundRobinQueue,
    pq: PriorityQueue,
    running: RunningSet,
    policy: PolicyController,
    /// Scheduling-decision counter, starts at 1
    decisions: u64,
    /// Number of exits so far, orders zombies for reaping
    exits: u64,
    next_pid: u32,
    root: Option<Pid>,
    /// Process dispatched on each CPU
    current: Vec<Option<Slot>>,
    config: SchedConfig,
}

impl ProcessTable {
    /// Create an empty table for `config`
    pub fn new(config: SchedConfig) -> Self {
        let mut current = Vec::with_capacity(config.cpu_count);
        current.resize(config.cpu_count, None);

        Self {
            procs: ProcArena::new(config.max_processes),
            rr: RoundRobinQueue::new(),
            pq: PriorityQueue::new(),
            running: RunningSet::new(),
            policy: PolicyController::new(config.initial_policy, ACCUMULATOR_BASELINE),
            decisions: 1,
            exits: 0,
            next_pid: 1,
            root: None,
            current,
            config,
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Active policy
    pub fn policy(&self) -> Policy {
        self.policy.current()
    }

    /// Pid of the root process, once created
    pub fn root(&self) -> Option<Pid> {
        self.root
    }

    /// Next value of the scheduling-decision counter
    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    /// Process currently dispatched on `cpu`
    pub fn current(&self, cpu: CpuId) -> Option<Slot> {
        self.current.get(cpu.as_usize()).copied().flatten()
    }

    /// Handle of the process `pid` running on `cpu`
    ///
    /// # Panics
    /// If `pid` is not the process dispatched on `cpu`; process-side entry
    /// points must be called from the process itself.
    pub fn current_slot(&self, cpu: CpuId, pid: Pid) -> Slot {
        match self.current(cpu) {
            Some(slot) if self.procs.get(slot).pid == Some(pid) => slot,
            _ => crate::fatal!("pid {} is not running on cpu {}", pid, cpu.0),
        }
    }

    /// Pid behind a handle
    pub fn pid_of(&self, slot: Slot) -> Pid {
        self.procs.get(slot).expect_pid()
    }

    /// Whether the process behind a handle has been killed
    pub fn is_killed(&self, slot: Slot) -> bool {
        self.procs.get(slot).killed
    }

    /// Snapshot of the live process `pid`
    pub fn info(&self, pid: Pid) -> Option<ProcInfo> {
        self.procs.find(pid).map(|slot| self.procs.get(slot).info())
    }

    /// Snapshots of all live processes, in table order
    pub fn processes(&self) -> Vec<ProcInfo> {
        self.procs
            .iter()
            .filter(|(_, record)| record.is_used())
            .map(|(_, record)| record.info())
            .collect()
    }

    /// Number of runnable processes waiting for a CPU
    pub fn ready_len(&self) -> usize {
        self.rr.len() + self.pq.len()
    }

    // ========================================================================
    // CREATION
    // ========================================================================

    /// Create the root process, Runnable
    pub fn userinit(&mut self, now: u64) -> Pid {
        crate::invariant!(self.root.is_none(), "userinit called twice");

        let slot = match self.allocate("init", None) {
            Ok(slot) => slot,
            Err(err) => crate::fatal!("userinit: {}", err),
        };
        let pid = self.pid_of(slot);
        self.root = Some(pid);
        self.make_runnable(slot, now);

        log::info!("Root process {} created", pid);
        pid
    }

    /// Reserve a slot for a new process
    ///
    /// The record is Initializing with a fresh pid, the default priority
    /// and a zero accumulator. It joins no queue until `make_runnable`.
    pub fn allocate(&mut self, name: &str, parent: Option<Pid>) -> Result<Slot, SchedError> {
        let slot = self.procs.first_free().ok_or(SchedError::ResourceExhausted)?;

        let pid = Pid(self.next_pid);
        self.next_pid += 1;

        let default_priority = self.config.default_priority;
        let record = self.procs.get_mut(slot);
        record.pid = Some(pid);
        record.parent = parent;
        record.name = proc_name(name);
        record.state = ProcState::Initializing;
        record.priority = default_priority;
        record.accumulator = 0;
        record.last_scheduled = 0;
        record.killed = false;
        record.exit_status = 0;
        record.exit_seq = 0;
        record.chan = None;
        record.stats = Default::default();

        log::debug!("allocated pid {} in slot {}", pid, slot.index());
        Ok(slot)
    }

    /// Reserve a slot for a child of the process behind `parent`
    pub fn allocate_child(&mut self, parent: Slot) -> Result<Slot, SchedError> {
        let parent_record = self.procs.get(parent);
        let name = parent_record.name.clone();
        let parent_pid = parent_record.expect_pid();
        self.allocate(&name, Some(parent_pid))
    }

    /// Give an Initializing slot back after a failed creation
    pub fn release(&mut self, slot: Slot) {
        let record = self.procs.get(slot);
        crate::invariant!(
            record.state == ProcState::Initializing,
            "release of slot {} in state {:?}",
            slot.index(),
            record.state
        );
        log::debug!("released unfinished pid {}", record.expect_pid());
        self.free_slot(slot);
    }

    /// Finish creation: Runnable and queued
    ///
    /// Under the Priority policies the newcomer starts at the fairness
    /// baseline, so it neither jumps ahead of nor lags behind the others.
    pub fn make_runnable(&mut self, slot: Slot, now: u64) {
        crate::invariant!(
            self.procs.get(slot).state == ProcState::Initializing,
            "make_runnable of slot {} in state {:?}",
            slot.index(),
            self.procs.get(slot).state
        );

        let baseline = self.baseline_for_newcomer();
        let record = self.procs.get_mut(slot);
        record.stats.record(Transition::Created, now);
        record.state = ProcState::Runnable;
        if let Some(baseline) = baseline {
            record.accumulator = baseline;
        }
        self.enqueue(slot);
    }

    // ========================================================================
    // RUNNING PROCESS TRANSITIONS
    // ========================================================================

    /// Running -> Runnable, back into the ready queue
    pub fn yield_process(&mut self, slot: Slot, now: u64) {
        self.expect_running(slot, "yield");
        let record = self.procs.get_mut(slot);
        record.state = ProcState::Runnable;
        record.stats.record(Transition::Yielded, now);
        self.enqueue(slot);
    }

    /// Running -> Sleeping on `chan`
    pub fn sleep_process(&mut self, slot: Slot, chan: Channel, now: u64) {
        self.expect_running(slot, "sleep");
        let record = self.procs.get_mut(slot);
        record.chan = Some(chan);
        record.state = ProcState::Sleeping;
        record.stats.record(Transition::Slept, now);
    }

    /// Running -> Zombie
    ///
    /// Records the exit status, wakes the parent and hands every child to
    /// the root process. If one of those children has already exited the
    /// root is woken too, so it can reap it.
    ///
    /// # Panics
    /// If the root process tries to exit.
    pub fn terminate(&mut self, slot: Slot, status: i32, now: u64) {
        self.expect_running(slot, "exit");
        let pid = self.pid_of(slot);
        let root = self.root_pid();
        crate::invariant!(pid != root, "init exiting");

        self.exits += 1;
        let exit_seq = self.exits;
        let record = self.procs.get_mut(slot);
        record.exit_status = status;
        record.exit_seq = exit_seq;
        record.state = ProcState::Zombie;
        record.stats.record(Transition::Exited, now);
        let parent = record.parent;

        if let Some(parent) = parent {
            self.wakeup(Channel::Child(parent), now);
        }

        let mut orphan_zombie = false;
        for (_, record) in self.procs.iter_mut() {
            if record.is_used() && record.parent == Some(pid) {
                record.parent = Some(root);
                orphan_zombie |= record.state == ProcState::Zombie;
            }
        }
        if orphan_zombie {
            self.wakeup(Channel::Child(root), now);
        }

        log::debug!("pid {} exited with status {}", pid, status);
    }

    // ========================================================================
    // SLEEP / WAKEUP
    // ========================================================================

    /// Make every process sleeping on `chan` Runnable
    ///
    /// # Returns
    /// Number of processes woken
    pub fn wakeup(&mut self, chan: Channel, now: u64) -> usize {
        let sleepers = self
            .procs
            .select(|record| record.state == ProcState::Sleeping && record.chan == Some(chan));
        for &slot in &sleepers {
            self.wake(slot, now);
        }
        sleepers.len()
    }

    fn wake(&mut self, slot: Slot, now: u64) {
        let baseline = self.baseline_for_newcomer();
        let record = self.procs.get_mut(slot);
        crate::invariant!(
            record.state == ProcState::Sleeping,
            "wake of slot {} in state {:?}",
            slot.index(),
            record.state
        );
        record.chan = None;
        record.state = ProcState::Runnable;
        record.stats.record(Transition::Woke, now);
        if let Some(baseline) = baseline {
            record.accumulator = baseline;
        }
        self.enqueue(slot);
    }

    // ========================================================================
    // WAIT / KILL / DETACH
    // ========================================================================

    /// Try to reap one exited child of `parent`
    ///
    /// The child that exited first is reaped first; its slot becomes Free.
    /// Exits are ordered by the table-wide exit sequence, not by tick, so
    /// children exiting within the same tick keep their order.
    pub fn reap(&mut self, parent: Pid) -> Reap {
        let children = self.procs.select(|record| record.parent == Some(parent));
        if children.is_empty() {
            return Reap::NoChildren;
        }

        let zombie = children
            .into_iter()
            .filter(|&slot| self.procs.get(slot).state == ProcState::Zombie)
            .min_by_key(|&slot| self.procs.get(slot).exit_seq);
        let Some(slot) = zombie else {
            return Reap::Pending;
        };

        let record = self.procs.get(slot);
        let pid = record.expect_pid();
        crate::invariant!(Some(pid) != self.root, "reaping the root process");

        let exit = ChildExit {
            pid,
            status: record.exit_status,
        };
        let stats = record.stats.snapshot();
        self.free_slot(slot);

        log::debug!("pid {} reaped by {}", pid, parent);
        Reap::Reaped(exit, stats)
    }

    /// Set the sticky kill flag of `pid`
    ///
    /// A sleeping target is made Runnable so it notices. An exited target
    /// is left alone: it will never run again, so there is nothing to do.
    pub fn mark_killed(&mut self, pid: Pid, now: u64) -> Result<(), SchedError> {
        let slot = self.procs.find(pid).ok_or(SchedError::NotFound)?;

        let state = self.procs.get(slot).state;
        if state == ProcState::Zombie {
            return Ok(());
        }

        self.procs.get_mut(slot).killed = true;
        if state == ProcState::Sleeping {
            self.wake(slot, now);
        }

        log::debug!("pid {} killed", pid);
        Ok(())
    }

    /// Hand the direct child `pid` of `parent` to the root process
    pub fn detach(&mut self, parent: Pid, pid: Pid, now: u64) -> Result<(), SchedError> {
        let slot = self
            .procs
            .find(pid)
            .filter(|&slot| self.procs.get(slot).parent == Some(parent))
            .ok_or(SchedError::NotFound)?;

        let root = self.root_pid();
        let record = self.procs.get_mut(slot);
        record.parent = Some(root);

        if record.state == ProcState::Zombie {
            self.wakeup(Channel::Child(root), now);
        }

        log::debug!("pid {} detached from {}", pid, parent);
        Ok(())
    }

    // ========================================================================
    // POLICY CONTROL
    // ========================================================================

    /// Change the priority of the process behind `slot`
    ///
    /// 1..=10 is always accepted, 0 only under Extended-Priority.
    ///
    /// # Returns
    /// `false` if the value was ignored
    pub fn set_priority(&mut self, slot: Slot, value: i32) -> bool {
        let allowed = match Priority::from_raw(value) {
            Some(priority) if priority.is_unset() => {
                (self.policy() == Policy::ExtendedPriority).then_some(priority)
            }
            other => other,
        };

        match allowed {
            Some(priority) => {
                self.procs.get_mut(slot).priority = priority;
                true
            }
            None => false,
        }
    }

    /// Switch the active policy by syscall id
    ///
    /// # Panics
    /// On an id that names no policy.
    pub fn set_policy(&mut self, id: i32) {
        let target = match Policy::from_id(id) {
            Some(policy) => policy,
            None => crate::fatal!("the desired policy is out of bounds: {}", id),
        };
        self.policy
            .transition(target, &mut self.procs, &mut self.rr, &mut self.pq);
    }

    // ========================================================================
    // DISPATCH
    // ========================================================================

    /// Ask the active policy for the next process to dispatch
    ///
    /// The selected process has already been taken off its ready queue.
    pub fn select_next(&mut self) -> Option<Slot> {
        let rule = self.policy.rule();
        let mut ctx = DispatchCtx {
            procs: &self.procs,
            rr: &mut self.rr,
            pq: &mut self.pq,
            decision: self.decisions,
            aging_period: self.config.aging_period,
        };
        let selected = rule.select(&mut ctx);
        if selected.is_none() {
            log::trace!("[{}] nothing runnable at decision {}", rule.name(), self.decisions);
        }
        selected
    }

    /// Runnable -> Running on `cpu`
    ///
    /// Stamps the decision counter into the record and advances it.
    ///
    /// # Panics
    /// If the selected process is not Runnable.
    pub fn begin_dispatch(&mut self, cpu: CpuId, slot: Slot, now: u64) -> Pid {
        crate::invariant!(
            self.current(cpu).is_none(),
            "cpu {} dispatching while slot {:?} is current",
            cpu.0,
            self.current(cpu)
        );

        let decision = self.decisions;
        let record = self.procs.get_mut(slot);
        crate::invariant!(
            record.state == ProcState::Runnable,
            "scheduling a {:?} process (slot {})",
            record.state,
            slot.index()
        );
        record.stats.record(Transition::Dispatched, now);
        record.state = ProcState::Running;
        record.last_scheduled = decision;
        let pid = record.expect_pid();

        self.decisions += 1;
        self.running.add(slot);
        self.current[cpu.as_usize()] = Some(slot);

        log::debug!("cpu {}: dispatch pid {} (decision {})", cpu.0, pid, decision);
        pid
    }

    /// Hand-back bookkeeping of the process leaving `cpu`
    ///
    /// Runs in the critical section in which the process changed its own
    /// state. A process that is still Runnable is charged by the active
    /// policy.
    ///
    /// # Panics
    /// If the process is still Running.
    pub fn finish_dispatch(&mut self, cpu: CpuId, slot: Slot) {
        crate::invariant!(self.procs.get(slot).state != ProcState::Running, "sched running");
        crate::invariant!(self.running.remove(slot), "slot {} was not running", slot.index());
        self.current[cpu.as_usize()] = None;

        let record = self.procs.get_mut(slot);
        if record.state == ProcState::Runnable {
            self.policy.rule().after_run(record);
        }
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// Check every queue-membership invariant
    pub fn audit(&self) -> Result<(), AuditError> {
        self.audit_structure(self.rr.iter())?;
        self.audit_structure(self.pq.iter())?;
        self.audit_structure(self.running.iter())?;

        let policy = self.policy();
        for (slot, record) in self.procs.iter() {
            if !record.is_used() {
                if record.pid.is_some() {
                    return Err(AuditError::FreeWithPid(slot));
                }
                continue;
            }
            let pid = record.expect_pid();

            if self.procs.iter().any(|(other, rec)| {
                other != slot && rec.is_used() && rec.pid == Some(pid)
            }) {
                return Err(AuditError::DuplicatePid(pid));
            }

            let in_rr = self.rr.contains(slot);
            let in_pq = self.pq.contains(slot);
            let in_running = self.running.contains(slot);

            match record.state {
                ProcState::Runnable => {
                    let queued = if policy.uses_priority_queue() {
                        in_pq && !in_rr
                    } else {
                        in_rr && !in_pq
                    };
                    if !queued {
                        return Err(AuditError::NotQueued(pid));
                    }
                    if in_running {
                        return Err(AuditError::Misplaced { slot, state: record.state });
                    }
                }
                ProcState::Running => {
                    if !in_running {
                        return Err(AuditError::NotInRunningSet(pid));
                    }
                    if in_rr || in_pq {
                        return Err(AuditError::Misplaced { slot, state: record.state });
                    }
                }
                _ => {
                    if in_rr || in_pq || in_running {
                        return Err(AuditError::Misplaced { slot, state: record.state });
                    }
                }
            }

            if record.priority.is_unset() && policy != Policy::ExtendedPriority {
                return Err(AuditError::UnsetPriority(pid));
            }
            if (record.state == ProcState::Sleeping) != record.chan.is_some() {
                return Err(AuditError::Channel(slot));
            }
        }

        Ok(())
    }

    /// Log one line per live process
    pub fn procdump(&self) {
        log::info!(
            "procdump: policy {}, decision {}",
            self.policy().name(),
            self.decisions
        );
        for (_, record) in self.procs.iter().filter(|(_, record)| record.is_used()) {
            log::info!("{}", record.info());
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn audit_structure(&self, slots: impl Iterator<Item = Slot>) -> Result<(), AuditError> {
        let mut seen: Vec<Slot> = Vec::new();
        for slot in slots {
            if seen.contains(&slot) {
                return Err(AuditError::Duplicated(slot));
            }
            seen.push(slot);

            if !self.procs.get(slot).is_used() {
                return Err(AuditError::Misplaced {
                    slot,
                    state: ProcState::Free,
                });
            }
        }
        Ok(())
    }

    fn root_pid(&self) -> Pid {
        match self.root {
            Some(root) => root,
            None => crate::fatal!("no root process"),
        }
    }

    fn expect_running(&self, slot: Slot, what: &str) {
        let state = self.procs.get(slot).state;
        crate::invariant!(
            state == ProcState::Running,
            "{} from a {:?} process (slot {})",
            what,
            state,
            slot.index()
        );
    }

    /// Accumulator for a process (re)entering the priority queue
    fn baseline_for_newcomer(&self) -> Option<i64> {
        self.policy()
            .uses_priority_queue()
            .then(|| fairness_baseline(&self.procs, &self.pq, &self.running))
    }

    fn enqueue(&mut self, slot: Slot) {
        if self.policy().uses_priority_queue() {
            self.pq.put(slot);
        } else {
            self.rr.enqueue(slot);
        }
    }

    fn free_slot(&mut self, slot: Slot) {
        *self.procs.get_mut(slot) = super::process::ProcessRecord::free();
    }
}
