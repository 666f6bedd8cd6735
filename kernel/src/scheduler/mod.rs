/*
 * Process Scheduler
 *
 * This module implements the multi-CPU process scheduler of the CLUU
 * kernel: the per-CPU dispatch loop, the three scheduling policies, and
 * the process-side entry points (fork, exit, wait, sleep, kill, ...) that
 * change what the dispatch loop sees.
 *
 * DISPATCH LOOP:
 * ==============
 *
 * Every CPU runs `Kernel::run`:
 * 1. Enable interrupts, then lock the process table
 * 2. Ask the active policy for the next runnable process
 * 3. Mark it Running, stamp the decision counter, add it to the running set
 * 4. Hand the still-locked table to the process and switch to it
 *    (`Platform::resume`); the process unlocks it once it runs
 * 5. When the process gives the CPU back it is the other way round: the
 *    process switches away with the table locked and the dispatcher
 *    unlocks it after `resume` returns
 *
 * The process side mirrors this in `sched`: with the table locked it
 * performs its own transition (yield, sleep, exit) and the hand-back
 * bookkeeping, hands the lock off and calls `Platform::suspend`. Until
 * that switch is complete no other CPU can dispatch the process again.
 *
 * POLICIES:
 * =========
 *
 * - Round-Robin: FIFO over runnable processes
 * - Priority: lowest accumulator first; a run costs `priority`
 * - Extended-Priority: Priority, but every 100th decision runs the process
 *   that waited longest
 *
 * `set_policy` switches between them atomically, moving runnable processes
 * to the new policy's queue.
 *
 * PROCESS LIFECYCLE:
 * ==================
 *
 * Free -> Initializing -> Runnable <-> Running -> Zombie -> Free
 *                            ^            |
 *                            +- Sleeping <+
 *
 * The root process (pid 1, "init") is created with the kernel, adopts
 * orphans and must never exit.
 */

use alloc::vec::Vec;

use spin::Mutex;

pub mod events;
pub mod policies;
pub mod process;
pub mod queues;
pub mod sched_core;
pub mod stats;
pub mod table;
pub mod traits;
pub mod types;

#[cfg(test)]
mod tests_prop;

pub use process::{ProcInfo, ProcState};
pub use sched_core::{CpuFlags, CpuState, SchedGuard};
pub use stats::ProcStats;
pub use table::{AuditError, ChildExit, ProcessTable, Reap};
pub use traits::{Platform, ResourceError};
pub use types::{Channel, CpuId, Pid, Policy, Priority};

use crate::config::SchedConfig;
use crate::error::SchedError;

/// Identity of the process making a call, as seen from inside it
///
/// `cpu` is the CPU the process is executing on. It is updated whenever
/// the process gives up the CPU and is later resumed somewhere else, so
/// every blocking entry point takes it by `&mut`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CurrentProc {
    pub pid: Pid,
    pub cpu: CpuId,
}

impl CurrentProc {
    pub fn new(pid: Pid, cpu: CpuId) -> Self {
        Self { pid, cpu }
    }
}

/// The scheduler
///
/// One instance is shared by every CPU. All mutable state lives in the
/// process table behind a single spin lock.
pub struct Kernel<P: Platform> {
    table: Mutex<ProcessTable>,
    cpus: Vec<CpuState>,
    platform: P,
    config: SchedConfig,
    root: Pid,
}

impl<P: Platform> Kernel<P> {
    /// Create the scheduler and its root process
    ///
    /// # Panics
    /// If `config` exceeds the compile-time capacities.
    pub fn new(config: SchedConfig, platform: P) -> Self {
        config.validate();

        let mut table = ProcessTable::new(config);
        let root = table.userinit(platform.ticks());
        let cpus = (0..config.cpu_count)
            .map(|i| CpuState::new(CpuId(i as u32)))
            .collect();

        log::info!(
            "Scheduler initialized: {} CPU(s), {} process slots, policy {}",
            config.cpu_count,
            config.max_processes,
            config.initial_policy.name()
        );

        Self {
            table: Mutex::new(table),
            cpus,
            platform,
            config,
            root,
        }
    }

    /// Pid of the root process
    pub fn root(&self) -> Pid {
        self.root
    }

    /// The platform this scheduler drives
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Configuration the scheduler was created with
    pub fn config(&self) -> &SchedConfig {
        &self.config
    }

    /// Per-CPU state of `cpu`
    ///
    /// # Panics
    /// If `cpu` is not one of the configured CPUs.
    pub fn cpu(&self, cpu: CpuId) -> &CpuState {
        match self.cpus.get(cpu.as_usize()) {
            Some(state) => state,
            None => crate::fatal!("cpu {} is not configured", cpu.0),
        }
    }

    /// Lock the process table from `cpu`
    pub fn lock(&self, cpu: CpuId) -> SchedGuard<'_> {
        SchedGuard::acquire(&self.table, self.cpu(cpu))
    }

    fn finish_switch(&self, cpu: CpuId) {
        SchedGuard::finish_switch(&self.table, self.cpu(cpu));
    }

    // ========================================================================
    // DISPATCHER SIDE
    // ========================================================================

    /// Per-CPU scheduler loop, never returns
    pub fn run(&self, cpu: CpuId) -> ! {
        log::info!("cpu {}: starting scheduler", cpu.0);
        loop {
            if self.run_once(cpu).is_none() {
                core::hint::spin_loop();
            }
        }
    }

    /// One iteration of the scheduler loop
    ///
    /// Dispatches one process and returns once it has given the CPU back.
    ///
    /// # Returns
    /// The process that ran, or None if nothing was runnable
    pub fn run_once(&self, cpu: CpuId) -> Option<Pid> {
        let state = self.cpu(cpu);
        // Let pending interrupts in between dispatches
        state.intr_on();

        let mut guard = self.lock(cpu);
        let slot = guard.select_next()?;
        let pid = guard.begin_dispatch(cpu, slot, self.platform.ticks());
        state.record_dispatch();

        guard.hand_off();
        self.platform.resume(cpu, pid);

        // The process switched back with the table locked
        self.finish_switch(cpu);
        Some(pid)
    }

    /// First code a newly dispatched process runs
    ///
    /// Releases the table lock the dispatcher switched in with.
    pub fn enter(&self, cpu: CpuId) {
        self.finish_switch(cpu);
    }

    // ========================================================================
    // PROCESS SIDE
    // ========================================================================

    /// Give the CPU back to the dispatcher
    ///
    /// The caller must hold the table lock exactly once and have moved the
    /// current process out of Running. The table stays locked until the
    /// dispatcher has taken the CPU back. Returns with the lock held again,
    /// on whichever CPU the process was resumed.
    fn sched<'a>(&'a self, cur: &mut CurrentProc, mut guard: SchedGuard<'a>) -> SchedGuard<'a> {
        let state = self.cpu(cur.cpu);
        state.check_hand_off("sched");

        let slot = guard.current_slot(cur.cpu, cur.pid);
        guard.finish_dispatch(cur.cpu, slot);

        let intena = state.intena();
        guard.hand_off();
        cur.cpu = self.platform.suspend(cur.cpu, cur.pid);
        self.cpu(cur.cpu).set_intena(intena);

        self.finish_switch(cur.cpu);
        self.lock(cur.cpu)
    }

    fn sleep_locked<'a>(
        &'a self,
        cur: &mut CurrentProc,
        chan: Channel,
        mut guard: SchedGuard<'a>,
    ) -> SchedGuard<'a> {
        let slot = guard.current_slot(cur.cpu, cur.pid);
        guard.sleep_process(slot, chan, self.platform.ticks());
        self.sched(cur, guard)
    }

    /// Create a child of the calling process
    ///
    /// The child is a copy of the caller in name and resources, starts
    /// with the default priority and becomes Runnable right away.
    ///
    /// # Returns
    /// The child's pid, or `ResourceExhausted` if no slot is free or the
    /// platform could not duplicate the caller's resources
    pub fn spawn(&self, cur: &mut CurrentProc) -> Result<Pid, SchedError> {
        let (slot, child) = {
            let mut guard = self.lock(cur.cpu);
            let parent = guard.current_slot(cur.cpu, cur.pid);
            let slot = guard.allocate_child(parent)?;
            (slot, guard.pid_of(slot))
        };

        if let Err(err) = self.platform.duplicate_resources(cur.pid, child) {
            log::warn!("fork of {} failed: {}", cur.pid, err);
            self.lock(cur.cpu).release(slot);
            return Err(SchedError::ResourceExhausted);
        }

        let now = self.platform.ticks();
        self.lock(cur.cpu).make_runnable(slot, now);
        log::debug!("pid {} forked {}", cur.pid, child);
        Ok(child)
    }

    /// Terminate the calling process
    ///
    /// The process becomes a Zombie until its parent reaps it. Never
    /// returns.
    ///
    /// # Panics
    /// If called by the root process.
    pub fn exit(&self, cur: &mut CurrentProc, status: i32) -> ! {
        crate::invariant!(cur.pid != self.root, "init exiting");
        self.platform.release_resources(cur.pid);

        let mut guard = self.lock(cur.cpu);
        let slot = guard.current_slot(cur.cpu, cur.pid);
        guard.terminate(slot, status, self.platform.ticks());
        let _guard = self.sched(cur, guard);

        crate::fatal!("zombie exit");
    }

    /// Wait for a child to exit and reap it
    ///
    /// # Returns
    /// Pid and exit status of the reaped child; `NoChildren` immediately if
    /// the caller has none; `Killed` if the caller was killed while waiting
    pub fn wait(&self, cur: &mut CurrentProc) -> Result<ChildExit, SchedError> {
        self.wait_with_stats(cur).map(|(exit, _)| exit)
    }

    /// `wait` that also returns the child's timing statistics
    pub fn wait_with_stats(
        &self,
        cur: &mut CurrentProc,
    ) -> Result<(ChildExit, ProcStats), SchedError> {
        let mut guard = self.lock(cur.cpu);
        loop {
            match guard.reap(cur.pid) {
                Reap::Reaped(exit, stats) => return Ok((exit, stats)),
                Reap::NoChildren => return Err(SchedError::NoChildren),
                Reap::Pending => {}
            }

            let slot = guard.current_slot(cur.cpu, cur.pid);
            if guard.is_killed(slot) {
                return Err(SchedError::Killed);
            }

            // Exiting children wake us through our own Child channel
            guard = self.sleep_locked(cur, Channel::Child(cur.pid), guard);
        }
    }

    /// Give up the CPU, staying Runnable
    pub fn yield_now(&self, cur: &mut CurrentProc) {
        let mut guard = self.lock(cur.cpu);
        let slot = guard.current_slot(cur.cpu, cur.pid);
        guard.yield_process(slot, self.platform.ticks());
        drop(self.sched(cur, guard));
    }

    /// Sleep on `chan` until someone calls `wakeup(chan)` (or kills us)
    pub fn sleep(&self, cur: &mut CurrentProc, chan: Channel) {
        let guard = self.lock(cur.cpu);
        drop(self.sleep_locked(cur, chan, guard));
    }

    /// Atomically release `held` and sleep on `chan`
    ///
    /// The table lock is taken before `held` is released, so a `wakeup`
    /// issued by whoever takes `lock` next cannot be missed. `lock` is
    /// re-acquired before returning.
    pub fn sleep_on<'l, T>(
        &self,
        cur: &mut CurrentProc,
        chan: Channel,
        lock: &'l Mutex<T>,
        held: spin::MutexGuard<'l, T>,
    ) -> spin::MutexGuard<'l, T> {
        let guard = self.lock(cur.cpu);
        drop(held);
        drop(self.sleep_locked(cur, chan, guard));
        lock.lock()
    }

    /// Wake every process sleeping on `chan`
    ///
    /// # Returns
    /// Number of processes woken
    pub fn wakeup(&self, cpu: CpuId, chan: Channel) -> usize {
        let now = self.platform.ticks();
        self.lock(cpu).wakeup(chan, now)
    }

    /// Whether the calling process has been killed
    pub fn is_killed(&self, cur: &CurrentProc) -> bool {
        let guard = self.lock(cur.cpu);
        let slot = guard.current_slot(cur.cpu, cur.pid);
        guard.is_killed(slot)
    }

    // ========================================================================
    // CONTROL
    // ========================================================================

    /// Request termination of `pid`
    ///
    /// Only sets the kill flag (and wakes the target if it sleeps); the
    /// target exits on its own when it notices.
    pub fn kill(&self, cpu: CpuId, pid: Pid) -> Result<(), SchedError> {
        let now = self.platform.ticks();
        self.lock(cpu).mark_killed(pid, now)
    }

    /// Hand the caller's direct child `pid` to the root process
    pub fn detach(&self, cur: &CurrentProc, pid: Pid) -> Result<(), SchedError> {
        let now = self.platform.ticks();
        self.lock(cur.cpu).detach(cur.pid, pid, now)
    }

    /// Set the caller's priority; invalid values are ignored
    pub fn set_priority(&self, cur: &CurrentProc, value: i32) {
        let mut guard = self.lock(cur.cpu);
        let slot = guard.current_slot(cur.cpu, cur.pid);
        if !guard.set_priority(slot, value) {
            log::debug!("pid {}: ignoring priority {}", cur.pid, value);
        }
    }

    /// Switch the scheduling policy by id (1, 2 or 3)
    ///
    /// # Panics
    /// On any other id.
    pub fn set_policy(&self, cpu: CpuId, id: i32) {
        self.lock(cpu).set_policy(id);
    }

    /// Active scheduling policy
    pub fn policy(&self, cpu: CpuId) -> Policy {
        self.lock(cpu).policy()
    }

    // ========================================================================
    // DIAGNOSTICS
    // ========================================================================

    /// Snapshot of a live process
    pub fn process_info(&self, cpu: CpuId, pid: Pid) -> Option<ProcInfo> {
        self.lock(cpu).info(pid)
    }

    /// Snapshots of every live process
    pub fn processes(&self, cpu: CpuId) -> Vec<ProcInfo> {
        self.lock(cpu).processes()
    }

    /// Log the process list
    pub fn procdump(&self, cpu: CpuId) {
        self.lock(cpu).procdump();
    }

    /// Check the queue-membership invariants
    pub fn audit(&self, cpu: CpuId) -> Result<(), AuditError> {
        self.lock(cpu).audit()
    }
}
