/*
 * Scheduler Core - Mechanism Layer
 *
 * Per-CPU state and the process-table lock discipline.
 *
 * The whole scheduler is protected by one spin lock. Taking it disables
 * (logical) interrupts on the taking CPU; the nesting depth and the
 * interrupt-enable state from before the outermost acquisition are tracked
 * per CPU, the same way `push_off`/`pop_off` work in classic Unix kernels.
 *
 * The lock stays held across a context switch:
 * 1. The dispatcher locks, picks a process and calls `hand_off`, which
 *    gives up the guard without unlocking and leaves the CPU at depth 1
 *    with interrupts off
 * 2. Once running, the process calls `finish_switch`, which unlocks the
 *    table and restores the CPU's interrupt state
 * 3. Giving the CPU back runs the same dance in the other direction: the
 *    process hands off, the dispatcher finishes the switch after `resume`
 *    returns
 *
 * So no other CPU can pick a process that is still switching out: it sits
 * in a ready queue again, but the table stays locked until the context
 * switch is complete.
 *
 * A hand-off at any depth other than 1, or with interrupts enabled, means
 * some code path leaked or double-released the lock and is fatal.
 */

use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};

use bitflags::bitflags;
use spin::{Mutex, MutexGuard};

use super::table::ProcessTable;
use super::types::CpuId;

bitflags! {
    /// Per-CPU interrupt state
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CpuFlags: u8 {
        /// Interrupts are currently enabled
        const INTERRUPTS = 1;
        /// Interrupts were enabled before the outermost `push_off`
        const INTENA = 1 << 1;
    }
}

/// Per-CPU scheduling state
///
/// Only the code currently executing on a CPU touches its state: the
/// dispatcher before `resume` and after it returns, the process in
/// between. The atomics make the state shareable, not concurrent.
#[derive(Debug)]
pub struct CpuState {
    /// Which CPU this state belongs to
    id: CpuId,

    /// Nesting depth of `push_off`
    depth: AtomicU32,

    /// Interrupt flags
    flags: AtomicU8,

    /// Whether this CPU holds the process-table lock
    holding: AtomicBool,

    /// Number of dispatches performed
    dispatches: AtomicU64,
}

impl CpuState {
    /// Create new per-CPU state, interrupts disabled
    pub fn new(id: CpuId) -> Self {
        Self {
            id,
            depth: AtomicU32::new(0),
            flags: AtomicU8::new(0),
            holding: AtomicBool::new(false),
            dispatches: AtomicU64::new(0),
        }
    }

    /// Which CPU this is
    pub fn id(&self) -> CpuId {
        self.id
    }

    /// Current interrupt flags
    pub fn flags(&self) -> CpuFlags {
        CpuFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    fn set_flag(&self, flag: CpuFlags, value: bool) {
        let mut flags = self.flags();
        flags.set(flag, value);
        self.flags.store(flags.bits(), Ordering::Release);
    }

    /// Whether interrupts are enabled
    pub fn interrupts_enabled(&self) -> bool {
        self.flags().contains(CpuFlags::INTERRUPTS)
    }

    /// Enable interrupts
    ///
    /// # Panics
    /// If a spin lock is held on this CPU.
    pub fn intr_on(&self) {
        crate::invariant!(
            self.depth() == 0,
            "cpu {}: enabling interrupts at depth {}",
            self.id.0,
            self.depth()
        );
        self.set_flag(CpuFlags::INTERRUPTS, true);
    }

    /// Disable interrupts, remembering the previous state at depth 0
    pub fn push_off(&self) {
        let was_enabled = self.interrupts_enabled();
        self.set_flag(CpuFlags::INTERRUPTS, false);
        if self.depth.fetch_add(1, Ordering::AcqRel) == 0 {
            self.set_flag(CpuFlags::INTENA, was_enabled);
        }
    }

    /// Undo one `push_off`, restoring interrupts at depth 0
    pub fn pop_off(&self) {
        crate::invariant!(
            !self.interrupts_enabled(),
            "cpu {}: pop_off - interruptible",
            self.id.0
        );
        crate::invariant!(self.depth() >= 1, "cpu {}: pop_off", self.id.0);

        if self.depth.fetch_sub(1, Ordering::AcqRel) == 1 && self.intena() {
            self.set_flag(CpuFlags::INTERRUPTS, true);
        }
    }

    /// Nesting depth of `push_off`
    pub fn depth(&self) -> u32 {
        self.depth.load(Ordering::Acquire)
    }

    /// Interrupt state saved by the outermost `push_off`
    pub fn intena(&self) -> bool {
        self.flags().contains(CpuFlags::INTENA)
    }

    /// Restore a saved interrupt state after a context switch
    pub fn set_intena(&self, enabled: bool) {
        self.set_flag(CpuFlags::INTENA, enabled);
    }

    /// Whether this CPU holds the process-table lock
    pub fn holding(&self) -> bool {
        self.holding.load(Ordering::Acquire)
    }

    fn set_holding(&self, holding: bool) {
        self.holding.store(holding, Ordering::Release);
    }

    /// Count a dispatch on this CPU
    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of dispatches performed on this CPU
    pub fn dispatches(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Check the state required to switch away from the current context
    ///
    /// # Panics
    /// Unless exactly the process-table lock is held, with interrupts off.
    pub fn check_hand_off(&self, what: &str) {
        crate::invariant!(self.holding(), "{}: table lock not held", what);
        crate::invariant!(
            self.depth() == 1,
            "{}: lock depth {} on cpu {}",
            what,
            self.depth(),
            self.id.0
        );
        crate::invariant!(!self.interrupts_enabled(), "{}: interruptible", what);
    }
}

/// Guard over the process table
///
/// Dereferences to the table. Dropping it unlocks the table and undoes
/// the `push_off` of the acquisition. `hand_off` keeps the table locked
/// and the depth in place for the other side of a context switch, which
/// releases both with `finish_switch`.
pub struct SchedGuard<'a> {
    table: Option<MutexGuard<'a, ProcessTable>>,
    cpu: &'a CpuState,
}

impl<'a> SchedGuard<'a> {
    /// Lock the table on `cpu`
    pub fn acquire(lock: &'a Mutex<ProcessTable>, cpu: &'a CpuState) -> Self {
        cpu.push_off();
        let table = lock.lock();
        cpu.set_holding(true);
        Self {
            table: Some(table),
            cpu,
        }
    }

    /// Switch away with the table still locked
    pub fn hand_off(mut self) {
        self.cpu.check_hand_off("hand-off");
        self.cpu.set_holding(false);
        // Leaking the guard keeps the mutex locked; `Drop` sees None
        if let Some(table) = self.table.take() {
            core::mem::forget(table);
        }
    }

    /// Release a lock handed off on `cpu` once the switch has completed
    ///
    /// # Panics
    /// If `cpu` is not in the state `hand_off` leaves it in, or the table
    /// is not locked.
    pub fn finish_switch(lock: &Mutex<ProcessTable>, cpu: &CpuState) {
        crate::invariant!(
            cpu.depth() == 1 && !cpu.interrupts_enabled() && !cpu.holding(),
            "cpu {}: finishing a switch at depth {}",
            cpu.id().0,
            cpu.depth()
        );
        crate::invariant!(lock.is_locked(), "cpu {}: switch without the table lock", cpu.id().0);

        // SAFETY: the lock was leaked by `hand_off` on the other side of
        // this switch, and nothing touches the table until it is unlocked
        unsafe { lock.force_unlock() };
        cpu.pop_off();
    }
}

impl Deref for SchedGuard<'_> {
    type Target = ProcessTable;

    fn deref(&self) -> &ProcessTable {
        match self.table.as_deref() {
            Some(table) => table,
            None => crate::fatal!("process table used after hand-off"),
        }
    }
}

impl DerefMut for SchedGuard<'_> {
    fn deref_mut(&mut self) -> &mut ProcessTable {
        match self.table.as_deref_mut() {
            Some(table) => table,
            None => crate::fatal!("process table used after hand-off"),
        }
    }
}

impl Drop for SchedGuard<'_> {
    fn drop(&mut self) {
        if let Some(table) = self.table.take() {
            self.cpu.set_holding(false);
            drop(table);
            self.cpu.pop_off();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedConfig;

    #[test]
    fn test_push_pop_restores_interrupts() {
        let cpu = CpuState::new(CpuId::BSP);
        cpu.intr_on();

        cpu.push_off();
        cpu.push_off();
        assert!(!cpu.interrupts_enabled());
        assert_eq!(cpu.depth(), 2);

        cpu.pop_off();
        assert!(!cpu.interrupts_enabled());
        cpu.pop_off();
        assert!(cpu.interrupts_enabled());
        assert_eq!(cpu.depth(), 0);
    }

    #[test]
    fn test_pop_off_keeps_interrupts_disabled_if_they_were() {
        let cpu = CpuState::new(CpuId::BSP);
        cpu.push_off();
        cpu.pop_off();
        assert!(!cpu.interrupts_enabled());
    }

    #[test]
    #[should_panic(expected = "pop_off")]
    fn test_unbalanced_pop_off_is_fatal() {
        let cpu = CpuState::new(CpuId::BSP);
        cpu.pop_off();
    }

    #[test]
    fn test_hand_off_keeps_table_locked_until_switch_finishes() {
        let lock = Mutex::new(ProcessTable::new(SchedConfig::default()));
        let cpu = CpuState::new(CpuId::BSP);
        cpu.intr_on();

        let guard = SchedGuard::acquire(&lock, &cpu);
        assert!(cpu.holding());
        guard.hand_off();
        assert!(lock.is_locked());
        assert!(!cpu.holding());
        assert_eq!(cpu.depth(), 1);
        assert!(!cpu.interrupts_enabled());

        SchedGuard::finish_switch(&lock, &cpu);
        assert!(!lock.is_locked());
        assert_eq!(cpu.depth(), 0);
        assert!(cpu.interrupts_enabled());
    }

    #[test]
    #[should_panic(expected = "switch without the table lock")]
    fn test_finish_switch_without_hand_off_is_fatal() {
        let lock = Mutex::new(ProcessTable::new(SchedConfig::default()));
        let cpu = CpuState::new(CpuId::BSP);
        cpu.push_off();
        SchedGuard::finish_switch(&lock, &cpu);
    }

    #[test]
    #[should_panic(expected = "lock depth")]
    fn test_nested_hand_off_is_fatal() {
        let lock = Mutex::new(ProcessTable::new(SchedConfig::default()));
        let cpu = CpuState::new(CpuId::BSP);
        cpu.push_off();
        let guard = SchedGuard::acquire(&lock, &cpu);
        guard.hand_off();
    }
}
