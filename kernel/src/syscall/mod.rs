/*
 * System Call Layer
 *
 * Entry point from the kernel's trap handler into the scheduler. The trap
 * handler decodes the syscall number and raw argument registers and calls
 * `dispatch`; this layer never sees user memory. Values a syscall returns
 * through user pointers are placed in a `SyscallOut`, and the trap handler
 * copies them out after validating the pointers.
 *
 * Calling convention (System V AMD64, as in Linux):
 * - RAX: syscall number
 * - RDI, RSI, RDX: arguments 1-3
 * - RAX on return: result (negative = error)
 */

pub mod handlers;
pub mod numbers;

use handlers::*;
use numbers::*;

use crate::scheduler::{CurrentProc, Kernel, Platform, ProcStats};

/// Values returned through user pointers
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyscallOut {
    /// Exit status of a reaped child, if the caller asked for it
    pub status: Option<i32>,
    /// Timing statistics of a reaped child (wait_stat only)
    pub stats: Option<ProcStats>,
}

/// Dispatch one system call made by `cur`
///
/// # Arguments
/// * `num` - Syscall number (see `numbers`)
/// * `args` - First three argument registers; a pointer argument of 0
///   means the caller does not want that value
/// * `out` - Receives values the caller asked for through pointers
///
/// # Returns
/// Return value for RAX (negative = error)
pub fn dispatch<P: Platform>(
    kernel: &Kernel<P>,
    cur: &mut CurrentProc,
    num: usize,
    args: [usize; 3],
    out: &mut SyscallOut,
) -> isize {
    let [arg1, arg2, _arg3] = args;
    log::debug!("Syscall {} from pid {} with args: {:#x}, {:#x}", num, cur.pid, arg1, arg2);

    let ret = match num {
        SYS_FORK => sys_fork(kernel, cur),
        SYS_EXIT => sys_exit(kernel, cur, arg1 as i32),
        SYS_WAIT => {
            let mut status = 0;
            let ret = sys_wait(kernel, cur, (arg1 != 0).then_some(&mut status));
            if ret >= 0 && arg1 != 0 {
                out.status = Some(status);
            }
            ret
        }
        SYS_WAIT_STAT => {
            let mut status = 0;
            let mut stats = ProcStats::default();
            let ret = sys_wait_stat(kernel, cur, (arg1 != 0).then_some(&mut status), &mut stats);
            if ret >= 0 {
                if arg1 != 0 {
                    out.status = Some(status);
                }
                if arg2 != 0 {
                    out.stats = Some(stats);
                }
            }
            ret
        }
        SYS_KILL => sys_kill(kernel, cur, arg1 as i32),
        SYS_DETACH => sys_detach(kernel, cur, arg1 as i32),
        SYS_PRIORITY => sys_priority(kernel, cur, arg1 as i32),
        SYS_POLICY => sys_policy(kernel, cur, arg1 as i32),
        SYS_YIELD => sys_yield(kernel, cur),
        _ => {
            log::warn!("Unknown syscall number: {}", num);
            -ENOSYS
        }
    };

    log::debug!("Syscall {} returning: {}", num, ret);
    ret
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedConfig;
    use crate::scheduler::{CpuId, Pid, ResourceError};

    /// Platform for calls that never switch context
    struct Inert;

    impl Platform for Inert {
        fn ticks(&self) -> u64 {
            0
        }
        fn resume(&self, _cpu: CpuId, _pid: Pid) {}
        fn suspend(&self, cpu: CpuId, _pid: Pid) -> CpuId {
            cpu
        }
        fn duplicate_resources(&self, _parent: Pid, _child: Pid) -> Result<(), ResourceError> {
            Ok(())
        }
        fn release_resources(&self, _pid: Pid) {}
    }

    #[test]
    fn test_unknown_syscall() {
        let kernel = Kernel::new(SchedConfig::default(), Inert);
        let mut cur = CurrentProc::new(kernel.root(), CpuId::BSP);
        let mut out = SyscallOut::default();
        assert_eq!(dispatch(&kernel, &mut cur, 4242, [0; 3], &mut out), -ENOSYS);
        assert_eq!(out, SyscallOut::default());
    }

    #[test]
    fn test_kill_errors_map_to_minus_one() {
        let kernel = Kernel::new(SchedConfig::default(), Inert);
        let mut cur = CurrentProc::new(kernel.root(), CpuId::BSP);
        let mut out = SyscallOut::default();

        assert_eq!(dispatch(&kernel, &mut cur, SYS_KILL, [77, 0, 0], &mut out), -1);
        assert_eq!(dispatch(&kernel, &mut cur, SYS_KILL, [(-3i32) as usize, 0, 0], &mut out), -1);
        assert_eq!(dispatch(&kernel, &mut cur, SYS_KILL, [1, 0, 0], &mut out), 0);
        assert!(kernel.process_info(CpuId::BSP, kernel.root()).unwrap().killed);
    }

    #[test]
    fn test_policy_syscall_switches_policy() {
        let kernel = Kernel::new(SchedConfig::default(), Inert);
        let mut cur = CurrentProc::new(kernel.root(), CpuId::BSP);
        let mut out = SyscallOut::default();

        assert_eq!(dispatch(&kernel, &mut cur, SYS_POLICY, [3, 0, 0], &mut out), 0);
        assert_eq!(kernel.policy(CpuId::BSP), crate::scheduler::Policy::ExtendedPriority);
        assert_eq!(kernel.audit(CpuId::BSP), Ok(()));
    }
}
