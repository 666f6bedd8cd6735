/*
 * System Call Handlers
 *
 * This module implements the process-management syscall handlers. Each
 * handler forwards to the scheduler and maps its `Result` onto the
 * integer return convention: the value on success, `SchedError::errno()`
 * (-1) on any recoverable error.
 *
 * Every handler runs in the context of the calling process, identified by
 * `cur`. Blocking handlers may return on another CPU, which is reflected
 * in `cur.cpu`.
 */

use crate::error::SchedError;
use crate::scheduler::{ChildExit, CurrentProc, Kernel, Pid, Platform, ProcStats};

fn pid_arg(pid: i32) -> Result<Pid, SchedError> {
    u32::try_from(pid).map(Pid).map_err(|_| SchedError::NotFound)
}

fn to_ret<T: Into<isize>>(result: Result<T, SchedError>) -> isize {
    match result {
        Ok(value) => value.into(),
        Err(err) => {
            log::debug!("syscall failed: {}", err);
            err.errno()
        }
    }
}

fn copy_out_status(exit: &ChildExit, status_out: Option<&mut i32>) -> isize {
    if let Some(status) = status_out {
        *status = exit.status;
    }
    exit.pid.0 as isize
}

pub fn sys_fork<P: Platform>(kernel: &Kernel<P>, cur: &mut CurrentProc) -> isize {
    to_ret(kernel.spawn(cur).map(|pid| pid.0 as isize))
}

pub fn sys_exit<P: Platform>(kernel: &Kernel<P>, cur: &mut CurrentProc, status: i32) -> ! {
    kernel.exit(cur, status)
}

/// Reap one exited child, writing its exit status to `status_out`
pub fn sys_wait<P: Platform>(
    kernel: &Kernel<P>,
    cur: &mut CurrentProc,
    status_out: Option<&mut i32>,
) -> isize {
    match kernel.wait(cur) {
        Ok(exit) => copy_out_status(&exit, status_out),
        Err(err) => to_ret::<isize>(Err(err)),
    }
}

/// `sys_wait` that also copies out the child's timing statistics
pub fn sys_wait_stat<P: Platform>(
    kernel: &Kernel<P>,
    cur: &mut CurrentProc,
    status_out: Option<&mut i32>,
    stats_out: &mut ProcStats,
) -> isize {
    match kernel.wait_with_stats(cur) {
        Ok((exit, stats)) => {
            *stats_out = stats;
            copy_out_status(&exit, status_out)
        }
        Err(err) => to_ret::<isize>(Err(err)),
    }
}

pub fn sys_kill<P: Platform>(kernel: &Kernel<P>, cur: &CurrentProc, pid: i32) -> isize {
    to_ret(pid_arg(pid).and_then(|pid| kernel.kill(cur.cpu, pid)).map(|()| 0isize))
}

pub fn sys_detach<P: Platform>(kernel: &Kernel<P>, cur: &CurrentProc, pid: i32) -> isize {
    to_ret(pid_arg(pid).and_then(|pid| kernel.detach(cur, pid)).map(|()| 0isize))
}

pub fn sys_priority<P: Platform>(kernel: &Kernel<P>, cur: &CurrentProc, priority: i32) -> isize {
    kernel.set_priority(cur, priority);
    0
}

pub fn sys_policy<P: Platform>(kernel: &Kernel<P>, cur: &CurrentProc, policy: i32) -> isize {
    kernel.set_policy(cur.cpu, policy);
    0
}

pub fn sys_yield<P: Platform>(kernel: &Kernel<P>, cur: &mut CurrentProc) -> isize {
    kernel.yield_now(cur);
    0
}
