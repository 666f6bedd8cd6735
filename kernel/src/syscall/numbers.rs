/*
 * System Call Numbers
 *
 * This module defines the numbers of the process-management syscalls the
 * scheduler serves. Standard Linux numbers are used where a Linux
 * counterpart exists; CLUU-specific calls use custom numbers (>= 1100).
 *
 * Return convention: a non-negative value on success. Every recoverable
 * scheduler error is reported as -1; only an unknown syscall number gets
 * a distinct code (-ENOSYS).
 */

/// Function not implemented
pub const ENOSYS: isize = 38;

/// Create a child process
///
/// Arguments: () -> isize
/// Returns: child PID, or -1 if no process slot is free
pub const SYS_FORK: usize = 57;

/// Exit current process
///
/// Arguments: (status: i32) -> !
/// Does not return
pub const SYS_EXIT: usize = 60;

/// Wait for a child to exit
///
/// Arguments: (status: *mut i32) -> isize
/// Returns: PID of the reaped child, or -1 if there are no children or the
/// caller was killed while waiting
pub const SYS_WAIT: usize = 61;

/// Request termination of a process
///
/// Arguments: (pid: i32) -> isize
/// Returns: 0 on success, -1 if no such process
pub const SYS_KILL: usize = 62;

/// Yield CPU to scheduler
///
/// Arguments: () -> isize
/// Returns: 0
pub const SYS_YIELD: usize = 158; // sched_yield in Linux

/// Wait for a child to exit, also returning its timing statistics
///
/// Arguments: (status: *mut i32, stats: *mut ProcStats) -> isize
/// Returns: PID of the reaped child, or -1
pub const SYS_WAIT_STAT: usize = 1100;

/// Hand a direct child over to the root process
///
/// Arguments: (pid: i32) -> isize
/// Returns: 0 on success, -1 if pid is not a direct child
pub const SYS_DETACH: usize = 1101;

/// Set the caller's priority
///
/// Arguments: (priority: i32) -> isize
/// Returns: 0; values outside 1..=10 (0 outside Extended-Priority) are
/// silently ignored
pub const SYS_PRIORITY: usize = 1102;

/// Switch the scheduling policy
///
/// Arguments: (policy: i32) -> isize
/// Returns: 0. 1 = Round-Robin, 2 = Priority, 3 = Extended-Priority; any
/// other id halts the kernel
pub const SYS_POLICY: usize = 1103;
