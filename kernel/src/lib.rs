/*
 * CLUU Process Scheduling Core
 *
 * This crate contains the part of the CLUU kernel that decides, at every
 * scheduling point on every CPU, which runnable process gets the processor
 * next. It owns the process table, the ready structures of the three
 * scheduling policies and the timing bookkeeping those policies depend on.
 *
 * Why this is important:
 * - Every CPU runs the same dispatch loop against one shared table
 * - Policies (Round-Robin, Priority, Extended-Priority) can be switched at
 *   runtime without losing a single runnable process
 * - Process lifecycle (fork/exit/wait/kill/detach) is kept consistent with
 *   ready-queue membership under a single lock
 *
 * The crate is no_std + alloc. Everything architecture specific (the actual
 * register save/restore, the timer, address spaces and file tables) is
 * reached through the `Platform` trait so the same code runs inside the
 * kernel image and in host tests.
 */

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod config;
pub mod error;
pub mod scheduler;
pub mod syscall;
pub mod utils;

#[doc(hidden)]
pub use log as __log;

pub use config::SchedConfig;
pub use error::SchedError;
pub use scheduler::{
    AuditError, Channel, ChildExit, CpuId, CurrentProc, Kernel, Pid, Platform, Policy, Priority,
    ProcInfo, ProcState, ProcStats, ResourceError,
};
