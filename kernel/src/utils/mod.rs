/*
 * Kernel Utilities
 *
 * Small helpers shared by the scheduler: the fatal-invariant macros and the
 * buffered debug logger.
 */

#[macro_use]
pub mod macros;
pub mod debug;
