/*
 * Scheduler Errors
 *
 * Recoverable failures of the control entry points. These are returned to
 * the caller and become `-1` at the syscall boundary.
 *
 * Fatal conditions (an unknown policy id, a broken lock hand-off, the root
 * process exiting, ...) are NOT represented here: they mean the shared
 * scheduling state can no longer be trusted and the kernel panics through
 * `invariant!` / `fatal!`.
 */

/// Recoverable scheduler error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// No free process slot (or the platform could not duplicate resources)
    ResourceExhausted,
    /// Target pid does not exist (or is not a direct child, for detach)
    NotFound,
    /// The caller has no children to wait for
    NoChildren,
    /// The caller was killed while waiting
    Killed,
}

impl SchedError {
    /// Value handed back across the syscall boundary
    pub const fn errno(self) -> isize {
        -1
    }
}

impl core::fmt::Display for SchedError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SchedError::ResourceExhausted => write!(f, "No free process slot"),
            SchedError::NotFound => write!(f, "No such process"),
            SchedError::NoChildren => write!(f, "No child processes"),
            SchedError::Killed => write!(f, "Caller was killed"),
        }
    }
}
