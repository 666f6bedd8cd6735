/*
 * Process State Transitions
 *
 * Every lifecycle edge the process table performs is named here. The
 * statistics collector translates an edge into "close this interval, open
 * that one", and the debug log reports edges by name.
 */

/// Time interval a process is currently accumulating
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Interval {
    /// Runnable, waiting in a ready queue (retime)
    Ready,
    /// Running on a CPU (rutime)
    Running,
    /// Sleeping on a channel (stime)
    Sleeping,
}

/// Lifecycle edge of a process record
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Initializing -> Runnable, stamps the creation tick
    Created,
    /// Runnable -> Running
    Dispatched,
    /// Running -> Runnable
    Yielded,
    /// Running -> Sleeping
    Slept,
    /// Sleeping -> Runnable (wakeup or kill)
    Woke,
    /// Running -> Zombie, stamps the termination tick
    Exited,
}

impl Transition {
    /// Interval that must be open before this edge and is closed by it
    pub fn closes(self) -> Option<Interval> {
        match self {
            Transition::Created => None,
            Transition::Dispatched => Some(Interval::Ready),
            Transition::Yielded | Transition::Slept | Transition::Exited => {
                Some(Interval::Running)
            }
            Transition::Woke => Some(Interval::Sleeping),
        }
    }

    /// Interval opened by this edge
    pub fn opens(self) -> Option<Interval> {
        match self {
            Transition::Created | Transition::Yielded | Transition::Woke => Some(Interval::Ready),
            Transition::Dispatched => Some(Interval::Running),
            Transition::Slept => Some(Interval::Sleeping),
            Transition::Exited => None,
        }
    }

    /// Name used in debug logs
    pub fn name(self) -> &'static str {
        match self {
            Transition::Created => "created",
            Transition::Dispatched => "dispatched",
            Transition::Yielded => "yielded",
            Transition::Slept => "slept",
            Transition::Woke => "woke",
            Transition::Exited => "exited",
        }
    }
}
