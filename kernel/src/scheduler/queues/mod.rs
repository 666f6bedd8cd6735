/*
 * Ready Structures
 *
 * The three places a schedulable process can live:
 * - RoundRobinQueue: FIFO of runnable processes under Round-Robin
 * - PriorityQueue: runnable processes ordered by accumulator under the
 *   Priority policies
 * - RunningSet: processes currently executing, one per CPU at most
 *
 * All three hold arena handles and are only touched with the table lock
 * held. Fixed capacities come from `config::NPROC` / `config::NCPU`.
 */

pub mod priority;
pub mod round_robin;
pub mod running;

pub use priority::PriorityQueue;
pub use round_robin::RoundRobinQueue;
pub use running::RunningSet;

use super::process::ProcArena;

/// Accumulator a process gets when it (re)enters the priority queue
///
/// The minimum accumulator among processes that are waiting or running,
/// so a newcomer neither starves the others nor is starved by them.
/// Sources with no processes are ignored; with no processes at all the
/// baseline is 0.
pub fn fairness_baseline(procs: &ProcArena, pq: &PriorityQueue, running: &RunningSet) -> i64 {
    match (pq.peek_min_accumulator(procs), running.min_accumulator(procs)) {
        (Some(queued), Some(running)) => queued.min(running),
        (Some(value), None) | (None, Some(value)) => value,
        (None, None) => 0,
    }
}
