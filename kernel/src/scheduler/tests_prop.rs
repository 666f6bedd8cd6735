/*
 * Property Tests for the Process Table
 *
 * Random sequences of lifecycle operations on a two-CPU table. After every
 * operation the residency invariants must hold: Runnable processes sit in
 * exactly the active policy's queue, Running ones in the running set,
 * everything else in neither, pids stay unique and priority 0 only
 * appears under Extended-Priority. Under the Priority policies every
 * regular (non-aging) decision picks a lowest accumulator.
 */

use proptest::prelude::*;

use super::process::ProcState;
use super::table::ProcessTable;
use super::types::{Channel, CpuId, Pid, Policy};
use crate::config::SchedConfig;

#[derive(Debug, Clone)]
enum Op {
    Dispatch(u32),
    Yield(u32),
    Sleep(u32, usize),
    Exit(u32, i32),
    Fork(u32),
    Wakeup(usize),
    Kill(u32),
    Reap(u32),
    Detach(u32, u32),
    SetPriority(u32, i32),
    SetPolicy(i32),
}

fn arb_op() -> impl Strategy<Value = Op> {
    let cpu = 0u32..2;
    prop_oneof![
        4 => cpu.clone().prop_map(Op::Dispatch),
        3 => cpu.clone().prop_map(Op::Yield),
        2 => (cpu.clone(), 0usize..3).prop_map(|(c, t)| Op::Sleep(c, t)),
        2 => (cpu.clone(), -2i32..5).prop_map(|(c, s)| Op::Exit(c, s)),
        3 => cpu.clone().prop_map(Op::Fork),
        2 => (0usize..3).prop_map(Op::Wakeup),
        1 => (1u32..12).prop_map(Op::Kill),
        2 => cpu.clone().prop_map(Op::Reap),
        1 => (cpu.clone(), 1u32..12).prop_map(|(c, p)| Op::Detach(c, p)),
        2 => (cpu, -1i32..12).prop_map(|(c, v)| Op::SetPriority(c, v)),
        1 => (1i32..=3).prop_map(Op::SetPolicy),
    ]
}

fn apply(table: &mut ProcessTable, op: &Op, now: u64) {
    match *op {
        Op::Dispatch(cpu) => {
            let cpu = CpuId(cpu);
            if table.current(cpu).is_none() {
                if let Some(slot) = table.select_next() {
                    table.begin_dispatch(cpu, slot, now);
                }
            }
        }
        Op::Yield(cpu) => {
            let cpu = CpuId(cpu);
            if let Some(slot) = table.current(cpu) {
                table.yield_process(slot, now);
                table.finish_dispatch(cpu, slot);
            }
        }
        Op::Sleep(cpu, token) => {
            let cpu = CpuId(cpu);
            if let Some(slot) = table.current(cpu) {
                table.sleep_process(slot, Channel::Token(token), now);
                table.finish_dispatch(cpu, slot);
            }
        }
        Op::Exit(cpu, status) => {
            let cpu = CpuId(cpu);
            if let Some(slot) = table.current(cpu) {
                if Some(table.pid_of(slot)) != table.root() {
                    table.terminate(slot, status, now);
                    table.finish_dispatch(cpu, slot);
                }
            }
        }
        Op::Fork(cpu) => {
            if let Some(parent) = table.current(CpuId(cpu)) {
                if let Ok(child) = table.allocate_child(parent) {
                    table.make_runnable(child, now);
                }
            }
        }
        Op::Wakeup(token) => {
            table.wakeup(Channel::Token(token), now);
        }
        Op::Kill(pid) => {
            let _ = table.mark_killed(Pid(pid), now);
        }
        Op::Reap(cpu) => {
            if let Some(slot) = table.current(CpuId(cpu)) {
                let pid = table.pid_of(slot);
                let _ = table.reap(pid);
            }
        }
        Op::Detach(cpu, pid) => {
            if let Some(slot) = table.current(CpuId(cpu)) {
                let parent = table.pid_of(slot);
                let _ = table.detach(parent, Pid(pid), now);
            }
        }
        Op::SetPriority(cpu, value) => {
            if let Some(slot) = table.current(CpuId(cpu)) {
                table.set_priority(slot, value);
            }
        }
        Op::SetPolicy(id) => table.set_policy(id),
    }
}

proptest! {
    #[test]
    fn residency_invariant_holds(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut table = ProcessTable::new(SchedConfig::default().with_cpus(2).with_max_processes(8));
        table.userinit(0);

        for (step, op) in ops.iter().enumerate() {
            apply(&mut table, op, step as u64 + 1);
            prop_assert_eq!(table.audit(), Ok(()), "after {:?}", op);
        }
    }

    #[test]
    fn pids_are_never_reused(ops in prop::collection::vec(arb_op(), 1..200)) {
        let mut table = ProcessTable::new(SchedConfig::default().with_cpus(2).with_max_processes(4));
        table.userinit(0);
        let mut seen_max = 1;

        for (step, op) in ops.iter().enumerate() {
            apply(&mut table, op, step as u64 + 1);
            for info in table.processes() {
                // A pid above everything seen so far must be brand new
                if info.pid.0 > seen_max {
                    prop_assert_eq!(info.pid.0, seen_max + 1);
                    seen_max = info.pid.0;
                }
            }
        }
    }

    #[test]
    fn priority_dispatch_picks_lowest_accumulator(ops in prop::collection::vec(arb_op(), 1..300)) {
        let config = SchedConfig::default().with_cpus(2).with_max_processes(8);
        let mut table = ProcessTable::new(config);
        table.userinit(0);
        table.set_policy(Policy::Priority.id());

        for (step, op) in ops.iter().enumerate() {
            let now = step as u64 + 1;
            let cpu = match *op {
                Op::Dispatch(cpu) => CpuId(cpu),
                _ => {
                    apply(&mut table, op, now);
                    continue;
                }
            };

            let policy = table.policy();
            let aging = policy == Policy::ExtendedPriority
                && table.decisions() % config.aging_period == 0;
            if !policy.uses_priority_queue() || aging || table.current(cpu).is_some() {
                apply(&mut table, op, now);
                continue;
            }

            let runnable: Vec<i64> = table
                .processes()
                .iter()
                .filter(|info| info.state == ProcState::Runnable)
                .map(|info| info.accumulator)
                .collect();
            if let Some(slot) = table.select_next() {
                let chosen = table.info(table.pid_of(slot)).unwrap().accumulator;
                prop_assert!(
                    runnable.iter().all(|&other| chosen <= other),
                    "picked {} out of {:?}",
                    chosen,
                    runnable
                );
                table.begin_dispatch(cpu, slot, now);
            }
            prop_assert_eq!(table.audit(), Ok(()));
        }
    }
}
