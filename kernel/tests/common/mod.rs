/*
 * Thread-Backed Test Platform
 *
 * Runs every scheduled process on its own OS thread so the scheduler can be
 * exercised end to end on the host: blocking `wait`, sleep/wakeup, kill,
 * migration between CPUs.
 *
 * A context switch is a baton pass. `resume(cpu, pid)` grants `cpu` to
 * the process thread and blocks the dispatcher until the process calls
 * `suspend(cpu, pid)`, which marks `cpu` as returned and blocks the process
 * until some dispatcher grants it a CPU again. At any moment each CPU is
 * driven by exactly one thread, and resuming a process that has not
 * parked in `suspend` yet fails the test.
 *
 * Process bodies are closures. A forked child gets the body its parent
 * registered with `fork` (the platform's "duplicate resources" step moves
 * it to the child). Returning from a body exits the process with the
 * returned status. The root body never exits: once it returns the root
 * keeps reaping orphans.
 */

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, Weak};
use std::thread;
use std::time::Duration;

use cluu_sched::utils::debug::logger;
use cluu_sched::{
    Channel, CpuId, CurrentProc, Kernel, Pid, Platform, ResourceError, SchedConfig, SchedError,
};

pub type Sim = Kernel<Threads>;
pub type Body = Box<dyn FnOnce(&Sim, &mut CurrentProc) -> i32 + Send>;

/// Upper bound on dispatches a single test may perform
const MAX_STEPS: usize = 200_000;

#[derive(Default)]
struct State {
    /// Bodies of processes that have not started yet
    bodies: HashMap<Pid, Body>,
    /// Body the parent wants its next child to run
    pending: HashMap<Pid, Body>,
    started: HashSet<Pid>,
    /// CPU granted to a process that has not picked it up yet
    grants: HashMap<Pid, CpuId>,
    /// CPUs whose process has given them back
    returned: HashSet<CpuId>,
    /// Processes resumed and not yet parked in `suspend`
    executing: HashSet<Pid>,
    /// Time a process spends saving its context in `suspend`
    switch_delay: Duration,
    released: Vec<Pid>,
    /// First panic raised inside a process thread
    failure: Option<String>,
}

struct Shared {
    state: Mutex<State>,
    cv: Condvar,
    ticks: AtomicU64,
    kernel: OnceLock<Weak<Sim>>,
}

/// Platform whose processes are OS threads
#[derive(Clone)]
pub struct Threads(Arc<Shared>);

impl Threads {
    fn new() -> Self {
        Self(Arc::new(Shared {
            state: Mutex::new(State::default()),
            cv: Condvar::new(),
            ticks: AtomicU64::new(0),
            kernel: OnceLock::new(),
        }))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.0.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn kernel(&self) -> Arc<Sim> {
        self.0
            .kernel
            .get()
            .and_then(Weak::upgrade)
            .expect("kernel dropped while processes run")
    }

    /// Register the body the next child of `parent` will run
    pub fn prepare<F>(&self, parent: Pid, body: F)
    where
        F: FnOnce(&Sim, &mut CurrentProc) -> i32 + Send + 'static,
    {
        self.lock().pending.insert(parent, Box::new(body));
    }

    fn discard(&self, parent: Pid) {
        self.lock().pending.remove(&parent);
    }

    /// Make every switch-out take `delay` before the process parks
    pub fn slow_switches(&self, delay: Duration) {
        self.lock().switch_delay = delay;
    }

    /// Pids whose resources were released by `exit`
    pub fn released(&self) -> Vec<Pid> {
        self.lock().released.clone()
    }

    fn start(&self, pid: Pid, body: Body) {
        let platform = self.clone();
        thread::Builder::new()
            .name(format!("pid-{}", pid))
            .spawn(move || {
                let cpu = platform.wait_grant(pid);
                let kernel = platform.kernel();
                let outcome = catch_unwind(AssertUnwindSafe(|| {
                    let mut cur = CurrentProc::new(pid, cpu);
                    kernel.enter(cpu);
                    let status = body(kernel.as_ref(), &mut cur);
                    kernel.exit(&mut cur, status);
                }));
                if let Err(payload) = outcome {
                    let message = payload
                        .downcast_ref::<String>()
                        .cloned()
                        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
                        .unwrap_or_else(|| "unknown panic".to_string());
                    let mut state = platform.lock();
                    state.failure.get_or_insert(message);
                    platform.0.cv.notify_all();
                }
            })
            .expect("spawn process thread");
    }

    fn wait_grant(&self, pid: Pid) -> CpuId {
        let mut state = self.lock();
        loop {
            if let Some(cpu) = state.grants.remove(&pid) {
                return cpu;
            }
            state = self.0.cv.wait(state).unwrap_or_else(|p| p.into_inner());
        }
    }
}

impl Platform for Threads {
    fn ticks(&self) -> u64 {
        self.0.ticks.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn resume(&self, cpu: CpuId, pid: Pid) {
        let mut state = self.lock();
        if !state.executing.insert(pid) {
            let message = format!("pid {} resumed on cpu {} while still executing", pid, cpu.0);
            state.failure.get_or_insert(message.clone());
            self.0.cv.notify_all();
            drop(state);
            panic!("{}", message);
        }
        state.returned.remove(&cpu);
        state.grants.insert(pid, cpu);

        if state.started.insert(pid) {
            let body = state
                .bodies
                .remove(&pid)
                .unwrap_or_else(|| panic!("no body registered for pid {}", pid));
            self.start(pid, body);
        }
        self.0.cv.notify_all();

        while !state.returned.contains(&cpu) {
            if let Some(message) = state.failure.clone() {
                drop(state);
                panic!("process panicked: {}", message);
            }
            state = self.0.cv.wait(state).unwrap_or_else(|p| p.into_inner());
        }
        state.returned.remove(&cpu);
    }

    fn suspend(&self, cpu: CpuId, pid: Pid) -> CpuId {
        let delay = self.lock().switch_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        {
            let mut state = self.lock();
            state.executing.remove(&pid);
            state.returned.insert(cpu);
            self.0.cv.notify_all();
        }
        self.wait_grant(pid)
    }

    fn duplicate_resources(&self, parent: Pid, child: Pid) -> Result<(), ResourceError> {
        let mut state = self.lock();
        let body = state.pending.remove(&parent).ok_or(ResourceError)?;
        state.bodies.insert(child, body);
        Ok(())
    }

    fn release_resources(&self, pid: Pid) {
        self.lock().released.push(pid);
    }
}

/// Boot a kernel whose root process runs `root`
pub fn boot<F>(config: SchedConfig, root: F) -> Arc<Sim>
where
    F: FnOnce(&Sim, &mut CurrentProc) + Send + 'static,
{
    let _ = logger::init(log::LevelFilter::Debug);

    let platform = Threads::new();
    let kernel = Arc::new(Kernel::new(config, platform.clone()));
    let _ = platform.0.kernel.set(Arc::downgrade(&kernel));

    let body: Body = Box::new(move |kernel: &Sim, cur: &mut CurrentProc| {
        root(kernel, cur);
        reap_forever(kernel, cur)
    });
    platform.lock().bodies.insert(kernel.root(), body);
    kernel
}

fn reap_forever(kernel: &Sim, cur: &mut CurrentProc) -> ! {
    loop {
        if kernel.wait(cur).is_err() {
            kernel.sleep(cur, Channel::Child(cur.pid));
        }
    }
}

/// Fork a child of `cur` that runs `body`
pub fn fork<F>(kernel: &Sim, cur: &mut CurrentProc, body: F) -> Result<Pid, SchedError>
where
    F: FnOnce(&Sim, &mut CurrentProc) -> i32 + Send + 'static,
{
    kernel.platform().prepare(cur.pid, body);
    let result = kernel.spawn(cur);
    if result.is_err() {
        kernel.platform().discard(cur.pid);
    }
    result
}

/// Drive `cpu` until nothing is runnable, auditing after every dispatch
///
/// # Returns
/// The pids dispatched, in order
pub fn run_until_idle(kernel: &Sim, cpu: CpuId) -> Vec<Pid> {
    let mut trace = Vec::new();
    while let Some(pid) = kernel.run_once(cpu) {
        trace.push(pid);
        assert_eq!(kernel.audit(cpu), Ok(()), "after dispatching {}", pid);
        assert!(trace.len() < MAX_STEPS, "scheduler never went idle");
    }
    trace
}

/// Shared, append-only log of values recorded by process bodies
#[derive(Clone)]
pub struct Record<T>(Arc<Mutex<Vec<T>>>);

impl<T: Clone> Record<T> {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn push(&self, value: T) {
        self.0.lock().unwrap().push(value);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn get(&self) -> Vec<T> {
        self.0.lock().unwrap().clone()
    }
}
