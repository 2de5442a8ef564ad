/*
 * Tasklet Runner Registry
 *
 * Deferred interrupt work (driver bottom halves) runs on dedicated
 * "tasklet runner" tasks rather than in the ISR itself. The scheduler
 * core only needs to ask one question of this subsystem: is a runner
 * ready, and if so which one takes priority over the task currently on
 * CPU. Kept outside `sched` since the scheduler only consumes this one
 * query contract, never the registration side.
 *
 * A driver registers its runner's `Tid` once at setup time, then calls
 * `mark_ready`/`mark_idle` from its ISR and from the runner's own loop.
 * Deliberately small and fixed in shape, in the style of the wait-queue
 * registries elsewhere in the kernel: a spinlock-guarded table, safe to
 * touch from interrupt context.
 */

use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use crate::sched::task::Tid;

struct Runner {
    tid: Tid,
    ready: AtomicBool,
}

static RUNNERS: Mutex<Vec<Runner>> = Mutex::new(Vec::new());

/// Register `tid` as a tasklet runner. Must be called before the task
/// is handed to `add_task`, so the scheduler never places it on a
/// state list.
pub fn register_runner(tid: Tid) {
    let mut runners = RUNNERS.lock();
    if !runners.iter().any(|r| r.tid == tid) {
        runners.push(Runner { tid, ready: AtomicBool::new(false) });
    }
}

/// Mark `tid`'s deferred work as pending. Safe to call from an ISR.
pub fn mark_ready(tid: Tid) {
    let runners = RUNNERS.lock();
    if let Some(runner) = runners.iter().find(|r| r.tid == tid) {
        runner.ready.store(true, Ordering::Release);
    }
}

/// Mark `tid`'s deferred work as drained. Called by the runner itself
/// once it has processed its queue.
pub fn mark_idle(tid: Tid) {
    let runners = RUNNERS.lock();
    if let Some(runner) = runners.iter().find(|r| r.tid == tid) {
        runner.ready.store(false, Ordering::Release);
    }
}

/// The highest-priority runner with pending work, if any. Registration
/// order is priority order; first match wins.
pub fn get_hi_prio_ready_tasklet_runner() -> Option<Tid> {
    let runners = RUNNERS.lock();
    runners
        .iter()
        .find(|r| r.ready.load(Ordering::Acquire))
        .map(|r| r.tid)
}

/// Whether `tid` names a registered tasklet runner.
pub fn is_tasklet_runner(tid: Tid) -> bool {
    RUNNERS.lock().iter().any(|r| r.tid == tid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unready_runner_is_not_returned() {
        let tid = Tid(900);
        register_runner(tid);
        assert!(is_tasklet_runner(tid));
        assert_ne!(get_hi_prio_ready_tasklet_runner(), Some(tid));
        mark_idle(tid);
    }

    #[test]
    fn ready_runner_is_returned_and_clears() {
        let tid = Tid(901);
        register_runner(tid);
        mark_ready(tid);
        assert_eq!(get_hi_prio_ready_tasklet_runner(), Some(tid));
        mark_idle(tid);
        assert_ne!(get_hi_prio_ready_tasklet_runner(), Some(tid));
    }
}
