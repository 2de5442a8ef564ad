/*
 * Generic I/O Wait Queue System
 *
 * Lets any driver block the current task until its device raises an
 * interrupt, without the driver needing to know how the scheduler
 * itself represents blocked tasks. Each device or event source gets a
 * channel; a task waits on a channel, an ISR wakes everyone waiting on
 * it.
 *
 * `wait_for_io` runs in ordinary task context; `wake_io_waiters` runs
 * from interrupt context. Both take the same lock, so the lock must
 * never be held across a yield.
 */

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

use spin::Mutex;

use super::task::{Tid, WaitObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IoChannel {
    Keyboard,
    Serial(u8),
    Timer,
    Disk(u8),
    Network(u8),
    Device(u32),
}

struct WaitQueue {
    waiting_tasks: Vec<Tid>,
}

impl WaitQueue {
    fn new() -> Self {
        Self { waiting_tasks: Vec::new() }
    }

    fn add_waiter(&mut self, tid: Tid) {
        if !self.waiting_tasks.contains(&tid) {
            self.waiting_tasks.push(tid);
        }
    }

    fn wake_all(&mut self) -> Vec<Tid> {
        let tasks = self.waiting_tasks.clone();
        self.waiting_tasks.clear();
        tasks
    }

    fn remove_waiter(&mut self, tid: Tid) {
        self.waiting_tasks.retain(|&t| t != tid);
    }

    fn is_empty(&self) -> bool {
        self.waiting_tasks.is_empty()
    }
}

static IO_WAIT_QUEUES: Mutex<BTreeMap<IoChannel, WaitQueue>> = Mutex::new(BTreeMap::new());
static IO_WAIT_INIT: AtomicBool = AtomicBool::new(false);

pub fn init() {
    IO_WAIT_INIT.store(true, Ordering::SeqCst);
    log::info!("I/O wait queue system initialized");
}

/// Block the current task on `channel`. Registers the task as a waiter,
/// marks it `Sleeping` with `WaitObject::Io(channel)`, then yields. When
/// this returns, the I/O event has already occurred.
///
/// Panics if called from the idle task or before the scheduler is up.
pub fn wait_for_io(channel: IoChannel) {
    if !IO_WAIT_INIT.load(Ordering::Acquire) {
        log::warn!("wait_for_io called before I/O wait system initialized");
        return;
    }

    let current_tid = super::engine::get_curr_task_tid();
    if current_tid.0 == super::config::IDLE_TASK_TID {
        panic!("cannot wait for I/O in the idle task");
    }

    {
        let mut queues = IO_WAIT_QUEUES.lock();
        let wait_queue = queues.entry(channel).or_insert_with(WaitQueue::new);
        wait_queue.add_waiter(current_tid);
    }

    super::engine::block_current_task(WaitObject::Io(channel));
    super::engine::yield_now();
}

/// Wake every task waiting on `channel`. Called from interrupt context
/// by the device's ISR.
pub fn wake_io_waiters(channel: IoChannel) {
    if !IO_WAIT_INIT.load(Ordering::Acquire) {
        return;
    }

    let tasks_to_wake = {
        let mut queues = IO_WAIT_QUEUES.lock();
        if let Some(wait_queue) = queues.get_mut(&channel) {
            wait_queue.wake_all()
        } else {
            Vec::new()
        }
    };

    for tid in tasks_to_wake {
        super::engine::wake_task(tid);
    }
}

/// Remove `tid` from every wait queue without waking it. Used when a
/// task is torn down while still blocked on I/O.
pub fn cancel_wait(tid: Tid) {
    let mut queues = IO_WAIT_QUEUES.lock();
    for wait_queue in queues.values_mut() {
        wait_queue.remove_waiter(tid);
    }
}

pub fn has_waiters(channel: IoChannel) -> bool {
    if !IO_WAIT_INIT.load(Ordering::Acquire) {
        return false;
    }
    let queues = IO_WAIT_QUEUES.lock();
    queues.get(&channel).map(|wq| !wq.is_empty()).unwrap_or(false)
}

pub fn waiter_count(channel: IoChannel) -> usize {
    if !IO_WAIT_INIT.load(Ordering::Acquire) {
        return 0;
    }
    let queues = IO_WAIT_QUEUES.lock();
    queues.get(&channel).map(|wq| wq.waiting_tasks.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_queue_dedups_waiters() {
        let mut wq = WaitQueue::new();
        wq.add_waiter(Tid(3));
        wq.add_waiter(Tid(3));
        assert_eq!(wq.waiting_tasks.len(), 1);
    }

    #[test]
    fn wake_all_drains_queue() {
        let mut wq = WaitQueue::new();
        wq.add_waiter(Tid(1));
        wq.add_waiter(Tid(2));
        let woken = wq.wake_all();
        assert_eq!(woken, alloc::vec![Tid(1), Tid(2)]);
        assert!(wq.is_empty());
    }

    #[test]
    fn remove_waiter_is_targeted() {
        let mut wq = WaitQueue::new();
        wq.add_waiter(Tid(1));
        wq.add_waiter(Tid(2));
        wq.remove_waiter(Tid(1));
        assert_eq!(wq.waiting_tasks, alloc::vec![Tid(2)]);
    }
}
