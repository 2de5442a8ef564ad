/*
 * Identifier Allocator
 *
 * Assigns a fresh process identifier, keeping identifiers dense (reuse
 * holes) while preferring monotonic growth so short-lived processes
 * don't recycle recently used numbers while space above the high-water
 * mark remains. A single ascending pass over the task index, tracking
 * two candidates at once.
 */

use super::config::MAX_PID;
use super::index::TaskIndex;
use super::task::Pid;

/// Error conditions the scheduler core reports to its callers. Identifier
/// exhaustion is the only one with a real recovery path (the caller fails
/// process creation); the rest indicate a caller violating the core's
/// contract and are expected to be unreachable in a correct kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedError {
    /// Both the monotonic candidate and the lowest-hole candidate exceed
    /// `MAX_PID`.
    NoIdentifierAvailable,
    /// `add_task` called with a `tid` already present in the index.
    DuplicateIdentifier,
    /// `remove_task` called on a task not in state `Zombie`.
    NotZombie,
    /// Lookup by `tid` found nothing.
    NoSuchTask,
}

/// Tracks the high-water mark across allocations. Starts at -1 so the
/// first allocation's `lowest_after_current_max` begins at 0.
pub struct PidAllocator {
    current_max_pid: i64,
}

impl PidAllocator {
    pub const fn new() -> Self {
        Self { current_max_pid: -1 }
    }

    #[cfg(test)]
    pub fn current_max_pid(&self) -> i64 {
        self.current_max_pid
    }

    /// Single ascending pass over `index`'s main-thread records,
    /// maintaining `lowest_available` (L) and `lowest_after_current_max`
    /// (A). Prefers A when it fits under `MAX_PID`; falls back to L;
    /// fails if neither fits.
    pub fn allocate(&mut self, index: &TaskIndex) -> Result<Pid, SchedError> {
        let mut lowest_available: i64 = 0;
        let mut lowest_after_current_max: i64 = self.current_max_pid + 1;

        index.iterate(|task| {
            if !task.is_main_thread() {
                return 0;
            }
            let tid = task.pid.0 as i64;

            if tid == lowest_available {
                lowest_available += 1;
            }
            if tid == lowest_after_current_max {
                lowest_after_current_max += 1;
            }
            0
        });

        let chosen = if lowest_after_current_max <= MAX_PID as i64 {
            lowest_after_current_max
        } else if lowest_available <= MAX_PID as i64 {
            lowest_available
        } else {
            return Err(SchedError::NoIdentifierAvailable);
        };

        self.current_max_pid = chosen;
        Ok(Pid(chosen as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::process::Process;
    use crate::sched::task::{Pid as TaskPid, Task, Tid};
    use alloc::boxed::Box;
    use alloc::string::String;
    use alloc::sync::Arc;
    use spin::Mutex;

    fn mock_main_thread(pid_val: u32) -> Box<Task> {
        fn dummy_entry() -> ! {
            loop {}
        }
        let pi = Arc::new(Mutex::new(Process::new_kernel(TaskPid(0))));
        Box::new(Task::new_kernel_task(
            Tid(pid_val),
            TaskPid(pid_val),
            String::from("mock"),
            dummy_entry as fn() -> !,
            pi,
            4096,
        ))
    }

    #[test]
    fn bootstrap_task_gets_identifier_zero() {
        let index = TaskIndex::new();
        let mut allocator = PidAllocator::new();
        let pid = allocator.allocate(&index).unwrap();
        assert_eq!(pid, TaskPid(0));
    }

    #[test]
    fn fresh_identifier_in_monotonic_region() {
        let mut index = TaskIndex::new();
        for pid in [0, 1, 2] {
            index.insert(mock_main_thread(pid)).unwrap();
        }
        let mut allocator = PidAllocator::new();
        allocator.current_max_pid = 2;

        let pid = allocator.allocate(&index).unwrap();
        assert_eq!(pid, TaskPid(3));
        assert_eq!(allocator.current_max_pid(), 3);
    }

    #[test]
    fn hole_reuse_after_exhaustion() {
        let mut index = TaskIndex::new();
        for pid in [0, 2, 3, 5] {
            index.insert(mock_main_thread(pid)).unwrap();
        }
        let mut allocator = PidAllocator::new();
        allocator.current_max_pid = 5;

        // MAX_PID is large in the real config; shrink the view for this
        // test by asserting the algorithm still prefers the hole once A
        // overflows past a locally simulated ceiling.
        let pid = allocate_with_ceiling(&mut allocator, &index, 5);
        assert_eq!(pid, TaskPid(1));
    }

    #[test]
    fn exhaustion_reports_no_identifier_available() {
        let mut index = TaskIndex::new();
        for pid in 0..=5u32 {
            index.insert(mock_main_thread(pid)).unwrap();
        }
        let mut allocator = PidAllocator::new();
        allocator.current_max_pid = 5;

        // Every identifier in 0..=5 is live and the ceiling is 5, so both
        // the monotonic candidate (6) and the lowest-hole candidate (6)
        // overflow it: allocation must fail rather than hand out 6.
        assert_eq!(allocate_with_ceiling(&mut allocator, &index, 5), None);
    }

    /// Test helper mirroring `PidAllocator::allocate` but parameterized
    /// over the MAX_PID ceiling, so the hole-reuse and exhaustion laws
    /// can be exercised without depending on the real (much larger)
    /// config constant.
    fn allocate_with_ceiling(allocator: &mut PidAllocator, index: &TaskIndex, ceiling: i64) -> Option<TaskPid> {
        let mut lowest_available: i64 = 0;
        let mut lowest_after_current_max: i64 = allocator.current_max_pid + 1;

        index.iterate(|task| {
            if !task.is_main_thread() {
                return 0;
            }
            let tid = task.pid.0 as i64;
            if tid == lowest_available {
                lowest_available += 1;
            }
            if tid == lowest_after_current_max {
                lowest_after_current_max += 1;
            }
            0
        });

        let chosen = if lowest_after_current_max <= ceiling {
            lowest_after_current_max
        } else if lowest_available <= ceiling {
            lowest_available
        } else {
            return None;
        };
        allocator.current_max_pid = chosen;
        Some(TaskPid(chosen as u32))
    }
}
