/*
 * Task Index
 *
 * An ordered associative structure mapping task identifier to task
 * record. A from-scratch intrusive BST would need unsafe self-referential
 * pointers to be genuinely free of per-entry allocation; the teacher
 * itself keeps its tasks in owning containers (`Vec<Thread>` in
 * `scheduler/mod.rs`, `HashMap<ProcessId, Process>` in
 * `scheduler/process.rs`) rather than a hand-rolled tree, so this index
 * is a `BTreeMap` instead: ascending iteration order comes for free and
 * is exactly what the identifier allocator relies on.
 */

use alloc::boxed::Box;
use alloc::collections::BTreeMap;

use super::task::{Task, Tid};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyPresent;

pub struct TaskIndex {
    tasks: BTreeMap<Tid, Box<Task>>,
}

impl TaskIndex {
    pub const fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Insert a new task record. Fails if the identifier is already present.
    pub fn insert(&mut self, task: Box<Task>) -> Result<(), AlreadyPresent> {
        let tid = task.tid;
        if self.tasks.contains_key(&tid) {
            return Err(AlreadyPresent);
        }
        self.tasks.insert(tid, task);
        Ok(())
    }

    /// Remove and return a task record by identifier.
    pub fn remove(&mut self, tid: Tid) -> Option<Box<Task>> {
        self.tasks.remove(&tid)
    }

    pub fn get(&self, tid: Tid) -> Option<&Task> {
        self.tasks.get(&tid).map(|t| t.as_ref())
    }

    pub fn get_mut(&mut self, tid: Tid) -> Option<&mut Task> {
        self.tasks.get_mut(&tid).map(|t| t.as_mut())
    }

    pub fn contains(&self, tid: Tid) -> bool {
        self.tasks.contains_key(&tid)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// In-order traversal, ascending by `tid`. Stops as soon as `visitor`
    /// returns non-zero, matching the early-out contract of
    /// `iterate_over_tasks`.
    pub fn iterate<F>(&self, mut visitor: F) -> i32
    where
        F: FnMut(&Task) -> i32,
    {
        for task in self.tasks.values() {
            let rc = visitor(task);
            if rc != 0 {
                return rc;
            }
        }
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sched::process::Process;
    use crate::sched::task::{Pid, Task};
    use alloc::sync::Arc;
    use alloc::string::String;
    use spin::Mutex;

    fn mock_task(tid_val: u32) -> Box<Task> {
        fn dummy_entry() -> ! {
            loop {}
        }
        let pi = Arc::new(Mutex::new(Process::new_kernel(Pid(0))));
        Box::new(Task::new_kernel_task(
            Tid(tid_val),
            Pid(tid_val),
            String::from("mock"),
            dummy_entry as fn() -> !,
            pi,
            4096,
        ))
    }

    #[test]
    fn insert_rejects_duplicate_identifier() {
        let mut index = TaskIndex::new();
        assert!(index.insert(mock_task(0)).is_ok());
        assert_eq!(index.insert(mock_task(0)), Err(AlreadyPresent));
    }

    #[test]
    fn traversal_visits_ascending_tid_order() {
        let mut index = TaskIndex::new();
        for tid in [5, 1, 3, 0, 2] {
            index.insert(mock_task(tid)).unwrap();
        }

        let mut seen = alloc::vec::Vec::new();
        index.iterate(|task| {
            seen.push(task.tid.0);
            0
        });

        assert_eq!(seen, alloc::vec![0, 1, 2, 3, 5]);
    }

    #[test]
    fn traversal_stops_at_first_nonzero_return() {
        let mut index = TaskIndex::new();
        for tid in 0..5 {
            index.insert(mock_task(tid)).unwrap();
        }

        let mut visited = 0;
        let rc = index.iterate(|_task| {
            visited += 1;
            if visited == 2 { 1 } else { 0 }
        });

        assert_eq!(rc, 1);
        assert_eq!(visited, 2);
    }

    #[test]
    fn remove_drops_entry_from_index() {
        let mut index = TaskIndex::new();
        index.insert(mock_task(7)).unwrap();
        assert!(index.contains(Tid(7)));
        assert!(index.remove(Tid(7)).is_some());
        assert!(!index.contains(Tid(7)));
        assert!(index.remove(Tid(7)).is_none());
    }
}
