/*
 * Process Record
 *
 * An ownership group of tasks sharing an address space and resources.
 * Grounded in the teacher's `scheduler::process::Process`, trimmed to the
 * fields the scheduler core itself is responsible for.
 */

use alloc::string::String;
use alloc::vec::Vec;

use super::task::{Pid, Tid};
use crate::memory::paging::get_kernel_cr3;

/// A process record. Destroyed when its reference count reaches zero.
pub struct Process {
    pub pid: Pid,
    pub parent_pid: Option<Pid>,
    pub name: String,
    pub ref_count: u32,
    pub cwd: String,
    pub tty: Option<u32>,
    /// Physical address of this process's page directory root (CR3 value).
    pub pdir: x86_64::PhysAddr,
    pub threads: Vec<Tid>,
    pub children: Vec<Pid>,
    /// Set once the last thread of this process exits to zombie.
    pub exit_code: Option<i32>,
}

impl Process {
    /// The kernel process (pid 0): no parent, root cwd, the kernel's own
    /// page directory.
    pub fn new_kernel(pid: Pid) -> Self {
        Self {
            pid,
            parent_pid: None,
            name: String::from("kernel"),
            ref_count: 1,
            cwd: String::from("/"),
            tty: None,
            pdir: get_kernel_cr3(),
            threads: Vec::new(),
            children: Vec::new(),
            exit_code: None,
        }
    }

    pub fn add_thread(&mut self, tid: Tid) {
        self.threads.push(tid);
        self.ref_count += 1;
    }

    pub fn remove_thread(&mut self, tid: Tid) {
        self.threads.retain(|&t| t != tid);
        self.ref_count = self.ref_count.saturating_sub(1);
    }
}
