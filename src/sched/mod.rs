/*
 * Task Scheduler Core
 *
 * The scheduler core owns task identity (`Tid`/`Pid`), task lifecycle
 * (runnable/running/sleeping/zombie), and the policy that picks which
 * task runs next. It does not know about ELF loading, filesystems, or
 * IPC; those layers build on top of the task records this module
 * maintains.
 *
 * Layout:
 * - `task`         task identity, state, and the saved interrupt context
 * - `process`      the process record a task's main thread owns
 * - `index`        the `Tid -> Task` lookup table
 * - `state_lists`  runnable/sleeping/zombie membership
 * - `preempt`      the preemption-disable nesting counter
 * - `pid`          identifier allocation and `SchedError`
 * - `io_wait`      blocking I/O wait queues, keyed by channel
 * - `config`       scheduler-wide constants
 * - `engine`       the scheduler singleton: task creation, state
 *                  transitions, and the next-task selection policy
 * - `selftest`     boot-time self-check exercising the engine end to end
 */

pub mod config;
pub mod engine;
pub mod index;
pub mod io_wait;
pub mod pid;
pub mod preempt;
pub mod process;
pub mod selftest;
pub mod state_lists;
pub mod task;

pub use pid::SchedError;
pub use task::{Pid, Tid};
