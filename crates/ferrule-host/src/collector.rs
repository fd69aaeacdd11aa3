//! Scheduler context tracking.
//!
//! A thread runs "inside the scheduler" while it executes on behalf of a
//! process, either a native call or process code. The innermost active
//! environment is what resource reclamation hands to custom destructors;
//! reclamation on any other thread supplies no environment.

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::env::Env;

thread_local! {
    static SCHEDULER_STACK: RefCell<Vec<Env>> = RefCell::new(Vec::new());
}

/// Keeps an environment active on the current thread until dropped.
///
/// Guards must be dropped on the thread that created them, in reverse order.
#[must_use = "the scheduler context ends when the guard is dropped"]
pub struct SchedulerGuard {
    depth: usize,
    // Tied to the thread-local stack.
    _not_send: PhantomData<*const ()>,
}

/// Makes `env` the current scheduler environment of this thread.
pub fn enter(env: &Env) -> SchedulerGuard {
    let depth = SCHEDULER_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(env.clone());
        stack.len()
    });
    SchedulerGuard {
        depth,
        _not_send: PhantomData,
    }
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        // The popped envs are dropped after the borrow ends so their own
        // teardown may consult the stack.
        let popped = SCHEDULER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let keep = self.depth.saturating_sub(1).min(stack.len());
            stack.split_off(keep)
        });
        drop(popped);
    }
}

/// The innermost active scheduler environment, if this thread has one.
pub fn current_env() -> Option<Env> {
    SCHEDULER_STACK
        .try_with(|stack| stack.try_borrow().ok().and_then(|s| s.last().cloned()))
        .ok()
        .flatten()
}

/// True if the current thread is inside a scheduler context.
pub fn in_scheduler() -> bool {
    current_env().is_some()
}
