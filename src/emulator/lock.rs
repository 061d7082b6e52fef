//! Synchronization primitives shared between callers and the emulation worker.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::ops::{Deref, DerefMut};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct LockState {
    held: bool,
    next_ticket: u64,
    /// Waiters ordered by `(priority, ticket)`, smallest first.
    waiting: BinaryHeap<Reverse<(u32, u64)>>,
}

/// A mutex whose waiters are serviced by priority, lowest number first.
///
/// Waiters with equal priority are serviced in arrival order. The holder is always the
/// head of the waiting heap at the moment the lock was released, so out-of-order
/// acquisition cannot happen.
#[derive(Debug)]
pub struct PriorityLock<T> {
    state: Mutex<LockState>,
    released: Condvar,
    data: Mutex<T>,
}

impl<T> PriorityLock<T> {
    pub fn new(data: T) -> Self {
        Self {
            state: Mutex::new(LockState::default()),
            released: Condvar::new(),
            data: Mutex::new(data),
        }
    }

    /// Blocks until the lock is granted at `priority`, returning a scoped guard.
    pub fn lock(&self, priority: u32) -> PriorityGuard<'_, T> {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        let me = Reverse((priority, ticket));
        state.waiting.push(me);
        while state.held || state.waiting.peek() != Some(&me) {
            self.released.wait(&mut state);
        }
        state.waiting.pop();
        state.held = true;
        drop(state);

        PriorityGuard {
            lock: self,
            data: self.data.lock(),
        }
    }

    /// Number of threads currently blocked in [`PriorityLock::lock`].
    pub fn waiting(&self) -> usize {
        self.state.lock().waiting.len()
    }

    fn release(&self) {
        let mut state = self.state.lock();
        state.held = false;
        drop(state);
        self.released.notify_all();
    }
}

/// Grants access to the data of a [`PriorityLock`]; releases the lock when dropped.
pub struct PriorityGuard<'a, T> {
    lock: &'a PriorityLock<T>,
    data: MutexGuard<'a, T>,
}

impl<T> Deref for PriorityGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.data
    }
}

impl<T> DerefMut for PriorityGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.data
    }
}

impl<T> Drop for PriorityGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.release();
    }
}

/// A manually reset event.
#[derive(Debug, Default)]
pub struct Signal {
    set: Mutex<bool>,
    changed: Condvar,
}

impl Signal {
    pub fn new(initial: bool) -> Self {
        Self {
            set: Mutex::new(initial),
            changed: Condvar::new(),
        }
    }

    pub fn set(&self) {
        *self.set.lock() = true;
        self.changed.notify_all();
    }

    pub fn clear(&self) {
        *self.set.lock() = false;
    }

    pub fn is_set(&self) -> bool {
        *self.set.lock()
    }

    /// Waits until the signal is set or `timeout` elapses. Returns whether it was set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut set = self.set.lock();
        if !*set {
            self.changed.wait_while_for(&mut set, |set| !*set, timeout);
        }
        *set
    }
}
