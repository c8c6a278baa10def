/*
    Copyright (C) 2020-2023  Rafal Michalski

    This file is part of SHARPKEY, a Rust library for building keyboard interfaces.

    For the full copyright notice, see the lib.rs file.
*/
//! Coordination between the acquisition loop and a real-time host driver.
//!
//! The real-time driver never takes a lock while it's serving the host. It only polls
//! atomic flags between protocol units (a row response or a byte) and pops queues without
//! blocking. Only the acquisition side ever blocks.
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::collections::VecDeque;
use std::error;
use std::sync::{Condvar, Mutex, MutexGuard, TryLockError};
use std::time::Instant;

/// A two-state suspend handshake between the acquisition loop and a real-time driver.
///
/// The acquisition loop requests a suspension and blocks until the driver acknowledges it.
/// The driver acknowledges only after its outputs are forced inactive, then blocks until
/// released.
#[derive(Debug, Default)]
pub struct SuspendHandshake {
    yield_requested: AtomicBool,
    suspend_requested: AtomicBool,
    shutdown: AtomicBool,
    suspended: Mutex<bool>,
    changed: Condvar,
}

fn recover<'a, T>(res: std::sync::LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    res.unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SuspendHandshake {
    pub fn new() -> Self {
        SuspendHandshake::default()
    }

    /* acquisition side */

    /// Allows (or disallows) the driver to yield its execution context.
    #[inline]
    pub fn set_yield(&self, yield_requested: bool) {
        self.yield_requested.store(yield_requested, Ordering::Release);
    }
    /// Requests the driver to suspend.
    pub fn request_suspend(&self) {
        self.suspend_requested.store(true, Ordering::Release);
    }
    /// Waits until the driver acknowledges a suspension request.
    ///
    /// Returns `false` if the driver didn't acknowledge within `timeout`. In this instance
    /// the request is still pending and [SuspendHandshake::release] should be called.
    pub fn wait_suspended(&self, timeout: Duration) -> bool {
        let guard = recover(self.suspended.lock());
        let (guard, _) = self.changed.wait_timeout_while(guard, timeout, |suspended| !*suspended)
                             .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard
    }
    /// Withdraws a suspension request and lets a suspended driver resume.
    pub fn release(&self) {
        let _guard = recover(self.suspended.lock());
        self.suspend_requested.store(false, Ordering::Release);
        self.changed.notify_all();
    }
    /// Returns `true` if the driver is currently suspended.
    pub fn is_suspended(&self) -> bool {
        *recover(self.suspended.lock())
    }

    /* driver side */

    /// Returns `true` if the driver may yield at the next safe point.
    #[inline]
    pub fn yield_requested(&self) -> bool {
        self.yield_requested.load(Ordering::Acquire) || self.suspend_requested()
    }
    #[inline]
    pub fn suspend_requested(&self) -> bool {
        self.suspend_requested.load(Ordering::Acquire)
    }
    /// Acknowledges a suspension. The outputs must already be inactive.
    pub fn acknowledge_suspended(&self) {
        let mut suspended = recover(self.suspended.lock());
        *suspended = true;
        self.changed.notify_all();
    }
    /// Blocks a suspended driver until released or shut down.
    pub fn wait_released(&self) {
        let guard = recover(self.suspended.lock());
        let mut guard = self.changed.wait_while(guard, |_| {
            self.suspend_requested() && !self.is_shutdown()
        }).unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = false;
    }

    /* control */

    /// Makes the driver leave its run loop at the next safe point.
    pub fn shutdown(&self) {
        let _guard = recover(self.suspended.lock());
        self.shutdown.store(true, Ordering::Release);
        self.changed.notify_all();
    }
    #[inline]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// A periodic proof of life of a real-time driver, e.g. feeding a watchdog.
pub trait Liveness {
    fn feed(&mut self);
}

impl<F: FnMut()> Liveness for F {
    #[inline]
    fn feed(&mut self) {
        self()
    }
}

/// Returned by [BoundedQueue] pushes when the queue is full. Contains the rejected item.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

impl<T> fmt::Display for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is full")
    }
}

impl<T> error::Error for QueueFull<T> {}

/// A bounded, thread-safe FIFO queue.
///
/// Producers may wait a bounded time for space. The consumer never blocks: if the queue is
/// momentarily locked by a producer the pop reports an empty queue.
#[derive(Debug)]
pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Creates a new queue. A `capacity` of 0 is treated as 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        BoundedQueue {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_full: Condvar::new(),
            capacity
        }
    }
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        recover(self.items.lock()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Pushes an item if there's space left, otherwise returns it back.
    pub fn try_push(&self, item: T) -> Result<(), QueueFull<T>> {
        let mut items = recover(self.items.lock());
        if items.len() < self.capacity {
            items.push_back(item);
            Ok(())
        }
        else {
            Err(QueueFull(item))
        }
    }
    /// Pushes an item waiting up to `timeout` for space to become available.
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), QueueFull<T>> {
        let deadline = Instant::now() + timeout;
        let mut items = recover(self.items.lock());
        while items.len() >= self.capacity {
            let now = Instant::now();
            if now >= deadline {
                return Err(QueueFull(item))
            }
            let (guard, _) = self.not_full.wait_timeout(items, deadline - now)
                                 .unwrap_or_else(|poisoned| poisoned.into_inner());
            items = guard;
        }
        items.push_back(item);
        Ok(())
    }
    /// Pops the oldest item without blocking.
    pub fn try_pop(&self) -> Option<T> {
        let mut items = match self.items.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return None,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner()
        };
        let item = items.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }
    /// Removes all items.
    pub fn clear(&self) {
        recover(self.items.lock()).clear();
        self.not_full.notify_all();
    }
}
