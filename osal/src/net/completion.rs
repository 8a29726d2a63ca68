/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! A single-shot completion: a result slot plus a wake for the caller.
//!
//! This is the safe re-expression of "capture the caller's stack flags by
//! reference in a closure running on another thread". The worker side owns a
//! clone, fills the slot exactly once, and wakes the caller; the caller stays
//! parked in [`Completion::wait`] until the slot is filled, so no reference
//! ever outlives the exchange.
//!
//! The wake uses the operating system block/unblock protocol when the caller
//! is a service-created thread, including the `LimitReached`-means-retry
//! rule: a wake that lands before the caller has blocked makes the next
//! `block` return [`LimitReached`](crate::Error::LimitReached), and the wait
//! loop simply re-checks the slot. Callers unknown to the service (e.g. the
//! process main thread) fall back to 1 ms delay-polling.

use std::sync::{Arc, Mutex};

use crate::{Error, Id, Milliseconds, OperatingSystem, sync::lock_or_recover};

/// Polling interval for callers that can not use block/unblock.
const POLL_INTERVAL: Milliseconds = 1;

/// See the [module docs](self).
pub struct Completion<T> {
    inner: Arc<CompletionInner<T>>,
}

struct CompletionInner<T> {
    slot: Mutex<Option<T>>,
    /// The caller's logical id, when the caller is known to the operating
    /// system service.
    caller: Option<Id>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("caller", &self.inner.caller)
            .finish()
    }
}

impl<T: Send> Completion<T> {
    /// Create a completion for the calling thread. Call this on the thread
    /// that will [`wait`](Completion::wait).
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CompletionInner {
                slot: Mutex::new(None),
                caller: OperatingSystem::instance().current_thread_id().ok(),
            }),
        }
    }

    /// Fill the slot and wake the caller. Call from the worker side, once.
    pub fn complete(&self, value: T) {
        // The slot must be visible before the wake, or the caller could wake
        // to an empty slot and park again for good.
        *lock_or_recover(&self.inner.slot) = Some(value);
        if let Some(caller) = self.inner.caller {
            let _ = OperatingSystem::instance().unblock(caller);
        }
    }

    /// Park until the worker side calls [`complete`](Completion::complete),
    /// then return the value.
    pub fn wait(&self) -> T {
        let os = OperatingSystem::instance();
        loop {
            if let Some(value) = lock_or_recover(&self.inner.slot).take() {
                return value;
            }
            match self.inner.caller {
                Some(_) => match os.block() {
                    // LimitReached: the wake raced ahead of the block. The
                    // slot check above is the loop exit, so just go around.
                    Ok(()) | Err(Error::LimitReached) => {}
                    Err(_) => {
                        let _ = os.delay(POLL_INTERVAL);
                    }
                },
                None => {
                    let _ = os.delay(POLL_INTERVAL);
                }
            }
        }
    }
}

impl<T: Send> Default for Completion<T> {
    fn default() -> Self { Self::new() }
}
