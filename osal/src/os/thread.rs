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

//! Thread creation, identity, join, and the cooperative block/unblock
//! protocol.
//!
//! Every thread the service creates gets a stable logical [`Id`] (assigned
//! from 1) and a name-keyed record. The record is published **before** the
//! underlying scheduler can run the new thread, so a thread body that
//! immediately asks for [`OperatingSystem::current_thread_id`] always finds
//! itself.
//!
//! # The block/unblock contract
//!
//! [`OperatingSystem::block`] is a cooperative self-block on the calling
//! thread's private condition variable; any other thread resumes it with
//! [`OperatingSystem::unblock`]. When `unblock` lands **before** the target
//! has blocked, the next `block` returns immediately with
//! [`Error::LimitReached`] and the caller must retry. `LimitReached` twice in
//! a row means `unblock` already happened and the caller can safely proceed.
//! Keep this contract verbatim when porting; it exists so the state stays a
//! pair of booleans instead of a tri-state.

use std::{collections::HashMap,
          panic::{AssertUnwindSafe, catch_unwind},
          sync::{Arc, Condvar, Mutex, OnceLock},
          thread};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, FromRepr};

use crate::{Bytes, Error, FixedName, Id, NULL_ID, OperatingSystem, Result, ok,
            sync::lock_or_recover};

/// The maximum number of threads the service will track.
pub const MAX_THREADS: usize = 32;

/// The priority of a thread: the scheduler's preference for giving it CPU
/// time. Mapped onto each platform's native priority band (at least 5
/// levels).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Display,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum Priority {
    Highest,
    High,
    Normal,
    Low,
    Lowest,
}

/// The status of a thread.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Display,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum ThreadStatus {
    /// The status of the thread is unknown.
    #[default]
    Unknown,
    /// The thread is blocked.
    Blocked,
    /// The thread is terminated.
    Terminated,
    /// The thread is active.
    Active,
}

#[derive(Debug, Default)]
pub(crate) struct ThreadTable {
    inner: Mutex<ThreadTableInner>,
}

#[derive(Debug)]
struct ThreadTableInner {
    records: HashMap<FixedName, ThreadRecord>,
    next_id: Id,
}

impl Default for ThreadTableInner {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
            next_id: NULL_ID + 1,
        }
    }
}

#[derive(Debug)]
struct ThreadRecord {
    id: Id,
    shared: Arc<ThreadShared>,
    join_handle: Option<thread::JoinHandle<()>>,
}

/// State the spawned thread itself needs a handle to: its platform identity
/// (set by the thread before its body runs), its status tag, and the
/// block/unblock cell.
#[derive(Debug, Default)]
struct ThreadShared {
    platform_id: OnceLock<thread::ThreadId>,
    status: Mutex<ThreadStatus>,
    block: BlockCell,
}

#[derive(Debug, Default)]
struct BlockCell {
    state: Mutex<BlockState>,
    unblocked: Condvar,
}

#[derive(Debug, Default)]
struct BlockState {
    is_blocked: bool,
    pending_unblock: bool,
}

impl OperatingSystem {
    /// Create a new thread running `start_function`.
    ///
    /// The name must be unique and at most 16 bytes. The returned logical id
    /// is stable for the lifetime of the record and is what
    /// [`OperatingSystem::current_thread_id`] reports from inside the thread,
    /// even if the body starts running before this call returns.
    ///
    /// # Errors
    ///
    /// - [`Error::LimitReached`] once [`MAX_THREADS`] records exist.
    /// - [`Error::InvalidParameter`] if the name is already in use.
    /// - The platform-mapped spawn error otherwise.
    pub fn create_thread<F>(
        &self,
        priority: Priority,
        name: &str,
        stack_size: Bytes,
        start_function: F,
    ) -> Result<Id>
    where
        F: FnOnce() + Send + 'static,
    {
        let name = FixedName::new(name);
        let shared = Arc::new(ThreadShared {
            status: Mutex::new(ThreadStatus::Active),
            ..ThreadShared::default()
        });

        {
            let mut table = lock_or_recover(&self.threads.inner);
            if table.records.len() >= MAX_THREADS {
                return Err(Error::LimitReached);
            }
            if table.records.contains_key(&name) {
                return Err(Error::InvalidParameter);
            }
            let id = table.next_id;
            table.next_id += 1;
            // Publish before the scheduler may run the new thread.
            table.records.insert(
                name.clone(),
                ThreadRecord {
                    id,
                    shared: shared.clone(),
                    join_handle: None,
                },
            );
        }

        let spawn_shared = shared.clone();
        let spawn_result = thread::Builder::new()
            .name(name.as_str().to_owned())
            .stack_size(stack_size as usize)
            .spawn(move || {
                // Must happen before the body: a body that asks for its own
                // id looks itself up by this platform identity.
                let _ = spawn_shared.platform_id.set(thread::current().id());
                apply_native_priority(priority);

                if catch_unwind(AssertUnwindSafe(start_function)).is_err() {
                    tracing::error!(
                        thread = ?thread::current().name(),
                        "thread start function panicked"
                    );
                }

                *lock_or_recover(&spawn_shared.status) = ThreadStatus::Terminated;
            });

        let mut table = lock_or_recover(&self.threads.inner);
        match spawn_result {
            Ok(handle) => {
                let id = match table.records.get_mut(&name) {
                    Some(record) => {
                        record.join_handle = Some(handle);
                        record.id
                    }
                    // The record was deleted in the window between publishing
                    // and the spawn returning; the thread still runs.
                    None => return Err(Error::NoData),
                };
                self.set_thread_count(table.records.len());
                ok!(id)
            }
            Err(spawn_error) => {
                table.records.remove(&name);
                self.set_thread_count(table.records.len());
                Err(Error::from_io(&spawn_error))
            }
        }
    }

    /// Remove the bookkeeping for the named thread. Threads can not be
    /// forcibly killed; the running function must cooperate by observing
    /// [`OperatingSystem::is_deleted`].
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if no thread with this name exists.
    pub fn delete_thread(&self, name: &str) -> Result<()> {
        let name = FixedName::new(name);
        let mut table = lock_or_recover(&self.threads.inner);
        if table.records.remove(&name).is_none() {
            return Err(Error::NoData);
        }
        self.set_thread_count(table.records.len());
        ok!()
    }

    /// Block the calling thread until the named thread's start function
    /// returns.
    ///
    /// # Errors
    ///
    /// - [`Error::NoData`] if the name is unknown.
    /// - [`Error::InvalidParameter`] if the thread was already joined.
    pub fn join_thread(&self, name: &str) -> Result<()> {
        let name = FixedName::new(name);
        let handle = {
            let mut table = lock_or_recover(&self.threads.inner);
            let record = table.records.get_mut(&name).ok_or(Error::NoData)?;
            record.join_handle.take().ok_or(Error::InvalidParameter)?
        };
        // Join outside the table lock so the joined thread can keep using the
        // service while it winds down.
        handle.join().map_err(|_| Error::Failure)?;
        ok!()
    }

    /// The logical id of the named thread.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if no thread with this name has been created.
    pub fn thread_id(&self, name: &str) -> Result<Id> {
        let name = FixedName::new(name);
        let table = lock_or_recover(&self.threads.inner);
        table
            .records
            .get(&name)
            .map(|record| record.id)
            .ok_or(Error::NoData)
    }

    /// The logical id of the calling thread.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the caller was not created by this service (e.g.
    /// the process main thread).
    pub fn current_thread_id(&self) -> Result<Id> {
        let current = thread::current().id();
        let table = lock_or_recover(&self.threads.inner);
        table
            .records
            .values()
            .find(|record| record.shared.platform_id.get() == Some(&current))
            .map(|record| record.id)
            .ok_or(Error::NoData)
    }

    /// The status tag of the named thread.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if no thread with this name has been created.
    pub fn thread_status(&self, name: &str) -> Result<ThreadStatus> {
        let name = FixedName::new(name);
        let shared = {
            let table = lock_or_recover(&self.threads.inner);
            table
                .records
                .get(&name)
                .map(|record| record.shared.clone())
                .ok_or(Error::NoData)?
        };
        let status = *lock_or_recover(&shared.status);
        ok!(status)
    }

    /// Check whether the named thread's record has been removed. The service
    /// never deletes threads on its own; the application checks this and
    /// winds the thread down when it is safe to do so.
    ///
    /// # Errors
    ///
    /// [`Error::Negative`] while the record still exists.
    pub fn is_deleted(&self, name: &str) -> Result<()> {
        let name = FixedName::new(name);
        let table = lock_or_recover(&self.threads.inner);
        if table.records.contains_key(&name) {
            return Err(Error::Negative);
        }
        ok!()
    }

    /// Cooperatively block the calling thread until another thread calls
    /// [`OperatingSystem::unblock`] with its id. Spurious wakeups are
    /// filtered.
    ///
    /// # Errors
    ///
    /// - [`Error::LimitReached`] if `unblock` landed before this call; retry
    ///   per the contract in the [module docs](self).
    /// - [`Error::NoData`] if the caller was not created by this service.
    pub fn block(&self) -> Result<()> {
        let current = thread::current().id();
        let shared = {
            let table = lock_or_recover(&self.threads.inner);
            table
                .records
                .values()
                .find(|record| record.shared.platform_id.get() == Some(&current))
                .map(|record| record.shared.clone())
                .ok_or(Error::NoData)?
        };

        let mut state = lock_or_recover(&shared.block.state);
        if state.pending_unblock {
            state.pending_unblock = false;
            return Err(Error::LimitReached);
        }
        state.is_blocked = true;
        *lock_or_recover(&shared.status) = ThreadStatus::Blocked;
        while state.is_blocked {
            state = shared
                .block
                .unblocked
                .wait(state)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        drop(state);
        *lock_or_recover(&shared.status) = ThreadStatus::Active;
        ok!()
    }

    /// Resume a thread blocked in [`OperatingSystem::block`]. If the target
    /// is not blocked yet, the wakeup is remembered and its next `block`
    /// returns [`Error::LimitReached`].
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the id is unknown.
    pub fn unblock(&self, task: Id) -> Result<()> {
        let shared = {
            let table = lock_or_recover(&self.threads.inner);
            table
                .records
                .values()
                .find(|record| record.id == task)
                .map(|record| record.shared.clone())
                .ok_or(Error::NoData)?
        };

        let mut state = lock_or_recover(&shared.block.state);
        if state.is_blocked {
            state.is_blocked = false;
            shared.block.unblocked.notify_one();
        } else {
            state.pending_unblock = true;
        }
        ok!()
    }
}

/// Map the logical priority onto the POSIX `SCHED_FIFO` band: `max/2` for
/// `Highest` down to `max/2 - 4` for `Lowest`.
#[cfg(unix)]
fn to_posix_priority(priority: Priority, max: i32) -> i32 {
    let base = max / 2;
    match priority {
        Priority::Highest => base,
        Priority::High => base - 1,
        Priority::Normal => base - 2,
        Priority::Low => base - 3,
        Priority::Lowest => base - 4,
    }
}

/// Apply the native scheduling priority on the calling thread. Unprivileged
/// processes usually may not raise real-time priorities; the thread runs
/// either way, so a refusal is only logged.
#[cfg(unix)]
fn apply_native_priority(priority: Priority) {
    // SAFETY: pthread_self is always valid for the calling thread and the
    // sched_param struct is zero-initialized before the priority is written.
    unsafe {
        let policy = libc::SCHED_FIFO;
        let max = libc::sched_get_priority_max(policy);
        if max < 0 {
            return;
        }
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = to_posix_priority(priority, max);
        let return_code =
            libc::pthread_setschedparam(libc::pthread_self(), policy, &param);
        if return_code != 0 {
            tracing::debug!(
                return_code,
                %priority,
                "could not apply native thread priority"
            );
        }
    }
}

#[cfg(not(unix))]
fn apply_native_priority(_priority: Priority) {}
