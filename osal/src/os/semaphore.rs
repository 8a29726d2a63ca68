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

//! Named counting semaphores.
//!
//! On POSIX a named semaphore persists in the kernel until it is unlinked, so
//! the platform modules unlink-then-create to keep stale names from rejecting
//! a create. The portable table below keeps that discipline: creating a
//! semaphore under an existing name replaces it. The `/` prefix POSIX wants
//! on semaphore names is an internal detail of those modules and never
//! appears in this API.

use std::{collections::HashMap, sync::{Arc, Mutex}};

use crate::{Count, Error, FixedName, Milliseconds, OperatingSystem, Result,
            ok, sync::lock_or_recover};

/// Polling interval for [`OperatingSystem::wait_semaphore`] while the count
/// is exhausted.
const WAIT_POLL_INTERVAL: Milliseconds = 1;

#[derive(Debug, Default)]
pub(crate) struct SemaphoreTable {
    inner: Mutex<HashMap<FixedName, Arc<SemaphoreRecord>>>,
}

#[derive(Debug)]
struct SemaphoreRecord {
    max: Count,
    count: Mutex<Count>,
}

impl SemaphoreRecord {
    fn try_decrement(&self) -> bool {
        let mut count = lock_or_recover(&self.count);
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }
}

impl OperatingSystem {
    /// Create a counting semaphore with the given maximum and initial count.
    /// An existing semaphore under the same name is replaced.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `max` is zero or `initial > max`.
    pub fn create_semaphore(
        &self,
        max: Count,
        initial: Count,
        name: &str,
    ) -> Result<()> {
        if max == 0 || initial > max {
            return Err(Error::InvalidParameter);
        }
        let name = FixedName::new(name);
        let mut table = lock_or_recover(&self.semaphores.inner);
        table.insert(
            name,
            Arc::new(SemaphoreRecord {
                max,
                count: Mutex::new(initial),
            }),
        );
        ok!()
    }

    /// Delete the named semaphore.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the semaphore does not exist.
    pub fn delete_semaphore(&self, name: &str) -> Result<()> {
        let name = FixedName::new(name);
        let mut table = lock_or_recover(&self.semaphores.inner);
        table.remove(&name).map(|_| ()).ok_or(Error::NoData)
    }

    /// Decrement the named semaphore, waiting up to `timeout` for the count
    /// to become positive. The count is polled at 1 ms intervals while it is
    /// exhausted, so a zero timeout reports contention immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the count stayed zero past the deadline.
    /// - [`Error::NoData`] if the semaphore does not exist.
    pub fn wait_semaphore(
        &self,
        name: &str,
        timeout: Milliseconds,
    ) -> Result<()> {
        let record = self.find_semaphore(name)?;
        let mut time_remaining = timeout;
        loop {
            if record.try_decrement() {
                return ok!();
            }
            if time_remaining == 0 {
                return Err(Error::Timeout);
            }
            self.delay(WAIT_POLL_INTERVAL)?;
            time_remaining = time_remaining.saturating_sub(WAIT_POLL_INTERVAL);
        }
    }

    /// Raise the named semaphore's count by one, up to its maximum.
    ///
    /// # Errors
    ///
    /// - [`Error::Failure`] if the count is already at its maximum.
    /// - [`Error::NoData`] if the semaphore does not exist.
    pub fn increment_semaphore(&self, name: &str) -> Result<()> {
        let record = self.find_semaphore(name)?;
        let mut count = lock_or_recover(&record.count);
        if *count < record.max {
            *count += 1;
            ok!()
        } else {
            Err(Error::Failure)
        }
    }

    /// Try to decrement the named semaphore without blocking.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the count is zero.
    /// - [`Error::NoData`] if the semaphore does not exist.
    pub fn decrement_semaphore(&self, name: &str) -> Result<()> {
        let record = self.find_semaphore(name)?;
        if record.try_decrement() {
            ok!()
        } else {
            Err(Error::Timeout)
        }
    }

    fn find_semaphore(&self, name: &str) -> Result<Arc<SemaphoreRecord>> {
        let name = FixedName::new(name);
        let table = lock_or_recover(&self.semaphores.inner);
        table.get(&name).cloned().ok_or(Error::NoData)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;
    use crate::Priority;

    #[test]
    fn test_counting_semantics() {
        let os = OperatingSystem::instance();
        os.create_semaphore(2, 2, "semCount").unwrap();

        // Two decrements succeed, the third reports the exhausted count.
        os.wait_semaphore("semCount", 0).unwrap();
        os.decrement_semaphore("semCount").unwrap();
        assert_eq!(os.decrement_semaphore("semCount"), Err(Error::Timeout));

        // The count never exceeds the maximum.
        os.increment_semaphore("semCount").unwrap();
        os.increment_semaphore("semCount").unwrap();
        assert_eq!(os.increment_semaphore("semCount"), Err(Error::Failure));

        os.delete_semaphore("semCount").unwrap();
        assert_eq!(os.delete_semaphore("semCount"), Err(Error::NoData));
    }

    #[test]
    fn test_unknown_name_is_no_data() {
        let os = OperatingSystem::instance();
        assert_eq!(os.wait_semaphore("semMissing", 0), Err(Error::NoData));
        assert_eq!(os.increment_semaphore("semMissing"), Err(Error::NoData));
        assert_eq!(os.decrement_semaphore("semMissing"), Err(Error::NoData));
    }

    #[test]
    fn test_wait_times_out_then_succeeds_after_release() {
        let os = OperatingSystem::instance();
        os.create_semaphore(1, 0, "semRelease").unwrap();

        let before = std::time::Instant::now();
        assert_eq!(os.wait_semaphore("semRelease", 20), Err(Error::Timeout));
        assert!(before.elapsed() >= std::time::Duration::from_millis(20));

        let released = std::sync::Arc::new(AtomicBool::new(false));
        let released_in_thread = released.clone();
        os.create_thread(Priority::Normal, "semGiver", 64 * 1024, move || {
            let os = OperatingSystem::instance();
            os.delay(10).unwrap();
            os.increment_semaphore("semRelease").unwrap();
            released_in_thread.store(true, Ordering::SeqCst);
        })
        .unwrap();

        os.wait_semaphore("semRelease", 1000).unwrap();
        assert!(released.load(Ordering::SeqCst));

        os.join_thread("semGiver").unwrap();
        os.delete_thread("semGiver").unwrap();
        os.delete_semaphore("semRelease").unwrap();
    }

    #[test]
    fn test_create_replaces_existing_name() {
        let os = OperatingSystem::instance();
        os.create_semaphore(1, 0, "semReplace").unwrap();
        // Re-creating under the same name resets the count.
        os.create_semaphore(1, 1, "semReplace").unwrap();
        os.wait_semaphore("semReplace", 0).unwrap();
        os.delete_semaphore("semReplace").unwrap();
    }

    #[test]
    fn test_invalid_parameters() {
        let os = OperatingSystem::instance();
        assert_eq!(
            os.create_semaphore(0, 0, "semBad"),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            os.create_semaphore(1, 2, "semBad"),
            Err(Error::InvalidParameter)
        );
    }
}
