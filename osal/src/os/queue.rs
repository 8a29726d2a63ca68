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

//! Named bounded queues with a fixed item size and capacity, for passing
//! small records between threads. `to_front` injects ahead of the FIFO;
//! `from_isr` selects the interrupt-safe dispatch on platforms where that
//! distinction exists and is accepted and ignored here.

use std::{collections::{HashMap, VecDeque},
          sync::{Arc, Condvar, Mutex, PoisonError},
          time::{Duration, Instant}};

use crate::{Bytes, Count, Error, FixedName, Milliseconds, OperatingSystem,
            Result, ok, sync::lock_or_recover};

#[derive(Debug, Default)]
pub(crate) struct QueueTable {
    inner: Mutex<HashMap<FixedName, Arc<QueueRecord>>>,
}

#[derive(Debug)]
struct QueueRecord {
    item_size: Bytes,
    capacity: Count,
    items: Mutex<VecDeque<Box<[u8]>>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl OperatingSystem {
    /// Create a queue that holds up to `capacity` items of exactly
    /// `item_size` bytes each. An existing queue under the same name is
    /// replaced.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if `item_size` or `capacity` is zero.
    pub fn create_queue(
        &self,
        name: &str,
        item_size: Bytes,
        capacity: Count,
    ) -> Result<()> {
        if item_size == 0 || capacity == 0 {
            return Err(Error::InvalidParameter);
        }
        let name = FixedName::new(name);
        let mut table = lock_or_recover(&self.queues.inner);
        table.insert(
            name,
            Arc::new(QueueRecord {
                item_size,
                capacity,
                items: Mutex::new(VecDeque::with_capacity(capacity as usize)),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
            }),
        );
        ok!()
    }

    /// Delete the named queue. Items still in it are dropped.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the queue does not exist.
    pub fn delete_queue(&self, name: &str) -> Result<()> {
        let name = FixedName::new(name);
        let mut table = lock_or_recover(&self.queues.inner);
        table.remove(&name).map(|_| ()).ok_or(Error::NoData)
    }

    /// Insert an item, waiting up to `timeout` for a free slot.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `item` is not exactly the queue's
    ///   item size.
    /// - [`Error::Timeout`] if the queue stayed full past the deadline.
    /// - [`Error::NoData`] if the queue does not exist.
    pub fn send_to_queue(
        &self,
        name: &str,
        item: &[u8],
        timeout: Milliseconds,
        to_front: bool,
        from_isr: bool,
    ) -> Result<()> {
        let record = self.find_queue(name)?;
        if item.len() != record.item_size as usize {
            return Err(Error::InvalidParameter);
        }
        let _ = from_isr; // No ISR context on hosted builds.

        let deadline = Instant::now() + Duration::from_millis(u64::from(timeout));
        let mut items = lock_or_recover(&record.items);
        while items.len() >= record.capacity as usize {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::Timeout);
            }
            let (guard, _wait_outcome) = record
                .not_full
                .wait_timeout(items, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            items = guard;
        }

        let boxed = item.to_vec().into_boxed_slice();
        if to_front {
            items.push_front(boxed);
        } else {
            items.push_back(boxed);
        }
        record.not_empty.notify_one();
        ok!()
    }

    /// Remove and return the item at the front of the queue, waiting up to
    /// `timeout` for one to arrive.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the queue stayed empty past the deadline.
    /// - [`Error::NoData`] if the queue does not exist.
    pub fn receive_from_queue(
        &self,
        name: &str,
        timeout: Milliseconds,
        from_isr: bool,
    ) -> Result<Vec<u8>> {
        let record = self.find_queue(name)?;
        let _ = from_isr;

        let mut items = wait_until_non_empty(&record, timeout)?;
        let item = items
            .pop_front()
            .map(|item| item.into_vec())
            .ok_or(Error::Failure)?;
        record.not_full.notify_one();
        ok!(item)
    }

    /// Copy the item at the front of the queue without removing it, waiting
    /// up to `timeout` for one to arrive.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the queue stayed empty past the deadline.
    /// - [`Error::NoData`] if the queue does not exist.
    pub fn peek_from_queue(
        &self,
        name: &str,
        timeout: Milliseconds,
        from_isr: bool,
    ) -> Result<Vec<u8>> {
        let record = self.find_queue(name)?;
        let _ = from_isr;

        let items = wait_until_non_empty(&record, timeout)?;
        let item = items.front().map(|item| item.to_vec()).ok_or(Error::Failure)?;
        ok!(item)
    }

    fn find_queue(&self, name: &str) -> Result<Arc<QueueRecord>> {
        let name = FixedName::new(name);
        let table = lock_or_recover(&self.queues.inner);
        table.get(&name).cloned().ok_or(Error::NoData)
    }
}

fn wait_until_non_empty<'a>(
    record: &'a QueueRecord,
    timeout: Milliseconds,
) -> Result<std::sync::MutexGuard<'a, VecDeque<Box<[u8]>>>> {
    let deadline = Instant::now() + Duration::from_millis(u64::from(timeout));
    let mut items = lock_or_recover(&record.items);
    while items.is_empty() {
        let now = Instant::now();
        if now >= deadline {
            return Err(Error::Timeout);
        }
        let (guard, _wait_outcome) = record
            .not_empty
            .wait_timeout(items, deadline - now)
            .unwrap_or_else(PoisonError::into_inner);
        items = guard;
    }
    ok!(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Priority;

    #[test]
    fn test_fifo_and_front_injection() {
        let os = OperatingSystem::instance();
        os.create_queue("queueOrder", 4, 8).unwrap();

        os.send_to_queue("queueOrder", &1u32.to_ne_bytes(), 0, false, false)
            .unwrap();
        os.send_to_queue("queueOrder", &2u32.to_ne_bytes(), 0, false, false)
            .unwrap();
        os.send_to_queue("queueOrder", &3u32.to_ne_bytes(), 0, true, false)
            .unwrap();

        // Front injection lands ahead of the FIFO, peek does not consume.
        let peeked = os.peek_from_queue("queueOrder", 0, false).unwrap();
        assert_eq!(peeked, 3u32.to_ne_bytes());

        let order: Vec<u32> = (0..3)
            .map(|_| {
                let item = os.receive_from_queue("queueOrder", 0, false).unwrap();
                u32::from_ne_bytes(item.try_into().unwrap())
            })
            .collect();
        assert_eq!(order, [3, 1, 2]);

        os.delete_queue("queueOrder").unwrap();
    }

    #[test]
    fn test_full_queue_times_out() {
        let os = OperatingSystem::instance();
        os.create_queue("queueFull", 1, 2).unwrap();
        os.send_to_queue("queueFull", &[1], 0, false, false).unwrap();
        os.send_to_queue("queueFull", &[2], 0, false, false).unwrap();
        assert_eq!(
            os.send_to_queue("queueFull", &[3], 20, false, false),
            Err(Error::Timeout)
        );
        os.delete_queue("queueFull").unwrap();
    }

    #[test]
    fn test_empty_queue_times_out() {
        let os = OperatingSystem::instance();
        os.create_queue("queueEmpty", 1, 2).unwrap();
        assert_eq!(
            os.receive_from_queue("queueEmpty", 20, false),
            Err(Error::Timeout)
        );
        assert_eq!(
            os.peek_from_queue("queueEmpty", 0, false),
            Err(Error::Timeout)
        );
        os.delete_queue("queueEmpty").unwrap();
    }

    #[test]
    fn test_wrong_item_size_is_rejected() {
        let os = OperatingSystem::instance();
        os.create_queue("queueSize", 4, 2).unwrap();
        assert_eq!(
            os.send_to_queue("queueSize", &[0u8; 3], 0, false, false),
            Err(Error::InvalidParameter)
        );
        os.delete_queue("queueSize").unwrap();
    }

    #[test]
    fn test_blocked_receive_wakes_on_send() {
        let os = OperatingSystem::instance();
        os.create_queue("queueWake", 1, 1).unwrap();

        os.create_thread(Priority::Normal, "queueSender", 64 * 1024, || {
            let os = OperatingSystem::instance();
            os.delay(10).unwrap();
            os.send_to_queue("queueWake", &[42], 100, false, false).unwrap();
        })
        .unwrap();

        let item = os.receive_from_queue("queueWake", 1000, false).unwrap();
        assert_eq!(item, [42]);

        os.join_thread("queueSender").unwrap();
        os.delete_thread("queueSender").unwrap();
        os.delete_queue("queueWake").unwrap();
    }

    #[test]
    fn test_unknown_queue_is_no_data() {
        let os = OperatingSystem::instance();
        assert_eq!(
            os.send_to_queue("queueMissing", &[0], 0, false, false),
            Err(Error::NoData)
        );
        assert_eq!(
            os.receive_from_queue("queueMissing", 0, false),
            Err(Error::NoData)
        );
    }
}
