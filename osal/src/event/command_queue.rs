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

//! A command queue: serialize a desired action's data for later processing.
//!
//! Where the [`EventQueue`](crate::EventQueue) carries type-erased callables,
//! a [`CommandQueue`] carries plain command data of one type, in a
//! fixed-capacity ring. Producers add commands from any thread; a consumer
//! drains them when it gets around to it. Nothing blocks: a full queue is
//! [`Error::LimitReached`], an empty one [`Error::NoData`].

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::{Count, Error, Result, ok, sync::lock_or_recover};

/// The maximum number of commands that can be in a queue at the same time.
pub const MAX_COMMAND_QUEUE_SIZE: usize = 8;

/// The status of a command queue.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct CommandQueueStatus {
    /// The number of commands currently queued.
    pub commands_queued: Count,
}

/// See the [module docs](self).
#[derive(Debug)]
pub struct CommandQueue<T, const N: usize = MAX_COMMAND_QUEUE_SIZE> {
    ring: Mutex<CommandRing<T, N>>,
}

#[derive(Debug)]
struct CommandRing<T, const N: usize> {
    storage: [Option<T>; N],
    first: usize,
    count: usize,
}

impl<T, const N: usize> Default for CommandQueue<T, N> {
    fn default() -> Self { Self::new() }
}

impl<T, const N: usize> CommandQueue<T, N> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ring: Mutex::new(CommandRing {
                storage: [(); N].map(|()| None),
                first: 0,
                count: 0,
            }),
        }
    }

    /// Add a command to the back of the queue.
    ///
    /// # Errors
    ///
    /// [`Error::LimitReached`] if the queue is full.
    pub fn add_to_queue(&self, command_data: T) -> Result<()> {
        let mut ring = lock_or_recover(&self.ring);
        if ring.count == N {
            return Err(Error::LimitReached);
        }
        let slot = (ring.first + ring.count) % N;
        ring.storage[slot] = Some(command_data);
        ring.count += 1;
        ok!()
    }

    /// Return and remove the next command in the queue.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if there are no commands in the queue.
    pub fn next_in_queue(&self) -> Result<T> {
        let mut ring = lock_or_recover(&self.ring);
        if ring.count == 0 {
            return Err(Error::NoData);
        }
        let slot = ring.first;
        let command_data = ring.storage[slot].take().ok_or(Error::Failure)?;
        ring.first = (ring.first + 1) % N;
        ring.count -= 1;
        ok!(command_data)
    }

    /// The status of the queue.
    pub fn status(&self) -> CommandQueueStatus {
        CommandQueueStatus {
            commands_queued: lock_or_recover(&self.ring).count as Count,
        }
    }
}

impl<T: Clone, const N: usize> CommandQueue<T, N> {
    /// Return the next command in the queue without removing it.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if there are no commands in the queue.
    pub fn peek_next_in_queue(&self) -> Result<T> {
        let ring = lock_or_recover(&self.ring);
        if ring.count == 0 {
            return Err(Error::NoData);
        }
        ring.storage[ring.first].clone().ok_or(Error::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order_and_peek() {
        let queue: CommandQueue<u32> = CommandQueue::new();
        queue.add_to_queue(1).unwrap();
        queue.add_to_queue(2).unwrap();
        queue.add_to_queue(3).unwrap();
        assert_eq!(queue.status().commands_queued, 3);

        assert_eq!(queue.peek_next_in_queue(), Ok(1));
        assert_eq!(queue.next_in_queue(), Ok(1));
        assert_eq!(queue.next_in_queue(), Ok(2));
        assert_eq!(queue.next_in_queue(), Ok(3));
        assert_eq!(queue.next_in_queue(), Err(Error::NoData));
        assert_eq!(queue.peek_next_in_queue(), Err(Error::NoData));
    }

    #[test]
    fn test_full_queue_is_limit_reached() {
        let queue: CommandQueue<u8, 2> = CommandQueue::new();
        queue.add_to_queue(1).unwrap();
        queue.add_to_queue(2).unwrap();
        assert_eq!(queue.add_to_queue(3), Err(Error::LimitReached));

        // Draining one re-opens a slot, and the ring keeps FIFO order.
        assert_eq!(queue.next_in_queue(), Ok(1));
        queue.add_to_queue(3).unwrap();
        assert_eq!(queue.next_in_queue(), Ok(2));
        assert_eq!(queue.next_in_queue(), Ok(3));
    }

    #[test]
    fn test_wraps_around_many_times() {
        let queue: CommandQueue<u32, 4> = CommandQueue::new();
        for value in 0..100u32 {
            queue.add_to_queue(value).unwrap();
            assert_eq!(queue.next_in_queue(), Ok(value));
        }
        assert_eq!(queue.status().commands_queued, 0);
    }
}
