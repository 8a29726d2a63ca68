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

//! A per-owner FIFO of deferred work items: the reactor pattern.
//!
//! The thread that constructs an [`EventQueue`] is its **owner**: the thread
//! expected to drive [`EventQueue::main_loop`]. Submissions from any other
//! thread are appended to the FIFO and executed when the owner drains it.
//! Submissions **from the owner itself** execute inline before
//! [`EventQueue::add_event`] returns, so an owner calling through its own queue
//! neither deadlocks nor pays queue overhead, at the cost of interleaving
//! with an in-progress drain (intentional, and covered by tests).
//!
//! Take care not to create the queue on a thread that will not run the main
//! loop, or nothing will ever be able to skip queuing. Embedding types (e.g.
//! a network interface) inherit this: the queue is created wherever they are
//! constructed.
//!
//! Mutation of the FIFO is guarded by a binary semaphore named
//! `"eventQSem<N>"` registered with the [`OperatingSystem`] semaphore table.
//! The semaphore is taken with a zero timeout: contention is reported as
//! [`Error::Timeout`], not waited out. Work items run outside the semaphore
//! so they can submit further events.

use std::{collections::VecDeque,
          sync::{Mutex, atomic::{AtomicU32, Ordering}},
          thread};

use crate::{Count, Error, FixedName, OperatingSystem, Result, ok,
            sync::lock_or_recover};

/// The maximum number of events that can be queued.
pub const MAX_EVENTS: usize = 10;

/// A type-erased work item. The return value propagates out of
/// [`EventQueue::run_next_event`] (or out of [`EventQueue::add_event`] on the
/// inline fast path).
pub type Event = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

/// The timeout for the queue's binary semaphore operations.
const SEMAPHORE_TIMEOUT: crate::Milliseconds = 0;

/// Process-wide counter used to generate unique semaphore names.
static SEMAPHORE_COUNT: AtomicU32 = AtomicU32::new(0);

/// See the [module docs](self).
pub struct EventQueue {
    events: Mutex<VecDeque<Event>>,
    binary_semaphore: FixedName,
    owner: thread::ThreadId,
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("events", &lock_or_recover(&self.events).len())
            .field("binary_semaphore", &self.binary_semaphore)
            .field("owner", &self.owner)
            .finish()
    }
}

impl EventQueue {
    /// Create an event queue owned by the calling thread.
    ///
    /// # Errors
    ///
    /// Propagates the error from registering the queue's binary semaphore.
    pub fn new() -> Result<Self> {
        let semaphore_number = SEMAPHORE_COUNT.fetch_add(1, Ordering::Relaxed) + 1;
        let binary_semaphore =
            FixedName::new(&format!("eventQSem{semaphore_number}"));
        OperatingSystem::instance().create_semaphore(
            1,
            1,
            binary_semaphore.as_str(),
        )?;
        ok!(Self {
            events: Mutex::new(VecDeque::with_capacity(MAX_EVENTS)),
            binary_semaphore,
            owner: thread::current().id(),
        })
    }

    /// The number of free event slots.
    #[must_use]
    pub fn events_available(&self) -> Count {
        (MAX_EVENTS - lock_or_recover(&self.events).len()) as Count
    }

    /// Add an event to the queue, or, when the caller is the owner thread,
    /// run it inline and return its result.
    ///
    /// Ownership of the event transfers to the queue if, and only if,
    /// `Ok(())` is returned from the queued path.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the binary semaphore is contended.
    /// - [`Error::LimitReached`] if [`MAX_EVENTS`] events are queued.
    /// - The event's own error, when it ran inline.
    pub fn add_event(&self, event: Event) -> Result<()> {
        self.add_event_reclaim(event).map_err(|(error, _event)| error)
    }

    /// Like [`EventQueue::add_event`], but hands the event back when it could
    /// not be queued, so serialise-and-wait callers can treat semaphore
    /// contention as transient and resubmit. `Err((error, None))` means the
    /// event ran inline and failed.
    pub(crate) fn add_event_reclaim(
        &self,
        event: Event,
    ) -> std::result::Result<(), (Error, Option<Event>)> {
        let os = OperatingSystem::instance();
        if let Err(error) =
            os.wait_semaphore(self.binary_semaphore.as_str(), SEMAPHORE_TIMEOUT)
        {
            return Err((error, Some(event)));
        }

        let run_inline = thread::current().id() == self.owner;
        {
            let mut events = lock_or_recover(&self.events);
            if events.len() >= MAX_EVENTS {
                // A binary semaphore held by this thread always re-raises.
                let _ = os.increment_semaphore(self.binary_semaphore.as_str());
                return Err((Error::LimitReached, Some(event)));
            }
            if !run_inline {
                events.push_back(event);
                let _ = os.increment_semaphore(self.binary_semaphore.as_str());
                return Ok(());
            }
        }

        let _ = os.increment_semaphore(self.binary_semaphore.as_str());
        // Run outside the semaphore so the event can queue more events.
        match event() {
            Ok(()) => Ok(()),
            Err(error) => Err((error, None)),
        }
    }

    /// Run the next event in the queue.
    ///
    /// # Errors
    ///
    /// - [`Error::NoData`] if the queue is empty.
    /// - [`Error::Timeout`] if the binary semaphore is contended.
    /// - The error returned by the event's callback.
    pub fn run_next_event(&self) -> Result<()> {
        let os = OperatingSystem::instance();
        os.wait_semaphore(self.binary_semaphore.as_str(), SEMAPHORE_TIMEOUT)?;
        let front = lock_or_recover(&self.events).pop_front();
        os.increment_semaphore(self.binary_semaphore.as_str())?;

        // Run last, outside the semaphore: the event may add events or drain
        // further.
        match front {
            Some(event) => event(),
            None => Err(Error::NoData),
        }
    }

    /// One pass of the owner's main loop.
    ///
    /// # Errors
    ///
    /// Everything [`EventQueue::run_next_event`] returns, [`Error::NoData`]
    /// included; callers loop regardless.
    pub fn main_loop(&self) -> Result<()> { self.run_next_event() }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, atomic::{AtomicBool, Ordering}};

    use super::*;
    use crate::Priority;

    #[test]
    fn test_owner_submission_runs_inline() {
        let queue = EventQueue::new().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let ran_in_event = ran.clone();

        queue
            .add_event(Box::new(move || {
                ran_in_event.store(true, Ordering::SeqCst);
                ok!()
            }))
            .unwrap();

        // The event completed before add_event returned; nothing is queued.
        assert!(ran.load(Ordering::SeqCst));
        assert_eq!(queue.events_available(), MAX_EVENTS as Count);
        assert_eq!(queue.run_next_event(), Err(Error::NoData));
    }

    #[test]
    fn test_inline_error_propagates_out_of_add_event() {
        let queue = EventQueue::new().unwrap();
        let outcome = queue.add_event(Box::new(|| Err(Error::CrcMismatch)));
        assert_eq!(outcome, Err(Error::CrcMismatch));
    }

    #[test]
    fn test_external_submissions_queue_in_fifo_order() {
        let os = OperatingSystem::instance();
        let recorded: Arc<Mutex<Vec<char>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded_in_worker = recorded.clone();

        // The queue must be owned by a thread that is not this test thread,
        // so submissions from here take the FIFO path.
        let (queue_sender, queue_receiver) = std::sync::mpsc::channel();
        let (drain_sender, drain_receiver) = std::sync::mpsc::channel::<()>();
        os.create_thread(Priority::Normal, "eventOwner", 64 * 1024, move || {
            let queue = Arc::new(EventQueue::new().unwrap());

            // Owner submission: runs inline, before any queued event.
            let recorded = recorded_in_worker.clone();
            queue
                .add_event(Box::new(move || {
                    recorded.lock().unwrap().push('a');
                    ok!()
                }))
                .unwrap();

            queue_sender.send(queue.clone()).unwrap();

            // Wait for the external submissions, then drain.
            drain_receiver.recv().unwrap();
            while queue.main_loop() != Err(Error::NoData) {}
        })
        .unwrap();

        let queue = queue_receiver.recv().unwrap();
        for label in ['b', 'c', 'd'] {
            let recorded = recorded.clone();
            queue
                .add_event(Box::new(move || {
                    recorded.lock().unwrap().push(label);
                    ok!()
                }))
                .unwrap();
        }
        drain_sender.send(()).unwrap();

        os.join_thread("eventOwner").unwrap();
        os.delete_thread("eventOwner").unwrap();

        // The inline event completed first; external submissions kept their
        // submission order.
        assert_eq!(*recorded.lock().unwrap(), ['a', 'b', 'c', 'd']);
    }

    #[test]
    fn test_full_queue_is_limit_reached() {
        let os = OperatingSystem::instance();
        let (queue_sender, queue_receiver) = std::sync::mpsc::channel();
        let (done_sender, done_receiver) = std::sync::mpsc::channel::<()>();

        os.create_thread(Priority::Normal, "eventFullOwner", 64 * 1024, move || {
            let queue = Arc::new(EventQueue::new().unwrap());
            queue_sender.send(queue).unwrap();
            done_receiver.recv().unwrap();
        })
        .unwrap();

        let queue = queue_receiver.recv().unwrap();
        for _ in 0..MAX_EVENTS {
            queue.add_event(Box::new(|| ok!())).unwrap();
        }
        assert_eq!(queue.events_available(), 0);
        assert_eq!(
            queue.add_event(Box::new(|| ok!())),
            Err(Error::LimitReached)
        );

        // Drain from here is allowed (any thread may run events); the owner
        // just gets the inline fast path.
        for _ in 0..MAX_EVENTS {
            queue.run_next_event().unwrap();
        }
        assert_eq!(queue.run_next_event(), Err(Error::NoData));

        done_sender.send(()).unwrap();
        os.join_thread("eventFullOwner").unwrap();
        os.delete_thread("eventFullOwner").unwrap();
    }
}
