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

//! Software timers driven by one dedicated service thread.
//!
//! A started timer first fires at now + the start timeout; an auto-reload
//! timer then keeps firing every period, while a one-shot timer deletes
//! itself after its callback has run. Callbacks execute on the timer service
//! thread (the "platform timer context") and must not block.

use std::{fmt,
          sync::{Arc, Condvar, Mutex, OnceLock, PoisonError},
          time::{Duration, Instant}};

use crate::{Error, Id, Milliseconds, NULL_ID, OperatingSystem, Result, ok,
            sync::lock_or_recover};

type TimerCallback = Arc<dyn Fn() + Send + Sync + 'static>;

pub(crate) struct TimerService {
    shared: Arc<TimerServiceShared>,
    worker_started: OnceLock<()>,
}

impl Default for TimerService {
    fn default() -> Self {
        Self {
            shared: Arc::new(TimerServiceShared {
                state: Mutex::new(TimerServiceState {
                    timers: Vec::new(),
                    next_id: NULL_ID + 1,
                }),
                wakeup: Condvar::new(),
            }),
            worker_started: OnceLock::new(),
        }
    }
}

impl fmt::Debug for TimerService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock_or_recover(&self.shared.state);
        f.debug_struct("TimerService")
            .field("timers", &state.timers.len())
            .field("next_id", &state.next_id)
            .finish()
    }
}

struct TimerServiceShared {
    state: Mutex<TimerServiceState>,
    wakeup: Condvar,
}

struct TimerServiceState {
    timers: Vec<TimerRecord>,
    next_id: Id,
}

struct TimerRecord {
    id: Id,
    period: Milliseconds,
    auto_reload: bool,
    callback: TimerCallback,
    /// `None` while the timer is stopped.
    next_fire: Option<Instant>,
    is_suspended: bool,
}

impl TimerService {
    fn ensure_worker(&self) {
        self.worker_started.get_or_init(|| {
            let shared = self.shared.clone();
            let spawn_result = std::thread::Builder::new()
                .name("osalTimerSvc".to_owned())
                .spawn(move || run_timer_service(&shared));
            if let Err(spawn_error) = spawn_result {
                tracing::error!(
                    %spawn_error,
                    "could not spawn the timer service thread"
                );
            }
        });
    }
}

impl OperatingSystem {
    /// Create a timer. The timer is created stopped; arm it with
    /// [`OperatingSystem::start_timer`].
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds; the id is stable until the timer is
    /// deleted.
    pub fn create_timer(
        &self,
        period: Milliseconds,
        auto_reload: bool,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> Result<Id> {
        self.timers.ensure_worker();
        let mut state = lock_or_recover(&self.timers.shared.state);
        let id = state.next_id;
        state.next_id += 1;
        state.timers.push(TimerRecord {
            id,
            period,
            auto_reload,
            callback: Arc::new(callback),
            next_fire: None,
            is_suspended: true,
        });
        ok!(id)
    }

    /// Delete a timer. A running timer is cancelled.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the id does not exist (e.g. a one-shot that
    /// already fired and deleted itself).
    pub fn delete_timer(&self, timer: Id) -> Result<()> {
        let mut state = lock_or_recover(&self.timers.shared.state);
        let before = state.timers.len();
        state.timers.retain(|record| record.id != timer);
        if state.timers.len() == before {
            return Err(Error::NoData);
        }
        self.timers.shared.wakeup.notify_one();
        ok!()
    }

    /// Arm the timer: it first fires at now + `timeout`. An auto-reload timer
    /// then keeps firing every period; a one-shot fires once and deletes
    /// itself after the callback runs.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the id does not exist or has been deleted.
    pub fn start_timer(&self, timer: Id, timeout: Milliseconds) -> Result<()> {
        let mut state = lock_or_recover(&self.timers.shared.state);
        let record = state
            .timers
            .iter_mut()
            .find(|record| record.id == timer)
            .ok_or(Error::NoData)?;
        record.next_fire =
            Some(Instant::now() + Duration::from_millis(u64::from(timeout)));
        record.is_suspended = false;
        self.timers.shared.wakeup.notify_one();
        ok!()
    }

    /// Cancel a running timer. Stopping a stopped timer is a no-op.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the id does not exist.
    pub fn stop_timer(&self, timer: Id, _timeout: Milliseconds) -> Result<()> {
        let mut state = lock_or_recover(&self.timers.shared.state);
        let record = state
            .timers
            .iter_mut()
            .find(|record| record.id == timer)
            .ok_or(Error::NoData)?;
        if record.is_suspended {
            return ok!();
        }
        record.next_fire = None;
        record.is_suspended = true;
        self.timers.shared.wakeup.notify_one();
        ok!()
    }
}

/// The timer service loop: fire whatever is due, then sleep until the nearest
/// deadline (or until a timer is started/stopped/deleted).
fn run_timer_service(shared: &TimerServiceShared) {
    loop {
        let mut due: Vec<(Id, TimerCallback, bool)> = Vec::new();
        {
            let mut state = lock_or_recover(&shared.state);
            let now = Instant::now();
            for record in &mut state.timers {
                let Some(fire_at) = record.next_fire else { continue };
                if fire_at > now {
                    continue;
                }
                due.push((record.id, record.callback.clone(), record.auto_reload));
                record.next_fire = if record.auto_reload {
                    Some(fire_at + Duration::from_millis(u64::from(record.period)))
                } else {
                    None
                };
            }
        }

        // Callbacks run outside the state lock so they may create or start
        // other timers.
        for (id, callback, auto_reload) in due {
            callback();
            if !auto_reload {
                // One-shot timers self-delete after the callback has run.
                let mut state = lock_or_recover(&shared.state);
                state.timers.retain(|record| record.id != id);
            }
        }

        let state = lock_or_recover(&shared.state);
        let nearest = state
            .timers
            .iter()
            .filter_map(|record| record.next_fire)
            .min();
        match nearest {
            Some(fire_at) => {
                let now = Instant::now();
                if fire_at > now {
                    let _ = shared
                        .wakeup
                        .wait_timeout(state, fire_at - now)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
            None => {
                drop(
                    shared
                        .wakeup
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_one_shot_fires_once_and_self_deletes() {
        let os = OperatingSystem::instance();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_in_callback = fired.clone();

        let id = os
            .create_timer(50, false, move || {
                fired_in_callback.store(true, Ordering::SeqCst);
            })
            .unwrap();
        os.start_timer(id, 50).unwrap();

        os.delay(150).unwrap();
        assert!(fired.load(Ordering::SeqCst));
        // The id is no longer valid after the self-delete.
        assert_eq!(os.start_timer(id, 0), Err(Error::NoData));
        assert_eq!(os.delete_timer(id), Err(Error::NoData));
    }

    #[test]
    fn test_auto_reload_fires_repeatedly_until_stopped() {
        let os = OperatingSystem::instance();
        let fire_count = Arc::new(AtomicU32::new(0));
        let count_in_callback = fire_count.clone();

        let id = os
            .create_timer(10, true, move || {
                count_in_callback.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        os.start_timer(id, 10).unwrap();

        os.delay(105).unwrap();
        os.stop_timer(id, 0).unwrap();
        let after_stop = fire_count.load(Ordering::SeqCst);
        assert!(after_stop >= 3, "fired {after_stop} times");

        // Stopped means no further callbacks.
        os.delay(50).unwrap();
        assert_eq!(fire_count.load(Ordering::SeqCst), after_stop);

        // Stopping twice is a no-op; the id stays valid until deleted.
        os.stop_timer(id, 0).unwrap();
        os.delete_timer(id).unwrap();
        assert_eq!(os.stop_timer(id, 0), Err(Error::NoData));
    }

    #[test]
    fn test_unstarted_timer_does_not_fire() {
        let os = OperatingSystem::instance();
        let fired = Arc::new(AtomicBool::new(false));
        let fired_in_callback = fired.clone();

        let id = os
            .create_timer(10, false, move || {
                fired_in_callback.store(true, Ordering::SeqCst);
            })
            .unwrap();

        os.delay(50).unwrap();
        assert!(!fired.load(Ordering::SeqCst));
        os.delete_timer(id).unwrap();
    }
}
