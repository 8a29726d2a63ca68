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

//! System time, the monotonic tick counter, and uptime accounting.
//!
//! The hosted tick base matches the classic `times(2)` / `_SC_CLK_TCK` rate
//! of 100 Hz. The tick counter is a wrapping 32-bit value; uptime survives
//! the wrap by accumulating seconds since the last observed rollover.

use std::{sync::Mutex,
          time::{Instant, SystemTime, UNIX_EPOCH}};

use crate::{Error, Milliseconds, OperatingSystem, Result, Seconds, Ticks,
            UnixTime, ok, sync::lock_or_recover};

/// Ticks per second of the hosted monotonic counter.
pub const TICK_RATE_HZ: u32 = 100;

#[derive(Debug)]
pub(crate) struct SystemClock {
    start: Instant,
    uptime: Mutex<UptimeState>,
}

#[derive(Debug, Default)]
struct UptimeState {
    accumulated: Seconds,
    since_last_rollover: Seconds,
}

impl SystemClock {
    pub(crate) fn new() -> Self {
        Self {
            start: Instant::now(),
            uptime: Mutex::new(UptimeState::default()),
        }
    }

    pub(crate) fn started_at(&self) -> Instant { self.start }
}

impl OperatingSystem {
    /// The current wall-clock time in seconds since the epoch.
    ///
    /// # Errors
    ///
    /// [`Error::Failure`] if the host clock reads before the epoch.
    pub fn get_system_time(&self) -> Result<UnixTime> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since_epoch| since_epoch.as_secs() as UnixTime)
            .map_err(|_| Error::Failure)
    }

    /// The current monotonic tick count. Wraps at 32 bits.
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds.
    pub fn get_system_tick(&self) -> Result<Ticks> {
        let elapsed_ms = self.clock.start.elapsed().as_millis() as u64;
        ok!((elapsed_ms.wrapping_mul(u64::from(TICK_RATE_HZ)) / 1000) as Ticks)
    }

    /// Convert a tick count to milliseconds using the platform tick rate.
    /// A u32 of milliseconds is narrower than a u32 of ticks, so the result
    /// saturates at [`Milliseconds::MAX`] rather than wrapping early.
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds.
    pub fn ticks_to_milliseconds(&self, ticks: Ticks) -> Result<Milliseconds> {
        let milliseconds = u64::from(ticks) * 1000 / u64::from(TICK_RATE_HZ);
        ok!(Milliseconds::try_from(milliseconds).unwrap_or(Milliseconds::MAX))
    }

    /// Convert milliseconds to a tick count using the platform tick rate.
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds.
    pub fn milliseconds_to_ticks(&self, milli: Milliseconds) -> Result<Ticks> {
        ok!((u64::from(milli) * u64::from(TICK_RATE_HZ) / 1000) as Ticks)
    }

    /// Seconds since the service was initialized. Keeps counting across tick
    /// counter rollovers by accumulating the seconds seen since the last
    /// rollover.
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds.
    pub fn uptime(&self) -> Result<Seconds> {
        let ticks = self.get_system_tick()?;
        // Straight to seconds: the millisecond conversion saturates well
        // before `Ticks` wraps, and the rollover detection below must fire
        // only on the genuine tick counter wraparound.
        let seconds_now = ticks / TICK_RATE_HZ;

        let mut state = lock_or_recover(&self.clock.uptime);
        let tick_count_has_rolled_over = seconds_now < state.since_last_rollover;
        if tick_count_has_rolled_over {
            state.accumulated = state.accumulated.wrapping_add(seconds_now);
        } else {
            state.accumulated = state
                .accumulated
                .wrapping_add(seconds_now - state.since_last_rollover);
        }
        state.since_last_rollover = seconds_now;
        ok!(state.accumulated)
    }
}
