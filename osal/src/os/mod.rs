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

//! # The operating system capability service
//!
//! A process-wide singleton that owns every thread, semaphore, timer, and
//! queue the application creates, keyed by fixed-capacity names and stable
//! logical ids. It layers over whatever scheduler the host provides; nothing
//! here invents scheduling policy.
//!
//! Get the singleton with [`OperatingSystem::instance`]. It is initialized
//! lazily on first use (a process-scope once-init, not a global constructor,
//! so there is no static-initialization-order hazard) and outlives every
//! other component in this crate.
//!
//! ```
//! use r3bl_osal::OperatingSystem;
//!
//! let os = OperatingSystem::instance();
//! let uptime = os.uptime().unwrap();
//! assert!(uptime < 60 * 60 * 24);
//! ```

// Connect to source file.
pub mod clock;
pub mod queue;
pub mod semaphore;
pub mod status;
pub mod thread;
pub mod timer;

// Re-export.
pub use clock::*;
pub use queue::*;
pub use semaphore::*;
pub use status::*;
pub use thread::*;
pub use timer::*;

use std::sync::{Mutex, OnceLock};

use serde::{Deserialize, Serialize};
use strum_macros::{Display, FromRepr};

use crate::{Error, Microseconds, Milliseconds, Result, UnixTime, ok,
            sync::lock_or_recover};

/// The maximum value for a counting semaphore.
pub const MAX_COUNTING_SEMAPHORE: crate::Count = 10;

/// The reason the processor was reset. Hosted builds report
/// [`ResetReason::PowerOn`]; MCU platform modules map their reset registers
/// onto the full set.
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
pub enum ResetReason {
    /// Reset reason can not be determined.
    #[default]
    Unknown,
    /// Reset due to power-on event.
    PowerOn,
    /// Reset by external pin.
    ExternalPin,
    /// Deliberate software reset.
    Software,
    /// Software reset due to exception/panic.
    Exception,
    /// Reset (software or hardware) due to interrupt watchdog.
    Watchdog,
    /// Reset after exiting deep sleep mode.
    DeepSleep,
    /// Brownout reset (software or hardware).
    BrownOut,
    /// Reset due to completion of an update.
    Update,
}

/// The process-wide operating system capability service. See the [module
/// docs](self) for the contract.
#[derive(Debug)]
pub struct OperatingSystem {
    pub(crate) threads: thread::ThreadTable,
    pub(crate) semaphores: semaphore::SemaphoreTable,
    pub(crate) queues: queue::QueueTable,
    pub(crate) timers: timer::TimerService,
    pub(crate) clock: clock::SystemClock,
    pub(crate) status: Mutex<OperatingSystemStatus>,
}

static SINGLETON: OnceLock<OperatingSystem> = OnceLock::new();

impl OperatingSystem {
    /// The singleton. Initialized on first call; never dropped.
    pub fn instance() -> &'static OperatingSystem {
        SINGLETON.get_or_init(OperatingSystem::new)
    }

    fn new() -> Self {
        Self {
            threads: thread::ThreadTable::default(),
            semaphores: semaphore::SemaphoreTable::default(),
            queues: queue::QueueTable::default(),
            timers: timer::TimerService::default(),
            clock: clock::SystemClock::new(),
            status: Mutex::new(OperatingSystemStatus::default()),
        }
    }

    /// Delay the calling thread by placing it in the blocking state.
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds; the signature leaves room for platforms
    /// whose tick granularity rejects very small delays.
    pub fn delay(&self, delay: Milliseconds) -> Result<()> {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(delay)));
        ok!()
    }

    /// Microsecond variant of [`OperatingSystem::delay`].
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds.
    pub fn delay_us(&self, delay: Microseconds) -> Result<()> {
        std::thread::sleep(std::time::Duration::from_micros(delay));
        ok!()
    }

    /// Start the scheduler. Hosted platforms are already scheduled by the
    /// time user code runs.
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] on hosted builds.
    pub fn start_scheduler(&self) -> Result<()> { Err(Error::NotAvailable) }

    /// Enter a nested critical section. On MCU platforms, calls nest and must
    /// balance with [`OperatingSystem::enable_all_interrupts`]; blocking
    /// primitives must not be called inside the section.
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] on hosted operating systems.
    pub fn disable_all_interrupts(&self) -> Result<()> {
        Err(Error::NotAvailable)
    }

    /// Leave a critical section entered by
    /// [`OperatingSystem::disable_all_interrupts`].
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] on hosted operating systems.
    pub fn enable_all_interrupts(&self) -> Result<()> {
        Err(Error::NotAvailable)
    }

    /// Perform a soft reset of the processor.
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] on hosted builds.
    pub fn reset(&self) -> Result<()> { Err(Error::NotAvailable) }

    /// The reason for the last processor reset. There is no such thing on a
    /// hosted system, so the process start counts as a power-on.
    ///
    /// # Errors
    ///
    /// Infallible on hosted builds.
    pub fn reset_reason(&self) -> Result<ResetReason> { ok!(ResetReason::PowerOn) }

    /// Set the time of day. On systems that use POSIX you should not attempt
    /// to set the time of day; the time obtained from the host is already
    /// correct when the application starts.
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] on hosted builds.
    pub fn set_time_of_day(
        &self,
        _utc: UnixTime,
        _time_zone_difference_utc: i16,
    ) -> Result<()> {
        Err(Error::NotAvailable)
    }

    pub(crate) fn set_thread_count(&self, thread_count: usize) {
        lock_or_recover(&self.status).thread_count = thread_count as crate::Count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hosted_stubs() {
        let os = OperatingSystem::instance();
        assert_eq!(os.start_scheduler(), Err(Error::NotAvailable));
        assert_eq!(os.disable_all_interrupts(), Err(Error::NotAvailable));
        assert_eq!(os.enable_all_interrupts(), Err(Error::NotAvailable));
        assert_eq!(os.reset(), Err(Error::NotAvailable));
        assert_eq!(os.set_time_of_day(0, 0), Err(Error::NotAvailable));
        assert_eq!(os.reset_reason(), Ok(ResetReason::PowerOn));
    }

    #[test]
    fn test_delay_is_at_least_the_requested_time() {
        let os = OperatingSystem::instance();
        let before = std::time::Instant::now();
        os.delay(20).unwrap();
        assert!(before.elapsed() >= std::time::Duration::from_millis(20));
    }
}
