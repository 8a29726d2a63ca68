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

//! On-demand status introspection for the operating system service.

use serde::{Deserialize, Serialize};

use crate::{Count, Error, FixedName, OperatingSystem, Percent, Result,
            Seconds, UnixTime, ok, sync::lock_or_recover};

/// The free memory in a named memory region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRegionInfo {
    /// The name of the memory region.
    pub name: FixedName,
    /// The free memory in the region.
    pub free: Percent,
}

/// The aggregated status of the operating system, populated on demand by
/// [`OperatingSystem::status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingSystemStatus {
    /// The number of threads currently tracked.
    pub thread_count: Count,
    /// The percent of time the system spent idle. The exact definition varies
    /// with the underlying operating system.
    pub idle: Percent,
    /// The amount of time since the service was initialized.
    pub up_time: Seconds,
    /// Free memory on the system.
    pub memory_region: Vec<MemoryRegionInfo>,
    /// The current system time.
    pub system_time: UnixTime,
}

impl Default for OperatingSystemStatus {
    fn default() -> Self {
        Self {
            thread_count: 0,
            idle: -1.0,
            up_time: 0,
            memory_region: vec![MemoryRegionInfo {
                name: FixedName::new("heap"),
                free: 0.0,
            }],
            system_time: 0,
        }
    }
}

impl OperatingSystem {
    /// The status of the operating system. Pass `refresh = true` to
    /// repopulate every field before returning.
    pub fn status(&self, refresh: bool) -> OperatingSystemStatus {
        let mut status = lock_or_recover(&self.status);
        if refresh {
            if let Ok(system_time) = self.get_system_time() {
                status.system_time = system_time;
            }
            if let Ok(idle) = self.idle_percentage() {
                status.idle = idle;
            }
            if let Ok(up_time) = self.uptime() {
                status.up_time = up_time;
            }
            for region in &mut status.memory_region {
                let _ = self.memory_region_usage(region);
            }
        }
        status.clone()
    }

    /// Log the current status through the structured logger.
    pub fn print_status(&self) {
        let status = self.status(true);
        tracing::info!(
            thread_count = status.thread_count,
            idle_percent = status.idle,
            up_time_seconds = status.up_time,
            system_unix_time = status.system_time,
            "OperatingSystemStatus"
        );
        for region in &status.memory_region {
            tracing::info!(
                region = %region.name,
                free_percent = region.free,
                "MemoryRegion"
            );
        }
    }

    /// The percentage of time this process left the CPU idle: elapsed time
    /// not spent on CPU, over elapsed time.
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] off Linux, [`Error::Failure`] if the procfs
    /// fields can not be read.
    #[cfg(target_os = "linux")]
    pub fn idle_percentage(&self) -> Result<Percent> {
        let stat = std::fs::read_to_string("/proc/self/stat")
            .map_err(|error| Error::from_io(&error))?;
        // Skip past the parenthesized command name; it may contain spaces.
        let after_comm =
            stat.rsplit_once(')').map(|(_, rest)| rest).ok_or(Error::Failure)?;
        let fields: Vec<&str> = after_comm.split_whitespace().collect();
        // Field 14 (utime) and 15 (stime), 1-based in proc(5); the split
        // starts at field 3.
        let utime: u64 =
            fields.get(11).and_then(|f| f.parse().ok()).ok_or(Error::Failure)?;
        let stime: u64 =
            fields.get(12).and_then(|f| f.parse().ok()).ok_or(Error::Failure)?;

        let cpu_seconds =
            (utime + stime) as f32 / crate::TICK_RATE_HZ as f32;
        let elapsed_seconds = self.clock.started_at().elapsed().as_secs_f32();
        if elapsed_seconds <= 0.0 {
            return ok!(100.0);
        }
        ok!((100.0 - (cpu_seconds / elapsed_seconds) * 100.0).clamp(0.0, 100.0))
    }

    /// See the Linux variant.
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] on this platform.
    #[cfg(not(target_os = "linux"))]
    pub fn idle_percentage(&self) -> Result<Percent> {
        Err(Error::NotAvailable)
    }

    /// Update the free percentage of the given memory region. Only the
    /// `heap` region exists on hosted builds.
    ///
    /// # Errors
    ///
    /// [`Error::NotAvailable`] for unknown regions or off Linux;
    /// [`Error::Failure`] if the meminfo fields can not be read.
    pub fn memory_region_usage(
        &self,
        region: &mut MemoryRegionInfo,
    ) -> Result<()> {
        if region.name != *"heap" {
            return Err(Error::NotAvailable);
        }
        let (total, available) = read_meminfo()?;
        if total == 0 {
            return Err(Error::Failure);
        }
        region.free = (available as f32 / total as f32) * 100.0;
        ok!()
    }

    /// The software version, parsed from `git describe --tag` when this
    /// process runs inside a checkout. Digits and dots up to the first `-`.
    ///
    /// # Errors
    ///
    /// [`Error::Failure`] if git is unavailable or produces no tag.
    pub fn software_version(&self) -> Result<String> {
        let output = std::process::Command::new("git")
            .args(["describe", "--tag"])
            .output()
            .map_err(|error| Error::from_io(&error))?;
        if !output.status.success() {
            return Err(Error::Failure);
        }
        let raw = String::from_utf8(output.stdout).map_err(|_| Error::Failure)?;
        let version: String = raw
            .chars()
            .take_while(|character| *character != '-' && *character != '\n')
            .filter(|character| character.is_ascii_digit() || *character == '.')
            .collect();
        if version.is_empty() {
            return Err(Error::Failure);
        }
        ok!(version)
    }
}

/// `(MemTotal, MemAvailable)` in kilobytes.
#[cfg(target_os = "linux")]
fn read_meminfo() -> Result<(u64, u64)> {
    let meminfo = std::fs::read_to_string("/proc/meminfo")
        .map_err(|error| Error::from_io(&error))?;
    let mut total = None;
    let mut available = None;
    for line in meminfo.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            total = rest.trim().split_whitespace().next().and_then(|f| f.parse().ok());
        } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
            available =
                rest.trim().split_whitespace().next().and_then(|f| f.parse().ok());
        }
    }
    match (total, available) {
        (Some(total), Some(available)) => ok!((total, available)),
        _ => Err(Error::Failure),
    }
}

#[cfg(not(target_os = "linux"))]
fn read_meminfo() -> Result<(u64, u64)> { Err(Error::NotAvailable) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_refresh_populates_fields() {
        let os = OperatingSystem::instance();
        let status = os.status(true);
        // 2020-01-01 as a sanity floor for the wall clock.
        assert!(status.system_time > 1_577_836_800);
        assert_eq!(status.memory_region.len(), 1);
        assert_eq!(status.memory_region[0].name, FixedName::new("heap"));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_linux_introspection() {
        let os = OperatingSystem::instance();
        let idle = os.idle_percentage().unwrap();
        assert!((0.0..=100.0).contains(&idle));

        let mut region = MemoryRegionInfo {
            name: FixedName::new("heap"),
            free: 0.0,
        };
        os.memory_region_usage(&mut region).unwrap();
        assert!((0.0..=100.0).contains(&region.free));
    }

    #[test]
    fn test_unknown_memory_region() {
        let os = OperatingSystem::instance();
        let mut region = MemoryRegionInfo {
            name: FixedName::new("flash"),
            free: 0.0,
        };
        assert_eq!(
            os.memory_region_usage(&mut region),
            Err(Error::NotAvailable)
        );
    }

    #[test]
    fn test_status_serializes() {
        let status = OperatingSystemStatus::default();
        let json = serde_json::to_string(&status).unwrap();
        let parsed: OperatingSystemStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
