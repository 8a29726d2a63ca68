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

//! Transparent quantity aliases for enhanced readability. These deliberately
//! stay plain integer aliases (not newtypes) so that they compose with the
//! syscall surfaces they are handed to without conversion noise.

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumCount, FromRepr};

// -------------------------------Time
/// Microseconds (μs).
pub type Microseconds = u64;
/// Milliseconds (ms).
pub type Milliseconds = u32;
/// Seconds (s).
pub type Seconds = u32;
/// Unix time (seconds since 1970-01-01 UTC).
pub type UnixTime = u32;
/// CPU tick. Use the system tick rate to convert to elapsed time.
pub type Ticks = u32;

// -------------------------------Storage sizes
/// Bytes (B).
pub type Bytes = u32;

// -------------------------------Physical quantities
/// Decibel milliwatts (dBm).
pub type DecibelMilliWatts = i16;

// -------------------------------Number representations
/// Percentage (%).
pub type Percent = f32;

// -------------------------------Algorithms
/// A count of things (retries, messages, connections, ...).
pub type Count = u32;
/// Identification number. Logical ids handed out by the operating system
/// service start at 1; see [`NULL_ID`].
pub type Id = u32;
/// The null id that will never be used to identify a thread or timer.
pub const NULL_ID: Id = 0;

// -------------------------------Networks
/// Network port number.
pub type Port = u16;
/// Network socket handle. Signed so that [`NO_SOCKET`] can mark "no socket".
pub type Socket = i32;
/// The sentinel for an unbound [`Socket`].
pub const NO_SOCKET: Socket = -1;
/// IP version 4 address in host byte order.
pub type Ipv4Address = u32;

/// Hardware peripheral number. Refers to the index given to the hardware
/// peripheral being used. Peripheral numbers do not change at runtime; the
/// operating system exposes no device paths, so platform driver modules map
/// these to their own identifiers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumCount,
    FromRepr,
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum PeripheralNumber {
    Zero = 0,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Ten,
    /// Unknown and invalid peripheral number.
    #[default]
    Unknown,
}

/// First octet of an IPv4 address (`123.xxx.xxx.xxx`).
#[must_use]
pub const fn ipv4_address_octet_1(address: Ipv4Address) -> u8 {
    ((address >> 24) & 0xFF) as u8
}

/// Second octet of an IPv4 address (`xxx.123.xxx.xxx`).
#[must_use]
pub const fn ipv4_address_octet_2(address: Ipv4Address) -> u8 {
    ((address >> 16) & 0xFF) as u8
}

/// Third octet of an IPv4 address (`xxx.xxx.123.xxx`).
#[must_use]
pub const fn ipv4_address_octet_3(address: Ipv4Address) -> u8 {
    ((address >> 8) & 0xFF) as u8
}

/// Fourth octet of an IPv4 address (`xxx.xxx.xxx.123`).
#[must_use]
pub const fn ipv4_address_octet_4(address: Ipv4Address) -> u8 {
    (address & 0xFF) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_octets() {
        let address: Ipv4Address = 0xC0A8_0164; // 192.168.1.100
        assert_eq!(ipv4_address_octet_1(address), 192);
        assert_eq!(ipv4_address_octet_2(address), 168);
        assert_eq!(ipv4_address_octet_3(address), 1);
        assert_eq!(ipv4_address_octet_4(address), 100);
    }

    #[test]
    fn test_peripheral_number_repr() {
        assert_eq!(PeripheralNumber::from_repr(0), Some(PeripheralNumber::Zero));
        assert_eq!(PeripheralNumber::from_repr(10), Some(PeripheralNumber::Ten));
        assert_eq!(PeripheralNumber::from_repr(12), None);
    }
}
