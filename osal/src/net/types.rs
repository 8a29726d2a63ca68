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

//! Types shared by the network interface, clients, and servers.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallstr::SmallString;
use smallvec::SmallVec;
use strum_macros::{Display, FromRepr};

use crate::{Error, Result};

/// The maximum number of simultaneously accepted connections a hosted
/// network interface will carry.
pub const MAX_CONNECTIONS: usize = 10;

/// Inline capacity of a receive buffer before it spills to the heap.
pub const FRAME_INLINE_SIZE: usize = 256;

/// Payload buffer for transmit/receive. Stack allocated up to
/// [`FRAME_INLINE_SIZE`] bytes.
pub type FrameBuffer = SmallVec<[u8; FRAME_INLINE_SIZE]>;

/// Stack allocated hostname storage.
pub type HostName = SmallString<[u8; 64]>;

/// The protocol to use for an IP connection.
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
pub enum Protocol {
    #[default]
    Unknown = 0,
    /// Transmission Control Protocol.
    Tcp,
    /// User Datagram Protocol.
    Udp,
}

/// The IP version to use for a connection.
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
pub enum Version {
    #[default]
    Unknown = 0,
    /// Internet Protocol version 4.
    IPv4,
    /// Internet Protocol version 6.
    IPv6,
    /// Internet Protocol versions 4 and 6.
    IPv4v6,
}

/// The link technology of a network interface.
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
pub enum Technology {
    #[default]
    Unknown = 0,
    Wifi,
    Zigbee,
    Ethernet,
    Cellular,
}

/// The status of a network interface.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct NetworkStatus {
    /// True when the network is up and ready for use.
    pub is_up: bool,
    /// The technology of the network interface.
    pub technology: Technology,
}

/// The parameters used to configure a network interface, tagged by the kind
/// of link they describe. These cross the core as opaque data; only the
/// matching platform module interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigurationParameters {
    /// A wired interface bound to a named host interface (e.g. `eth0`).
    Wired { interface: String },
    /// The host loopback device. Useful for tests and same-host transports.
    Loopback,
}

impl ConfigurationParameters {
    /// The technology these parameters are meant for.
    #[must_use]
    pub fn technology(&self) -> Technology {
        match self {
            ConfigurationParameters::Wired { .. }
            | ConfigurationParameters::Loopback => Technology::Ethernet,
        }
    }
}

/// A MAC address as six octets.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Parse the canonical `aa:bb:cc:dd:ee:ff` form.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidParameter`] if the text is not six `:`-separated hex
    /// octets.
    pub fn parse(text: &str) -> Result<MacAddress> {
        let mut octets = [0u8; 6];
        let mut parts = text.trim().split(':');
        for octet in &mut octets {
            let part = parts.next().ok_or(Error::InvalidParameter)?;
            *octet = u8::from_str_radix(part, 16)
                .map_err(|_| Error::InvalidParameter)?;
        }
        if parts.next().is_some() {
            return Err(Error::InvalidParameter);
        }
        Ok(MacAddress(octets))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_address_round_trip() {
        let parsed = MacAddress::parse("de:ad:be:ef:00:2a").unwrap();
        assert_eq!(parsed, MacAddress([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x2A]));
        assert_eq!(parsed.to_string(), "de:ad:be:ef:00:2a");
    }

    #[test]
    fn test_mac_address_rejects_malformed_text() {
        assert_eq!(MacAddress::parse("de:ad"), Err(Error::InvalidParameter));
        assert_eq!(
            MacAddress::parse("de:ad:be:ef:00:2a:ff"),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            MacAddress::parse("zz:ad:be:ef:00:2a"),
            Err(Error::InvalidParameter)
        );
    }

    #[test]
    fn test_configuration_parameters_technology() {
        let wired = ConfigurationParameters::Wired {
            interface: "eth0".to_owned(),
        };
        assert_eq!(wired.technology(), Technology::Ethernet);
        assert_eq!(
            ConfigurationParameters::Loopback.technology(),
            Technology::Ethernet
        );
    }

    #[test]
    fn test_configuration_parameters_serde() {
        let wired = ConfigurationParameters::Wired {
            interface: "eth0".to_owned(),
        };
        let json = serde_json::to_string(&wired).unwrap();
        let parsed: ConfigurationParameters =
            serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, wired);
    }
}
