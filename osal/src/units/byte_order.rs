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

//! Byte-order helpers for wire formats. Network byte order is big endian;
//! host endianness is resolved at compile time and the payload is swapped
//! only when the host is little endian.

macro_rules! byte_order_pair {
    ($host_to_network:ident, $network_to_host:ident, $ty:ty) => {
        #[doc = concat!(
            "Convert a `", stringify!($ty),
            "` from host byte order to network byte order."
        )]
        #[must_use]
        pub fn $host_to_network(value: $ty) -> $ty {
            if cfg!(target_endian = "little") {
                value.swap_bytes()
            } else {
                value
            }
        }

        #[doc = concat!(
            "Convert a `", stringify!($ty),
            "` from network byte order to host byte order."
        )]
        #[must_use]
        pub fn $network_to_host(value: $ty) -> $ty {
            // The swap is an involution, so both directions share it.
            $host_to_network(value)
        }
    };
}

byte_order_pair!(host_to_network_u16, network_to_host_u16, u16);
byte_order_pair!(host_to_network_u32, network_to_host_u32, u32);
byte_order_pair!(host_to_network_u64, network_to_host_u64, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips() {
        assert_eq!(network_to_host_u16(host_to_network_u16(0xBEEF)), 0xBEEF);
        assert_eq!(
            network_to_host_u32(host_to_network_u32(0xDEAD_BEEF)),
            0xDEAD_BEEF
        );
        assert_eq!(
            network_to_host_u64(host_to_network_u64(0x0123_4567_89AB_CDEF)),
            0x0123_4567_89AB_CDEF
        );
    }

    #[test]
    fn test_network_order_is_big_endian() {
        let wire = host_to_network_u32(0x0A0B_0C0D);
        assert_eq!(wire.to_ne_bytes(), [0x0A, 0x0B, 0x0C, 0x0D]);

        let wire = host_to_network_u16(0x1122);
        assert_eq!(wire.to_ne_bytes(), [0x11, 0x22]);
    }
}
