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

//! The "none" network interface: a stub platform module.
//!
//! Ports in progress link against this so that application code compiles and
//! runs before a real network module lands. Lifecycle calls succeed so state
//! machines can be exercised; every I/O operation reports
//! [`Error::NotImplemented`].

use std::sync::Mutex;

use crate::{DecibelMilliWatts, Error, EventQueue, FrameBuffer, Milliseconds,
            Port, Result, Socket, ok,
            net::{interface::NetworkInterface,
                  types::{ConfigurationParameters, MacAddress, NetworkStatus,
                          Protocol, Version}},
            sync::lock_or_recover};

/// See the [module docs](self).
#[derive(Debug)]
pub struct NoneNetworkInterface {
    event_queue: EventQueue,
    status: Mutex<NetworkStatus>,
}

impl NoneNetworkInterface {
    /// Create a stub interface owned by the calling thread.
    ///
    /// # Errors
    ///
    /// Propagates event queue creation failures.
    pub fn new() -> Result<Self> {
        ok!(Self {
            event_queue: EventQueue::new()?,
            status: Mutex::new(NetworkStatus::default()),
        })
    }
}

impl NetworkInterface for NoneNetworkInterface {
    fn event_queue(&self) -> &EventQueue { &self.event_queue }

    fn configure(&self, parameters: &ConfigurationParameters) -> Result<()> {
        lock_or_recover(&self.status).technology = parameters.technology();
        ok!()
    }

    fn init(&self) -> Result<()> { ok!() }

    fn network_up(&self) -> Result<()> {
        lock_or_recover(&self.status).is_up = true;
        ok!()
    }

    fn network_down(&self) -> Result<()> {
        lock_or_recover(&self.status).is_up = false;
        ok!()
    }

    fn connect_to(
        &self,
        _host_name: &str,
        _port: Port,
        _protocol: Protocol,
        _version: Version,
        _timeout: Milliseconds,
    ) -> Result<Socket> {
        Err(Error::NotImplemented)
    }

    fn disconnect(&self, _socket: Socket) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn listen_to(
        &self,
        _protocol: Protocol,
        _version: Version,
        _port: Port,
    ) -> Result<Socket> {
        Err(Error::NotImplemented)
    }

    fn accept_connection(
        &self,
        _listener_socket: Socket,
        _timeout: Milliseconds,
    ) -> Result<Socket> {
        Err(Error::NotImplemented)
    }

    fn close_connection(&self, _socket: Socket) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn transmit(
        &self,
        _frame: &[u8],
        _socket: Socket,
        _timeout: Milliseconds,
    ) -> Result<()> {
        Err(Error::NotImplemented)
    }

    fn receive(
        &self,
        _buffer_size: usize,
        _socket: Socket,
        _timeout: Milliseconds,
    ) -> Result<FrameBuffer> {
        Err(Error::NotImplemented)
    }

    fn mac_address(&self) -> Result<MacAddress> { Err(Error::NotImplemented) }

    fn signal_strength(&self) -> Result<DecibelMilliWatts> {
        Err(Error::NotImplemented)
    }

    fn status(&self) -> NetworkStatus { *lock_or_recover(&self.status) }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::IpClient;

    #[test]
    fn test_lifecycle_succeeds_io_is_not_implemented() {
        let network = NoneNetworkInterface::new().unwrap();
        network.configure(&ConfigurationParameters::Loopback).unwrap();
        network.init().unwrap();
        network.network_up().unwrap();
        assert!(network.status().is_up);

        assert_eq!(
            network.connect_to("anywhere", 1, Protocol::Tcp, Version::IPv4, 10),
            Err(Error::NotImplemented)
        );
        assert_eq!(network.transmit(b"x", 3, 10), Err(Error::NotImplemented));

        network.network_down().unwrap();
        assert!(!network.status().is_up);
    }

    #[test]
    fn test_client_on_stub_interface() {
        let network = Arc::new(NoneNetworkInterface::new().unwrap());
        let mut client = IpClient::new(network);

        // The interface owner is this thread, so the connect event runs
        // inline and the stub's answer comes straight back.
        assert_eq!(
            client.connect_to("anywhere", 1, Protocol::Tcp, Version::IPv4, 10),
            Err(Error::NotImplemented)
        );
        assert!(!client.is_connected());
    }
}
