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

//! The abstract network interface capability.
//!
//! One implementation instance is one link, owned by one worker thread: the
//! thread that constructed it (and with it, its embedded [`EventQueue`]) and
//! that drives [`NetworkInterface::main_loop`]. Every socket syscall happens
//! on that thread: clients and servers never call socket APIs directly, they
//! submit closures through [`NetworkInterface::add_event`] and wait. This is
//! what makes a network interface a single-threaded executor and lets any
//! number of clients share one link without locking each other.
//!
//! The lifecycle is `configure -> init -> network_up -> [I/O] ->
//! network_down`.

use crate::{DecibelMilliWatts, Event, EventQueue, FrameBuffer, Milliseconds,
            Port, Result, Socket, net::types::{ConfigurationParameters,
                                               MacAddress, NetworkStatus,
                                               Protocol, Version}};

/// See the [module docs](self).
pub trait NetworkInterface: Send + Sync {
    /// The event queue embedded in this interface. Its owner is the worker
    /// thread.
    fn event_queue(&self) -> &EventQueue;

    /// Configure the interface before initializing it.
    ///
    /// # Errors
    ///
    /// Implementation defined; see the platform module.
    fn configure(&self, parameters: &ConfigurationParameters) -> Result<()>;

    /// Initialize the interface. Call [`NetworkInterface::configure`] first.
    ///
    /// # Errors
    ///
    /// [`Error::PrerequisitesNotMet`](crate::Error::PrerequisitesNotMet) when
    /// not configured.
    fn init(&self) -> Result<()>;

    /// Bring the interface up so that it is ready for use.
    ///
    /// # Errors
    ///
    /// Implementation defined; see the platform module.
    fn network_up(&self) -> Result<()>;

    /// Bring the interface down. Open sockets are closed.
    ///
    /// # Errors
    ///
    /// Implementation defined; see the platform module.
    fn network_down(&self) -> Result<()>;

    /// Resolve `host_name` and connect a new socket to it, waiting up to
    /// `timeout`. The connection can still complete after a timeout is
    /// reported.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`](crate::Error::Timeout) when the deadline expires.
    /// - [`Error::NotSupported`](crate::Error::NotSupported) for IP versions
    ///   the platform build does not implement.
    fn connect_to(
        &self,
        host_name: &str,
        port: Port,
        protocol: Protocol,
        version: Version,
        timeout: Milliseconds,
    ) -> Result<Socket>;

    /// Close a single socket. Idempotent on
    /// [`NO_SOCKET`](crate::NO_SOCKET).
    ///
    /// # Errors
    ///
    /// Implementation defined; see the platform module.
    fn disconnect(&self, socket: Socket) -> Result<()>;

    /// Open a listener socket on `port`.
    ///
    /// # Errors
    ///
    /// Implementation defined; see the platform module.
    fn listen_to(
        &self,
        protocol: Protocol,
        version: Version,
        port: Port,
    ) -> Result<Socket>;

    /// Accept one connection on a listener, waiting up to `timeout`.
    ///
    /// # Errors
    ///
    /// - [`Error::LimitReached`](crate::Error::LimitReached) when the
    ///   connection table is full.
    /// - [`Error::Timeout`](crate::Error::Timeout) when nothing arrived in
    ///   time.
    fn accept_connection(
        &self,
        listener_socket: Socket,
        timeout: Milliseconds,
    ) -> Result<Socket>;

    /// Close an accepted or listener socket.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`](crate::Error::NoData) if the socket is unknown.
    fn close_connection(&self, socket: Socket) -> Result<()>;

    /// Transmit the whole frame on `socket` within `timeout`. The payload is
    /// bytes; nothing here interprets it.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`](crate::Error::Timeout) when the frame could not be
    /// fully written in time.
    fn transmit(
        &self,
        frame: &[u8],
        socket: Socket,
        timeout: Milliseconds,
    ) -> Result<()>;

    /// Receive at most `buffer_size` bytes from `socket` within `timeout`.
    /// The returned buffer holds exactly the bytes read.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`](crate::Error::Timeout) when no data arrived in
    ///   time.
    /// - [`Error::NoData`](crate::Error::NoData) for a zero-sized buffer.
    fn receive(
        &self,
        buffer_size: usize,
        socket: Socket,
        timeout: Milliseconds,
    ) -> Result<FrameBuffer>;

    /// The MAC address of this interface. Best effort.
    ///
    /// # Errors
    ///
    /// [`Error::Negative`](crate::Error::Negative) when no address is
    /// available.
    fn mac_address(&self) -> Result<MacAddress>;

    /// The signal strength of this interface. Best effort.
    ///
    /// # Errors
    ///
    /// [`Error::Negative`](crate::Error::Negative) when the link has no
    /// meaningful RSSI (e.g. wired ethernet).
    fn signal_strength(&self) -> Result<DecibelMilliWatts>;

    /// The current status of the interface.
    fn status(&self) -> NetworkStatus;

    /// Submit a work item to this interface's worker. Submissions from the
    /// worker itself run inline.
    ///
    /// # Errors
    ///
    /// See [`EventQueue::add_event`].
    fn add_event(&self, event: Event) -> Result<()> {
        self.event_queue().add_event(event)
    }

    /// Run the next queued work item. Call from the worker thread.
    ///
    /// # Errors
    ///
    /// See [`EventQueue::run_next_event`].
    fn run_next_event(&self) -> Result<()> { self.event_queue().run_next_event() }

    /// One pass of the worker's main loop.
    ///
    /// # Errors
    ///
    /// See [`EventQueue::main_loop`].
    fn main_loop(&self) -> Result<()> { self.event_queue().main_loop() }
}
