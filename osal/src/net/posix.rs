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

//! The hosted (POSIX) network interface.
//!
//! Sockets are non-blocking; every timeout is a bounded readiness wait on the
//! one [`mio::Poll`] instance this interface owns. Construct the interface on
//! its worker thread (construction captures event queue ownership) and drive
//! [`NetworkInterface::main_loop`] from that thread.
//!
//! Transient conditions (`EINTR`, spurious wakeups, `WouldBlock` after a
//! readiness event) are retried inside each call and never surface.

use std::{collections::HashMap,
          io::{Read, Write},
          net::{SocketAddr, ToSocketAddrs},
          os::fd::AsRawFd,
          sync::Mutex,
          time::{Duration, Instant}};

use mio::{Events, Interest, Poll, Token,
          net::{TcpListener, TcpStream, UdpSocket}};

use crate::{DecibelMilliWatts, Error, EventQueue, FrameBuffer,
            Milliseconds, Port, Result, Socket, ok,
            net::{interface::NetworkInterface,
                  types::{ConfigurationParameters, MAX_CONNECTIONS, MacAddress,
                          NetworkStatus, Protocol, Version}},
            sync::lock_or_recover};

/// See the [module docs](self).
#[derive(Debug)]
pub struct PosixNetworkInterface {
    event_queue: EventQueue,
    status: Mutex<NetworkStatus>,
    parameters: Mutex<Option<ConfigurationParameters>>,
    io: Mutex<IoState>,
}

#[derive(Debug)]
struct IoState {
    poll: Poll,
    events: Events,
    connections: HashMap<Socket, Connection>,
    listeners: HashMap<Socket, TcpListener>,
}

#[derive(Debug)]
enum Connection {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl PosixNetworkInterface {
    /// Create an interface owned by the calling thread.
    ///
    /// # Errors
    ///
    /// Propagates event queue and poll instance creation failures.
    pub fn new() -> Result<Self> {
        ok!(Self {
            event_queue: EventQueue::new()?,
            status: Mutex::new(NetworkStatus::default()),
            parameters: Mutex::new(None),
            io: Mutex::new(IoState {
                poll: Poll::new().map_err(|error| Error::from_io(&error))?,
                events: Events::with_capacity(8),
                connections: HashMap::new(),
                listeners: HashMap::new(),
            }),
        })
    }

    fn require_configured(&self) -> Result<()> {
        if lock_or_recover(&self.parameters).is_none() {
            return Err(Error::PrerequisitesNotMet);
        }
        ok!()
    }
}

impl NetworkInterface for PosixNetworkInterface {
    fn event_queue(&self) -> &EventQueue { &self.event_queue }

    fn configure(&self, parameters: &ConfigurationParameters) -> Result<()> {
        *lock_or_recover(&self.parameters) = Some(parameters.clone());
        lock_or_recover(&self.status).technology = parameters.technology();
        ok!()
    }

    fn init(&self) -> Result<()> { self.require_configured() }

    fn network_up(&self) -> Result<()> {
        self.require_configured()?;
        lock_or_recover(&self.status).is_up = true;
        ok!()
    }

    fn network_down(&self) -> Result<()> {
        lock_or_recover(&self.status).is_up = false;
        let mut io = lock_or_recover(&self.io);
        // Dropping the sockets closes them.
        io.connections.clear();
        io.listeners.clear();
        ok!()
    }

    fn connect_to(
        &self,
        host_name: &str,
        port: Port,
        protocol: Protocol,
        version: Version,
        timeout: Milliseconds,
    ) -> Result<Socket> {
        if version != Version::IPv4 {
            return Err(Error::NotSupported);
        }
        let address = resolve_ipv4(host_name, port)?;
        let deadline = deadline_after(timeout);
        let mut io = lock_or_recover(&self.io);
        let IoState {
            poll,
            events,
            connections,
            ..
        } = &mut *io;

        match protocol {
            Protocol::Tcp => {
                let mut stream = TcpStream::connect(address)
                    .map_err(|error| Error::from_io(&error))?;
                let socket = stream.as_raw_fd() as Socket;

                // Non-blocking connect: wait for writability, then surface
                // the queued socket error, if any.
                wait_ready(
                    poll,
                    events,
                    &mut stream,
                    Token(socket as usize),
                    Interest::WRITABLE,
                    deadline,
                )?;
                if let Some(socket_error) =
                    stream.take_error().map_err(|error| Error::from_io(&error))?
                {
                    tracing::warn!(
                        %host_name,
                        port,
                        %socket_error,
                        "connection failed"
                    );
                    return Err(Error::from_io(&socket_error));
                }

                connections.insert(socket, Connection::Tcp(stream));
                ok!(socket)
            }
            Protocol::Udp => {
                let local: SocketAddr = SocketAddr::from(([0, 0, 0, 0], 0));
                let udp = UdpSocket::bind(local)
                    .map_err(|error| Error::from_io(&error))?;
                udp.connect(address).map_err(|error| Error::from_io(&error))?;
                let socket = udp.as_raw_fd() as Socket;
                connections.insert(socket, Connection::Udp(udp));
                ok!(socket)
            }
            Protocol::Unknown => Err(Error::InvalidParameter),
        }
    }

    fn disconnect(&self, socket: Socket) -> Result<()> {
        if socket == crate::NO_SOCKET {
            return ok!();
        }
        let mut io = lock_or_recover(&self.io);
        // Removing the socket twice is the idempotent no-op.
        io.connections.remove(&socket);
        ok!()
    }

    fn listen_to(
        &self,
        protocol: Protocol,
        version: Version,
        port: Port,
    ) -> Result<Socket> {
        if version != Version::IPv4 {
            return Err(Error::NotSupported);
        }
        let local: SocketAddr = SocketAddr::from(([0, 0, 0, 0], port));
        let mut io = lock_or_recover(&self.io);

        match protocol {
            Protocol::Tcp => {
                let listener = TcpListener::bind(local)
                    .map_err(|error| Error::from_io(&error))?;
                let socket = listener.as_raw_fd() as Socket;
                io.listeners.insert(socket, listener);
                ok!(socket)
            }
            Protocol::Udp => {
                // A UDP "listener" is just a bound socket; receive from it
                // directly.
                let udp = UdpSocket::bind(local)
                    .map_err(|error| Error::from_io(&error))?;
                let socket = udp.as_raw_fd() as Socket;
                io.connections.insert(socket, Connection::Udp(udp));
                ok!(socket)
            }
            Protocol::Unknown => Err(Error::InvalidParameter),
        }
    }

    fn accept_connection(
        &self,
        listener_socket: Socket,
        timeout: Milliseconds,
    ) -> Result<Socket> {
        let deadline = deadline_after(timeout);
        let mut io = lock_or_recover(&self.io);
        let IoState {
            poll,
            events,
            connections,
            listeners,
        } = &mut *io;

        if connections.len() >= MAX_CONNECTIONS {
            return Err(Error::LimitReached);
        }
        let listener = listeners.get_mut(&listener_socket).ok_or(Error::NoData)?;

        loop {
            match listener.accept() {
                Ok((stream, _peer)) => {
                    let socket = stream.as_raw_fd() as Socket;
                    connections.insert(socket, Connection::Tcp(stream));
                    return ok!(socket);
                }
                Err(error)
                    if error.kind() == std::io::ErrorKind::WouldBlock =>
                {
                    wait_ready(
                        poll,
                        events,
                        listener,
                        Token(listener_socket as usize),
                        Interest::READABLE,
                        deadline,
                    )?;
                }
                Err(error)
                    if error.kind() == std::io::ErrorKind::Interrupted => {}
                Err(error) => return Err(Error::from_io(&error)),
            }
        }
    }

    fn close_connection(&self, socket: Socket) -> Result<()> {
        let mut io = lock_or_recover(&self.io);
        if io.connections.remove(&socket).is_some() {
            return ok!();
        }
        if io.listeners.remove(&socket).is_some() {
            return ok!();
        }
        Err(Error::NoData)
    }

    fn transmit(
        &self,
        frame: &[u8],
        socket: Socket,
        timeout: Milliseconds,
    ) -> Result<()> {
        let deadline = deadline_after(timeout);
        let mut io = lock_or_recover(&self.io);
        let IoState {
            poll,
            events,
            connections,
            ..
        } = &mut *io;
        let connection = connections.get_mut(&socket).ok_or(Error::NoData)?;

        match connection {
            Connection::Tcp(stream) => {
                let mut written = 0;
                while written < frame.len() {
                    match stream.write(&frame[written..]) {
                        Ok(0) => return Err(Error::PrerequisitesNotMet),
                        Ok(count) => written += count,
                        Err(error)
                            if error.kind()
                                == std::io::ErrorKind::WouldBlock =>
                        {
                            wait_ready(
                                poll,
                                events,
                                stream,
                                Token(socket as usize),
                                Interest::WRITABLE,
                                deadline,
                            )?;
                        }
                        Err(error)
                            if error.kind()
                                == std::io::ErrorKind::Interrupted => {}
                        Err(error) => return Err(Error::from_io(&error)),
                    }
                }
                let _ = stream.flush();
                ok!()
            }
            Connection::Udp(udp) => loop {
                match udp.send(frame) {
                    Ok(_) => return ok!(),
                    Err(error)
                        if error.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        wait_ready(
                            poll,
                            events,
                            udp,
                            Token(socket as usize),
                            Interest::WRITABLE,
                            deadline,
                        )?;
                    }
                    Err(error)
                        if error.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(error) => return Err(Error::from_io(&error)),
                }
            },
        }
    }

    fn receive(
        &self,
        buffer_size: usize,
        socket: Socket,
        timeout: Milliseconds,
    ) -> Result<FrameBuffer> {
        if buffer_size == 0 {
            return Err(Error::NoData);
        }
        let deadline = deadline_after(timeout);
        let mut io = lock_or_recover(&self.io);
        let IoState {
            poll,
            events,
            connections,
            ..
        } = &mut *io;
        let connection = connections.get_mut(&socket).ok_or(Error::NoData)?;

        let mut buffer = FrameBuffer::new();
        buffer.resize(buffer_size, 0);

        match connection {
            Connection::Tcp(stream) => loop {
                match stream.read(&mut buffer[..]) {
                    // An orderly peer close while we expect data means the
                    // link is gone.
                    Ok(0) => return Err(Error::PrerequisitesNotMet),
                    Ok(count) => {
                        buffer.truncate(count);
                        return ok!(buffer);
                    }
                    Err(error)
                        if error.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        wait_ready(
                            poll,
                            events,
                            stream,
                            Token(socket as usize),
                            Interest::READABLE,
                            deadline,
                        )?;
                    }
                    Err(error)
                        if error.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(error) => return Err(Error::from_io(&error)),
                }
            },
            Connection::Udp(udp) => loop {
                match udp.recv(&mut buffer[..]) {
                    Ok(count) => {
                        buffer.truncate(count);
                        return ok!(buffer);
                    }
                    Err(error)
                        if error.kind() == std::io::ErrorKind::WouldBlock =>
                    {
                        wait_ready(
                            poll,
                            events,
                            udp,
                            Token(socket as usize),
                            Interest::READABLE,
                            deadline,
                        )?;
                    }
                    Err(error)
                        if error.kind() == std::io::ErrorKind::Interrupted => {}
                    Err(error) => return Err(Error::from_io(&error)),
                }
            },
        }
    }

    #[cfg(target_os = "linux")]
    fn mac_address(&self) -> Result<MacAddress> {
        let entries = std::fs::read_dir("/sys/class/net")
            .map_err(|error| Error::from_io(&error))?;
        for entry in entries.flatten() {
            if entry.file_name() == "lo" {
                continue;
            }
            let address_path = entry.path().join("address");
            let Ok(text) = std::fs::read_to_string(address_path) else {
                continue;
            };
            if let Ok(address) = MacAddress::parse(&text) {
                if address != MacAddress::default() {
                    return ok!(address);
                }
            }
        }
        Err(Error::Negative)
    }

    #[cfg(not(target_os = "linux"))]
    fn mac_address(&self) -> Result<MacAddress> { Err(Error::Negative) }

    fn signal_strength(&self) -> Result<DecibelMilliWatts> {
        // Wired links have no meaningful RSSI.
        Err(Error::Negative)
    }

    fn status(&self) -> NetworkStatus { *lock_or_recover(&self.status) }
}

fn deadline_after(timeout: Milliseconds) -> Instant {
    Instant::now() + Duration::from_millis(u64::from(timeout))
}

/// Resolve a host name to its first IPv4 address.
fn resolve_ipv4(host_name: &str, port: Port) -> Result<SocketAddr> {
    let mut addresses = (host_name, port).to_socket_addrs().map_err(|error| {
        tracing::warn!(%host_name, %error, "could not resolve host");
        Error::Failure
    })?;
    addresses.find(SocketAddr::is_ipv4).ok_or(Error::Failure)
}

/// Register `source`, wait until it reports an event for `interest` or the
/// deadline passes, then deregister. Signals interrupting the poll are
/// retried within the deadline.
fn wait_ready(
    poll: &mut Poll,
    events: &mut Events,
    source: &mut impl mio::event::Source,
    token: Token,
    interest: Interest,
    deadline: Instant,
) -> Result<()> {
    if let Err(error) = poll.registry().register(source, token, interest) {
        return Err(Error::from_io(&error));
    }

    let outcome = loop {
        let now = Instant::now();
        if now >= deadline {
            break Err(Error::Timeout);
        }
        match poll.poll(events, Some(deadline - now)) {
            Err(error)
                if error.kind() == std::io::ErrorKind::Interrupted =>
            {
                continue;
            }
            Err(error) => break Err(Error::from_io(&error)),
            Ok(()) => {}
        }
        if events.iter().any(|event| event.token() == token) {
            break ok!();
        }
    };

    let _ = poll.registry().deregister(source);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_requires_configuration() {
        let network = PosixNetworkInterface::new().unwrap();
        assert_eq!(network.init(), Err(Error::PrerequisitesNotMet));
        assert_eq!(network.network_up(), Err(Error::PrerequisitesNotMet));

        network.configure(&ConfigurationParameters::Loopback).unwrap();
        network.init().unwrap();
        network.network_up().unwrap();
        assert!(network.status().is_up);

        network.network_down().unwrap();
        assert!(!network.status().is_up);
    }

    #[test]
    fn test_ipv6_is_not_supported() {
        let network = PosixNetworkInterface::new().unwrap();
        assert_eq!(
            network.connect_to("::1", 80, Protocol::Tcp, Version::IPv6, 100),
            Err(Error::NotSupported)
        );
        assert_eq!(
            network.listen_to(Protocol::Tcp, Version::IPv6, 0),
            Err(Error::NotSupported)
        );
    }

    #[test]
    fn test_disconnect_is_idempotent_on_no_socket() {
        let network = PosixNetworkInterface::new().unwrap();
        network.disconnect(crate::NO_SOCKET).unwrap();
        network.disconnect(crate::NO_SOCKET).unwrap();
    }

    #[test]
    fn test_unknown_sockets_report_no_data() {
        let network = PosixNetworkInterface::new().unwrap();
        assert_eq!(network.transmit(b"x", 12_345, 10), Err(Error::NoData));
        assert_eq!(
            network.receive(16, 12_345, 10).unwrap_err(),
            Error::NoData
        );
        assert_eq!(network.close_connection(12_345), Err(Error::NoData));
        assert_eq!(network.accept_connection(12_345, 10), Err(Error::NoData));
    }

    #[test]
    fn test_signal_strength_is_negative_for_wired() {
        let network = PosixNetworkInterface::new().unwrap();
        assert_eq!(network.signal_strength(), Err(Error::Negative));
    }
}
