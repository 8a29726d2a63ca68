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

//! An IP server: a listener socket plus the sockets it has accepted, all on
//! one network interface.
//!
//! Same event-queue discipline as the client, plus fan-out receive: pass
//! [`NO_SOCKET`] to receive from whichever accepted socket has data first,
//! polled in insertion order.
//!
//! State machine: Idle -> Listening -> Listening+Accepting -> closed.
//! Closing the listener returns to Idle. `active_connections` always equals
//! the number of accepted sockets.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{Bytes, Completion, Count, Error, Event, FrameBuffer,
            Milliseconds, NO_SOCKET, Port, Result, Socket, ok,
            net::{interface::NetworkInterface,
                  types::{MAX_CONNECTIONS, Protocol, Version}}};

/// The status of an IP server.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct IpServerStatus {
    /// True when the server is listening for connections.
    pub listening: bool,
    /// The number of simultaneous active connections.
    pub active_connections: Count,
}

/// See the [module docs](self).
#[derive(Debug)]
pub struct IpServer<N: NetworkInterface + 'static> {
    network: Arc<N>,
    listener_socket: Socket,
    connected_sockets: SmallVec<[Socket; MAX_CONNECTIONS]>,
    protocol: Protocol,
    version: Version,
    port: Port,
    status: IpServerStatus,
}

impl<N: NetworkInterface + 'static> IpServer<N> {
    /// Create an idle server on the given network interface. The interface
    /// must outlive the server; the shared handle enforces that.
    #[must_use]
    pub fn new(network: Arc<N>) -> Self {
        Self {
            network,
            listener_socket: NO_SOCKET,
            connected_sockets: SmallVec::new(),
            protocol: Protocol::default(),
            version: Version::default(),
            port: 0,
            status: IpServerStatus::default(),
        }
    }

    #[must_use]
    pub fn status(&self) -> IpServerStatus { self.status }

    #[must_use]
    pub fn listener_socket(&self) -> Socket { self.listener_socket }

    /// The accepted sockets, in acceptance order.
    #[must_use]
    pub fn connected_sockets(&self) -> &[Socket] { &self.connected_sockets }

    /// Open a listener on `port`. Any prior listener is closed first.
    ///
    /// # Errors
    ///
    /// The network's listen error, or the event queue's submission error.
    pub fn listen_to(
        &mut self,
        protocol: Protocol,
        version: Version,
        port: Port,
    ) -> Result<()> {
        if self.listener_socket != NO_SOCKET {
            let _ = self.close_connection(self.listener_socket);
        }

        let completion: Completion<Result<Socket>> = Completion::new();
        let network = self.network.clone();
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome = network.listen_to(protocol, version, port);
            let event_result = outcome.map(|_| ());
            event_completion.complete(outcome);
            event_result
        }))?;

        match completion.wait() {
            Ok(listener_socket) => {
                self.listener_socket = listener_socket;
                self.protocol = protocol;
                self.version = version;
                self.port = port;
                self.status.listening = true;
                ok!()
            }
            Err(error) => {
                self.status.listening = false;
                Err(error)
            }
        }
    }

    /// Accept one connection, waiting up to `timeout`, and record the new
    /// socket.
    ///
    /// # Errors
    ///
    /// - [`Error::PrerequisitesNotMet`] when not listening.
    /// - [`Error::LimitReached`] when the connection table is full.
    /// - [`Error::Timeout`] when nothing arrived in time.
    pub fn accept_connection(
        &mut self,
        timeout: Milliseconds,
    ) -> Result<Socket> {
        if !self.status.listening {
            return Err(Error::PrerequisitesNotMet);
        }
        if self.connected_sockets.len() >= MAX_CONNECTIONS {
            return Err(Error::LimitReached);
        }

        let completion: Completion<Result<Socket>> = Completion::new();
        let network = self.network.clone();
        let listener_socket = self.listener_socket;
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome = network.accept_connection(listener_socket, timeout);
            let event_result = outcome.map(|_| ());
            event_completion.complete(outcome);
            event_result
        }))?;

        let socket = completion.wait()?;
        self.connected_sockets.push(socket);
        self.status.active_connections = self.connected_sockets.len() as Count;
        ok!(socket)
    }

    /// Close an accepted socket or the listener. Closing the listener
    /// returns the server to idle.
    ///
    /// # Errors
    ///
    /// [`Error::NoData`] if the socket is neither accepted nor the listener.
    pub fn close_connection(&mut self, socket: Socket) -> Result<()> {
        let is_listener =
            socket != NO_SOCKET && socket == self.listener_socket;
        if !is_listener && !self.connected_sockets.contains(&socket) {
            return Err(Error::NoData);
        }

        let completion: Completion<Result<()>> = Completion::new();
        let network = self.network.clone();
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome = network.close_connection(socket);
            event_completion.complete(outcome);
            outcome
        }))?;

        completion.wait()?;
        if is_listener {
            self.listener_socket = NO_SOCKET;
            self.status.listening = false;
        } else {
            self.connected_sockets.retain(|kept| *kept != socket);
            self.status.active_connections =
                self.connected_sockets.len() as Count;
        }
        ok!()
    }

    /// Send `data` on one accepted socket, blocking the caller until done.
    ///
    /// # Errors
    ///
    /// The network's transmit error, or the event queue's submission error.
    pub fn send_blocking(
        &self,
        data: &[u8],
        timeout: Milliseconds,
        socket: Socket,
    ) -> Result<()> {
        let completion: Completion<Result<()>> = Completion::new();
        let network = self.network.clone();
        let frame: Vec<u8> = data.to_vec();
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome = network.transmit(&frame, socket, timeout);
            event_completion.complete(outcome);
            outcome
        }))?;
        completion.wait()
    }

    /// Receive from one socket, or, when `socket` is [`NO_SOCKET`], from the
    /// first accepted socket with data, polled in insertion order. Returns
    /// the buffer and the socket that produced it.
    ///
    /// # Errors
    ///
    /// - [`Error::NoData`] when there is nothing to receive from.
    /// - The last receive error when every socket came up empty.
    pub fn receive_blocking(
        &self,
        buffer_size: usize,
        timeout: Milliseconds,
        socket: Socket,
    ) -> Result<(FrameBuffer, Socket)> {
        let sockets = self.receive_candidates(socket)?;

        let completion: Completion<Result<(FrameBuffer, Socket)>> =
            Completion::new();
        let network = self.network.clone();
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome =
                receive_first(network.as_ref(), &sockets, buffer_size, timeout);
            let event_result = match &outcome {
                Ok(_) => ok!(),
                Err(error) => Err(*error),
            };
            event_completion.complete(outcome);
            event_result
        }))?;

        completion.wait()
    }

    /// Queue a send and return immediately. The callback runs on the worker
    /// thread with the transmit result and the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`Error::LimitReached`] when the event queue is full.
    pub fn send_non_blocking(
        &self,
        data: Arc<Vec<u8>>,
        timeout: Milliseconds,
        socket: Socket,
        callback: impl FnOnce(Result<Bytes>) + Send + 'static,
    ) -> Result<()> {
        let network = self.network.clone();
        self.submit(Box::new(move || {
            let outcome = network
                .transmit(&data, socket, timeout)
                .map(|()| data.len() as Bytes);
            let event_result = match &outcome {
                Ok(_) => ok!(),
                Err(error) => Err(*error),
            };
            callback(outcome);
            event_result
        }))
    }

    /// Queue a fan-out receive and return immediately. The callback runs on
    /// the worker thread with the buffer and the socket that produced it.
    ///
    /// # Errors
    ///
    /// - [`Error::NoData`] when there is nothing to receive from.
    /// - [`Error::LimitReached`] when the event queue is full.
    pub fn receive_non_blocking(
        &self,
        buffer_size: usize,
        timeout: Milliseconds,
        callback: impl FnOnce(Result<(FrameBuffer, Socket)>) + Send + 'static,
    ) -> Result<()> {
        let sockets = self.receive_candidates(NO_SOCKET)?;
        let network = self.network.clone();
        self.submit(Box::new(move || {
            let outcome =
                receive_first(network.as_ref(), &sockets, buffer_size, timeout);
            let event_result = match &outcome {
                Ok(_) => ok!(),
                Err(error) => Err(*error),
            };
            callback(outcome);
            event_result
        }))
    }

    /// Log the current status through the structured logger.
    pub fn print_status(&self) {
        tracing::info!(
            listening = self.status.listening,
            active_connections = self.status.active_connections,
            port = self.port,
            "IpServerStatus"
        );
    }

    fn receive_candidates(
        &self,
        socket: Socket,
    ) -> Result<SmallVec<[Socket; MAX_CONNECTIONS]>> {
        if socket == NO_SOCKET {
            if self.connected_sockets.is_empty() {
                return Err(Error::NoData);
            }
            ok!(self.connected_sockets.clone())
        } else {
            let mut single = SmallVec::new();
            single.push(socket);
            ok!(single)
        }
    }

    fn submit(&self, event: Event) -> Result<()> {
        let submitted = crate::net::ip_client::submit_with_retry(
            self.network.as_ref(),
            event,
        );
        if let Err(error) = submitted {
            tracing::warn!(%error, "could not add event to network queue");
            return Err(error);
        }
        ok!()
    }
}

/// Try each socket in order with the full timeout; the first one that yields
/// data wins. The last error is reported when none does.
fn receive_first<N: NetworkInterface>(
    network: &N,
    sockets: &[Socket],
    buffer_size: usize,
    timeout: Milliseconds,
) -> Result<(FrameBuffer, Socket)> {
    let mut last_error = Error::NoData;
    for socket in sockets {
        match network.receive(buffer_size, *socket, timeout) {
            Ok(buffer) => return ok!((buffer, *socket)),
            Err(error) => last_error = error,
        }
    }
    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PosixNetworkInterface;

    #[test]
    fn test_accept_requires_listening() {
        let network = Arc::new(PosixNetworkInterface::new().unwrap());
        let mut server = IpServer::new(network);
        assert_eq!(
            server.accept_connection(10),
            Err(Error::PrerequisitesNotMet)
        );
    }

    #[test]
    fn test_close_unknown_socket_is_no_data() {
        let network = Arc::new(PosixNetworkInterface::new().unwrap());
        let mut server = IpServer::new(network);
        assert_eq!(server.close_connection(1234), Err(Error::NoData));
    }

    #[test]
    fn test_fan_out_receive_with_no_connections_is_no_data() {
        let network = Arc::new(PosixNetworkInterface::new().unwrap());
        let server = IpServer::new(network);
        assert_eq!(
            server.receive_blocking(16, 10, NO_SOCKET).unwrap_err(),
            Error::NoData
        );
    }
}
