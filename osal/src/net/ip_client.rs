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

//! An IP client: one connected socket on one network interface.
//!
//! Every public operation follows the serialise-and-wait pattern: build a
//! closure that performs the underlying network call and completes a
//! [`Completion`], submit it to the network's event queue, and park the
//! caller until the worker signals. Multiple clients sharing one interface
//! serialise naturally through its queue.
//!
//! State machine: Disconnected -> Connected -> Disconnected. `send`/`receive`
//! are only valid while connected; any failure other than a timeout drops the
//! connection state (the link is considered gone).

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{Bytes, Completion, Error, Event, FrameBuffer, Milliseconds,
            NO_SOCKET, Port, Result, Socket, ok,
            net::{interface::NetworkInterface,
                  types::{HostName, Protocol, Version}}};

/// The status of an IP client.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct IpClientStatus {
    /// True when the client is connected to the host.
    pub connected: bool,
}

/// See the [module docs](self).
#[derive(Debug)]
pub struct IpClient<N: NetworkInterface + 'static> {
    network: Arc<N>,
    socket: Socket,
    protocol: Protocol,
    version: Version,
    host_name: HostName,
    port: Port,
    status: IpClientStatus,
}

impl<N: NetworkInterface + 'static> IpClient<N> {
    /// Create a disconnected client on the given network interface. The
    /// interface must outlive the client; the shared handle enforces that.
    #[must_use]
    pub fn new(network: Arc<N>) -> Self {
        Self {
            network,
            socket: NO_SOCKET,
            protocol: Protocol::default(),
            version: Version::default(),
            host_name: HostName::new(),
            port: 0,
            status: IpClientStatus::default(),
        }
    }

    #[must_use]
    pub fn status(&self) -> IpClientStatus { self.status }

    #[must_use]
    pub fn is_connected(&self) -> bool { self.status.connected }

    #[must_use]
    pub fn socket(&self) -> Socket { self.socket }

    /// Connect to a host. Any existing connection is closed first so no
    /// socket leaks.
    ///
    /// # Errors
    ///
    /// - The network's connect error (timeout included).
    /// - The event queue's submission error when the worker is saturated.
    pub fn connect_to(
        &mut self,
        host_name: &str,
        port: Port,
        protocol: Protocol,
        version: Version,
        timeout: Milliseconds,
    ) -> Result<()> {
        self.disconnect()?;

        let completion: Completion<Result<Socket>> = Completion::new();
        let network = self.network.clone();
        let event_host: String = host_name.to_owned();
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome =
                network.connect_to(&event_host, port, protocol, version, timeout);
            let event_result = outcome.map(|_| ());
            event_completion.complete(outcome);
            event_result
        }))?;

        match completion.wait() {
            Ok(socket) => {
                self.socket = socket;
                self.host_name = HostName::from_str(host_name);
                self.port = port;
                self.protocol = protocol;
                self.version = version;
                self.status.connected = true;
                ok!()
            }
            Err(error) => {
                self.status.connected = false;
                Err(error)
            }
        }
    }

    /// Close the socket, if any. Idempotent: a second disconnect is a
    /// successful no-op, and afterwards the socket is [`NO_SOCKET`] and the
    /// client reports not connected.
    ///
    /// # Errors
    ///
    /// The network's close error for a socket that was actually open.
    pub fn disconnect(&mut self) -> Result<()> {
        let mut result = ok!();
        if self.socket != NO_SOCKET {
            result = self.network.disconnect(self.socket);
            self.socket = NO_SOCKET;
        }
        self.status.connected = false;
        result
    }

    /// Send `data`, blocking the caller until the worker has written the
    /// whole frame or failed.
    ///
    /// # Errors
    ///
    /// - [`Error::PrerequisitesNotMet`] when not connected.
    /// - [`Error::Timeout`] when the deadline expired (stays connected).
    /// - Any other transmit error; the client transitions to disconnected.
    pub fn send_blocking(
        &mut self,
        data: &[u8],
        timeout: Milliseconds,
    ) -> Result<()> {
        if !self.status.connected {
            return Err(Error::PrerequisitesNotMet);
        }

        let completion: Completion<Result<()>> = Completion::new();
        let network = self.network.clone();
        let socket = self.socket;
        let frame: Vec<u8> = data.to_vec();
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome = network.transmit(&frame, socket, timeout);
            event_completion.complete(outcome);
            outcome
        }))?;

        let outcome = completion.wait();
        self.note_link_state(outcome.err());
        outcome
    }

    /// Receive at most `buffer_size` bytes, blocking the caller until data
    /// arrived or the deadline expired.
    ///
    /// # Errors
    ///
    /// - [`Error::PrerequisitesNotMet`] when not connected.
    /// - [`Error::Timeout`] when the deadline expired (stays connected).
    /// - Any other receive error; the client transitions to disconnected.
    pub fn receive_blocking(
        &mut self,
        buffer_size: usize,
        timeout: Milliseconds,
    ) -> Result<FrameBuffer> {
        if !self.status.connected {
            return Err(Error::PrerequisitesNotMet);
        }

        let completion: Completion<Result<FrameBuffer>> = Completion::new();
        let network = self.network.clone();
        let socket = self.socket;
        let event_completion = completion.clone();
        self.submit(Box::new(move || {
            let outcome = network.receive(buffer_size, socket, timeout);
            let event_result = match &outcome {
                Ok(_) => ok!(),
                Err(error) => Err(*error),
            };
            event_completion.complete(outcome);
            event_result
        }))?;

        let outcome = completion.wait();
        self.note_link_state(outcome.as_ref().err().copied());
        outcome
    }

    /// Queue a send and return immediately. The callback runs on the worker
    /// thread with the transmit result and the number of bytes written.
    ///
    /// # Errors
    ///
    /// - [`Error::PrerequisitesNotMet`] when not connected.
    /// - [`Error::LimitReached`] when the event queue is full.
    pub fn send_non_blocking(
        &self,
        data: Arc<Vec<u8>>,
        timeout: Milliseconds,
        callback: impl FnOnce(Result<Bytes>) + Send + 'static,
    ) -> Result<()> {
        if !self.status.connected {
            return Err(Error::PrerequisitesNotMet);
        }
        let network = self.network.clone();
        let socket = self.socket;
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

    /// Queue a receive and return immediately. The callback runs on the
    /// worker thread with the received buffer.
    ///
    /// # Errors
    ///
    /// - [`Error::PrerequisitesNotMet`] when not connected.
    /// - [`Error::LimitReached`] when the event queue is full.
    pub fn receive_non_blocking(
        &self,
        buffer_size: usize,
        timeout: Milliseconds,
        callback: impl FnOnce(Result<FrameBuffer>) + Send + 'static,
    ) -> Result<()> {
        if !self.status.connected {
            return Err(Error::PrerequisitesNotMet);
        }
        let network = self.network.clone();
        let socket = self.socket;
        self.submit(Box::new(move || {
            let outcome = network.receive(buffer_size, socket, timeout);
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
            connected = self.status.connected,
            socket = self.socket,
            host = %self.host_name,
            port = self.port,
            "IpClientStatus"
        );
    }

    fn submit(&self, event: Event) -> Result<()> {
        let submitted = submit_with_retry(self.network.as_ref(), event);
        if let Err(error) = submitted {
            tracing::warn!(%error, "could not add event to network queue");
            return Err(error);
        }
        ok!()
    }

    /// A non-timeout failure means the link is gone.
    fn note_link_state(&mut self, error: Option<Error>) {
        if let Some(error) = error {
            if error != Error::Timeout {
                self.status.connected = false;
            }
        }
    }
}

/// Submit an event, riding out transient contention on the queue's binary
/// semaphore: the worker's drain pass holds it for a moment, and that
/// zero-timeout collision is recovered here rather than surfaced.
/// [`Error::LimitReached`] (a genuinely full queue) is surfaced; callers
/// should back off.
pub(crate) fn submit_with_retry<N: NetworkInterface + ?Sized>(
    network: &N,
    event: Event,
) -> Result<()> {
    const RETRY_LIMIT: u32 = 100;
    let os = crate::OperatingSystem::instance();
    let mut pending = event;
    let mut attempts = 0;
    loop {
        match network.event_queue().add_event_reclaim(pending) {
            Ok(()) => return ok!(),
            Err((Error::Timeout, Some(reclaimed))) if attempts < RETRY_LIMIT => {
                attempts += 1;
                let _ = os.delay(1);
                pending = reclaimed;
            }
            Err((error, _event)) => return Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PosixNetworkInterface;

    #[test]
    fn test_operations_require_a_connection() {
        let network = Arc::new(PosixNetworkInterface::new().unwrap());
        let mut client = IpClient::new(network);

        assert_eq!(
            client.send_blocking(b"hello", 100),
            Err(Error::PrerequisitesNotMet)
        );
        assert_eq!(
            client.receive_blocking(16, 100).unwrap_err(),
            Error::PrerequisitesNotMet
        );
        assert_eq!(
            client.send_non_blocking(Arc::new(b"hello".to_vec()), 100, |_| {}),
            Err(Error::PrerequisitesNotMet)
        );
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let network = Arc::new(PosixNetworkInterface::new().unwrap());
        let mut client = IpClient::new(network);

        client.disconnect().unwrap();
        assert_eq!(client.socket(), NO_SOCKET);
        assert!(!client.is_connected());
        // And again.
        client.disconnect().unwrap();
        assert_eq!(client.socket(), NO_SOCKET);
    }
}
