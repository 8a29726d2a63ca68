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

//! End-to-end client/server scenarios over the host loopback.
//!
//! Each side gets its own network interface and worker thread, the way real
//! deployments pair one worker with one link. The tests share the operating
//! system singleton, so they run serially.

use std::sync::{Arc,
                atomic::{AtomicBool, Ordering},
                mpsc};

use r3bl_osal::{ConfigurationParameters, Error, IpClient, IpServer,
                NO_SOCKET, NetworkInterface, OperatingSystem,
                PosixNetworkInterface, Priority, Protocol, Version};
use serial_test::serial;

/// Spawn a service thread that owns a loopback-configured interface and
/// drains its event queue until `stop` is raised.
fn spawn_network_worker(
    name: &str,
) -> (Arc<PosixNetworkInterface>, Arc<AtomicBool>) {
    let os = OperatingSystem::instance();
    let stop = Arc::new(AtomicBool::new(false));
    let stop_in_worker = stop.clone();
    let (sender, receiver) = mpsc::channel();

    os.create_thread(Priority::Normal, name, 256 * 1024, move || {
        let os = OperatingSystem::instance();
        let network = Arc::new(PosixNetworkInterface::new().unwrap());
        network.configure(&ConfigurationParameters::Loopback).unwrap();
        network.init().unwrap();
        network.network_up().unwrap();
        sender.send(network.clone()).unwrap();

        while !stop_in_worker.load(Ordering::SeqCst) {
            if network.main_loop() == Err(Error::NoData) {
                os.delay(1).unwrap();
            }
        }
    })
    .unwrap();

    (receiver.recv().unwrap(), stop)
}

fn stop_network_worker(name: &str, stop: &AtomicBool) {
    let os = OperatingSystem::instance();
    stop.store(true, Ordering::SeqCst);
    os.join_thread(name).unwrap();
    os.delete_thread(name).unwrap();
}

#[test]
#[serial]
fn test_blocking_echo_round_trip() {
    let (client_network, client_stop) = spawn_network_worker("echoClientNet");
    let (server_network, server_stop) = spawn_network_worker("echoServerNet");

    let mut server = IpServer::new(server_network);
    server.listen_to(Protocol::Tcp, Version::IPv4, 37_100).unwrap();
    assert!(server.status().listening);

    let mut client = IpClient::new(client_network);
    client
        .connect_to("127.0.0.1", 37_100, Protocol::Tcp, Version::IPv4, 1000)
        .unwrap();
    assert!(client.is_connected());

    let accepted = server.accept_connection(1000).unwrap();
    assert_eq!(server.status().active_connections, 1);
    assert_eq!(server.connected_sockets().len(), 1);

    client.send_blocking(b"ping", 1000).unwrap();

    let (request, from_socket) =
        server.receive_blocking(64, 2000, NO_SOCKET).unwrap();
    assert_eq!(&request[..], b"ping");
    assert_eq!(from_socket, accepted);

    server.send_blocking(b"pong", 1000, accepted).unwrap();
    let reply = client.receive_blocking(64, 2000).unwrap();
    assert_eq!(&reply[..], b"pong");

    // Close the accepted socket, then the listener: back to idle, and the
    // connection count tracks the list exactly.
    server.close_connection(accepted).unwrap();
    assert_eq!(server.status().active_connections, 0);
    assert_eq!(server.connected_sockets().len(), 0);
    server.close_connection(server.listener_socket()).unwrap();
    assert!(!server.status().listening);

    client.disconnect().unwrap();
    assert_eq!(client.socket(), NO_SOCKET);
    assert!(!client.is_connected());
    // Idempotent.
    client.disconnect().unwrap();

    stop_network_worker("echoClientNet", &client_stop);
    stop_network_worker("echoServerNet", &server_stop);
}

#[test]
#[serial]
fn test_non_blocking_echo() {
    let (client_network, client_stop) = spawn_network_worker("nbClientNet");
    let (server_network, server_stop) = spawn_network_worker("nbServerNet");

    let mut server = IpServer::new(server_network);
    server.listen_to(Protocol::Tcp, Version::IPv4, 37_000).unwrap();

    let mut client = IpClient::new(client_network);
    client
        .connect_to("127.0.0.1", 37_000, Protocol::Tcp, Version::IPv4, 1000)
        .unwrap();
    let accepted = server.accept_connection(1000).unwrap();

    // Client side: queue the send and the receive, then collect both
    // callbacks.
    let (send_sender, send_receiver) = mpsc::channel();
    client
        .send_non_blocking(Arc::new(b"hello".to_vec()), 1000, move |outcome| {
            send_sender.send(outcome).unwrap();
        })
        .unwrap();

    let (receive_sender, receive_receiver) = mpsc::channel();
    client
        .receive_non_blocking(64, 2000, move |outcome| {
            receive_sender.send(outcome).unwrap();
        })
        .unwrap();

    // Server side: echo whatever arrives.
    let (request, from_socket) =
        server.receive_blocking(64, 2000, NO_SOCKET).unwrap();
    assert_eq!(&request[..], b"hello");
    server.send_blocking(&request, 1000, from_socket).unwrap();

    let bytes_written = send_receiver
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap()
        .unwrap();
    assert_eq!(bytes_written, 5);

    let reply = receive_receiver
        .recv_timeout(std::time::Duration::from_secs(5))
        .unwrap()
        .unwrap();
    assert_eq!(&reply[..], b"hello");

    server.close_connection(accepted).unwrap();
    stop_network_worker("nbClientNet", &client_stop);
    stop_network_worker("nbServerNet", &server_stop);
}

#[test]
#[serial]
fn test_connection_reset_during_blocking_receive() {
    let (client_network, client_stop) = spawn_network_worker("rstClientNet");
    let (server_network, server_stop) = spawn_network_worker("rstServerNet");

    let mut server = IpServer::new(server_network);
    server.listen_to(Protocol::Tcp, Version::IPv4, 37_200).unwrap();

    let mut client = IpClient::new(client_network);
    client
        .connect_to("127.0.0.1", 37_200, Protocol::Tcp, Version::IPv4, 1000)
        .unwrap();
    let accepted = server.accept_connection(1000).unwrap();

    // Close the server side of the link while the client is parked in its
    // blocking receive.
    let (server_sender, server_receiver) = mpsc::channel();
    let closer = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(200));
        server.close_connection(accepted).unwrap();
        server_sender.send(server).unwrap();
    });

    let outcome = client.receive_blocking(64, 2000);
    let error = outcome.unwrap_err();
    assert_ne!(error, Error::Timeout, "the peer closed; this is not a timeout");
    assert!(!client.is_connected());

    closer.join().unwrap();
    let server = server_receiver.recv().unwrap();
    assert!(server.status().listening);

    // The link is re-establishable right away.
    client
        .connect_to("127.0.0.1", 37_200, Protocol::Tcp, Version::IPv4, 1000)
        .unwrap();
    assert!(client.is_connected());

    client.disconnect().unwrap();
    stop_network_worker("rstClientNet", &client_stop);
    stop_network_worker("rstServerNet", &server_stop);
}

#[test]
#[serial]
fn test_receive_timeout_keeps_the_connection() {
    let (client_network, client_stop) = spawn_network_worker("toClientNet");
    let (server_network, server_stop) = spawn_network_worker("toServerNet");

    let mut server = IpServer::new(server_network);
    server.listen_to(Protocol::Tcp, Version::IPv4, 37_300).unwrap();

    let mut client = IpClient::new(client_network);
    client
        .connect_to("127.0.0.1", 37_300, Protocol::Tcp, Version::IPv4, 1000)
        .unwrap();
    let _accepted = server.accept_connection(1000).unwrap();

    // Nothing was sent: the receive times out, and a timeout alone does not
    // drop the connection state.
    assert_eq!(client.receive_blocking(64, 100).unwrap_err(), Error::Timeout);
    assert!(client.is_connected());

    client.disconnect().unwrap();
    stop_network_worker("toClientNet", &client_stop);
    stop_network_worker("toServerNet", &server_stop);
}

#[test]
#[serial]
fn test_udp_round_trip() {
    let (client_network, client_stop) = spawn_network_worker("udpClientNet");
    let (server_network, server_stop) = spawn_network_worker("udpServerNet");

    // A UDP "listener" is just a bound socket the server receives from
    // directly.
    let server_socket = server_network
        .listen_to(Protocol::Udp, Version::IPv4, 37_400)
        .unwrap();

    let mut client = IpClient::new(client_network);
    client
        .connect_to("127.0.0.1", 37_400, Protocol::Udp, Version::IPv4, 1000)
        .unwrap();
    client.send_blocking(b"datagram", 1000).unwrap();

    let payload = server_network.receive(64, server_socket, 2000).unwrap();
    assert_eq!(&payload[..], b"datagram");

    client.disconnect().unwrap();
    server_network.close_connection(server_socket).unwrap();
    stop_network_worker("udpClientNet", &client_stop);
    stop_network_worker("udpServerNet", &server_stop);
}
