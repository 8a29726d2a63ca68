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

//! # r3bl_osal
//!
//! A portable operating-system abstraction layer. Application code is
//! written once against capability interfaces (threads, counting
//! semaphores, software timers, bounded queues, an event queue (reactor),
//! and network sockets) and ported by swapping the per-platform module
//! behind the interface. This crate carries the portable core and the hosted
//! POSIX platform module; MCU ports supply their own modules against the
//! same contracts.
//!
//! The concurrency model has two layers:
//!
//! 1. **Preemptive between threads.** The [`OperatingSystem`] singleton
//!    creates and tracks threads (stable logical ids, name-keyed records),
//!    counting semaphores, software timers, and bounded queues, and provides
//!    the cooperative [block/unblock](OperatingSystem::block) protocol.
//! 2. **Cooperative within a network interface.** Each
//!    [`NetworkInterface`] owns one [`EventQueue`] and one worker thread.
//!    Application threads never touch sockets; they submit closures onto the
//!    interface's queue and wait. [`IpClient`] and [`IpServer`] package that
//!    serialise-and-wait discipline behind blocking and non-blocking calls.
//!
//! Every fallible operation returns the closed [`Error`] taxonomy; there is
//! no second error channel, and callers branch on the kind.
//!
//! ## Quick start
//!
//! ```no_run
//! use std::sync::Arc;
//! use r3bl_osal::{ConfigurationParameters, IpClient, NetworkInterface,
//!                 OperatingSystem, PosixNetworkInterface, Priority, Protocol,
//!                 Version};
//!
//! let os = OperatingSystem::instance();
//!
//! // The worker thread owns the interface and drives its event queue.
//! let (sender, receiver) = std::sync::mpsc::channel();
//! os.create_thread(Priority::Normal, "netWorker", 256 * 1024, move || {
//!     let network = Arc::new(PosixNetworkInterface::new().unwrap());
//!     network.configure(&ConfigurationParameters::Loopback).unwrap();
//!     network.init().unwrap();
//!     network.network_up().unwrap();
//!     sender.send(network.clone()).unwrap();
//!     loop {
//!         let _ = network.main_loop();
//!     }
//! })
//! .unwrap();
//!
//! // Any other thread talks to the link through a client.
//! let network = receiver.recv().unwrap();
//! let mut client = IpClient::new(network);
//! client
//!     .connect_to("127.0.0.1", 37000, Protocol::Tcp, Version::IPv4, 1000)
//!     .unwrap();
//! client.send_blocking(b"hello", 1000).unwrap();
//! ```

// Connect to source file.
pub mod decl_macros;
pub mod error;
pub mod event;
pub mod log;
pub mod net;
pub mod os;
pub mod units;

pub(crate) mod sync;

// Re-export.
pub use error::*;
pub use event::*;
pub use log::*;
pub use net::*;
pub use os::*;
pub use units::*;
