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

//! Opt-in logging initialization.
//!
//! The crate itself only emits [`tracing`] events; installing a subscriber is
//! the application's call. This helper wires up a sane default: compact
//! formatter, level from `RUST_LOG` (defaulting to `warn`).

use tracing_subscriber::EnvFilter;

use crate::{Error, Result, ok};

/// Install the default subscriber for this process.
///
/// # Errors
///
/// [`Error::PrerequisitesNotMet`] if a global subscriber is already
/// installed (harmless when tests race to initialize; ignore it there).
pub fn try_initialize_logging() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|_| Error::PrerequisitesNotMet)?;
    ok!()
}
