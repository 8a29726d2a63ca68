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

//! The closed error taxonomy shared by every capability in this crate.
//!
//! There is no second error channel: every fallible operation returns
//! `Result<T, Error>` where the variant is one of the coarse kinds below.
//! `Success` from the original C++ taxonomy maps to [`Ok`]. Callers branch on
//! the kind; there is no error string payload.

use serde::{Deserialize, Serialize};

/// Crate-wide result alias. The error type is always the closed taxonomy
/// [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error kinds. Platform error codes are folded into this set by
/// [`Error::from_platform`]; unknown codes become [`Error::Failure`] and are
/// logged.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    thiserror::Error,
)]
pub enum Error {
    /// General failure. Try to be more specific if you can.
    #[error("general failure")]
    Failure,
    /// The implementation does not exist for the given platform.
    #[error("not implemented on this platform")]
    NotImplemented,
    /// Not enough memory to complete the operation.
    #[error("not enough memory")]
    NoMemory,
    /// Operation timed out.
    #[error("operation timed out")]
    Timeout,
    /// The operation is implemented, but can not support the provided data.
    #[error("operation not supported")]
    NotSupported,
    /// One or more prerequisites are not met.
    #[error("prerequisites not met")]
    PrerequisitesNotMet,
    /// One or more parameters are invalid.
    #[error("invalid parameter")]
    InvalidParameter,
    /// Cyclic redundancy check failed.
    #[error("crc mismatch")]
    CrcMismatch,
    /// The operation makes sense, but the underlying platform can not do it.
    #[error("not available on this platform")]
    NotAvailable,
    /// File not found.
    #[error("file not found")]
    FileNotFound,
    /// File already exists.
    #[error("file already exists")]
    FileExists,
    /// End of file reached.
    #[error("end of file")]
    EndOfFile,
    /// No data available.
    #[error("no data")]
    NoData,
    /// An imposed limit has been reached. Callers should back off.
    #[error("limit reached")]
    LimitReached,
    /// The status or query is not true with respect to the predicate. Not a
    /// fault.
    #[error("predicate is false")]
    Negative,
}

impl Error {
    /// Fold a platform error number (`errno` on the hosted build) into the
    /// taxonomy. Unknown codes map to [`Error::Failure`] and are logged.
    #[cfg(unix)]
    #[must_use]
    pub fn from_platform(code: i32) -> Error {
        match code {
            0 => Error::Failure, // 0 is "no error"; reaching here is itself a fault.
            libc::EAGAIN | libc::ETIMEDOUT => Error::Timeout,
            libc::ENOMEM => Error::NoMemory,
            libc::EINVAL | libc::EBADF | libc::ENAMETOOLONG => {
                Error::InvalidParameter
            }
            libc::ENOTCONN | libc::ECONNRESET | libc::EPIPE => {
                Error::PrerequisitesNotMet
            }
            libc::ENOENT => Error::FileNotFound,
            libc::EEXIST => Error::FileExists,
            libc::ENOSYS => Error::NotImplemented,
            libc::EOPNOTSUPP | libc::EAFNOSUPPORT => Error::NotSupported,
            libc::EMFILE | libc::ENFILE => Error::LimitReached,
            _ => {
                tracing::warn!(code, "unhandled platform error code");
                Error::Failure
            }
        }
    }

    /// See the unix variant. Without a platform table every code is a plain
    /// failure.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_platform(code: i32) -> Error {
        tracing::warn!(code, "unhandled platform error code");
        Error::Failure
    }

    /// Fold an [`std::io::Error`] into the taxonomy, using the raw OS error
    /// number when one is present.
    #[must_use]
    pub fn from_io(error: &std::io::Error) -> Error {
        error
            .raw_os_error()
            .map_or(Error::Failure, Error::from_platform)
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Error { Error::from_io(&error) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_platform_mapping() {
        assert_eq!(Error::from_platform(libc::EAGAIN), Error::Timeout);
        assert_eq!(Error::from_platform(libc::ETIMEDOUT), Error::Timeout);
        assert_eq!(Error::from_platform(libc::ENOMEM), Error::NoMemory);
        assert_eq!(
            Error::from_platform(libc::ECONNRESET),
            Error::PrerequisitesNotMet
        );
        assert_eq!(Error::from_platform(libc::ENOENT), Error::FileNotFound);
        assert_eq!(Error::from_platform(libc::EINVAL), Error::InvalidParameter);
    }

    #[test]
    fn test_unknown_code_is_failure() {
        assert_eq!(Error::from_platform(-9999), Error::Failure);
    }

    #[test]
    #[cfg(unix)]
    fn test_io_error_mapping() {
        let io_error = std::io::Error::from_raw_os_error(libc::ETIMEDOUT);
        assert_eq!(Error::from_io(&io_error), Error::Timeout);

        let opaque = std::io::Error::other("opaque");
        assert_eq!(Error::from_io(&opaque), Error::Failure);
    }
}
