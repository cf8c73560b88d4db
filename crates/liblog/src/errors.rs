// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors a log write can surface to the caller.
///
/// Callers that speak errno can use [`WriteError::errno`] to get the negative code the
/// write would have returned at a C boundary.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Rejected by priority filtering, credentials or a disabled buffer.
    #[error("write rejected by logging policy")]
    Permission,

    /// Malformed record or a buffer this API never writes to.
    #[error("invalid log record")]
    InvalidArgument,

    /// The transport socket could not be created.
    #[error("log transport unavailable")]
    BadDescriptor,

    /// The daemon is not draining its socket fast enough.
    #[error("log daemon is overloaded")]
    WouldBlock,

    #[error("log transport failed: {0}")]
    Io(#[source] io::Error),
}

impl WriteError {
    /// Negative errno equivalent of this error.
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            WriteError::Permission => -libc::EPERM,
            WriteError::InvalidArgument => -libc::EINVAL,
            WriteError::BadDescriptor => -libc::EBADF,
            WriteError::WouldBlock => -libc::EAGAIN,
            WriteError::Io(e) => -e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

impl From<io::Error> for WriteError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock => WriteError::WouldBlock,
            _ => WriteError::Io(e),
        }
    }
}
