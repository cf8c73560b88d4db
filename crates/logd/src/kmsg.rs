// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Kernel log access: the `/dev/kmsg` writer and the `klogctl` ring-buffer reader.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

use liblog::Priority;

const LOG_AUTH: u8 = 4 << 3;
const LOG_WARNING: u8 = 4;
const LOG_INFO: u8 = 6;

const SYSLOG_ACTION_READ_ALL: libc::c_int = 3;
const SYSLOG_ACTION_SIZE_BUFFER: libc::c_int = 10;

/// `<PRI>` prefix of an AUTH facility kernel log line. Audit messages only use INFO and
/// WARN.
#[must_use]
pub fn kmsg_prefix(priority: Priority) -> String {
    let level = if priority <= Priority::Info {
        LOG_INFO
    } else {
        LOG_WARNING
    };
    format!("<{}>", LOG_AUTH | level)
}

/// Opens the kernel log for writing.
pub fn open_kmsg(path: &Path) -> io::Result<File> {
    OpenOptions::new().write(true).open(path)
}

/// Reads the whole kernel ring buffer.
pub fn read_ring_buffer() -> io::Result<Vec<u8>> {
    // SAFETY: SIZE_BUFFER ignores the buffer arguments.
    let size = unsafe { libc::klogctl(SYSLOG_ACTION_SIZE_BUFFER, std::ptr::null_mut(), 0) };
    if size < 0 {
        return Err(io::Error::last_os_error());
    }
    if size == 0 {
        return Ok(Vec::new());
    }

    let mut buf = vec![0u8; size as usize];
    // SAFETY: `buf` is valid for writes of `size` bytes.
    let read = unsafe {
        libc::klogctl(
            SYSLOG_ACTION_READ_ALL,
            buf.as_mut_ptr().cast::<libc::c_char>(),
            size,
        )
    };
    if read < 0 {
        return Err(io::Error::last_os_error());
    }
    buf.truncate(read as usize);
    Ok(buf)
}

/// Non-empty lines of a ring-buffer dump.
pub fn lines(buf: &[u8]) -> impl Iterator<Item = &[u8]> {
    buf.split(|&b| b == b'\n' || b == 0)
        .filter(|line| !line.is_empty())
}
