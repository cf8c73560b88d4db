// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Blocking receive of kernel audit messages over `NETLINK_AUDIT`.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};

use tracing::debug;

const AUDIT_SET: u16 = 1001;
const AUDIT_STATUS_PID: u32 = 4;

const NLMSG_HDRLEN: usize = 16;
const MAX_AUDIT_MESSAGE_LENGTH: usize = 8970;

/// One message from the audit subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditMessage {
    pub kind: u16,
    pub data: Vec<u8>,
}

impl AuditMessage {
    /// Text handed to the ingestor: `type=<kind> <data>`.
    #[must_use]
    pub fn text(&self) -> String {
        format!("type={} {}", self.kind, String::from_utf8_lossy(&self.data))
    }
}

/// Source of audit messages; one blocking receive per call.
pub trait AuditSource: Send {
    fn receive(&mut self) -> io::Result<AuditMessage>;
}

#[derive(Debug)]
pub struct NetlinkAuditSocket {
    fd: OwnedFd,
}

fn nlmsg(kind: u16, flags: u16, payload: &[u8]) -> Vec<u8> {
    let len = NLMSG_HDRLEN + payload.len();
    let mut msg = Vec::with_capacity(len);
    msg.extend_from_slice(&(len as u32).to_ne_bytes());
    msg.extend_from_slice(&kind.to_ne_bytes());
    msg.extend_from_slice(&flags.to_ne_bytes());
    msg.extend_from_slice(&1u32.to_ne_bytes());
    msg.extend_from_slice(&0u32.to_ne_bytes());
    msg.extend_from_slice(payload);
    msg
}

/// Splits a received datagram into its type and data, dropping trailing NULs.
fn parse_nlmsg(buf: &[u8]) -> io::Result<AuditMessage> {
    if buf.len() < NLMSG_HDRLEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "short netlink message",
        ));
    }
    let len = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]) as usize;
    let kind = u16::from_ne_bytes([buf[4], buf[5]]);
    let end = len.clamp(NLMSG_HDRLEN, buf.len());
    let mut data = buf[NLMSG_HDRLEN..end].to_vec();
    while data.last() == Some(&0) {
        data.pop();
    }
    Ok(AuditMessage { kind, data })
}

impl NetlinkAuditSocket {
    /// Opens the audit socket and registers `pid` as the audit daemon.
    pub fn open(pid: u32) -> io::Result<Self> {
        // SAFETY: plain socket(2) call; the result is checked below.
        let raw = unsafe {
            libc::socket(
                libc::AF_NETLINK,
                libc::SOCK_RAW | libc::SOCK_CLOEXEC,
                libc::NETLINK_AUDIT,
            )
        };
        if raw < 0 {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: `raw` is a freshly created descriptor owned by nobody else.
        let socket = NetlinkAuditSocket {
            fd: unsafe { OwnedFd::from_raw_fd(raw) },
        };
        socket.set_pid(pid)?;
        debug!("Registered pid {} with the audit subsystem", pid);
        Ok(socket)
    }

    fn set_pid(&self, pid: u32) -> io::Result<()> {
        // struct audit_status: mask, enabled, failure, pid, ...
        let mut status = [0u8; 8 * 4];
        status[0..4].copy_from_slice(&AUDIT_STATUS_PID.to_ne_bytes());
        status[12..16].copy_from_slice(&pid.to_ne_bytes());
        let msg = nlmsg(AUDIT_SET, libc::NLM_F_REQUEST as u16, &status);

        // SAFETY: a zeroed sockaddr_nl addresses the kernel.
        let mut addr: libc::sockaddr_nl = unsafe { mem::zeroed() };
        addr.nl_family = libc::AF_NETLINK as libc::sa_family_t;

        loop {
            // SAFETY: `msg` and `addr` outlive the call and lengths match.
            let sent = unsafe {
                libc::sendto(
                    self.fd.as_raw_fd(),
                    msg.as_ptr().cast(),
                    msg.len(),
                    0,
                    (&addr as *const libc::sockaddr_nl).cast(),
                    mem::size_of::<libc::sockaddr_nl>() as libc::socklen_t,
                )
            };
            if sent >= 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

impl AuditSource for NetlinkAuditSocket {
    fn receive(&mut self) -> io::Result<AuditMessage> {
        let mut buf = vec![0u8; NLMSG_HDRLEN + MAX_AUDIT_MESSAGE_LENGTH];
        loop {
            // SAFETY: `buf` is valid for writes of its full length.
            let n = unsafe {
                libc::recv(
                    self.fd.as_raw_fd(),
                    buf.as_mut_ptr().cast(),
                    buf.len(),
                    0,
                )
            };
            if n >= 0 {
                return parse_nlmsg(&buf[..n as usize]);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message() {
        let mut raw = nlmsg(1400, 0, b"audit(1.2:3): avc: denied\0\0");
        raw.extend_from_slice(b"padding");
        let msg = parse_nlmsg(&raw).unwrap();
        assert_eq!(msg.kind, 1400);
        assert_eq!(msg.data, b"audit(1.2:3): avc: denied");
        assert_eq!(msg.text(), "type=1400 audit(1.2:3): avc: denied");
    }

    #[test]
    fn test_length_is_clamped_to_datagram() {
        let mut raw = nlmsg(1300, 0, b"abc");
        raw[0..4].copy_from_slice(&1000u32.to_ne_bytes());
        assert_eq!(parse_nlmsg(&raw).unwrap().data, b"abc");
        assert!(parse_nlmsg(&raw[..8]).is_err());
    }

    #[test]
    fn test_set_pid_request_layout() {
        let msg = nlmsg(AUDIT_SET, 1, &[0u8; 32]);
        assert_eq!(msg.len(), NLMSG_HDRLEN + 32);
        assert_eq!(u16::from_ne_bytes([msg[4], msg[5]]), AUDIT_SET);
    }
}
