// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{AID_LOG, AID_ROOT, AID_SECURITY_LOG_WRITER, AID_SYSTEM};
use crate::errors::WriteError;

/// Credentials and ids of the calling process and thread.
pub trait ProcessIdentity: Send + Sync {
    fn uid(&self) -> u32;
    fn euid(&self) -> u32;
    fn gid(&self) -> u32;
    fn egid(&self) -> u32;
    fn groups(&self) -> Vec<u32>;
    fn pid(&self) -> u32;
    fn tid(&self) -> u32;
}

/// Identity as reported by the kernel for the current process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemIdentity;

impl ProcessIdentity for SystemIdentity {
    fn uid(&self) -> u32 {
        // SAFETY: getuid has no preconditions and cannot fail.
        unsafe { libc::getuid() }
    }

    fn euid(&self) -> u32 {
        // SAFETY: as above.
        unsafe { libc::geteuid() }
    }

    fn gid(&self) -> u32 {
        // SAFETY: as above.
        unsafe { libc::getgid() }
    }

    fn egid(&self) -> u32 {
        // SAFETY: as above.
        unsafe { libc::getegid() }
    }

    fn groups(&self) -> Vec<u32> {
        // SAFETY: a zero-sized query only returns the group count.
        let count = unsafe { libc::getgroups(0, std::ptr::null_mut()) };
        let Ok(len) = usize::try_from(count) else {
            return Vec::new();
        };
        let mut groups: Vec<libc::gid_t> = vec![0; len];
        // SAFETY: `groups` has room for `count` entries.
        let filled = unsafe { libc::getgroups(count, groups.as_mut_ptr()) };
        groups.truncate(usize::try_from(filled).unwrap_or(0));
        groups
    }

    fn pid(&self) -> u32 {
        std::process::id()
    }

    fn tid(&self) -> u32 {
        // SAFETY: gettid has no preconditions and cannot fail.
        let tid = unsafe { libc::syscall(libc::SYS_gettid) };
        u32::try_from(tid).unwrap_or(0)
    }
}

fn is_privileged(id: u32) -> bool {
    id == AID_SYSTEM || id == AID_ROOT || id == AID_LOG
}

/// Decides whether the caller may write to the security buffer.
///
/// Any of uid, euid, gid or egid being root, system or log is enough; otherwise a
/// supplementary group of log or security_log_writer is required.
pub fn check_log_uid_permissions(identity: &dyn ProcessIdentity) -> Result<(), WriteError> {
    if [identity.uid(), identity.euid(), identity.gid(), identity.egid()]
        .into_iter()
        .any(is_privileged)
    {
        return Ok(());
    }

    if identity
        .groups()
        .iter()
        .any(|&group| group == AID_LOG || group == AID_SECURITY_LOG_WRITER)
    {
        return Ok(());
    }

    Err(WriteError::Permission)
}
