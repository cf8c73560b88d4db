// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process and package lookups used to attribute audit messages.

use std::fs;
use std::path::PathBuf;

use liblog::constants::AID_LOGD;
use tracing::trace;

pub trait ProcessResolver: Send + Sync {
    /// Real uid of `pid`, or the daemon's uid when it cannot be read.
    fn pid_to_uid(&self, pid: u32) -> u32;

    /// Command name of `pid`.
    fn pid_to_name(&self, pid: u32) -> Option<String>;

    /// Package name owning `uid`.
    fn uid_to_name(&self, uid: u32) -> Option<String>;
}

/// Resolves through `/proc` and the package list file.
#[derive(Debug, Clone)]
pub struct ProcfsResolver {
    proc_root: PathBuf,
    packages_list: PathBuf,
}

impl ProcfsResolver {
    #[must_use]
    pub fn new(packages_list: impl Into<PathBuf>) -> Self {
        ProcfsResolver {
            proc_root: PathBuf::from("/proc"),
            packages_list: packages_list.into(),
        }
    }

    #[must_use]
    pub fn with_proc_root(mut self, proc_root: impl Into<PathBuf>) -> Self {
        self.proc_root = proc_root.into();
        self
    }
}

fn parse_status_uid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Uid:"))
        .and_then(|ids| ids.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

fn parse_cmdline(cmdline: &[u8]) -> Option<String> {
    let name = cmdline.split(|&b| b == 0).next()?;
    if name.is_empty() {
        return None;
    }
    Some(String::from_utf8_lossy(name).into_owned())
}

fn find_package(packages: &str, uid: u32) -> Option<String> {
    packages.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let name = fields.next()?;
        let owner: u32 = fields.next()?.parse().ok()?;
        (owner == uid).then(|| name.to_string())
    })
}

impl ProcessResolver for ProcfsResolver {
    fn pid_to_uid(&self, pid: u32) -> u32 {
        let path = self.proc_root.join(pid.to_string()).join("status");
        match fs::read_to_string(&path) {
            Ok(status) => parse_status_uid(&status).unwrap_or(AID_LOGD),
            Err(e) => {
                trace!("Cannot read {}: {}", path.display(), e);
                AID_LOGD
            }
        }
    }

    fn pid_to_name(&self, pid: u32) -> Option<String> {
        let path = self.proc_root.join(pid.to_string()).join("cmdline");
        fs::read(path).ok().as_deref().and_then(parse_cmdline)
    }

    fn uid_to_name(&self, uid: u32) -> Option<String> {
        let packages = fs::read_to_string(&self.packages_list).ok()?;
        find_package(&packages, uid)
    }
}
