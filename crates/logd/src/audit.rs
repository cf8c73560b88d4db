// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns kernel audit text into structured log entries.
//!
//! Every message is normalized, attributed to a process, annotated with bug metadata and
//! stored twice: once in the events buffer as a string event, once in the main buffer as a
//! text record whose tag is the audited command. Field extraction is plain substring
//! search; a field that cannot be found falls back to a default and the message is still
//! stored.

use std::borrow::Cow;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use liblog::constants::{AID_APP_END, AID_APP_START, AID_LOGD, AUDITD_LOG_TAG, MAX_PAYLOAD};
use liblog::event::string_event;
use liblog::identity::{ProcessIdentity, SystemIdentity};
use liblog::{LogId, LogTime, Priority};
use tracing::{debug, warn};

use crate::bug_map::{default_paths, BugMap};
use crate::config::LogdConfig;
use crate::errors::{AuditError, LogBufferError};
use crate::kmsg::kmsg_prefix;
use crate::log_buffer::LogBuffer;
use crate::netlink::AuditMessage;
use crate::resolver::{ProcessResolver, ProcfsResolver};

const PID_KEY: &str = " pid=";
const AUDIT_KEY: &str = " audit(";
const COMM_KEY: &str = " comm=\"";
const TYPE_KEY: &str = "type=";
const CANONICAL_TIME: &str = "0.0";
const UNKNOWN_COMM: &str = "unknown";
const DAEMON_COMM: &str = "auditd";

/// Substring of `denial` after `search_term`, up to `terminator` or the end.
#[must_use]
pub fn denial_parse<'a>(denial: &'a str, terminator: char, search_term: &str) -> &'a str {
    match denial.find(search_term) {
        Some(start) => {
            let value = &denial[start + search_term.len()..];
            value.find(terminator).map_or(value, |end| &value[..end])
        }
        None => "",
    }
}

/// Whether `text` already ends with bug metadata from an earlier pass.
///
/// Known suffixes end in `b/<8 digits>` or `b/<8 digits> duplicate messages suppressed`,
/// which puts a `/` 9 or 39 bytes from the end.
#[must_use]
pub fn has_metadata(text: &[u8]) -> bool {
    let len = text.len().min(MAX_PAYLOAD);
    len >= 39 && (text[len - 9] == b'/' || text[len - 39] == b'/')
}

/// Removes ` pid=<digits>` from `text` and returns the pid.
fn take_pid(text: &mut String) -> Option<u32> {
    let start = text.find(PID_KEY)?;
    let digits_start = start + PID_KEY.len();
    let digits = text[digits_start..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return None;
    }
    let pid = text[digits_start..digits_start + digits].parse().ok()?;
    text.replace_range(start..digits_start + digits, "");
    Some(pid)
}

/// Adopts the `audit(<sec>.<frac>:` timestamp and rewrites it to `audit(0.0:`.
fn take_audit_time(text: &mut String) -> Option<LogTime> {
    let start = text.find(AUDIT_KEY)? + AUDIT_KEY.len();
    let (realtime, consumed) = LogTime::parse_prefix(&text[start..])?;
    if !text[start + consumed..].starts_with(':') {
        return None;
    }
    text.replace_range(start..start + consumed, CANONICAL_TIME);
    Some(realtime)
}

pub struct LogAudit {
    buffer: Arc<dyn LogBuffer>,
    kmsg: Option<Box<dyn Write + Send>>,
    main: bool,
    events: bool,
    initialized: bool,
    bug_map_paths: Vec<PathBuf>,
    bug_map: OnceLock<BugMap>,
    resolver: Arc<dyn ProcessResolver>,
    identity: Arc<dyn ProcessIdentity>,
}

impl LogAudit {
    /// Creates an idle ingestor and announces it on the kernel log, if one is given.
    pub fn new(buffer: Arc<dyn LogBuffer>, kmsg: Option<Box<dyn Write + Send>>) -> Self {
        let mut audit = LogAudit {
            buffer,
            kmsg,
            main: true,
            events: true,
            initialized: false,
            bug_map_paths: default_paths(),
            bug_map: OnceLock::new(),
            resolver: Arc::new(ProcfsResolver::new(crate::config::DEFAULT_PACKAGES_LIST)),
            identity: Arc::new(SystemIdentity),
        };
        let start = format!("{}logd.auditd: start\n", kmsg_prefix(Priority::Info));
        audit.write_kmsg(start.as_bytes());
        audit
    }

    pub fn from_config(
        buffer: Arc<dyn LogBuffer>,
        kmsg: Option<Box<dyn Write + Send>>,
        config: &LogdConfig,
    ) -> Self {
        LogAudit::new(buffer, kmsg)
            .with_main(config.auditd_main)
            .with_events(config.auditd_events)
            .with_bug_map_paths(config.bug_map_paths.clone())
            .with_resolver(Arc::new(ProcfsResolver::new(&config.packages_list)))
    }

    #[must_use]
    pub fn with_main(mut self, main: bool) -> Self {
        self.main = main;
        self
    }

    #[must_use]
    pub fn with_events(mut self, events: bool) -> Self {
        self.events = events;
        self
    }

    #[must_use]
    pub fn with_bug_map_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.bug_map_paths = paths;
        self.bug_map = OnceLock::new();
        self
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn ProcessResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_identity(mut self, identity: Arc<dyn ProcessIdentity>) -> Self {
        self.identity = identity;
        self
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Switches to listening; from now on messages are mirrored to the kernel log.
    pub fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    /// Bug map, loaded on first use.
    pub fn bug_map(&self) -> &BugMap {
        self.bug_map
            .get_or_init(|| BugMap::load(&self.bug_map_paths))
    }

    fn write_kmsg(&mut self, line: &[u8]) {
        if let Some(kmsg) = self.kmsg.as_mut() {
            if let Err(e) = kmsg.write_all(line) {
                debug!("Failed to write to kernel log: {}", e);
            }
        }
    }

    /// Bug and app annotations for a denial, each with a leading space.
    pub fn audit_parse(&self, text: &str, uid: u32) -> String {
        let mut scontext = denial_parse(text, ':', "scontext=u:object_r:");
        let mut tcontext = denial_parse(text, ':', "tcontext=u:object_r:");
        let tclass = denial_parse(text, ' ', "tclass=");
        if scontext.is_empty() {
            scontext = denial_parse(text, ':', "scontext=u:r:");
        }
        if tcontext.is_empty() {
            tcontext = denial_parse(text, ':', "tcontext=u:r:");
        }

        let mut result = String::new();
        if let Some(bug) = self.bug_map().lookup(scontext, tcontext, tclass) {
            result.push_str(" bug=");
            result.push_str(bug);
        }

        if (AID_APP_START..=AID_APP_END).contains(&uid) {
            if let Some(name) = self.resolver.uid_to_name(uid) {
                result.push_str(" app=");
                result.push_str(&name);
            }
        }
        result
    }

    /// Handles one message from the live audit socket.
    pub fn on_audit_message(&mut self, message: &AuditMessage) -> Result<usize, AuditError> {
        if !self.initialized {
            self.mark_initialized();
        }
        self.log_print(&message.text())
    }

    /// Handles one kernel ring-buffer line. Lines without an audit marker are ignored.
    pub fn ingest_kernel_line(&mut self, line: &[u8]) -> Result<usize, AuditError> {
        let line = String::from_utf8_lossy(line);
        let Some(marker) = line.find(AUDIT_KEY) else {
            return Ok(0);
        };
        let head = &line[..marker];
        let audit = &line[marker + 1..];
        let text = match head.find(TYPE_KEY) {
            Some(kind) => format!("{} {}", &head[kind..], audit),
            None => audit.to_string(),
        };
        self.log_print(&text)
    }

    /// Stores one audit message and returns how many records were written.
    pub fn log_print(&mut self, raw: &str) -> Result<usize, AuditError> {
        // Some kernels inject newlines inside audit records.
        let mut text = raw.replace('\n', " ");

        let mut pid = self.identity.pid();
        let tid;
        let mut uid = AID_LOGD;
        match take_pid(&mut text) {
            Some(found) => {
                pid = found;
                tid = found;
                uid = self.resolver.pid_to_uid(found);
            }
            None => tid = self.identity.tid(),
        }

        let info = text.contains(" permissive=1") || text.contains(" policy loaded ");
        let priority = if info { Priority::Info } else { Priority::Warn };

        let mirror = self.initialized && self.kmsg.is_some();
        if !mirror && !self.main && !self.events {
            return Ok(0);
        }

        let metadata = if has_metadata(text.as_bytes()) {
            String::new()
        } else {
            self.audit_parse(&text, uid)
        };

        if mirror {
            let line = format!("{}{}{}\n", kmsg_prefix(priority), text, metadata);
            self.write_kmsg(line.as_bytes());
        }

        if !self.main && !self.events {
            return Ok(0);
        }

        let realtime = take_audit_time(&mut text).unwrap_or_else(LogTime::now);

        let mut stored = 0;
        let mut failure: Option<LogBufferError> = None;

        if self.events {
            let body = [text.as_bytes(), metadata.as_bytes()].concat();
            let event = string_event(AUDITD_LOG_TAG, &body, MAX_PAYLOAD);
            match self
                .buffer
                .log(LogId::Events, realtime, uid, pid, tid, &event)
            {
                Ok(_) => stored += 1,
                Err(e) => {
                    warn!("Failed to store audit event: {}", e);
                    failure = Some(e);
                }
            }
        }

        let (comm, prefix, suffix): (Cow<'_, str>, &str, &str) = match text.find(COMM_KEY) {
            Some(start) => {
                let rest = &text[start + COMM_KEY.len()..];
                match rest.find('"') {
                    Some(end) => (Cow::Borrowed(&rest[..end]), &text[..start], &rest[end + 1..]),
                    None => (Cow::Borrowed(UNKNOWN_COMM), text.as_str(), ""),
                }
            }
            None if pid == self.identity.pid() => {
                pid = tid;
                (Cow::Borrowed(DAEMON_COMM), text.as_str(), "")
            }
            None => {
                let comm = self
                    .resolver
                    .pid_to_name(pid)
                    .map_or(Cow::Borrowed(UNKNOWN_COMM), Cow::Owned);
                (comm, text.as_str(), "")
            }
        };

        if self.main {
            let mut record = Vec::with_capacity(
                2 + comm.len() + prefix.len() + suffix.len() + metadata.len() + 1,
            );
            record.push(u8::from(priority));
            record.extend_from_slice(comm.as_bytes());
            record.push(0);
            record.extend_from_slice(prefix.as_bytes());
            record.extend_from_slice(suffix.as_bytes());
            record.extend_from_slice(metadata.as_bytes());
            record.truncate(MAX_PAYLOAD - 1);
            record.push(0);

            match self.buffer.log(LogId::Main, realtime, uid, pid, tid, &record) {
                Ok(_) => stored += 1,
                Err(e) => {
                    warn!("Failed to store audit message: {}", e);
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) if stored == 0 => Err(AuditError::Store(e)),
            _ => Ok(stored),
        }
    }
}
