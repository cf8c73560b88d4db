// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Logger and aborter hooks, plus the built-in implementations.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Local};
use tracing::{debug, warn};

use crate::errors::WriteError;
use crate::identity::ProcessIdentity;
use crate::log_id::LogId;
use crate::priority::Priority;
use crate::sink::LogSink;

/// One text record as handed to a logger hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogMessage<'a> {
    pub log_id: LogId,
    pub priority: Priority,
    pub tag: &'a str,
    pub file: Option<&'a str>,
    pub line: u32,
    pub message: &'a str,
}

impl<'a> LogMessage<'a> {
    #[must_use]
    pub fn new(log_id: LogId, priority: Priority, tag: &'a str, message: &'a str) -> Self {
        LogMessage {
            log_id,
            priority,
            tag,
            file: None,
            line: 0,
            message,
        }
    }

    #[must_use]
    pub fn with_location(mut self, file: &'a str, line: u32) -> Self {
        self.file = Some(file);
        self.line = line;
        self
    }
}

/// Process-wide destination of text records.
pub trait Logger: Send + Sync {
    fn log(&self, message: &LogMessage<'_>) -> Result<usize, WriteError>;
}

/// Called on fatal assertions. Implementations are expected not to return.
pub trait Aborter: Send + Sync {
    fn abort(&self, message: &str);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAborter;

impl Aborter for DefaultAborter {
    fn abort(&self, _message: &str) {
        std::process::abort();
    }
}

/// Sends text records to the daemon as `priority`, `tag\0`, `message\0`.
pub struct LogdLogger {
    sink: Arc<LogSink>,
}

impl LogdLogger {
    #[must_use]
    pub fn new(sink: Arc<LogSink>) -> Self {
        LogdLogger { sink }
    }
}

impl Logger for LogdLogger {
    fn log(&self, message: &LogMessage<'_>) -> Result<usize, WriteError> {
        let log_id = match message.log_id {
            LogId::Default => LogId::Main,
            other => other,
        };
        let priority = [u8::from(message.priority)];
        let tag = [message.tag.as_bytes(), b"\0"].concat();
        let text = [message.message.as_bytes(), b"\0"].concat();
        self.sink
            .write_to_log(log_id, &[&priority, &tag, &text], None)
            .map_err(|e| {
                if matches!(e, WriteError::Io(_)) {
                    debug!("Failed to send log record to daemon: {}", e);
                }
                e
            })
    }
}

/// Human-readable line: `MM-DD HH:MM:SS.mmm   pid   tid P tag     : [file:line ]message`.
#[must_use]
pub fn format_line(message: &LogMessage<'_>, now: DateTime<Local>, pid: u32, tid: u32) -> String {
    let location = match message.file {
        Some(file) => format!("{}:{} ", file, message.line),
        None => String::new(),
    };
    format!(
        "{} {:5} {:5} {} {:<8}: {}{}\n",
        now.format("%m-%d %H:%M:%S%.3f"),
        pid,
        tid,
        message.priority.as_char(),
        message.tag,
        location,
        message.message
    )
}

fn write_line<W: Write>(
    out: &mut W,
    message: &LogMessage<'_>,
    identity: &dyn ProcessIdentity,
) -> Result<usize, WriteError> {
    let line = format_line(message, Local::now(), identity.pid(), identity.tid());
    out.write_all(line.as_bytes())?;
    Ok(line.len())
}

/// Writes formatted lines to standard error.
pub struct StderrLogger {
    identity: Arc<dyn ProcessIdentity>,
}

impl StderrLogger {
    #[must_use]
    pub fn new(identity: Arc<dyn ProcessIdentity>) -> Self {
        StderrLogger { identity }
    }
}

impl Logger for StderrLogger {
    fn log(&self, message: &LogMessage<'_>) -> Result<usize, WriteError> {
        write_line(&mut io::stderr().lock(), message, self.identity.as_ref())
    }
}

/// Appends formatted lines to a file in place of the daemon.
pub struct FileLogger {
    file: Mutex<File>,
    identity: Arc<dyn ProcessIdentity>,
}

impl FileLogger {
    pub fn open(path: &Path, identity: Arc<dyn ProcessIdentity>) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(FileLogger {
            file: Mutex::new(file),
            identity,
        })
    }
}

impl Logger for FileLogger {
    fn log(&self, message: &LogMessage<'_>) -> Result<usize, WriteError> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        write_line(&mut *file, message, self.identity.as_ref())
    }
}

/// The daemon logger, unless a file override is configured. An override that cannot be
/// opened falls back to standard error.
pub fn default_logger(
    sink: Arc<LogSink>,
    file_override: Option<&Path>,
    identity: Arc<dyn ProcessIdentity>,
) -> Arc<dyn Logger> {
    let Some(path) = file_override else {
        return Arc::new(LogdLogger::new(sink));
    };
    match FileLogger::open(path, Arc::clone(&identity)) {
        Ok(logger) => Arc::new(logger),
        Err(e) => {
            warn!(
                "Cannot open {} for logging: ({}). Falling back to stderr",
                path.display(),
                e
            );
            Arc::new(StderrLogger::new(identity))
        }
    }
}
