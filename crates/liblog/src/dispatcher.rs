// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The public logging API.
//!
//! Every text entry point checks the priority gate before it formats anything. Accepted
//! text records go to the active [`Logger`] hook; binary records go straight to the
//! [`LogSink`].

use std::ffi::OsStr;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use arc_swap::ArcSwap;

use crate::config::{config, LiblogConfig};
use crate::constants::{LOG_BUF_SIZE, MAX_PAYLOAD};
use crate::errors::WriteError;
use crate::event::EventType;
use crate::identity::{ProcessIdentity, SystemIdentity};
use crate::log_id::LogId;
use crate::logger::{default_logger, Aborter, DefaultAborter, LogMessage, LogdLogger, Logger};
use crate::mirror::DiscardMirror;
use crate::priority::Priority;
use crate::properties::LogFilter;
use crate::sink::LogSink;
use crate::writer::LogdWriter;

const UNKNOWN_PROGNAME: &str = "<unknown>";

pub struct LogDispatcher {
    sink: Arc<LogSink>,
    filter: Arc<LogFilter>,
    logd_logger: LogdLogger,
    logger: ArcSwap<Arc<dyn Logger>>,
    aborter: ArcSwap<Arc<dyn Aborter>>,
    default_tag: RwLock<Option<Arc<str>>>,
}

/// Process-wide dispatcher, built from [`config`] on first use.
pub fn dispatcher() -> &'static LogDispatcher {
    static DISPATCHER: OnceLock<LogDispatcher> = OnceLock::new();
    DISPATCHER.get_or_init(|| LogDispatcher::new(config()))
}

fn truncate_at_boundary(mut text: String, limit: usize) -> String {
    if text.len() > limit {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

fn progname() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .map(Path::new)
        .and_then(Path::file_name)
        .map(OsStr::to_string_lossy)
        .map(|name| name.into_owned())
        .unwrap_or_else(|| UNKNOWN_PROGNAME.to_string())
}

impl LogDispatcher {
    #[must_use]
    pub fn new(config: &LiblogConfig) -> Self {
        let identity: Arc<dyn ProcessIdentity> = Arc::new(SystemIdentity);
        let filter = Arc::new(LogFilter::new(config.tag_levels.clone()));
        let writer = LogdWriter::new(
            &config.socket_path,
            Arc::clone(&filter),
            Arc::clone(&identity),
        );
        let sink = Arc::new(LogSink::new(
            writer,
            Box::new(DiscardMirror),
            Arc::clone(&identity),
            config.security_enabled,
        ));
        let logger = default_logger(
            Arc::clone(&sink),
            config.file_logger_path.as_deref(),
            identity,
        );
        Self::from_parts(sink, filter, logger)
    }

    pub fn from_parts(sink: Arc<LogSink>, filter: Arc<LogFilter>, logger: Arc<dyn Logger>) -> Self {
        LogDispatcher {
            logd_logger: LogdLogger::new(Arc::clone(&sink)),
            sink,
            filter,
            logger: ArcSwap::from_pointee(logger),
            aborter: ArcSwap::from_pointee(Arc::new(DefaultAborter) as Arc<dyn Aborter>),
            default_tag: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    /// Sets the process-wide minimum priority and returns the previous one.
    pub fn set_minimum_priority(&self, priority: Priority) -> Priority {
        self.filter.set_minimum_priority(priority)
    }

    #[must_use]
    pub fn minimum_priority(&self) -> Priority {
        self.filter.minimum_priority()
    }

    #[must_use]
    pub fn is_loggable(&self, priority: Priority, tag: &str) -> bool {
        self.filter.is_loggable(priority, tag, Priority::Verbose)
    }

    /// Tag used when a caller gives none. Defaults to the program name.
    pub fn default_tag(&self) -> Arc<str> {
        if let Some(tag) = self
            .default_tag
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Arc::clone(tag);
        }
        let mut slot = self
            .default_tag
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(slot.get_or_insert_with(|| Arc::from(progname())))
    }

    pub fn set_default_tag(&self, tag: &str) {
        let tag = truncate_at_boundary(tag.to_string(), MAX_PAYLOAD);
        *self
            .default_tag
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::from(tag));
    }

    /// Runs `f` with the explicit tag, borrowed, or the default tag when none is given.
    fn with_tag<R>(&self, tag: Option<&str>, f: impl FnOnce(&str) -> R) -> R {
        match tag {
            Some(tag) if !tag.is_empty() => f(tag),
            _ => f(&self.default_tag()),
        }
    }

    /// Replaces the logger hook. Calls already in flight finish on the previous one.
    pub fn set_logger(&self, logger: Arc<dyn Logger>) {
        self.logger.store(Arc::new(logger));
    }

    pub fn set_aborter(&self, aborter: Arc<dyn Aborter>) {
        self.aborter.store(Arc::new(aborter));
    }

    pub fn call_aborter(&self, message: &str) {
        self.aborter.load().abort(message);
    }

    fn gate(&self, priority: Priority, tag: &str) -> Result<(), WriteError> {
        if self.is_loggable(priority, tag) {
            Ok(())
        } else {
            Err(WriteError::Permission)
        }
    }

    fn dispatch(&self, message: &LogMessage<'_>) -> Result<usize, WriteError> {
        if !matches!(
            message.log_id,
            LogId::Default | LogId::Main | LogId::System | LogId::Radio | LogId::Crash
        ) {
            return Ok(0);
        }
        self.logger.load().log(message)
    }

    pub fn write(&self, priority: Priority, tag: Option<&str>, message: &str) -> Result<usize, WriteError> {
        self.buf_write(LogId::Main, priority, tag, message)
    }

    pub fn buf_write(
        &self,
        log_id: LogId,
        priority: Priority,
        tag: Option<&str>,
        message: &str,
    ) -> Result<usize, WriteError> {
        self.with_tag(tag, |tag| {
            self.gate(priority, tag)?;
            self.dispatch(&LogMessage::new(log_id, priority, tag, message))
        })
    }

    pub fn print(
        &self,
        priority: Priority,
        tag: Option<&str>,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, WriteError> {
        self.buf_print(LogId::Main, priority, tag, args)
    }

    /// Formats into at most `LOG_BUF_SIZE - 1` bytes of text.
    pub fn buf_print(
        &self,
        log_id: LogId,
        priority: Priority,
        tag: Option<&str>,
        args: fmt::Arguments<'_>,
    ) -> Result<usize, WriteError> {
        self.with_tag(tag, |tag| {
            self.gate(priority, tag)?;
            let text = truncate_at_boundary(fmt::format(args), LOG_BUF_SIZE - 1);
            self.dispatch(&LogMessage::new(log_id, priority, tag, &text))
        })
    }

    /// Structured write. Only the text buffers are accepted; others are ignored. An empty
    /// tag is replaced by the default tag.
    pub fn write_log_message(&self, message: &LogMessage<'_>) -> Result<usize, WriteError> {
        self.with_tag(Some(message.tag), |tag| {
            self.gate(message.priority, tag)?;
            self.dispatch(&LogMessage { tag, ..*message })
        })
    }

    fn binary_write(&self, log_id: LogId, segments: &[&[u8]]) -> Result<usize, WriteError> {
        self.sink.write_to_log(log_id, segments, None)
    }

    pub fn bwrite(&self, tag: i32, payload: &[u8]) -> Result<usize, WriteError> {
        self.binary_write(LogId::Events, &[&tag.to_le_bytes(), payload])
    }

    pub fn btwrite(&self, tag: i32, kind: EventType, payload: &[u8]) -> Result<usize, WriteError> {
        self.binary_write(LogId::Events, &[&tag.to_le_bytes(), &[kind as u8], payload])
    }

    pub fn bswrite(&self, tag: i32, payload: &str) -> Result<usize, WriteError> {
        self.string_write(LogId::Events, tag, payload)
    }

    pub fn stats_bwrite(&self, tag: i32, payload: &[u8]) -> Result<usize, WriteError> {
        self.binary_write(LogId::Stats, &[&tag.to_le_bytes(), payload])
    }

    pub fn security_bwrite(&self, tag: i32, payload: &[u8]) -> Result<usize, WriteError> {
        self.binary_write(LogId::Security, &[&tag.to_le_bytes(), payload])
    }

    pub fn security_bswrite(&self, tag: i32, payload: &str) -> Result<usize, WriteError> {
        self.string_write(LogId::Security, tag, payload)
    }

    /// Writes a complete event payload, as produced by
    /// [`EventBuilder`](crate::event::EventBuilder), to a binary buffer.
    pub fn write_event(&self, log_id: LogId, event: &[u8]) -> Result<usize, WriteError> {
        let (tag, body) = event.split_at(event.len().min(4));
        self.binary_write(log_id, &[tag, body])
    }

    fn string_write(&self, log_id: LogId, tag: i32, payload: &str) -> Result<usize, WriteError> {
        let len = u32::try_from(payload.len()).map_err(|_| WriteError::InvalidArgument)?;
        self.binary_write(
            log_id,
            &[
                &tag.to_le_bytes(),
                &[EventType::String as u8],
                &len.to_le_bytes(),
                payload.as_bytes(),
            ],
        )
    }

    /// Logs the failure to standard error and at FATAL priority, calls the aborter, then
    /// aborts the process. The logger hook is bypassed.
    pub fn assert_and_abort(
        &self,
        condition: Option<&str>,
        tag: Option<&str>,
        args: Option<fmt::Arguments<'_>>,
    ) -> ! {
        let message = match (args, condition) {
            (Some(args), _) => fmt::format(args),
            (None, Some(condition)) => format!("Assertion failed: {}", condition),
            (None, None) => "Unspecified assertion failed".to_string(),
        };
        let message = truncate_at_boundary(message, LOG_BUF_SIZE - 1);

        let mut stderr = io::stderr().lock();
        let _ = stderr.write_all(message.as_bytes());
        let _ = stderr.write_all(b"\n");
        drop(stderr);

        self.with_tag(tag, |tag| {
            if self.is_loggable(Priority::Fatal, tag) {
                let _ = self
                    .logd_logger
                    .log(&LogMessage::new(LogId::Main, Priority::Fatal, tag, &message));
            }
        });

        self.call_aborter(&message);
        std::process::abort()
    }

    /// Releases both transport channels. Intended for use right after a fork, with no
    /// other thread writing.
    pub fn close(&self) {
        self.sink.writer().close();
    }
}
