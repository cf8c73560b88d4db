// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sends assembled records to the daemon over the matching transport channel.

use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::trace;

use crate::constants::{AID_LOGD, LIBLOG_LOG_TAG, LIBLOG_TAG};
use crate::dropped::DroppedCounter;
use crate::errors::WriteError;
use crate::event::int_event;
use crate::identity::ProcessIdentity;
use crate::log_id::LogId;
use crate::log_time::LogTime;
use crate::priority::Priority;
use crate::properties::LogFilter;
use crate::transport::{LogdSocket, Transport};
use crate::wire::{assemble, LogHeader, HEADER_SIZE};

pub struct LogdWriter {
    blocking: Arc<dyn Transport>,
    non_blocking: Arc<dyn Transport>,
    dropped: DroppedCounter,
    filter: Arc<LogFilter>,
    identity: Arc<dyn ProcessIdentity>,
    daemon_uid: u32,
}

impl LogdWriter {
    /// Writer with one blocking and one non-blocking socket to `socket_path`.
    pub fn new(
        socket_path: &Path,
        filter: Arc<LogFilter>,
        identity: Arc<dyn ProcessIdentity>,
    ) -> Self {
        Self::with_transports(
            Arc::new(LogdSocket::new(socket_path, true)),
            Arc::new(LogdSocket::new(socket_path, false)),
            filter,
            identity,
        )
    }

    pub fn with_transports(
        blocking: Arc<dyn Transport>,
        non_blocking: Arc<dyn Transport>,
        filter: Arc<LogFilter>,
        identity: Arc<dyn ProcessIdentity>,
    ) -> Self {
        LogdWriter {
            blocking,
            non_blocking,
            dropped: DroppedCounter::new(),
            filter,
            identity,
            daemon_uid: AID_LOGD,
        }
    }

    /// Overrides the uid whose writes are accepted as no-ops.
    #[must_use]
    pub fn with_daemon_uid(mut self, uid: u32) -> Self {
        self.daemon_uid = uid;
        self
    }

    /// Records lost so far and not yet reported.
    #[must_use]
    pub fn dropped(&self) -> i32 {
        self.dropped.get()
    }

    fn channel(&self, log_id: LogId) -> &dyn Transport {
        if log_id == LogId::Security {
            self.blocking.as_ref()
        } else {
            self.non_blocking.as_ref()
        }
    }

    /// Writes one record and returns the number of payload bytes the daemon accepted.
    ///
    /// A pending dropped count is reported first on the same channel. A failed send other
    /// than would-block is retried once after reconnecting; every failure adds one to the
    /// dropped count.
    pub fn write(
        &self,
        log_id: LogId,
        realtime: LogTime,
        segments: &[&[u8]],
    ) -> Result<usize, WriteError> {
        let transport = self.channel(log_id);
        if let Err(e) = transport.acquire() {
            trace!("No transport for {} buffer: {}", log_id, e);
            return Err(WriteError::BadDescriptor);
        }

        // The daemon's own writes would loop back into it.
        if self.identity.uid() == self.daemon_uid {
            return Ok(0);
        }

        let tid = self.identity.tid() as u16;
        self.report_dropped(transport, tid, realtime);

        let header = LogHeader {
            id: log_id,
            tid,
            realtime,
        };
        let datagram = assemble(&header, segments);

        match Self::send_with_retry(transport, &datagram) {
            Ok(n) if n > HEADER_SIZE => Ok(n - HEADER_SIZE),
            Ok(n) => Ok(n),
            Err(e) => {
                self.dropped.add(1);
                Err(e.into())
            }
        }
    }

    fn report_dropped(&self, transport: &dyn Transport, tid: u16, realtime: LogTime) {
        let snapshot = self.dropped.take();
        if snapshot == 0 || !self.filter.is_loggable(Priority::Info, LIBLOG_TAG, Priority::Verbose) {
            return;
        }

        let header = LogHeader {
            id: LogId::Events,
            tid,
            realtime,
        };
        let payload = int_event(LIBLOG_LOG_TAG, snapshot);
        if transport.send(&assemble(&header, &[&payload])).is_err() {
            self.dropped.add(snapshot);
        }
    }

    fn send_with_retry(transport: &dyn Transport, datagram: &[u8]) -> io::Result<usize> {
        match transport.send(datagram) {
            Err(e) if e.kind() != io::ErrorKind::WouldBlock => {
                trace!("Log write failed ({}), reconnecting", e);
                transport.reconnect();
                transport.send(datagram)
            }
            result => result,
        }
    }

    /// Closes both channels; the next write reconnects.
    pub fn close(&self) {
        self.blocking.reset();
        self.non_blocking.reset();
    }
}
