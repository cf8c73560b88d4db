// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Storage sink for ingested records.
//!
//! [`LogBufferService`] owns the entries and is driven through an unbounded channel, so
//! [`LogBufferHandle::log`] never blocks and can be called from plain threads.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use fnv::FnvBuildHasher;
use hashbrown::HashMap;
use liblog::{LogId, LogTime};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use crate::errors::LogBufferError;

/// One stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub sequence: u64,
    pub log_id: LogId,
    pub realtime: LogTime,
    pub uid: u32,
    pub pid: u32,
    pub tid: u32,
    pub payload: Vec<u8>,
}

/// Ingestion contract of the storage engine. Must tolerate concurrent callers.
pub trait LogBuffer: Send + Sync {
    /// Stores one record and returns its sequence number.
    fn log(
        &self,
        log_id: LogId,
        realtime: LogTime,
        uid: u32,
        pid: u32,
        tid: u32,
        payload: &[u8],
    ) -> Result<u64, LogBufferError>;
}

#[derive(Debug)]
pub enum LogBufferCommand {
    Insert(LogEntry),
    Snapshot(oneshot::Sender<Vec<LogEntry>>),
    Shutdown,
}

#[derive(Clone)]
pub struct LogBufferHandle {
    tx: mpsc::UnboundedSender<LogBufferCommand>,
    sequence: Arc<AtomicU64>,
}

impl LogBufferHandle {
    /// All retained entries, in sequence order.
    pub async fn snapshot(&self) -> Result<Vec<LogEntry>, LogBufferError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(LogBufferCommand::Snapshot(response_tx))
            .map_err(|_| LogBufferError::Closed)?;

        response_rx.await.map_err(|_| LogBufferError::Closed)
    }

    pub fn shutdown(&self) -> Result<(), LogBufferError> {
        self.tx
            .send(LogBufferCommand::Shutdown)
            .map_err(|_| LogBufferError::Closed)
    }
}

impl LogBuffer for LogBufferHandle {
    fn log(
        &self,
        log_id: LogId,
        realtime: LogTime,
        uid: u32,
        pid: u32,
        tid: u32,
        payload: &[u8],
    ) -> Result<u64, LogBufferError> {
        if payload.is_empty() {
            return Err(LogBufferError::EmptyPayload);
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = LogEntry {
            sequence,
            log_id,
            realtime,
            uid,
            pid,
            tid,
            payload: payload.to_vec(),
        };
        self.tx
            .send(LogBufferCommand::Insert(entry))
            .map_err(|_| LogBufferError::Closed)?;
        Ok(sequence)
    }
}

pub struct LogBufferService {
    buffers: HashMap<LogId, VecDeque<LogEntry>, FnvBuildHasher>,
    max_entries_per_buffer: usize,
    rx: mpsc::UnboundedReceiver<LogBufferCommand>,
}

impl LogBufferService {
    #[must_use]
    pub fn new(max_entries_per_buffer: usize) -> (Self, LogBufferHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let service = Self {
            buffers: HashMap::with_hasher(FnvBuildHasher::default()),
            max_entries_per_buffer: max_entries_per_buffer.max(1),
            rx,
        };

        let handle = LogBufferHandle {
            tx,
            sequence: Arc::new(AtomicU64::new(0)),
        };

        (service, handle)
    }

    fn insert(&mut self, entry: LogEntry) {
        let buffer = self.buffers.entry(entry.log_id).or_default();
        if buffer.len() >= self.max_entries_per_buffer {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    fn snapshot(&self) -> Vec<LogEntry> {
        let mut entries: Vec<LogEntry> = self.buffers.values().flatten().cloned().collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }

    pub async fn run(mut self) {
        debug!("Log buffer service started");

        while let Some(command) = self.rx.recv().await {
            match command {
                LogBufferCommand::Insert(entry) => self.insert(entry),

                LogBufferCommand::Snapshot(response_tx) => {
                    if response_tx.send(self.snapshot()).is_err() {
                        error!("Failed to send snapshot response - receiver dropped");
                    }
                }

                LogBufferCommand::Shutdown => {
                    debug!("Log buffer service shutting down");
                    break;
                }
            }
        }

        debug!("Log buffer service stopped");
    }
}
