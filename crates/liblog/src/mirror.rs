// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::WriteError;
use crate::log_id::LogId;
use crate::log_time::LogTime;

/// Secondary sink that receives a copy of every record sent to the daemon.
///
/// Its result never changes what the caller of a write sees.
pub trait Mirror: Send + Sync {
    fn write(&self, log_id: LogId, realtime: LogTime, segments: &[&[u8]])
        -> Result<usize, WriteError>;
}

/// Mirror used when no persistent store is present.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardMirror;

impl Mirror for DiscardMirror {
    fn write(&self, _: LogId, _: LogTime, segments: &[&[u8]]) -> Result<usize, WriteError> {
        Ok(segments.iter().map(|s| s.len()).sum())
    }
}
