// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Datagram layout shared by the client writer and the daemon.
//!
//! A record travels as one datagram: an 11-byte packed little-endian header
//! (`id: u8`, `tid: u16`, `sec: u32`, `nsec: u32`) followed by the caller's segments,
//! concatenated up to [`MAX_PAYLOAD`] bytes. The header does not count against the budget.

use crate::constants::MAX_PAYLOAD;
use crate::log_id::LogId;
use crate::log_time::LogTime;

pub const HEADER_SIZE: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogHeader {
    pub id: LogId,
    pub tid: u16,
    pub realtime: LogTime,
}

impl LogHeader {
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0] = self.id.as_u8();
        out[1..3].copy_from_slice(&self.tid.to_le_bytes());
        out[3..7].copy_from_slice(&self.realtime.sec.to_le_bytes());
        out[7..11].copy_from_slice(&self.realtime.nsec.to_le_bytes());
        out
    }

    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        let header: &[u8; HEADER_SIZE] = buf.get(..HEADER_SIZE)?.try_into().ok()?;
        let id = LogId::from_u8(header[0])?;
        let tid = u16::from_le_bytes([header[1], header[2]]);
        let sec = u32::from_le_bytes([header[3], header[4], header[5], header[6]]);
        let nsec = u32::from_le_bytes([header[7], header[8], header[9], header[10]]);
        Some(LogHeader {
            id,
            tid,
            realtime: LogTime::new(sec, nsec),
        })
    }
}

/// Clips an ordered list of segments to a cumulative byte budget.
///
/// The segment that crosses the budget is shortened, segments entirely past it are
/// dropped, and a segment clipped to nothing is dropped as well.
#[must_use]
pub fn clip_segments<'a>(segments: &[&'a [u8]], budget: usize) -> Vec<&'a [u8]> {
    let mut remaining = budget;
    let mut clipped = Vec::with_capacity(segments.len());
    for segment in segments {
        if segment.len() > remaining {
            if remaining > 0 {
                clipped.push(&segment[..remaining]);
            }
            break;
        }
        remaining -= segment.len();
        clipped.push(*segment);
    }
    clipped
}

/// Builds the datagram for one record: header, then segments clipped to [`MAX_PAYLOAD`].
#[must_use]
pub fn assemble(header: &LogHeader, segments: &[&[u8]]) -> Vec<u8> {
    let clipped = clip_segments(segments, MAX_PAYLOAD);
    let payload_len: usize = clipped.iter().map(|s| s.len()).sum();

    let mut datagram = Vec::with_capacity(HEADER_SIZE + payload_len);
    datagram.extend_from_slice(&header.encode());
    for segment in clipped {
        datagram.extend_from_slice(segment);
    }
    datagram
}
