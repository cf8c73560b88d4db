// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::{SystemTime, UNIX_EPOCH};

const NS_PER_SEC: u32 = 1_000_000_000;

/// Realtime timestamp carried by every record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LogTime {
    pub sec: u32,
    pub nsec: u32,
}

impl LogTime {
    pub const EPOCH: LogTime = LogTime { sec: 0, nsec: 0 };

    #[must_use]
    pub const fn new(sec: u32, nsec: u32) -> Self {
        LogTime { sec, nsec }
    }

    /// Current realtime clock. A clock before the epoch reads as the epoch.
    #[must_use]
    pub fn now() -> Self {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| LogTime {
                sec: u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX),
                nsec: elapsed.subsec_nanos(),
            })
            .unwrap_or_default()
    }

    /// Parses `<seconds>.<fraction>` from the start of `text`.
    ///
    /// Returns the timestamp and the number of bytes consumed. Fraction digits past the
    /// ninth are consumed but do not contribute.
    #[must_use]
    pub fn parse_prefix(text: &str) -> Option<(LogTime, usize)> {
        let bytes = text.as_bytes();
        let sec_len = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
        if sec_len == 0 || bytes.get(sec_len) != Some(&b'.') {
            return None;
        }
        let sec: u32 = text[..sec_len].parse().ok()?;

        let frac_start = sec_len + 1;
        let frac_len = bytes[frac_start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count();
        if frac_len == 0 {
            return None;
        }

        let mut nsec: u32 = 0;
        let mut scale = NS_PER_SEC;
        for digit in &bytes[frac_start..frac_start + frac_len.min(9)] {
            scale /= 10;
            nsec += u32::from(digit - b'0') * scale;
        }

        Some((LogTime { sec, nsec }, frac_start + frac_len))
    }
}
