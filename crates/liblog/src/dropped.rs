// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicI32, Ordering};

/// Lossy count of records that never reached the daemon.
///
/// Only ever touched with atomic add and exchange. Relaxed ordering is enough: the value
/// is a statistic, nothing else is published through it.
#[derive(Debug, Default)]
pub struct DroppedCounter {
    dropped: AtomicI32,
}

impl DroppedCounter {
    #[must_use]
    pub const fn new() -> Self {
        DroppedCounter {
            dropped: AtomicI32::new(0),
        }
    }

    /// Reads and clears the counter.
    pub fn take(&self) -> i32 {
        self.dropped.swap(0, Ordering::Relaxed)
    }

    pub fn add(&self, count: i32) {
        self.dropped.fetch_add(count, Ordering::Relaxed);
    }

    #[must_use]
    pub fn get(&self) -> i32 {
        self.dropped.load(Ordering::Relaxed)
    }
}
