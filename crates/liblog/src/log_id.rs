// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use derive_more::Display;

/// Logical log stream a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LogId {
    #[display("main")]
    Main,
    #[display("radio")]
    Radio,
    #[display("events")]
    Events,
    #[display("system")]
    System,
    #[display("crash")]
    Crash,
    #[display("stats")]
    Stats,
    #[display("security")]
    Security,
    /// Only the daemon itself files records here.
    #[display("kernel")]
    Kernel,
    /// Text written without an explicit buffer; routed to `Main`.
    #[display("default")]
    Default,
}

impl LogId {
    pub const ALL: [LogId; 8] = [
        LogId::Main,
        LogId::Radio,
        LogId::Events,
        LogId::System,
        LogId::Crash,
        LogId::Stats,
        LogId::Security,
        LogId::Kernel,
    ];

    /// Wire id. `Default` is sent as `Main`.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            LogId::Main | LogId::Default => 0,
            LogId::Radio => 1,
            LogId::Events => 2,
            LogId::System => 3,
            LogId::Crash => 4,
            LogId::Stats => 5,
            LogId::Security => 6,
            LogId::Kernel => 7,
        }
    }

    #[must_use]
    pub fn from_u8(id: u8) -> Option<Self> {
        LogId::ALL.get(usize::from(id)).copied()
    }

    /// Buffers whose first segment must carry a 4-byte event tag.
    #[must_use]
    pub fn is_binary(self) -> bool {
        matches!(self, LogId::Events | LogId::Stats | LogId::Security)
    }
}
