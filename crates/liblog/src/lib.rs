// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client side of the system log: filters, formats and sends records to the log daemon
//! over a per-process datagram socket.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod constants;
pub mod dispatcher;
pub mod dropped;
pub mod errors;
pub mod event;
pub mod identity;
pub mod log_id;
pub mod log_time;
pub mod logger;
pub mod mirror;
pub mod priority;
pub mod properties;
pub mod sink;
pub mod transport;
pub mod wire;
pub mod writer;

pub use dispatcher::{dispatcher, LogDispatcher};
pub use errors::WriteError;
pub use log_id::LogId;
pub use log_time::LogTime;
pub use logger::{Aborter, LogMessage, Logger};
pub use priority::Priority;

/// Formats and writes a record to the main buffer through the process-wide dispatcher.
///
/// ```ignore
/// log_print!(Priority::Info, "netd", "interface {} up", name);
/// ```
#[macro_export]
macro_rules! log_print {
    ($priority:expr, $tag:expr, $($arg:tt)+) => {
        $crate::dispatcher().print($priority, Some($tag), format_args!($($arg)+))
    };
}

/// Aborts the process with a formatted message when `$cond` holds.
#[macro_export]
macro_rules! log_always_fatal_if {
    ($cond:expr, $tag:expr, $($arg:tt)+) => {
        if $cond {
            $crate::dispatcher().assert_and_abort(
                Some(stringify!($cond)),
                Some($tag),
                Some(format_args!($($arg)+)),
            )
        }
    };
}
