// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire limits, well-known tags and the identities the logging path cares about.

/// Largest payload the daemon accepts for one record, header excluded.
pub const MAX_PAYLOAD: usize = 4068;

/// Formatting buffer for `print` style calls, terminating NUL included.
pub const LOG_BUF_SIZE: usize = 1024;

/// Well-known datagram socket the daemon reads records from.
pub const LOGDW_SOCKET_PATH: &str = "/dev/socket/logdw";

/// Tag the library logs its own housekeeping under.
pub const LIBLOG_TAG: &str = "liblog";

// Event log tags
pub const AUDITD_LOG_TAG: i32 = 1003;
pub const LIBLOG_LOG_TAG: i32 = 1006;

// Identities
pub const AID_ROOT: u32 = 0;
pub const AID_SYSTEM: u32 = 1000;
pub const AID_LOG: u32 = 1007;
pub const AID_LOGD: u32 = 1036;
pub const AID_SECURITY_LOG_WRITER: u32 = 1091;
pub const AID_APP_START: u32 = 10000;
pub const AID_APP_END: u32 = 19999;
