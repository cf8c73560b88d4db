// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Ingestion side of the log daemon: kernel audit messages and ring-buffer lines become
//! structured entries in the per-buffer log store.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod audit;
pub mod auditd;
pub mod bug_map;
pub mod config;
pub mod errors;
pub mod kmsg;
pub mod log_buffer;
pub mod netlink;
pub mod resolver;
