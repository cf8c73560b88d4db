// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::io;

/// Errors returned by the storage sink.
#[derive(Debug, thiserror::Error)]
pub enum LogBufferError {
    #[error("refusing to store an empty payload")]
    EmptyPayload,

    #[error("log buffer service is not running")]
    Closed,
}

/// Errors that can occur while loading daemon configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors raised by audit ingestion.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to open audit socket: {0}")]
    Open(#[source] io::Error),

    #[error("failed on audit receive: {0}")]
    Receive(#[source] io::Error),

    #[error("no audit record could be stored: {0}")]
    Store(#[from] LogBufferError),
}
