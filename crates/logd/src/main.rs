// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::io::Write;
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use logd::{
    audit::LogAudit,
    auditd::{replay_kernel, Auditd},
    config::LogdConfig,
    errors::AuditError,
    kmsg,
    log_buffer::{LogBuffer, LogBufferService},
    netlink::NetlinkAuditSocket,
};

#[tokio::main]
pub async fn main() {
    let config = match LogdConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            // No subscriber yet.
            eprintln!("logd: {}", e);
            return;
        }
    };

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(&config.log_level)
                .expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let (service, handle) = LogBufferService::new(config.max_entries_per_buffer);
    let service_task = tokio::spawn(service.run());

    let kmsg: Option<Box<dyn Write + Send>> = if config.auditd_dmesg {
        match kmsg::open_kmsg(&config.kmsg_path) {
            Ok(file) => Some(Box::new(file)),
            Err(e) => {
                warn!(
                    "Cannot open {}, audit messages will not be mirrored: {}",
                    config.kmsg_path.display(),
                    e
                );
                None
            }
        }
    } else {
        None
    };

    let buffer: Arc<dyn LogBuffer> = Arc::new(handle.clone());
    let mut audit = LogAudit::from_config(buffer, kmsg, &config);

    if config.kernel {
        match kmsg::read_ring_buffer() {
            Ok(dump) => {
                let stored = replay_kernel(&mut audit, &dump);
                info!("Replayed kernel ring buffer, {} audit records stored", stored);
            }
            Err(e) => warn!("Cannot read kernel ring buffer: {}", e),
        }
    }

    if config.auditd {
        match NetlinkAuditSocket::open(std::process::id()) {
            Ok(socket) => match Auditd::new(Box::new(socket), audit).spawn() {
                Ok(_) => info!("Audit listener started"),
                Err(e) => error!("Failed to start audit listener thread: {}", e),
            },
            Err(e) => error!("{}", AuditError::Open(e)),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    if let Err(e) = handle.shutdown() {
        debug!("Log buffer already stopped: {}", e);
    }
    if let Err(e) = service_task.await {
        error!("Log buffer service failed: {}", e);
    }
}
