// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::sync::Arc;

use liblog::constants::{AID_LOGD, AUDITD_LOG_TAG};
use liblog::{LogId, LogTime, Priority};
use logd::audit::LogAudit;
use logd::auditd::replay_kernel;
use logd::log_buffer::{LogBuffer, LogBufferHandle, LogBufferService, LogEntry};
use tempfile::TempDir;

const DENIAL: &str = "type=1400 audit(1620000000.123:45): avc: denied { read } for \
    name=\"data\" scontext=u:r:appdomain:s0 tcontext=u:object_r:shell_data_file:s0 \
    tclass=file permissive=0";

fn audit_for(dir: &TempDir, handle: &LogBufferHandle) -> LogAudit {
    let bug_map = dir.path().join("selinux_denial_metadata");
    fs::write(&bug_map, "# comment\nappdomain shell_data_file file 9999\n").unwrap();
    let buffer: Arc<dyn LogBuffer> = Arc::new(handle.clone());
    LogAudit::new(buffer, None).with_bug_map_paths(vec![bug_map])
}

fn main_message(entry: &LogEntry) -> (u8, &str, &str) {
    let payload = &entry.payload;
    let tag_end = payload[1..].iter().position(|&b| b == 0).unwrap() + 1;
    (
        payload[0],
        std::str::from_utf8(&payload[1..tag_end]).unwrap(),
        std::str::from_utf8(&payload[tag_end + 1..payload.len() - 1]).unwrap(),
    )
}

#[tokio::test]
async fn test_denial_lands_in_both_buffers() {
    let dir = TempDir::new().unwrap();
    let (service, handle) = LogBufferService::new(16);
    let service_task = tokio::spawn(service.run());
    let mut audit = audit_for(&dir, &handle);

    assert_eq!(audit.log_print(DENIAL).unwrap(), 2);

    let entries = handle.snapshot().await.unwrap();
    assert_eq!(entries.len(), 2);

    let events = &entries[0];
    assert_eq!(events.log_id, LogId::Events);
    assert_eq!(events.uid, AID_LOGD);
    assert_eq!(events.realtime, LogTime::new(1_620_000_000, 123_000_000));
    assert_eq!(&events.payload[..4], &AUDITD_LOG_TAG.to_le_bytes());
    let text = std::str::from_utf8(&events.payload[9..]).unwrap();
    assert!(text.starts_with("type=1400 audit(0.0:45): avc: denied"));
    assert!(text.ends_with("permissive=0 bug=9999"));

    let main = &entries[1];
    assert_eq!(main.log_id, LogId::Main);
    assert_eq!(main.realtime, events.realtime);
    let (priority, tag, message) = main_message(main);
    assert_eq!(priority, u8::from(Priority::Warn));
    assert_eq!(tag, "auditd");
    assert!(message.ends_with(" bug=9999"));
    assert_eq!(*main.payload.last().unwrap(), 0);

    handle.shutdown().unwrap();
    service_task.await.unwrap();
}

#[tokio::test]
async fn test_kernel_dump_replay() {
    let dir = TempDir::new().unwrap();
    let (service, handle) = LogBufferService::new(16);
    let service_task = tokio::spawn(service.run());
    let mut audit = audit_for(&dir, &handle);

    let dump = format!(
        "<6>[    0.000000] Booting Linux on physical CPU 0x0\n\
         <5>[    3.100000] {}\n\
         <5>[    4.200000] audit: type=1403 audit(1620000001.0:46): policy loaded auid=0\n",
        DENIAL.replace("permissive=0", "permissive=1"),
    );

    assert_eq!(replay_kernel(&mut audit, dump.as_bytes()), 4);

    let entries = handle.snapshot().await.unwrap();
    assert_eq!(entries.len(), 4);
    assert!(entries
        .iter()
        .filter(|entry| entry.log_id == LogId::Main)
        .all(|entry| main_message(entry).0 == u8::from(Priority::Info)));
    assert_eq!(entries[3].realtime, LogTime::new(1_620_000_001, 0));

    handle.shutdown().unwrap();
    service_task.await.unwrap();
}
