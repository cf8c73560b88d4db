// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Audit listener: one receive per iteration, each message fully ingested before the next.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::audit::LogAudit;
use crate::errors::AuditError;
use crate::kmsg;
use crate::netlink::AuditSource;

const THREAD_NAME: &str = "logd.auditd";

pub struct Auditd {
    source: Box<dyn AuditSource>,
    audit: LogAudit,
    stopped: Arc<AtomicBool>,
}

impl Auditd {
    #[must_use]
    pub fn new(source: Box<dyn AuditSource>, audit: LogAudit) -> Self {
        Auditd {
            source,
            audit,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the loop after the current receive returns.
    #[must_use]
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    /// Runs the listener on its own named thread.
    pub fn spawn(self) -> io::Result<JoinHandle<LogAudit>> {
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.spin())
    }

    /// Receives until the source fails for good or the stop flag is raised.
    /// Returns the ingestor so callers can inspect its final state.
    pub fn spin(mut self) -> LogAudit {
        while !self.stopped.load(Ordering::Relaxed) {
            if !self.consume() {
                break;
            }
        }
        debug!("Audit listener stopped");
        self.audit
    }

    fn consume(&mut self) -> bool {
        let message = match self.source.receive() {
            Ok(message) => message,
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) =>
            {
                return true;
            }
            Err(e) => {
                error!("Audit listener stopping: {}", AuditError::Receive(e));
                return false;
            }
        };

        match self.audit.on_audit_message(&message) {
            Ok(stored) => debug!("Stored {} records for audit type {}", stored, message.kind),
            Err(e) => warn!("Dropped audit message: {}", e),
        }
        true
    }
}

/// Feeds every audit line of a kernel ring-buffer dump through `audit`.
/// Returns the number of records stored.
pub fn replay_kernel(audit: &mut LogAudit, dump: &[u8]) -> usize {
    let mut stored = 0;
    for line in kmsg::lines(dump) {
        match audit.ingest_kernel_line(line) {
            Ok(n) => stored += n,
            Err(AuditError::Store(e)) => warn!("Dropped kernel audit line: {}", e),
            Err(e) => warn!("Kernel audit line rejected: {}", e),
        }
    }
    stored
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::audit::tests::{DaemonIdentity, RecordingBuffer, DENIAL};
    use crate::log_buffer::LogBuffer;
    use crate::netlink::AuditMessage;
    use liblog::LogId;
    use std::collections::VecDeque;
    use tracing_test::traced_test;

    // Replays a fixed script, then reports end of stream.
    struct ScriptedSource {
        script: VecDeque<io::Result<AuditMessage>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<io::Result<AuditMessage>>) -> Self {
            ScriptedSource {
                script: script.into(),
            }
        }
    }

    impl AuditSource for ScriptedSource {
        fn receive(&mut self) -> io::Result<AuditMessage> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(io::ErrorKind::UnexpectedEof.into()))
        }
    }

    fn denial_message() -> AuditMessage {
        let data = DENIAL.strip_prefix("type=1400 ").unwrap();
        AuditMessage {
            kind: 1400,
            data: data.as_bytes().to_vec(),
        }
    }

    fn audit(buffer: &Arc<RecordingBuffer>) -> LogAudit {
        LogAudit::new(Arc::clone(buffer) as Arc<dyn LogBuffer>, None)
            .with_bug_map_paths(Vec::new())
            .with_identity(Arc::new(DaemonIdentity))
    }

    #[test]
    #[traced_test]
    fn test_messages_are_ingested_in_order() {
        let buffer = Arc::new(RecordingBuffer::default());
        let source = ScriptedSource::new(vec![
            Ok(denial_message()),
            Err(io::ErrorKind::Interrupted.into()),
            Ok(AuditMessage {
                kind: 1403,
                data: b"audit(2.0:46): policy loaded auid=0".to_vec(),
            }),
        ]);

        let audit = Auditd::new(Box::new(source), audit(&buffer)).spin();

        assert!(audit.is_initialized());
        let entries = buffer.entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].log_id, LogId::Events);
        assert_eq!(entries[1].log_id, LogId::Main);
        assert_eq!(entries[3].realtime.sec, 2);
        assert!(logs_contain(
            "Audit listener stopping: failed on audit receive: unexpected end of file"
        ));
    }

    #[test]
    fn test_spawned_thread_is_named() {
        struct NameProbe;
        impl AuditSource for NameProbe {
            fn receive(&mut self) -> io::Result<AuditMessage> {
                assert_eq!(thread::current().name(), Some(THREAD_NAME));
                Err(io::ErrorKind::BrokenPipe.into())
            }
        }

        let buffer = Arc::new(RecordingBuffer::default());
        let handle = Auditd::new(Box::new(NameProbe), audit(&buffer))
            .spawn()
            .unwrap();
        let audit = handle.join().unwrap();
        assert!(!audit.is_initialized());
        assert!(buffer.entries().is_empty());
    }

    #[test]
    fn test_stop_flag_ends_loop() {
        let buffer = Arc::new(RecordingBuffer::default());
        let auditd = Auditd::new(
            Box::new(ScriptedSource::new(vec![Ok(denial_message())])),
            audit(&buffer),
        );
        auditd.stop_flag().store(true, Ordering::Relaxed);
        auditd.spin();
        assert!(buffer.entries().is_empty());
    }

    #[test]
    fn test_replay_kernel_dump() {
        let buffer = Arc::new(RecordingBuffer::default());
        let mut audit = audit(&buffer);
        let dump = format!(
            "<6>[    0.000000] Booting Linux\n<5>[   12.345678] {}\n\0",
            DENIAL
        );

        assert_eq!(replay_kernel(&mut audit, dump.as_bytes()), 2);
        assert!(!audit.is_initialized());
        assert_eq!(buffer.entries().len(), 2);
    }
}
