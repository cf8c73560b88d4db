// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Buffer-class validation and fan-out of one record to the daemon and the mirror.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::WriteError;
use crate::identity::{check_log_uid_permissions, ProcessIdentity};
use crate::log_id::LogId;
use crate::log_time::LogTime;
use crate::mirror::Mirror;
use crate::writer::LogdWriter;

/// Minimum length of the first segment of a binary record (its event tag).
const TAG_SEGMENT_MIN: usize = 4;

pub struct LogSink {
    writer: LogdWriter,
    mirror: Box<dyn Mirror>,
    identity: Arc<dyn ProcessIdentity>,
    security_enabled: AtomicBool,
}

impl LogSink {
    pub fn new(
        writer: LogdWriter,
        mirror: Box<dyn Mirror>,
        identity: Arc<dyn ProcessIdentity>,
        security_enabled: bool,
    ) -> Self {
        LogSink {
            writer,
            mirror,
            identity,
            security_enabled: AtomicBool::new(security_enabled),
        }
    }

    #[must_use]
    pub fn writer(&self) -> &LogdWriter {
        &self.writer
    }

    pub fn set_security_enabled(&self, enabled: bool) {
        self.security_enabled.store(enabled, Ordering::Relaxed);
    }

    #[must_use]
    pub fn security_enabled(&self) -> bool {
        self.security_enabled.load(Ordering::Relaxed)
    }

    fn validate(&self, log_id: LogId, segments: &[&[u8]]) -> Result<(), WriteError> {
        let tag_len = segments.first().map_or(0, |s| s.len());
        match log_id {
            LogId::Kernel => Err(WriteError::InvalidArgument),
            LogId::Security => {
                if tag_len < TAG_SEGMENT_MIN {
                    return Err(WriteError::Permission);
                }
                check_log_uid_permissions(self.identity.as_ref())?;
                if !self.security_enabled() {
                    return Err(WriteError::Permission);
                }
                Ok(())
            }
            LogId::Events | LogId::Stats if tag_len < TAG_SEGMENT_MIN => {
                Err(WriteError::Permission)
            }
            _ => Ok(()),
        }
    }

    /// Validates the record for its buffer, then sends it to the daemon and the mirror.
    ///
    /// Without an explicit `realtime` the record is stamped with the current time.
    pub fn write_to_log(
        &self,
        log_id: LogId,
        segments: &[&[u8]],
        realtime: Option<LogTime>,
    ) -> Result<usize, WriteError> {
        self.validate(log_id, segments)?;
        let realtime = realtime.unwrap_or_else(LogTime::now);

        let written = self.writer.write(log_id, realtime, segments);
        let _ = self.mirror.write(log_id, realtime, segments);
        written
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::constants::AID_SYSTEM;
    use crate::identity::tests::FakeIdentity;
    use crate::properties::LogFilter;
    use crate::transport::Transport;
    use crate::wire::HEADER_SIZE;
    use crate::writer::tests::ScriptedTransport;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMirror {
        records: Arc<Mutex<Vec<(LogId, Vec<u8>)>>>,
    }

    impl Mirror for RecordingMirror {
        fn write(
            &self,
            log_id: LogId,
            _: LogTime,
            segments: &[&[u8]],
        ) -> Result<usize, WriteError> {
            self.records.lock().unwrap().push((log_id, segments.concat()));
            Err(WriteError::BadDescriptor)
        }
    }

    struct Fixture {
        sink: LogSink,
        blocking: Arc<ScriptedTransport>,
        non_blocking: Arc<ScriptedTransport>,
        mirrored: Arc<Mutex<Vec<(LogId, Vec<u8>)>>>,
    }

    fn fixture(identity: FakeIdentity, security_enabled: bool) -> Fixture {
        let blocking = Arc::new(ScriptedTransport::default());
        let non_blocking = Arc::new(ScriptedTransport::default());
        let identity: Arc<dyn ProcessIdentity> = Arc::new(identity);
        let writer = LogdWriter::with_transports(
            Arc::clone(&blocking) as Arc<dyn Transport>,
            Arc::clone(&non_blocking) as Arc<dyn Transport>,
            Arc::new(LogFilter::default()),
            Arc::clone(&identity),
        );
        let mirror = RecordingMirror::default();
        let mirrored = Arc::clone(&mirror.records);
        Fixture {
            sink: LogSink::new(writer, Box::new(mirror), identity, security_enabled),
            blocking,
            non_blocking,
            mirrored,
        }
    }

    fn system() -> FakeIdentity {
        FakeIdentity {
            uid: AID_SYSTEM,
            ..FakeIdentity::app()
        }
    }

    #[test]
    fn test_kernel_buffer_is_rejected() {
        let f = fixture(system(), true);
        assert!(matches!(
            f.sink.write_to_log(LogId::Kernel, &[b"\x04", b"t\0", b"m\0"], None),
            Err(WriteError::InvalidArgument)
        ));
        assert!(f.non_blocking.sent().is_empty());
    }

    #[test]
    fn test_short_security_tag_is_rejected_before_io() {
        let f = fixture(system(), true);
        assert!(matches!(
            f.sink.write_to_log(LogId::Security, &[b"\x01\x00", b"payload"], None),
            Err(WriteError::Permission)
        ));
        assert!(f.blocking.sent().is_empty());
        assert!(f.mirrored.lock().unwrap().is_empty());
    }

    #[test]
    fn test_security_requires_credentials() {
        let f = fixture(FakeIdentity::app(), true);
        assert!(matches!(
            f.sink.write_to_log(LogId::Security, &[b"\x01\x00\x00\x00"], None),
            Err(WriteError::Permission)
        ));
        assert!(f.blocking.sent().is_empty());
    }

    #[test]
    fn test_security_requires_enabled_buffer() {
        let f = fixture(system(), false);
        assert!(matches!(
            f.sink.write_to_log(LogId::Security, &[b"\x01\x00\x00\x00"], None),
            Err(WriteError::Permission)
        ));

        f.sink.set_security_enabled(true);
        f.sink
            .write_to_log(LogId::Security, &[b"\x01\x00\x00\x00"], None)
            .unwrap();
        assert_eq!(f.blocking.sent().len(), 1);
    }

    #[test]
    fn test_short_event_tag_is_rejected() {
        let f = fixture(FakeIdentity::app(), false);
        for log_id in [LogId::Events, LogId::Stats] {
            assert!(f.sink.write_to_log(log_id, &[b"\x01"], None).is_err());
        }
        assert!(f.non_blocking.sent().is_empty());
    }

    #[test]
    fn test_mirror_failure_does_not_affect_result() {
        let f = fixture(FakeIdentity::app(), false);
        let realtime = LogTime::new(7, 8);
        let n = f
            .sink
            .write_to_log(LogId::Main, &[b"\x04", b"tag\0", b"hi\0"], Some(realtime))
            .unwrap();
        assert_eq!(n, 8);

        let mirrored = f.mirrored.lock().unwrap();
        assert_eq!(mirrored.as_slice(), &[(LogId::Main, b"\x04tag\0hi\0".to_vec())]);
        assert_eq!(&f.non_blocking.sent()[0][HEADER_SIZE..], b"\x04tag\0hi\0");
    }
}
