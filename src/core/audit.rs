//! Audit trail of the requests: one record per request, whatever its
//! outcome, dispatched to every configured sink.

use super::kdc_error::{KdcError, Violation};
use super::principal::Principal;
use crate::error::Error;
use crate::Result;
use log::{info, warn};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::sync::Mutex;

/// Progress of a request through the pipeline. Stages only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    ServerLookup,
    PolicyValidation,
    TicketIssuance,
    ReplyEncryption,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AuditRecord {
    pub request_type: &'static str,
    pub stage: Stage,
    pub status: String,
    pub success: bool,
    pub error_code: Option<i32>,
    pub violation: Option<Violation>,
    pub from: String,
    pub client: Option<String>,
    pub server: Option<String>,
    pub header_ticket: Option<String>,
    pub evidence_ticket: Option<String>,
    pub issued_ticket: Option<String>,
}

/// Destination of audit records.
pub trait AuditSink: Send + Sync {
    /// Called once when the KDC starts.
    fn open(&self) -> Result<()> {
        return Ok(());
    }

    fn record(&self, record: &AuditRecord);

    /// Called once when the KDC stops.
    fn close(&self) {}
}

/// The audit sinks of a KDC.
#[derive(Default)]
pub struct AuditSinks {
    sinks: Vec<Box<dyn AuditSink>>,
}

impl AuditSinks {
    pub fn new() -> Self {
        return Self { sinks: Vec::new() };
    }

    pub fn with_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        return self;
    }

    pub fn is_empty(&self) -> bool {
        return self.sinks.is_empty();
    }

    pub fn open(&self) -> Result<()> {
        for sink in self.sinks.iter() {
            sink.open()?;
        }
        return Ok(());
    }

    pub fn close(&self) {
        for sink in self.sinks.iter() {
            sink.close();
        }
    }

    pub fn record(&self, record: &AuditRecord) {
        for sink in self.sinks.iter() {
            sink.record(record);
        }
    }
}

/// Writes the records through the `log` facade.
#[derive(Clone, Debug, Default)]
pub struct LogAuditSink {}

impl LogAuditSink {
    pub fn new() -> Self {
        return Self {};
    }
}

impl AuditSink for LogAuditSink {
    fn record(&self, record: &AuditRecord) {
        info!(
            "audit {} {:?} {} client={} server={}",
            record.request_type,
            record.stage,
            record.status,
            record.client.as_deref().unwrap_or("-"),
            record.server.as_deref().unwrap_or("-"),
        );
    }
}

/// Writes the records as JSON lines.
pub struct JsonAuditSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> JsonAuditSink<W> {
    pub fn new(writer: W) -> Self {
        return Self {
            writer: Mutex::new(writer),
        };
    }

    pub fn into_inner(self) -> W {
        return match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
    }
}

impl<W: Write + Send> AuditSink for JsonAuditSink<W> {
    fn open(&self) -> Result<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| Error::from("Audit writer poisoned"))?;
        writer
            .flush()
            .map_err(|err| Error::from(("Unable to open audit log", err)))?;
        return Ok(());
    }

    fn record(&self, record: &AuditRecord) {
        let line = match serde_json::to_string(record) {
            Ok(line) => line,
            Err(err) => {
                warn!("Unable to serialize audit record: {}", err);
                return;
            }
        };

        match self.writer.lock() {
            Ok(mut writer) => {
                if let Err(err) = writeln!(writer, "{}", line) {
                    warn!("Unable to write audit record: {}", err);
                }
            }
            Err(_) => warn!("Audit writer poisoned"),
        }
    }

    fn close(&self) {
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writer.flush();
        }
    }
}

/// Short identifier of a ticket: the first 32 hex digits of the SHA-256 of
/// its ciphertext.
pub fn fingerprint(cipher: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(cipher);
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(32);
    return digest;
}

/// Audit record of a request being processed. The record reaches the sinks
/// exactly once: when the request finishes, or when the state is dropped
/// without finishing.
pub struct AuditState<'a> {
    sinks: &'a AuditSinks,
    record: AuditRecord,
    flushed: bool,
}

impl<'a> AuditState<'a> {
    pub fn new(sinks: &'a AuditSinks, request_type: &'static str, from: &str) -> Self {
        return Self {
            sinks,
            record: AuditRecord {
                request_type,
                stage: Stage::Received,
                status: String::new(),
                success: false,
                error_code: None,
                violation: None,
                from: from.to_string(),
                client: None,
                server: None,
                header_ticket: None,
                evidence_ticket: None,
                issued_ticket: None,
            },
            flushed: false,
        };
    }

    pub fn stage(&self) -> Stage {
        return self.record.stage;
    }

    pub fn advance(&mut self, stage: Stage) {
        if stage > self.record.stage {
            self.record.stage = stage;
        }
    }

    pub fn set_client(&mut self, client: &Principal) {
        self.record.client = Some(client.to_string());
    }

    pub fn set_server(&mut self, server: &Principal) {
        self.record.server = Some(server.to_string());
    }

    pub fn set_header_ticket(&mut self, cipher: &[u8]) {
        self.record.header_ticket = Some(fingerprint(cipher));
    }

    pub fn set_evidence_ticket(&mut self, cipher: &[u8]) {
        self.record.evidence_ticket = Some(fingerprint(cipher));
    }

    pub fn set_issued_ticket(&mut self, cipher: &[u8]) {
        self.record.issued_ticket = Some(fingerprint(cipher));
    }

    pub fn finish_ok(mut self, status: &str) {
        self.record.success = true;
        self.record.status = status.to_string();
        self.flush();
    }

    pub fn finish_err(mut self, error: &KdcError) {
        self.record.success = false;
        self.record.status = error.status.to_string();
        self.record.error_code = Some(error.wire_code());
        self.record.violation = error.violation;
        self.flush();
    }

    fn flush(&mut self) {
        if !self.flushed {
            self.flushed = true;
            self.sinks.record(&self.record);
        }
    }
}

impl<'a> Drop for AuditState<'a> {
    fn drop(&mut self) {
        if !self.flushed {
            self.record.status = "ABANDONED".to_string();
            self.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kerberos_constants::error_codes;
    use std::sync::Arc;

    struct Recorder {
        records: Arc<Mutex<Vec<AuditRecord>>>,
    }

    impl AuditSink for Recorder {
        fn record(&self, record: &AuditRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }

    fn sinks() -> (AuditSinks, Arc<Mutex<Vec<AuditRecord>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let sinks = AuditSinks::new().with_sink(Box::new(Recorder {
            records: records.clone(),
        }));
        return (sinks, records);
    }

    #[test]
    fn test_stage_only_advances() {
        let (sinks, records) = sinks();
        let mut state = AuditState::new(&sinks, "TGS_REQ", "10.0.0.1");
        state.advance(Stage::PolicyValidation);
        state.advance(Stage::ServerLookup);
        assert_eq!(Stage::PolicyValidation, state.stage());
        state.finish_ok("ISSUE");

        let records = records.lock().unwrap();
        assert_eq!(1, records.len());
        assert!(records[0].success);
        assert_eq!(Stage::PolicyValidation, records[0].stage);
    }

    #[test]
    fn test_error_record() {
        let (sinks, records) = sinks();
        let state = AuditState::new(&sinks, "AS_REQ", "10.0.0.1");
        state.finish_err(&KdcError::unknown_client("CLIENT_NOT_FOUND"));

        let records = records.lock().unwrap();
        assert_eq!(1, records.len());
        assert_eq!("CLIENT_NOT_FOUND", records[0].status);
        assert_eq!(Some(error_codes::KDC_ERR_C_PRINCIPAL_UNKNOWN), records[0].error_code);
    }

    #[test]
    fn test_dropped_state_is_recorded_once() {
        let (sinks, records) = sinks();
        {
            let mut state = AuditState::new(&sinks, "AS_REQ", "10.0.0.1");
            state.advance(Stage::ServerLookup);
        }

        let records = records.lock().unwrap();
        assert_eq!(1, records.len());
        assert_eq!("ABANDONED", records[0].status);
    }

    #[test]
    fn test_json_sink() {
        let sink = JsonAuditSink::new(Vec::new());
        let sinks = AuditSinks::new();
        let mut state = AuditState::new(&sinks, "AS_REQ", "10.0.0.1");
        state.set_client(&Principal::user("alice", "EXAMPLE.COM"));
        state.set_issued_ticket(b"ciphertext");
        sink.record(&state.record);
        state.finish_ok("ISSUE");

        let output = String::from_utf8(sink.into_inner()).unwrap();
        let value: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!("alice@EXAMPLE.COM", value["client"]);
        assert_eq!("received", value["stage"]);
        assert_eq!(32, value["issued_ticket"].as_str().unwrap().len());
    }

    #[test]
    fn test_fingerprint() {
        assert_eq!(
            "ba7816bf8f01cfea414140de5dae2223",
            fingerprint(b"abc")
        );
    }
}
