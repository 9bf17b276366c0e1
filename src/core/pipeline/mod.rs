//! Processing of AS and TGS requests, from the decoded request to the reply
//! or error to send back.

mod as_req;
mod context;
pub use context::{error_reply, Delegation, IssuanceContext};

mod log;
pub use self::log::RequestLog;

mod tgs_req;

use super::audit::{AuditSinks, AuditState};
use super::authdata::{AuthDataHook, CopyAuthData};
use super::crypto::{CryptoProvider, TicketKey};
use super::database::PrincipalRecord;
use super::forge::{build_kdc_rep, build_krb_error, decode_kdc_req};
use super::kdc_error::KdcError;
use super::policy::{PolicyHook, RealmPolicy};
use super::preauth::{EncTimestamp, PreauthModule};
use super::principal::Principal;
use super::realm::RealmContext;
use super::reply::{KdcErrorReply, KdcReply};
use super::request::KdcRequest;
use super::ticket::{DecryptedTicket, KerberosTime, Ticket, TicketBody};
use crate::Result;
use chrono::Utc;
use kerberos_constants::{error_codes, message_types};
use std::sync::Arc;

/// Result of a request.
#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Reply(KdcReply),
    Error(KdcErrorReply),
}

impl Outcome {
    pub fn is_reply(&self) -> bool {
        match self {
            Outcome::Reply(_) => true,
            Outcome::Error(_) => false,
        }
    }

    /// Wire encoding of the outcome: an AS-REP, a TGS-REP or a KRB-ERROR.
    pub fn build(&self) -> Result<Vec<u8>> {
        match self {
            Outcome::Reply(reply) => return Ok(build_kdc_rep(reply)?),
            Outcome::Error(error) => return Ok(build_krb_error(error)),
        }
    }
}

pub type Clock = Box<dyn Fn() -> KerberosTime + Send + Sync>;

/// Key distribution center of one realm. The realm and the collaborators
/// are only read, so a single instance serves concurrent requests.
pub struct Kdc {
    realm: RealmContext,
    crypto: Arc<dyn CryptoProvider>,
    policy: Box<dyn PolicyHook>,
    preauth: Vec<Box<dyn PreauthModule>>,
    authdata: Box<dyn AuthDataHook>,
    audit: AuditSinks,
    clock: Clock,
}

impl Kdc {
    pub fn new(realm: RealmContext, crypto: Arc<dyn CryptoProvider>) -> Self {
        return Self {
            realm,
            crypto,
            policy: Box::new(RealmPolicy::new()),
            preauth: vec![Box::new(EncTimestamp::new())],
            authdata: Box::new(CopyAuthData::new()),
            audit: AuditSinks::new(),
            clock: Box::new(Utc::now),
        };
    }

    pub fn with_policy(mut self, policy: Box<dyn PolicyHook>) -> Self {
        self.policy = policy;
        return self;
    }

    pub fn with_preauth(mut self, modules: Vec<Box<dyn PreauthModule>>) -> Self {
        self.preauth = modules;
        return self;
    }

    pub fn with_authdata(mut self, authdata: Box<dyn AuthDataHook>) -> Self {
        self.authdata = authdata;
        return self;
    }

    pub fn with_audit(mut self, audit: AuditSinks) -> Self {
        self.audit = audit;
        return self;
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        return self;
    }

    pub fn realm(&self) -> &RealmContext {
        return &self.realm;
    }

    pub fn crypto(&self) -> &dyn CryptoProvider {
        return self.crypto.as_ref();
    }

    pub fn policy(&self) -> &dyn PolicyHook {
        return self.policy.as_ref();
    }

    pub fn preauth(&self) -> &[Box<dyn PreauthModule>] {
        return &self.preauth;
    }

    pub fn authdata(&self) -> &dyn AuthDataHook {
        return self.authdata.as_ref();
    }

    pub fn audit(&self) -> &AuditSinks {
        return &self.audit;
    }

    pub fn now(&self) -> KerberosTime {
        return (self.clock)();
    }

    /// Opens the audit sinks. Called once before serving requests.
    pub fn start(&self) -> Result<()> {
        return self.audit.open();
    }

    /// Closes the audit sinks. Called once after the last request.
    pub fn stop(&self) {
        self.audit.close();
    }

    pub fn handle_as(&self, request: KdcRequest, from: &str) -> Outcome {
        return as_req::process(self, request, from);
    }

    /// Processes a TGS request whose header ticket was already decrypted
    /// and authenticated by the caller.
    pub fn handle_tgs(
        &self,
        request: KdcRequest,
        header: DecryptedTicket,
        from: &str,
    ) -> Outcome {
        return tgs_req::process(self, request, Some(header), from);
    }

    /// Processes an AS or TGS request. The header ticket of TGS requests is
    /// taken from their PA-TGS-REQ.
    pub fn handle(&self, request: KdcRequest, from: &str) -> Outcome {
        match request.msg_type {
            message_types::KRB_TGS_REQ => {
                return tgs_req::process(self, request, None, from)
            }
            _ => return as_req::process(self, request, from),
        }
    }

    /// Processes a DER encoded request and returns the DER encoded reply.
    pub fn handle_raw(&self, raw: &[u8], from: &str) -> Result<Vec<u8>> {
        let request = decode_kdc_req(raw)?;
        return self.handle(request, from).build();
    }
}

/// Ends a failed request: logs it, records it and builds the error reply.
fn fail(
    kdc: &Kdc,
    request: &KdcRequest,
    client: Option<&Principal>,
    error: KdcError,
    now: KerberosTime,
    audit: AuditState,
    log: RequestLog,
) -> Outcome {
    log.failure(&error);
    audit.finish_err(&error);
    return Outcome::Error(error_reply(
        kdc.realm().name(),
        request,
        client,
        &error,
        now,
    ));
}

fn message_type_error() -> KdcError {
    return KdcError::malformed(
        error_codes::KRB_AP_ERR_MSG_TYPE,
        "VALIDATE_MESSAGE_TYPE",
    );
}

/// Key of the server to encrypt its tickets: its newest key of a type the
/// KDC supports.
fn server_ticket_key(
    crypto: &dyn CryptoProvider,
    server: &PrincipalRecord,
) -> std::result::Result<TicketKey, KdcError> {
    return server
        .ticket_key(&crypto.supported_etypes())
        .map(TicketKey::from)
        .ok_or_else(|| {
            KdcError::policy(
                error_codes::KDC_ERR_ETYPE_NOSUPP,
                "FINDING_SERVER_KEY",
            )
            .with_detail(&format!("no usable key for {}", server.principal))
        });
}

fn seal_ticket(
    crypto: &dyn CryptoProvider,
    key: &TicketKey,
    server: &Principal,
    body: &TicketBody,
) -> std::result::Result<Ticket, KdcError> {
    let enc_part = crypto
        .encrypt_ticket(key, body)
        .map_err(|err| KdcError::internal("ENCRYPT_TICKET", &err.to_string()))?;

    return Ok(Ticket {
        server: server.clone(),
        enc_part,
    });
}
