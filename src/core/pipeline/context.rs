use crate::core::database::PrincipalRecord;
use crate::core::kdc_error::KdcError;
use crate::core::principal::Principal;
use crate::core::request::KdcRequest;
use crate::core::reply::KdcErrorReply;
use crate::core::ticket::{DecryptedTicket, KerberosTime};

/// How the client of the new ticket was established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delegation {
    None,
    /// S4U2Self: the service asserted the identity of the user.
    ProtocolTransition,
    /// S4U2Proxy: the service presented a ticket of the user.
    ConstrainedDelegation,
}

/// State of one request once its principals are resolved. Owned by the
/// request and dropped with it.
pub struct IssuanceContext {
    pub now: KerberosTime,
    pub server: PrincipalRecord,
    /// Name written in the ticket: the requested name, or the canonical or
    /// referral name.
    pub server_name: Principal,
    /// Missing in TGS requests which are not protocol transitions.
    pub client: Option<PrincipalRecord>,
    /// Local ticket-granting service, whose key checks the KDC signature
    /// of evidence tickets.
    pub tgs: PrincipalRecord,
    /// Client of the ticket to issue.
    pub client_name: Principal,
    /// Header ticket of TGS requests.
    pub header: Option<DecryptedTicket>,
    /// Ticket of the user presented in constrained delegation.
    pub evidence: Option<DecryptedTicket>,
    /// Second ticket of user-to-user requests, whose session key encrypts
    /// the new ticket.
    pub second_ticket: Option<DecryptedTicket>,
    pub delegation: Delegation,
    pub is_referral: bool,
    /// Whether the header ticket was issued by another realm.
    pub cross_realm: bool,
}

impl IssuanceContext {
    /// Ticket the times, the transited path and the authorization data
    /// derive from.
    pub fn subject(&self) -> Option<&DecryptedTicket> {
        return self.evidence.as_ref().or(self.header.as_ref());
    }

    pub fn is_protocol_transition(&self) -> bool {
        return self.delegation == Delegation::ProtocolTransition;
    }

    pub fn is_constrained_delegation(&self) -> bool {
        return self.delegation == Delegation::ConstrainedDelegation;
    }
}

/// Error reply sent for a failed request.
pub fn error_reply(
    realm: &str,
    request: &KdcRequest,
    client: Option<&Principal>,
    error: &KdcError,
    now: KerberosTime,
) -> KdcErrorReply {
    return KdcErrorReply {
        error_code: error.wire_code(),
        status: error.status,
        e_text: error.wire_text(),
        stime: now,
        realm: realm.to_string(),
        server: request.server.clone(),
        client: client.cloned().or_else(|| request.client.clone()),
        client_realm: error
            .client_referral
            .as_ref()
            .map(|client| client.realm.clone()),
        e_data: error.e_data.clone(),
    };
}
