//! Service-for-user requests: a service obtaining tickets on behalf of a
//! user, either without any ticket of the user (protocol transition) or
//! with a ticket the user gave to the service (constrained delegation).
//! User-to-user second tickets are decrypted here as well.

use super::crypto::{CryptoProvider, KeyEntry, TicketKey};
use super::database::{LookupError, LookupFlags, PrincipalRecord};
use super::kdc_error::{KdcError, Violation};
use super::policy::PolicyHook;
use super::principal::Principal;
use super::realm::RealmContext;
use super::request::{ForUser, KdcRequest};
use super::ticket::{DecryptedTicket, Ticket};
use kerberos_constants::{error_codes, ticket_flags};
use log::debug;

fn protocol_error(code: i32, status: &'static str) -> KdcError {
    return KdcError::policy(code, status)
        .with_violation(Violation::ProtocolConstraint);
}

/// Record of a local principal, `None` for foreign ones or missing ones.
fn lookup_local(
    realm: &RealmContext,
    principal: &Principal,
    status: &'static str,
) -> Result<Option<PrincipalRecord>, KdcError> {
    if !realm.is_local(&principal.realm) {
        return Ok(None);
    }

    match realm.db.lookup(principal, LookupFlags::client()) {
        Ok(record) => return Ok(Some(record)),
        Err(LookupError::NotFound) => return Ok(None),
        Err(err) => {
            return Err(err.into_kdc_error(KdcError::unknown_client(status), status))
        }
    }
}

/// Key of `server` a ticket given along the request was encrypted with.
fn second_ticket_key<'a>(
    ticket: &Ticket,
    server: &'a PrincipalRecord,
) -> Result<&'a KeyEntry, KdcError> {
    return server
        .find_key_version(ticket.enc_part.etype, ticket.enc_part.kvno)
        .ok_or_else(|| {
            KdcError::malformed(
                error_codes::KRB_AP_ERR_BADKEYVER,
                "2ND_TKT_DECRYPT",
            )
        });
}

/// Decrypts a ticket given along the request with the key of its server.
fn decrypt_second_ticket(
    crypto: &dyn CryptoProvider,
    ticket: &Ticket,
    key: &KeyEntry,
) -> Result<DecryptedTicket, KdcError> {
    let body = crypto
        .decrypt_ticket(&TicketKey::from(key), ticket)
        .map_err(|err| {
            KdcError::malformed(
                error_codes::KRB_AP_ERR_BAD_INTEGRITY,
                "2ND_TKT_DECRYPT",
            )
            .with_detail(&err.to_string())
        })?;

    return Ok(DecryptedTicket::new(ticket.clone(), body));
}

/// Outcome of a protocol transition request.
#[derive(Clone, Debug, PartialEq)]
pub struct ProtocolTransition {
    /// The user the ticket is issued for.
    pub user: Principal,
    /// Record of the user when it belongs to the local realm.
    pub user_record: Option<PrincipalRecord>,
}

/// Validates a protocol transition request, where the service that owns the
/// header ticket asserts the identity of a user.
///
/// The assertion must be signed with the session key of the header ticket
/// and, unless the request is being referred to another realm, the ticket
/// must be requested by the service for itself.
pub fn protocol_transition(
    realm: &RealmContext,
    crypto: &dyn CryptoProvider,
    for_user: &ForUser,
    header: &DecryptedTicket,
    server: &PrincipalRecord,
    is_referral: bool,
) -> Result<ProtocolTransition, KdcError> {
    crypto
        .verify_for_user(for_user, &header.body.session_key)
        .map_err(|err| {
            protocol_error(
                error_codes::KRB_AP_ERR_MODIFIED,
                "INVALID_S4U2SELF_CHECKSUM",
            )
            .with_detail(&err.to_string())
        })?;

    if !is_referral && header.client() != &server.principal {
        return Err(protocol_error(
            error_codes::KDC_ERR_BADOPTION,
            "INVALID_S4U2SELF_REQUEST_SERVER_MISMATCH",
        )
        .with_detail(&format!(
            "{} requested a ticket for {}",
            header.client(),
            server.principal
        )));
    }

    let user = for_user.user.clone();
    let user_record = if realm.is_local(&user.realm) {
        let record = realm
            .db
            .lookup(&user, LookupFlags::client())
            .map_err(|err| {
                err.into_kdc_error(
                    KdcError::unknown_client("LOOKING_UP_S4U2SELF_PRINCIPAL"),
                    "LOOKING_UP_S4U2SELF_PRINCIPAL",
                )
            })?;

        if record.attributes.disabled {
            return Err(KdcError::policy(
                error_codes::KDC_ERR_CLIENT_REVOKED,
                "S4U2SELF_CLIENT_LOCKED_OUT",
            )
            .with_violation(Violation::LocalPolicy));
        }
        Some(record)
    } else {
        None
    };

    debug!("{} acts on behalf of {}", header.client(), user);

    return Ok(ProtocolTransition { user, user_record });
}

/// Whether the evidence ticket is a cross-realm TGT towards this realm,
/// issued by the same foreign realm as the header ticket.
fn is_referred_evidence(
    realm: &RealmContext,
    evidence_server: &Principal,
    header: &DecryptedTicket,
    cross_realm: bool,
) -> bool {
    return cross_realm
        && evidence_server.is_cross_tgs()
        && evidence_server.component(1) == Some(realm.name())
        && evidence_server == header.server();
}

/// Outcome of a constrained delegation request.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstrainedDelegation {
    /// Ticket the user gave to the service.
    pub evidence: DecryptedTicket,
    /// The user the ticket is issued for.
    pub client: Principal,
}

/// Validates a constrained delegation request, where the service that owns
/// the header ticket presents a ticket of the user for itself and asks for
/// a ticket of the user to `target`.
///
/// The evidence is either a ticket for the service itself or, when the
/// service belongs to another realm, the cross-realm TGT that realm issued
/// along with the header ticket. The user is the client of the evidence
/// ticket when that ticket is a local one for a local user. Otherwise only
/// an identity vouched for by the authorization data of the ticket is
/// accepted.
///
/// `cross_realm` tells whether the header ticket was issued by another
/// realm, and `tgs` is the record of the local ticket-granting service.
pub fn constrained_delegation(
    realm: &RealmContext,
    crypto: &dyn CryptoProvider,
    policy: &dyn PolicyHook,
    request: &KdcRequest,
    header: &DecryptedTicket,
    cross_realm: bool,
    tgs: &PrincipalRecord,
    target: &Principal,
) -> Result<ConstrainedDelegation, KdcError> {
    let ticket = request.second_ticket().ok_or_else(|| {
        protocol_error(error_codes::KDC_ERR_BADOPTION, "NO_2ND_TKT")
    })?;

    let evidence_server = realm
        .db
        .lookup(
            &ticket.server,
            LookupFlags::server().canonicalize(true).allow_referral(true),
        )
        .map_err(|err| {
            err.into_kdc_error(
                KdcError::unknown_server("2ND_TKT_SERVER"),
                "2ND_TKT_SERVER",
            )
        })?;

    let referred =
        is_referred_evidence(realm, &ticket.server, header, cross_realm);

    if !referred && &ticket.server != header.client() {
        return Err(protocol_error(
            error_codes::KDC_ERR_SERVER_NOMATCH,
            "EVIDENCE_TICKET_MISMATCH",
        )
        .with_detail(&format!(
            "evidence ticket for {} presented by {}",
            ticket.server,
            header.client()
        )));
    }

    let evidence_key = second_ticket_key(ticket, &evidence_server)?;
    let evidence = decrypt_second_ticket(crypto, ticket, evidence_key)?;

    if !evidence.has_flag(ticket_flags::FORWARDABLE) {
        return Err(protocol_error(
            error_codes::KDC_ERR_BADOPTION,
            "EVIDENCE_TKT_NOT_FORWARDABLE",
        ));
    }

    let tgs_key = tgs
        .ticket_key(&crypto.supported_etypes())
        .ok_or_else(|| KdcError::internal("LOOKING_UP_TGS", "no TGS key"))?;

    // the KDC signature of a referred ticket is made with a foreign key
    let kdc_key = if referred { None } else { Some(tgs_key) };
    let verdict = crypto
        .verify_authdata(&evidence.body, evidence_key, kdc_key)
        .map_err(|err| {
            protocol_error(
                error_codes::KRB_AP_ERR_BAD_INTEGRITY,
                "VERIFY_AUTH_DATA",
            )
            .with_detail(&err.to_string())
        })?;

    let client = if !referred && realm.is_local(&evidence.client().realm) {
        evidence.client().clone()
    } else {
        match verdict.client {
            Some(client) => client,
            None => {
                return Err(protocol_error(
                    error_codes::KDC_ERR_BADOPTION,
                    "BAD_AUTHDATA_PRINCIPAL",
                )
                .with_detail(&format!(
                    "no signed identity in evidence ticket of {}",
                    evidence.client()
                )))
            }
        }
    };

    let service = header.client();
    let service_record = lookup_local(realm, service, "LOOKING_UP_SERVICE")?;
    policy.check_allowed_to_delegate(service, service_record.as_ref(), target)?;

    debug!("{} delegates {} to {}", service, client, target);

    return Ok(ConstrainedDelegation { evidence, client });
}

/// Decrypts the second ticket of a user-to-user request: a ticket granting
/// ticket of the local realm owned by the requested server.
pub fn user_to_user(
    realm: &RealmContext,
    crypto: &dyn CryptoProvider,
    request: &KdcRequest,
    server: &Principal,
) -> Result<DecryptedTicket, KdcError> {
    let ticket = request.second_ticket().ok_or_else(|| {
        protocol_error(error_codes::KDC_ERR_BADOPTION, "NO_2ND_TKT")
    })?;

    if !ticket.server.is_local_tgs(realm.name()) {
        return Err(protocol_error(
            error_codes::KDC_ERR_POLICY,
            "2ND_TKT_NOT_TGS",
        ));
    }

    let tgs = realm
        .db
        .lookup(&ticket.server, LookupFlags::server())
        .map_err(|err| {
            err.into_kdc_error(
                KdcError::unknown_server("2ND_TKT_SERVER"),
                "2ND_TKT_SERVER",
            )
        })?;

    let second_key = second_ticket_key(ticket, &tgs)?;
    let second = decrypt_second_ticket(crypto, ticket, second_key)?;

    if second.client() != server {
        return Err(protocol_error(
            error_codes::KDC_ERR_SERVER_NOMATCH,
            "2ND_TKT_MISMATCH",
        )
        .with_detail(&format!(
            "second ticket of {} for {}",
            second.client(),
            server
        )));
    }

    return Ok(second);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crypto::{
        AuthDataVerdict, CryptoResult, KerberosCrypto, KeyBytes, KeyEntry,
        SessionKey,
    };
    use crate::core::database::MemoryDb;
    use crate::core::policy::{PolicyView, RealmPolicy};
    use crate::core::realm::RealmConfig;
    use crate::core::reply::{EncReplyPart, ReplyKey};
    use crate::core::ticket::{EncryptedPart, TicketBody, TicketTimes};
    use crate::core::transited::TransitedPath;
    use chrono::{Duration, TimeZone, Utc};
    use kerberos_constants::etypes::AES256_CTS_HMAC_SHA1_96;
    use kerberos_constants::message_types;
    use std::sync::Arc;

    const REALM: &str = "EXAMPLE.COM";

    /// Vouches for a fixed identity in every ticket.
    struct VouchingCrypto {
        inner: KerberosCrypto,
        client: Principal,
    }

    impl CryptoProvider for VouchingCrypto {
        fn supported_etypes(&self) -> Vec<i32> {
            return self.inner.supported_etypes();
        }

        fn make_random_key(&self, etype: i32) -> CryptoResult<SessionKey> {
            return self.inner.make_random_key(etype);
        }

        fn encrypt(&self, key: &KeyBytes, etype: i32, usage: i32, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
            return self.inner.encrypt(key, etype, usage, plaintext);
        }

        fn decrypt(&self, key: &KeyBytes, etype: i32, usage: i32, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
            return self.inner.decrypt(key, etype, usage, ciphertext);
        }

        fn encrypt_ticket(&self, key: &TicketKey, body: &TicketBody) -> CryptoResult<EncryptedPart> {
            return self.inner.encrypt_ticket(key, body);
        }

        fn decrypt_ticket(&self, key: &TicketKey, ticket: &Ticket) -> CryptoResult<TicketBody> {
            return self.inner.decrypt_ticket(key, ticket);
        }

        fn seal_reply(&self, key: &ReplyKey, msg_type: i32, part: &EncReplyPart) -> CryptoResult<EncryptedPart> {
            return self.inner.seal_reply(key, msg_type, part);
        }

        fn verify_authdata(&self, _body: &TicketBody, _server_key: &KeyEntry, _tgs_key: Option<&KeyEntry>) -> CryptoResult<AuthDataVerdict> {
            return Ok(AuthDataVerdict {
                client: Some(self.client.clone()),
            });
        }

        fn verify_for_user(&self, for_user: &ForUser, session_key: &SessionKey) -> CryptoResult<()> {
            return self.inner.verify_for_user(for_user, session_key);
        }
    }

    /// Leaves delegation decisions to the realm that issued the evidence.
    struct ForeignDelegationPolicy {}

    impl PolicyHook for ForeignDelegationPolicy {
        fn check_constraints(&self, view: &PolicyView) -> Result<(), KdcError> {
            return RealmPolicy::new().check_constraints(view);
        }

        fn check_allowed_to_delegate(
            &self,
            service: &Principal,
            service_record: Option<&PrincipalRecord>,
            target: &Principal,
        ) -> Result<(), KdcError> {
            if service.realm != REALM {
                return Ok(());
            }
            return RealmPolicy::new().check_allowed_to_delegate(service, service_record, target);
        }
    }

    fn key(byte: u8) -> KeyEntry {
        return KeyEntry::new(1, AES256_CTS_HMAC_SHA1_96, KeyBytes::new(vec![byte; 32]));
    }

    fn service() -> Principal {
        return Principal::service("HTTP", "web.example.com", REALM);
    }

    fn backend() -> Principal {
        return Principal::service("MSSQLSvc", "db.example.com", REALM);
    }

    fn realm() -> RealmContext {
        let mut db = MemoryDb::new(REALM);
        db.add(PrincipalRecord::new(Principal::tgs(REALM, REALM)).with_key(key(1)));
        let mut web = PrincipalRecord::new(service()).with_key(key(2));
        web.allowed_to_delegate_to = vec![backend()];
        db.add(web);
        db.add(PrincipalRecord::new(backend()).with_key(key(3)));
        db.add(PrincipalRecord::new(Principal::user("alice", REALM)).with_key(key(4)));
        db.add(PrincipalRecord::new(Principal::tgs("OTHER.ORG", REALM)).with_key(key(5)));
        return RealmContext::new(RealmConfig::new(REALM), Arc::new(db));
    }

    fn tgs() -> PrincipalRecord {
        return PrincipalRecord::new(Principal::tgs(REALM, REALM)).with_key(key(1));
    }

    fn body(client: Principal, flags: u32) -> TicketBody {
        let now = Utc.timestamp(1_600_000_000, 0);
        return TicketBody {
            flags,
            session_key: SessionKey::new(AES256_CTS_HMAC_SHA1_96, KeyBytes::new(vec![9; 32])),
            client,
            transited: TransitedPath::empty(),
            times: TicketTimes {
                authtime: now,
                starttime: None,
                endtime: now + Duration::hours(10),
                renew_till: None,
            },
            addresses: None,
            authorization_data: Vec::new(),
        };
    }

    fn ticket(server: Principal, body: &TicketBody, key: &KeyEntry) -> Ticket {
        let enc_part = KerberosCrypto::new()
            .encrypt_ticket(&TicketKey::from(key), body)
            .unwrap();
        return Ticket { server, enc_part };
    }

    fn header() -> DecryptedTicket {
        let body = body(service(), ticket_flags::FORWARDABLE);
        let tgs = Principal::tgs(REALM, REALM);
        let ticket = ticket(tgs, &body, &key(1));
        return DecryptedTicket::new(ticket, body);
    }

    fn proxy_request(evidence_client: Principal, flags: u32) -> KdcRequest {
        let mut request = KdcRequest::new(message_types::KRB_TGS_REQ);
        let evidence = body(evidence_client, flags);
        request.additional_tickets = vec![ticket(service(), &evidence, &key(2))];
        return request;
    }

    #[test]
    fn test_same_realm_evidence_client() {
        let request = proxy_request(Principal::user("alice", REALM), ticket_flags::FORWARDABLE);
        let delegation = constrained_delegation(
            &realm(),
            &KerberosCrypto::new(),
            &RealmPolicy::new(),
            &request,
            &header(),
            false,
            &tgs(),
            &backend(),
        )
        .unwrap();

        assert_eq!(Principal::user("alice", REALM), delegation.client);
    }

    #[test]
    fn test_cross_realm_evidence_fails_closed() {
        let request = proxy_request(Principal::user("bob", "OTHER.ORG"), ticket_flags::FORWARDABLE);
        let err = constrained_delegation(
            &realm(),
            &KerberosCrypto::new(),
            &RealmPolicy::new(),
            &request,
            &header(),
            false,
            &tgs(),
            &backend(),
        )
        .unwrap_err();

        assert_eq!("BAD_AUTHDATA_PRINCIPAL", err.status);
        assert_eq!(error_codes::KDC_ERR_BADOPTION, err.code);
        assert_eq!(Some(Violation::ProtocolConstraint), err.violation);
    }

    #[test]
    fn test_cross_realm_evidence_uses_authdata_identity() {
        let signed = Principal::user("robert", "OTHER.ORG");
        let crypto = VouchingCrypto {
            inner: KerberosCrypto::new(),
            client: signed.clone(),
        };
        let request = proxy_request(Principal::user("bob", "OTHER.ORG"), ticket_flags::FORWARDABLE);
        let delegation = constrained_delegation(
            &realm(),
            &crypto,
            &RealmPolicy::new(),
            &request,
            &header(),
            false,
            &tgs(),
            &backend(),
        )
        .unwrap();

        assert_eq!(signed, delegation.client);
    }

    fn foreign_service() -> Principal {
        return Principal::service("HTTP", "web.other.org", "OTHER.ORG");
    }

    /// Header and evidence of a service of OTHER.ORG, both cross-realm
    /// TGTs issued by OTHER.ORG.
    fn referred_request(evidence_client: Principal) -> (DecryptedTicket, KdcRequest) {
        let referral_tgs = Principal::tgs(REALM, "OTHER.ORG");
        let header_body = body(foreign_service(), ticket_flags::FORWARDABLE);
        let header_ticket = ticket(referral_tgs.clone(), &header_body, &key(5));

        let mut request = KdcRequest::new(message_types::KRB_TGS_REQ);
        let evidence = body(evidence_client, ticket_flags::FORWARDABLE);
        request.additional_tickets = vec![ticket(referral_tgs, &evidence, &key(5))];

        return (DecryptedTicket::new(header_ticket, header_body), request);
    }

    #[test]
    fn test_referred_evidence_uses_authdata_identity() {
        let signed = Principal::user("dave", "OTHER.ORG");
        let crypto = VouchingCrypto {
            inner: KerberosCrypto::new(),
            client: signed.clone(),
        };
        let (header, request) = referred_request(Principal::user("dave", "OTHER.ORG"));

        let delegation = constrained_delegation(
            &realm(),
            &crypto,
            &ForeignDelegationPolicy {},
            &request,
            &header,
            true,
            &tgs(),
            &backend(),
        )
        .unwrap();

        assert_eq!(signed, delegation.client);
        assert_eq!(&Principal::tgs(REALM, "OTHER.ORG"), delegation.evidence.server());
    }

    #[test]
    fn test_referred_evidence_without_authdata_fails_closed() {
        let (header, request) = referred_request(Principal::user("alice", REALM));

        let err = constrained_delegation(
            &realm(),
            &KerberosCrypto::new(),
            &ForeignDelegationPolicy {},
            &request,
            &header,
            true,
            &tgs(),
            &backend(),
        )
        .unwrap_err();

        assert_eq!("BAD_AUTHDATA_PRINCIPAL", err.status);
    }

    #[test]
    fn test_referred_evidence_needs_cross_realm_header() {
        let (header, request) = referred_request(Principal::user("dave", "OTHER.ORG"));

        let err = constrained_delegation(
            &realm(),
            &KerberosCrypto::new(),
            &ForeignDelegationPolicy {},
            &request,
            &header,
            false,
            &tgs(),
            &backend(),
        )
        .unwrap_err();

        assert_eq!("EVIDENCE_TICKET_MISMATCH", err.status);
        assert_eq!(error_codes::KDC_ERR_SERVER_NOMATCH, err.code);
    }

    #[test]
    fn test_evidence_must_be_forwardable() {
        let request = proxy_request(Principal::user("alice", REALM), 0);
        let err = constrained_delegation(
            &realm(),
            &KerberosCrypto::new(),
            &RealmPolicy::new(),
            &request,
            &header(),
            false,
            &tgs(),
            &backend(),
        )
        .unwrap_err();
        assert_eq!("EVIDENCE_TKT_NOT_FORWARDABLE", err.status);
    }

    #[test]
    fn test_delegation_target_not_allowed() {
        let request = proxy_request(Principal::user("alice", REALM), ticket_flags::FORWARDABLE);
        let err = constrained_delegation(
            &realm(),
            &KerberosCrypto::new(),
            &RealmPolicy::new(),
            &request,
            &header(),
            false,
            &tgs(),
            &Principal::user("alice", REALM),
        )
        .unwrap_err();
        assert_eq!("NOT_ALLOWED_TO_DELEGATE", err.status);
    }

    #[test]
    fn test_missing_evidence() {
        let request = KdcRequest::new(message_types::KRB_TGS_REQ);
        let err = constrained_delegation(
            &realm(),
            &KerberosCrypto::new(),
            &RealmPolicy::new(),
            &request,
            &header(),
            false,
            &tgs(),
            &backend(),
        )
        .unwrap_err();
        assert_eq!("NO_2ND_TKT", err.status);
    }

    #[test]
    fn test_protocol_transition_bad_checksum() {
        let for_user = ForUser {
            user: Principal::user("alice", REALM),
            cksumtype: kerberos_constants::checksum_types::HMAC_MD5,
            checksum: vec![0; 16],
            auth_package: "Kerberos".to_string(),
        };
        let server = PrincipalRecord::new(service());
        let err = protocol_transition(&realm(), &KerberosCrypto::new(), &for_user, &header(), &server, false)
            .unwrap_err();
        assert_eq!("INVALID_S4U2SELF_CHECKSUM", err.status);
    }

    #[test]
    fn test_user_to_user() {
        let tgs = Principal::tgs(REALM, REALM);
        let alice = Principal::user("alice", REALM);
        let mut request = KdcRequest::new(message_types::KRB_TGS_REQ);
        request.additional_tickets = vec![ticket(tgs, &body(alice.clone(), 0), &key(1))];

        let second = user_to_user(&realm(), &KerberosCrypto::new(), &request, &alice).unwrap();
        assert_eq!(&alice, second.client());

        let err = user_to_user(&realm(), &KerberosCrypto::new(), &request, &service()).unwrap_err();
        assert_eq!("2ND_TKT_MISMATCH", err.status);
        assert_eq!(error_codes::KDC_ERR_SERVER_NOMATCH, err.code);
    }

    #[test]
    fn test_user_to_user_needs_tgt() {
        let alice = Principal::user("alice", REALM);
        let mut request = KdcRequest::new(message_types::KRB_TGS_REQ);
        request.additional_tickets = vec![ticket(service(), &body(alice.clone(), 0), &key(2))];

        let err = user_to_user(&realm(), &KerberosCrypto::new(), &request, &alice).unwrap_err();
        assert_eq!("2ND_TKT_NOT_TGS", err.status);
    }
}
