use super::principal_name::{from_kerberos_time, principal_from_name};
use super::ticket::ticket_from_asn1;
use crate::core::crypto::{CryptoProvider, TicketKey};
use crate::core::database::{LookupError, LookupFlags, PrincipalDb};
use crate::core::kdc_error::KdcError;
use crate::core::request::KdcRequest;
use crate::core::ticket::DecryptedTicket;
use chrono::{DateTime, Duration, Utc};
use kerberos_asn1::{ApReq, Asn1Object, Authenticator};
use kerberos_constants::error_codes;
use kerberos_constants::key_usages::KEY_USAGE_TGS_REQ_AUTHEN;
use kerberos_constants::pa_data_types::PA_TGS_REQ;
use log::debug;

/// Processes the AP-REQ of a TGS request: decrypts the ticket with the key
/// of its server and checks that the authenticator was made by the client
/// of the ticket within the allowed clock skew.
pub fn decrypt_header_ticket(
    request: &KdcRequest,
    db: &dyn PrincipalDb,
    crypto: &dyn CryptoProvider,
    now: DateTime<Utc>,
    clock_skew: Duration,
) -> Result<DecryptedTicket, KdcError> {
    let padata = request.find_padata(PA_TGS_REQ).ok_or_else(|| {
        KdcError::malformed(
            error_codes::KDC_ERR_PADATA_TYPE_NOSUPP,
            "PROCESS_TGS",
        )
        .with_detail("no PA-TGS-REQ in request")
    })?;

    let (_, ap_req) = ApReq::parse(&padata.value).map_err(|_| {
        KdcError::malformed(error_codes::KRB_ERR_GENERIC, "PROCESS_TGS")
            .with_detail("invalid AP-REQ")
    })?;

    let ticket = ticket_from_asn1(&ap_req.ticket);

    let server = db
        .lookup(&ticket.server, LookupFlags::server())
        .map_err(|err| match err {
            LookupError::NotFound => KdcError::malformed(
                error_codes::KRB_AP_ERR_NOT_US,
                "PROCESS_TGS",
            )
            .with_detail(&format!("unknown ticket server {}", ticket.server)),
            LookupError::Unavailable(s) => {
                KdcError::unavailable("PROCESS_TGS").with_detail(&s)
            }
            LookupError::Internal(s) => KdcError::internal("PROCESS_TGS", &s),
        })?;

    let key = server
        .find_key_version(ticket.enc_part.etype, ticket.enc_part.kvno)
        .ok_or_else(|| {
            KdcError::malformed(error_codes::KRB_AP_ERR_BADKEYVER, "PROCESS_TGS")
                .with_detail(&format!(
                    "no key of etype {} for {}",
                    ticket.enc_part.etype, ticket.server
                ))
        })?;

    let body = crypto
        .decrypt_ticket(&TicketKey::from(key), &ticket)
        .map_err(|err| {
            KdcError::malformed(
                error_codes::KRB_AP_ERR_BAD_INTEGRITY,
                "PROCESS_TGS",
            )
            .with_detail(&err.to_string())
        })?;

    let raw_authenticator = crypto
        .decrypt(
            &body.session_key.key,
            ap_req.authenticator.etype,
            KEY_USAGE_TGS_REQ_AUTHEN,
            &ap_req.authenticator.cipher,
        )
        .map_err(|err| {
            KdcError::malformed(
                error_codes::KRB_AP_ERR_BAD_INTEGRITY,
                "PROCESS_TGS",
            )
            .with_detail(&format!("authenticator: {}", err))
        })?;

    let (_, authenticator) =
        Authenticator::parse(&raw_authenticator).map_err(|_| {
            KdcError::malformed(error_codes::KRB_ERR_GENERIC, "PROCESS_TGS")
                .with_detail("invalid authenticator")
        })?;

    let author =
        principal_from_name(&authenticator.cname, &authenticator.crealm);
    if author != body.client {
        return Err(KdcError::malformed(
            error_codes::KRB_AP_ERR_BADMATCH,
            "PROCESS_TGS",
        )
        .with_detail(&format!(
            "authenticator of {} for ticket of {}",
            author, body.client
        )));
    }

    let ctime = from_kerberos_time(&authenticator.ctime);
    if ctime > now + clock_skew || ctime < now - clock_skew {
        return Err(KdcError::malformed(
            error_codes::KRB_AP_ERR_SKEW,
            "PROCESS_TGS",
        ));
    }

    debug!("Header ticket of {} for {}", body.client, ticket.server);

    return Ok(DecryptedTicket::new(ticket, body));
}
