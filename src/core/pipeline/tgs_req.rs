use super::context::{Delegation, IssuanceContext};
use super::log::RequestLog;
use super::{fail, message_type_error, seal_ticket, server_ticket_key, Kdc, Outcome};
use crate::core::assembler::{
    assemble, protocol_transition_flags, reply_part, AssembleInputs,
};
use crate::core::audit::{AuditState, Stage};
use crate::core::authdata::AuthDataContext;
use crate::core::crypto::TicketKey;
use crate::core::database::LookupFlags;
use crate::core::delegation::{
    constrained_delegation, protocol_transition, user_to_user,
};
use crate::core::forge::decrypt_header_ticket;
use crate::core::kdc_error::{KdcError, Violation};
use crate::core::policy::{apply_transit_policy, PolicyView};
use crate::core::referral::resolve;
use crate::core::reply::{KdcReply, ReplyKey};
use crate::core::request::KdcRequest;
use crate::core::ticket::{DecryptedTicket, KerberosTime, TicketBody};
use crate::core::times::{LifetimeLimits, TimeRequest};
use crate::core::transited;
use kerberos_constants::key_usages::KEY_USAGE_TGS_REP_ENC_PART_SESSION_KEY;
use kerberos_constants::{error_codes, kdc_options, message_types, ticket_flags};
use log::debug;

const REQUEST_TYPE: &str = "TGS_REQ";

/// Processes a TGS request. Without `header`, the header ticket is taken
/// from the PA-TGS-REQ of the request.
pub fn process(
    kdc: &Kdc,
    request: KdcRequest,
    header: Option<DecryptedTicket>,
    from: &str,
) -> Outcome {
    let now = kdc.now();
    let mut audit = AuditState::new(kdc.audit(), REQUEST_TYPE, from);
    let mut log = RequestLog::new(REQUEST_TYPE, &request, from);

    if request.msg_type != message_types::KRB_TGS_REQ {
        return fail(kdc, &request, None, message_type_error(), now, audit, log);
    }

    let header = match header {
        Some(header) => header,
        None => {
            let realm = kdc.realm();
            match decrypt_header_ticket(
                &request,
                realm.db.as_ref(),
                kdc.crypto(),
                now,
                realm.config.clock_skew,
            ) {
                Ok(header) => header,
                Err(err) => {
                    return fail(kdc, &request, None, err, now, audit, log)
                }
            }
        }
    };

    audit.set_header_ticket(&header.ticket.enc_part.cipher);
    audit.set_client(header.client());
    log.set_client(header.client());
    let header_client = header.client().clone();

    let request = request.unwrap_envelope();

    let result = match resolve_principals(kdc, &request, header, now, &mut audit, &mut log) {
        Ok(ctx) => issue(kdc, &request, ctx, &mut audit, &mut log),
        Err(err) => Err(err),
    };

    match result {
        Ok(reply) => {
            log.success("ISSUE");
            audit.finish_ok("ISSUE");
            return Outcome::Reply(reply);
        }
        Err(err) => {
            return fail(kdc, &request, Some(&header_client), err, now, audit, log)
        }
    }
}

fn resolve_principals(
    kdc: &Kdc,
    request: &KdcRequest,
    header: DecryptedTicket,
    now: KerberosTime,
    audit: &mut AuditState,
    log: &mut RequestLog,
) -> Result<IssuanceContext, KdcError> {
    let realm = kdc.realm();
    let crypto = kdc.crypto();
    let options = request.options;

    let requested = request.server.as_ref().ok_or_else(|| {
        KdcError::malformed(
            error_codes::KDC_ERR_S_PRINCIPAL_UNKNOWN,
            "NULL_SERVER",
        )
    })?;

    audit.advance(Stage::ServerLookup);
    let resolution = resolve(realm, requested, options)?;
    let server = resolution.record;
    let is_referral = resolution.is_referral;
    audit.set_server(&server.principal);

    let tgs = realm
        .db
        .lookup(&realm.tgs_principal(), LookupFlags::server())
        .map_err(|err| {
            err.into_kdc_error(
                KdcError::unknown_server("LOOKING_UP_TGS"),
                "LOOKING_UP_TGS",
            )
        })?;

    let server_name = if is_referral || options.has(kdc_options::CANONICALIZE) {
        server.principal.clone()
    } else {
        requested.clone()
    };

    let mut ctx = IssuanceContext {
        now,
        server,
        server_name,
        client: None,
        tgs,
        client_name: header.client().clone(),
        cross_realm: !realm.is_local(header.issuer_realm()),
        header: None,
        evidence: None,
        second_ticket: None,
        delegation: Delegation::None,
        is_referral,
    };

    if options.has(kdc_options::ENC_TKT_IN_SKEY) {
        ctx.second_ticket = Some(user_to_user(
            realm,
            crypto,
            request,
            &ctx.server.principal,
        )?);
    }

    if let Some(for_user) = &request.for_user {
        if options.has(kdc_options::CONSTRAINED_DELEGATION) {
            return Err(KdcError::policy(
                error_codes::KDC_ERR_BADOPTION,
                "S4U2SELF_WITH_S4U2PROXY",
            )
            .with_violation(Violation::ProtocolConstraint));
        }

        let transition = protocol_transition(
            realm,
            crypto,
            for_user,
            &header,
            &ctx.server,
            is_referral,
        )?;

        audit.set_client(&transition.user);
        log.set_delegation("S4U2SELF", &transition.user);
        ctx.client_name = transition.user;
        ctx.client = transition.user_record;
        ctx.delegation = Delegation::ProtocolTransition;
    } else if options.has(kdc_options::CONSTRAINED_DELEGATION) {
        let delegation = constrained_delegation(
            realm,
            crypto,
            kdc.policy(),
            request,
            &header,
            ctx.cross_realm,
            &ctx.tgs,
            requested,
        )?;

        audit.set_evidence_ticket(&delegation.evidence.ticket.enc_part.cipher);
        audit.set_client(&delegation.client);
        log.set_delegation("S4U2PROXY", &delegation.client);
        ctx.client_name = delegation.client;
        ctx.evidence = Some(delegation.evidence);
        ctx.delegation = Delegation::ConstrainedDelegation;
    }

    ctx.header = Some(header);
    return Ok(ctx);
}

fn issue(
    kdc: &Kdc,
    request: &KdcRequest,
    ctx: IssuanceContext,
    audit: &mut AuditState,
    log: &mut RequestLog,
) -> Result<KdcReply, KdcError> {
    let realm = kdc.realm();
    let config = &realm.config;
    let crypto = kdc.crypto();
    let options = request.options;
    let now = ctx.now;

    let header = ctx.header.as_ref().ok_or_else(|| {
        KdcError::internal("PROCESS_TGS", "no header ticket")
    })?;
    let subject = ctx.subject().unwrap_or(header);

    audit.advance(Stage::PolicyValidation);
    let mut view = PolicyView::new(request, config, now, &ctx.server);
    view.client = ctx.client.as_ref();
    view.header = Some(header);
    kdc.policy().check_constraints(&view)?;

    let transited = transited::compute(
        &subject.body.transited,
        subject.issuer_realm(),
        &ctx.client_name.realm,
        realm.name(),
        &ctx.server.principal.realm,
    )?;

    let ses_etype = crypto
        .select_session_etype(&request.etypes, Some(&ctx.server))
        .ok_or_else(|| {
            KdcError::policy(
                error_codes::KDC_ERR_ETYPE_NOSUPP,
                "BAD_ENCRYPTION_TYPE",
            )
        })?;

    let assembled = assemble(&AssembleInputs {
        options,
        times: TimeRequest {
            now,
            options,
            from: request.from,
            till: request.till,
            rtime: request.rtime,
            subject: Some(&header.body.times),
            evidence: ctx.evidence.as_ref().map(|e| &e.body.times),
            limits: LifetimeLimits::new(
                config,
                ctx.client.as_ref(),
                Some(&ctx.server),
            ),
        },
        client: ctx.client.as_ref(),
        server: &ctx.server,
        header_flags: Some(header.body.flags),
        preauthenticated: false,
    });

    let mut flags = assembled.flags;
    if ctx.is_protocol_transition() {
        flags = protocol_transition_flags(
            flags,
            ctx.client.as_ref(),
            header.body.flags,
            &ctx.server,
        );
    }

    flags = apply_transit_policy(
        kdc.policy(),
        config,
        options,
        &transited,
        &ctx.client_name.realm,
        &ctx.server.principal.realm,
        flags,
    )?;

    if options.has(kdc_options::CANONICALIZE)
        && request.server.as_ref() != Some(&ctx.server_name)
    {
        flags |= ticket_flags::NAME_CANONICALIZE;
    }

    // protocol transition tickets get authorization data of the user, not
    // of the service presenting the header ticket
    let subject_body = if ctx.is_protocol_transition() {
        None
    } else {
        Some(&subject.body)
    };
    let authorization_data =
        kdc.authdata().authorization_data(&AuthDataContext {
            msg_type: message_types::KRB_TGS_REQ,
            server: &ctx.server,
            subject: subject_body,
            force: ctx.is_protocol_transition(),
        })?;

    let addresses = if options
        .has_any(kdc_options::FORWARDED | kdc_options::PROXY)
    {
        request.addresses.clone()
    } else {
        subject.body.addresses.clone()
    };

    audit.advance(Stage::TicketIssuance);
    let session_key = crypto.make_random_key(ses_etype).map_err(|err| {
        KdcError::internal("MAKE_RANDOM_KEY", &err.to_string())
    })?;

    let body = TicketBody {
        flags,
        session_key,
        client: ctx.client_name.clone(),
        transited,
        times: assembled.times,
        addresses,
        authorization_data,
    };

    let ticket_key = match &ctx.second_ticket {
        Some(second) => {
            debug!("Encrypting ticket with the session key of {}", second.client());
            TicketKey::from(&second.body.session_key)
        }
        None => server_ticket_key(crypto, &ctx.server)?,
    };
    let ticket = seal_ticket(crypto, &ticket_key, &ctx.server_name, &body)?;
    audit.set_issued_ticket(&ticket.enc_part.cipher);

    audit.advance(Stage::ReplyEncryption);
    let part = reply_part(&body, &ctx.server_name, request.nonce, None);
    let reply_key = ReplyKey {
        key: header.body.session_key.clone(),
        kvno: None,
        usage: KEY_USAGE_TGS_REP_ENC_PART_SESSION_KEY,
    };
    let sealed_part = crypto
        .seal_reply(&reply_key, message_types::KRB_TGS_REP, &part)
        .map_err(|err| KdcError::internal("ENCRYPT_REPLY", &err.to_string()))?;

    if ctx.is_referral {
        debug!(
            "Referring {} to {} for {}",
            ctx.client_name, ctx.server_name,
            request.server.as_ref().map(|s| s.to_string()).unwrap_or_default()
        );
    }

    log.set_authtime(body.times.authtime);
    log.set_etypes(reply_key.key.etype, ticket_key.etype, ses_etype);

    return Ok(KdcReply {
        msg_type: message_types::KRB_TGS_REP,
        padata: Vec::new(),
        client: body.client,
        ticket,
        enc_part: part,
        sealed_part,
    });
}
