use super::context::{Delegation, IssuanceContext};
use super::log::RequestLog;
use super::{fail, message_type_error, seal_ticket, server_ticket_key, Kdc, Outcome};
use crate::core::assembler::{assemble, reply_part, AssembleInputs};
use crate::core::audit::{AuditState, Stage};
use crate::core::authdata::AuthDataContext;
use crate::core::crypto::SessionKey;
use crate::core::database::LookupFlags;
use crate::core::forge::encode_etype_info2;
use crate::core::kdc_error::{ErrorClass, KdcError};
use crate::core::policy::PolicyView;
use crate::core::preauth::{verify_preauth, PreauthContext};
use crate::core::principal::Principal;
use crate::core::realm::RealmConfig;
use crate::core::reply::{KdcReply, ReplyKey};
use crate::core::request::{KdcRequest, PaData};
use crate::core::ticket::{KerberosTime, TicketBody};
use crate::core::times::{LifetimeLimits, TimeRequest};
use crate::core::transited::TransitedPath;
use kerberos_constants::key_usages::KEY_USAGE_AS_REP_ENC_PART;
use kerberos_constants::pa_data_types::PA_ETYPE_INFO2;
use kerberos_constants::{error_codes, kdc_options, message_types};
use log::debug;

const REQUEST_TYPE: &str = "AS_REQ";

pub fn process(kdc: &Kdc, request: KdcRequest, from: &str) -> Outcome {
    let now = kdc.now();
    let mut audit = AuditState::new(kdc.audit(), REQUEST_TYPE, from);
    let mut log = RequestLog::new(REQUEST_TYPE, &request, from);

    if request.msg_type != message_types::KRB_AS_REQ {
        return fail(kdc, &request, None, message_type_error(), now, audit, log);
    }

    let request = request.unwrap_envelope();

    let result = match resolve_principals(kdc, &request, now, &mut audit, &mut log) {
        Ok(ctx) => issue(kdc, &request, ctx, &mut audit, &mut log),
        Err(err) => Err(err),
    };

    match result {
        Ok(reply) => {
            log.success("ISSUE");
            audit.finish_ok("ISSUE");
            return Outcome::Reply(reply);
        }
        Err(err) => return fail(kdc, &request, None, err, now, audit, log),
    }
}

fn unknown_client(config: &RealmConfig) -> KdcError {
    if config.vague_errors {
        return KdcError::new(
            ErrorClass::UnknownPrincipal,
            error_codes::KRB_ERR_GENERIC,
            "LOOKING_UP_CLIENT",
        );
    }
    return KdcError::unknown_client("LOOKING_UP_CLIENT");
}

fn resolve_principals(
    kdc: &Kdc,
    request: &KdcRequest,
    now: KerberosTime,
    audit: &mut AuditState,
    log: &mut RequestLog,
) -> Result<IssuanceContext, KdcError> {
    let realm = kdc.realm();
    let config = &realm.config;
    let canonicalize = request.options.has(kdc_options::CANONICALIZE);

    let requested_client = request.client.as_ref().ok_or_else(|| {
        KdcError::malformed(
            error_codes::KDC_ERR_C_PRINCIPAL_UNKNOWN,
            "NULL_CLIENT",
        )
    })?;
    let requested_server = request.server.as_ref().ok_or_else(|| {
        KdcError::malformed(
            error_codes::KDC_ERR_S_PRINCIPAL_UNKNOWN,
            "NULL_SERVER",
        )
    })?;

    let client_flags = LookupFlags::client().canonicalize(canonicalize);
    let lookup = match request.client_certificate() {
        Some(certificate) => realm.db.lookup_certificate(
            certificate,
            requested_client,
            client_flags,
        ),
        None => realm.db.lookup(requested_client, client_flags),
    };
    let mut client = lookup.map_err(|err| {
        err.into_kdc_error(unknown_client(config), "LOOKING_UP_CLIENT")
    })?;
    audit.set_client(&client.principal);

    audit.advance(Stage::ServerLookup);
    let server = realm
        .db
        .lookup(
            requested_server,
            LookupFlags::server().canonicalize(canonicalize),
        )
        .map_err(|err| {
            err.into_kdc_error(
                KdcError::unknown_server("LOOKING_UP_SERVER"),
                "LOOKING_UP_SERVER",
            )
        })?;
    audit.set_server(&server.principal);

    if client.principal.realm != requested_server.realm {
        debug!(
            "{} belongs to {}, referring client",
            requested_client, client.principal.realm
        );
        return Err(KdcError::policy(
            error_codes::KDC_ERR_WRONG_REALM,
            "REFERRAL",
        )
        .with_client_referral(client.principal.clone()));
    }

    let tgs_name =
        Principal::tgs(&server.principal.realm, &server.principal.realm);
    let tgs = realm
        .db
        .lookup(&tgs_name, LookupFlags::server())
        .map_err(|err| {
            err.into_kdc_error(
                KdcError::unknown_server("LOOKING_UP_TGS"),
                "LOOKING_UP_TGS",
            )
        })?;

    let mut client_name = if canonicalize {
        client.principal.clone()
    } else {
        requested_client.clone()
    };

    if request.options.has(kdc_options::REQUEST_ANONYMOUS) {
        client_name = Principal::anonymous();
        client.attributes.requires_preauth = true;
    }
    log.set_client(&client_name);

    let server_name = if canonicalize {
        server.principal.clone()
    } else {
        requested_server.clone()
    };

    return Ok(IssuanceContext {
        now,
        server,
        server_name,
        client: Some(client),
        tgs,
        client_name,
        header: None,
        evidence: None,
        second_ticket: None,
        delegation: Delegation::None,
        is_referral: false,
        cross_realm: false,
    });
}

fn issue(
    kdc: &Kdc,
    request: &KdcRequest,
    ctx: IssuanceContext,
    audit: &mut AuditState,
    log: &mut RequestLog,
) -> Result<KdcReply, KdcError> {
    let config = &kdc.realm().config;
    let crypto = kdc.crypto();
    let options = request.options;
    let now = ctx.now;

    let client = ctx.client.as_ref().ok_or_else(|| {
        KdcError::internal("LOOKING_UP_CLIENT", "no client record")
    })?;

    audit.advance(Stage::PolicyValidation);
    let mut view = PolicyView::new(request, config, now, &ctx.server);
    view.client = Some(client);
    kdc.policy().check_constraints(&view)?;

    let preauthenticated = verify_preauth(
        kdc.preauth(),
        &PreauthContext {
            request,
            client,
            crypto,
            now,
            clock_skew: config.clock_skew,
        },
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
            subject: None,
            evidence: None,
            limits: LifetimeLimits::new(config, Some(client), Some(&ctx.server)),
        },
        client: Some(client),
        server: &ctx.server,
        header_flags: None,
        preauthenticated,
    });

    let supported = crypto.supported_etypes();
    let client_key = request
        .etypes
        .iter()
        .filter(|etype| supported.contains(etype))
        .find_map(|etype| client.find_key(*etype))
        .ok_or_else(|| {
            KdcError::policy(
                error_codes::KDC_ERR_ETYPE_NOSUPP,
                "CANT_FIND_CLIENT_KEY",
            )
        })?;

    let authorization_data =
        kdc.authdata().authorization_data(&AuthDataContext {
            msg_type: message_types::KRB_AS_REQ,
            server: &ctx.server,
            subject: None,
            force: false,
        })?;

    audit.advance(Stage::TicketIssuance);
    let session_key = crypto.make_random_key(ses_etype).map_err(|err| {
        KdcError::internal("MAKE_RANDOM_KEY", &err.to_string())
    })?;

    let body = TicketBody {
        flags: assembled.flags,
        session_key,
        client: ctx.client_name.clone(),
        transited: TransitedPath::empty(),
        times: assembled.times,
        addresses: request.addresses.clone(),
        authorization_data,
    };

    let server_key = server_ticket_key(crypto, &ctx.server)?;
    let ticket = seal_ticket(crypto, &server_key, &ctx.server_name, &body)?;
    audit.set_issued_ticket(&ticket.enc_part.cipher);

    audit.advance(Stage::ReplyEncryption);
    let part =
        reply_part(&body, &ctx.server_name, request.nonce, client.pw_expiration);
    let reply_key = ReplyKey {
        key: SessionKey::new(client_key.etype, client_key.key.clone()),
        kvno: Some(client_key.kvno),
        usage: KEY_USAGE_AS_REP_ENC_PART,
    };
    let sealed_part = crypto
        .seal_reply(&reply_key, message_types::KRB_AS_REP, &part)
        .map_err(|err| KdcError::internal("ENCRYPT_REPLY", &err.to_string()))?;

    let mut padata = Vec::new();
    if preauthenticated {
        padata.push(PaData::new(
            PA_ETYPE_INFO2,
            encode_etype_info2(&[(client_key.etype, client_key.salt.clone())]),
        ));
    }

    log.set_authtime(body.times.authtime);
    log.set_etypes(client_key.etype, server_key.etype, ses_etype);

    return Ok(KdcReply {
        msg_type: message_types::KRB_AS_REP,
        padata,
        client: ctx.client_name,
        ticket,
        enc_part: part,
        sealed_part,
    });
}
