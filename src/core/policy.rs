//! Checks that decide whether a request may be granted at all, once its
//! principals are known.

use super::database::PrincipalRecord;
use super::kdc_error::{KdcError, Violation};
use super::principal::Principal;
use super::realm::RealmConfig;
use super::realm_tree::Capaths;
use super::request::{KdcOptions, KdcRequest};
use super::ticket::{DecryptedTicket, KerberosTime};
use super::times::kdc_infinity;
use super::transited::{check_transited_list, TransitError, TransitedPath};
use kerberos_constants::{error_codes, kdc_options, message_types, ticket_flags};
use log::{debug, info, warn};

/// Options that only make sense with an existing ticket.
const AS_INVALID_OPTIONS: u32 = kdc_options::FORWARDED
    | kdc_options::PROXY
    | kdc_options::VALIDATE
    | kdc_options::RENEW
    | kdc_options::ENC_TKT_IN_SKEY
    | kdc_options::CONSTRAINED_DELEGATION;

/// What the policy sees of a request: the resolved principals and the
/// requested ticket window.
pub struct PolicyView<'a> {
    pub request: &'a KdcRequest,
    pub realm: &'a RealmConfig,
    pub now: KerberosTime,
    pub client: Option<&'a PrincipalRecord>,
    pub server: &'a PrincipalRecord,
    /// Header ticket of TGS requests.
    pub header: Option<&'a DecryptedTicket>,
    pub start: KerberosTime,
    pub till: KerberosTime,
    pub rtime: Option<KerberosTime>,
}

impl<'a> PolicyView<'a> {
    pub fn new(
        request: &'a KdcRequest,
        realm: &'a RealmConfig,
        now: KerberosTime,
        server: &'a PrincipalRecord,
    ) -> Self {
        let start = match request.from {
            Some(from) if request.options.has(kdc_options::POSTDATED) => from,
            _ => now,
        };

        return Self {
            request,
            realm,
            now,
            client: None,
            server,
            header: None,
            start,
            till: request.till.unwrap_or_else(kdc_infinity),
            rtime: request.rtime,
        };
    }

    pub fn options(&self) -> KdcOptions {
        return self.request.options;
    }
}

pub trait PolicyHook: Send + Sync {
    /// Invoked once per request, after the principals are resolved and
    /// before the ticket is assembled.
    fn check_constraints(&self, view: &PolicyView) -> Result<(), KdcError>;

    /// Whether `service` may obtain tickets to `target` on behalf of other
    /// principals. `service_record` is missing for foreign services.
    fn check_allowed_to_delegate(
        &self,
        service: &Principal,
        service_record: Option<&PrincipalRecord>,
        target: &Principal,
    ) -> Result<(), KdcError>;

    /// Inspects a transited path for forbidden hops.
    fn check_transited(
        &self,
        path: &TransitedPath,
        client_realm: &str,
        server_realm: &str,
        capaths: &Capaths,
    ) -> Result<(), TransitError> {
        return check_transited_list(path, client_realm, server_realm, capaths);
    }
}

/// Policy driven by the realm settings and the principal attributes.
#[derive(Clone, Debug, Default)]
pub struct RealmPolicy {}

impl RealmPolicy {
    pub fn new() -> Self {
        return Self {};
    }
}

fn option_error(code: i32, status: &'static str) -> KdcError {
    return KdcError::policy(code, status)
        .with_violation(Violation::ProtocolConstraint);
}

fn attribute_error(code: i32, status: &'static str) -> KdcError {
    return KdcError::policy(code, status)
        .with_violation(Violation::LocalPolicy);
}

fn check_server(view: &PolicyView) -> Result<(), KdcError> {
    let server = view.server;
    if server.attributes.disabled {
        return Err(KdcError::unknown_server("SERVER_LOCKED_OUT")
            .with_violation(Violation::LocalPolicy));
    }
    if server.expiration.map_or(false, |exp| exp < view.now) {
        return Err(attribute_error(
            error_codes::KDC_ERR_SERVICE_EXP,
            "SERVICE_EXPIRED",
        ));
    }
    return Ok(());
}

fn check_client(view: &PolicyView, client: &PrincipalRecord) -> Result<(), KdcError> {
    if client.attributes.disabled {
        return Err(attribute_error(
            error_codes::KDC_ERR_CLIENT_REVOKED,
            "CLIENT_LOCKED_OUT",
        ));
    }
    if client.expiration.map_or(false, |exp| exp < view.now) {
        return Err(attribute_error(
            error_codes::KDC_ERR_NAME_EXP,
            "CLIENT_EXPIRED",
        ));
    }
    if client.pw_expiration.map_or(false, |exp| exp < view.now) {
        return Err(attribute_error(
            error_codes::KDC_ERR_KEY_EXPIRED,
            "CLIENT_KEY_EXPIRED",
        ));
    }
    return Ok(());
}

/// Checks the requested options against the attributes of a principal.
fn check_options_allowed(
    view: &PolicyView,
    record: &PrincipalRecord,
) -> Result<(), KdcError> {
    let options = view.options();
    let attributes = &record.attributes;

    if options.has(kdc_options::FORWARDABLE) && attributes.disallow_forwardable
    {
        return Err(attribute_error(
            error_codes::KDC_ERR_POLICY,
            "FORWARDABLE_NOT_ALLOWED",
        ));
    }
    if options.has(kdc_options::PROXIABLE) && attributes.disallow_proxiable {
        return Err(attribute_error(
            error_codes::KDC_ERR_POLICY,
            "PROXIABLE_NOT_ALLOWED",
        ));
    }
    if options.has_any(kdc_options::ALLOW_POSTDATE | kdc_options::POSTDATED)
        && attributes.disallow_postdated
    {
        return Err(attribute_error(
            error_codes::KDC_ERR_CANNOT_POSTDATE,
            "POSTDATE_NOT_ALLOWED",
        ));
    }
    if options.has(kdc_options::RENEWABLE) && attributes.disallow_renewable {
        return Err(attribute_error(
            error_codes::KDC_ERR_POLICY,
            "RENEWABLE_NOT_ALLOWED",
        ));
    }
    return Ok(());
}

fn check_window(view: &PolicyView) -> Result<(), KdcError> {
    if !view.options().has(kdc_options::POSTDATED) {
        if let Some(from) = view.request.from {
            if from > view.now + view.realm.clock_skew {
                return Err(option_error(
                    error_codes::KDC_ERR_CANNOT_POSTDATE,
                    "INVALID_STARTTIME",
                ));
            }
        }
    }

    if view.till < view.start {
        return Err(option_error(
            error_codes::KDC_ERR_NEVER_VALID,
            "NEVER_VALID",
        ));
    }
    return Ok(());
}

fn check_as(view: &PolicyView) -> Result<(), KdcError> {
    if view.options().has_any(AS_INVALID_OPTIONS) {
        return Err(option_error(
            error_codes::KDC_ERR_BADOPTION,
            "INVALID_AS_OPTIONS",
        ));
    }

    if let Some(client) = view.client {
        check_client(view, client)?;
        check_options_allowed(view, client)?;
    }
    check_server(view)?;
    check_options_allowed(view, view.server)?;

    return check_window(view);
}

fn check_tgs(view: &PolicyView, header: &DecryptedTicket) -> Result<(), KdcError> {
    let options = view.options();
    let now = view.now;
    let skew = view.realm.clock_skew;
    let times = &header.body.times;

    check_server(view)?;

    if header.has_flag(ticket_flags::INVALID)
        && !options.has(kdc_options::VALIDATE)
    {
        return Err(option_error(
            error_codes::KRB_AP_ERR_TKT_NYV,
            "TICKET_NOT_VALID",
        ));
    }

    if options.has(kdc_options::VALIDATE) {
        if !header.has_flag(ticket_flags::INVALID) {
            return Err(option_error(
                error_codes::KDC_ERR_POLICY,
                "VALIDATE_VALID_TICKET",
            ));
        }
        if times.start() > now + skew {
            return Err(option_error(
                error_codes::KRB_AP_ERR_TKT_NYV,
                "VALIDATE_NOT_YET_VALID",
            ));
        }
    }

    if options.has(kdc_options::RENEW) {
        if !header.has_flag(ticket_flags::RENEWABLE) {
            return Err(option_error(
                error_codes::KDC_ERR_BADOPTION,
                "TICKET_NOT_RENEWABLE",
            ));
        }
        if times.renew_till.map_or(true, |rtime| rtime < now) {
            return Err(option_error(
                error_codes::KRB_AP_ERR_TKT_EXPIRED,
                "TKT_EXPIRED",
            ));
        }
    }

    if times.endtime < now {
        return Err(option_error(
            error_codes::KRB_AP_ERR_TKT_EXPIRED,
            "TKT_EXPIRED",
        ));
    }

    if options.has(kdc_options::FORWARDED)
        && !header.has_flag(ticket_flags::FORWARDABLE)
    {
        return Err(option_error(
            error_codes::KDC_ERR_BADOPTION,
            "TGT_NOT_FORWARDABLE",
        ));
    }
    if options.has(kdc_options::PROXY)
        && !header.has_flag(ticket_flags::PROXIABLE)
    {
        return Err(option_error(
            error_codes::KDC_ERR_BADOPTION,
            "TGT_NOT_PROXIABLE",
        ));
    }
    if options.has_any(kdc_options::ALLOW_POSTDATE | kdc_options::POSTDATED)
        && !header.has_flag(ticket_flags::MAY_POSTDATE)
    {
        return Err(option_error(
            error_codes::KDC_ERR_BADOPTION,
            "TGT_NOT_POSTDATABLE",
        ));
    }

    if options.has_any(kdc_options::RENEW | kdc_options::VALIDATE) {
        if header.server() != &view.server.principal {
            return Err(option_error(
                error_codes::KDC_ERR_SERVER_NOMATCH,
                "SERVER_DIDNT_MATCH_TICKET",
            ));
        }
    } else if !header.server().is_tgs() {
        return Err(option_error(
            error_codes::KRB_AP_ERR_NOT_US,
            "TGT_SERVER_NOT_TGS",
        ));
    } else if header.server().component(1) != Some(view.realm.name.as_str()) {
        return Err(option_error(
            error_codes::KRB_AP_ERR_NOT_US,
            "TGT_FOR_OTHER_REALM",
        )
        .with_detail(&format!("header ticket for {}", header.server())));
    }

    if options.has(kdc_options::POSTDATED) {
        check_window(view)?;
    } else if view.till < now {
        return Err(option_error(
            error_codes::KDC_ERR_NEVER_VALID,
            "NEVER_VALID",
        ));
    }

    return Ok(());
}

impl PolicyHook for RealmPolicy {
    fn check_constraints(&self, view: &PolicyView) -> Result<(), KdcError> {
        match (view.request.msg_type, view.header) {
            (message_types::KRB_TGS_REQ, Some(header)) => {
                return check_tgs(view, header)
            }
            (message_types::KRB_TGS_REQ, None) => {
                return Err(KdcError::internal(
                    "CHECK_POLICY",
                    "TGS request without header ticket",
                ))
            }
            _ => return check_as(view),
        }
    }

    fn check_allowed_to_delegate(
        &self,
        service: &Principal,
        service_record: Option<&PrincipalRecord>,
        target: &Principal,
    ) -> Result<(), KdcError> {
        let allowed = service_record
            .map_or(false, |record| record.may_delegate_to(target));

        if !allowed {
            debug!("{} may not delegate to {}", service, target);
            return Err(option_error(
                error_codes::KDC_ERR_BADOPTION,
                "NOT_ALLOWED_TO_DELEGATE",
            ));
        }
        return Ok(());
    }
}

/// Runs the transit check on the path of a new ticket and returns its
/// flags, with TRANSITED_POLICY_CHECKED set when the path was verified.
///
/// A path that fails the check, or that the client asked not to check,
/// only stops the request when the realm rejects bad transits.
pub fn apply_transit_policy(
    policy: &dyn PolicyHook,
    realm: &RealmConfig,
    options: KdcOptions,
    path: &TransitedPath,
    client_realm: &str,
    server_realm: &str,
    flags: u32,
) -> Result<u32, KdcError> {
    let mut flags = flags;

    if !options.has(kdc_options::DISABLE_TRANSITED_CHECK) {
        match policy.check_transited(
            path,
            client_realm,
            server_realm,
            &realm.capaths,
        ) {
            Ok(()) => flags |= ticket_flags::TRANSITED_POLICY_CHECKED,
            Err(err) => warn!(
                "bad transited list from {} to {}: {}",
                client_realm, server_realm, err
            ),
        }
    } else {
        info!("not checking transit path");
    }

    if realm.reject_bad_transit
        && flags & ticket_flags::TRANSITED_POLICY_CHECKED == 0
    {
        return Err(KdcError::policy(error_codes::KDC_ERR_POLICY, "BAD_TRANSIT")
            .with_violation(Violation::LocalPolicy));
    }

    return Ok(flags);
}
