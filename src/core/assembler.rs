use super::database::PrincipalRecord;
use super::principal::Principal;
use super::reply::{EncReplyPart, LastReqEntry};
use super::request::KdcOptions;
use super::ticket::{has_flag, KerberosTime, TicketBody, TicketTimes};
use super::times::{compute_times, TimeRequest};
use chrono::{TimeZone, Utc};
use kerberos_constants::{kdc_options, ticket_flags};

/// Flags kept from the ticket a TGS request is based on.
const PROPAGATED_FLAGS: u32 = ticket_flags::PRE_AUTHENT
    | ticket_flags::HW_AUTHENT
    | ticket_flags::FORWARDED;

/// Flags a TGS ticket can only carry if the ticket it derives from has
/// them too.
const INHERITED_FLAGS: u32 = ticket_flags::FORWARDABLE
    | ticket_flags::PROXIABLE
    | ticket_flags::MAY_POSTDATE;

pub struct AssembleInputs<'a> {
    pub options: KdcOptions,
    pub times: TimeRequest<'a>,
    pub client: Option<&'a PrincipalRecord>,
    pub server: &'a PrincipalRecord,
    /// Flags of the header ticket, in TGS requests.
    pub header_flags: Option<u32>,
    /// The client proved its identity in an AS request.
    pub preauthenticated: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Assembled {
    pub times: TicketTimes,
    pub flags: u32,
}

/// Computes the times and flags of a new ticket.
pub fn assemble(inputs: &AssembleInputs) -> Assembled {
    let times = compute_times(&inputs.times);
    let mut flags = ticket_flags_for(inputs);

    if times.renew_till.map_or(false, |rtime| rtime > times.endtime) {
        flags |= ticket_flags::RENEWABLE;
    } else {
        flags &= !ticket_flags::RENEWABLE;
    }

    return Assembled {
        times: times.elide_starttime(),
        flags,
    };
}

fn options_to_flags(options: KdcOptions) -> u32 {
    let mut flags = 0;

    if options.has(kdc_options::FORWARDABLE) {
        flags |= ticket_flags::FORWARDABLE;
    }
    if options.has(kdc_options::FORWARDED) {
        flags |= ticket_flags::FORWARDED;
    }
    if options.has(kdc_options::PROXIABLE) {
        flags |= ticket_flags::PROXIABLE;
    }
    if options.has(kdc_options::PROXY) {
        flags |= ticket_flags::PROXY;
    }
    if options.has(kdc_options::ALLOW_POSTDATE) {
        flags |= ticket_flags::MAY_POSTDATE;
    }
    if options.has(kdc_options::POSTDATED) {
        flags |= ticket_flags::POSTDATE | ticket_flags::INVALID;
    }
    if options.has(kdc_options::REQUEST_ANONYMOUS) {
        flags |= ticket_flags::REQUEST_ANONYMOUS;
    }

    return flags;
}

/// Flags of a new ticket, except RENEWABLE which depends on its times.
pub fn ticket_flags_for(inputs: &AssembleInputs) -> u32 {
    let options = inputs.options;

    if let Some(header_flags) = inputs.header_flags {
        if options.has(kdc_options::VALIDATE) {
            return header_flags & !ticket_flags::INVALID;
        }
        if options.has(kdc_options::RENEW) {
            return header_flags;
        }
    }

    let mut flags = options_to_flags(options);

    match inputs.header_flags {
        Some(header_flags) => {
            flags |= header_flags & PROPAGATED_FLAGS;
            flags &= !(INHERITED_FLAGS & !header_flags);
        }
        None => {
            flags |= ticket_flags::INITIAL;
            if inputs.preauthenticated {
                flags |= ticket_flags::PRE_AUTHENT;
            }
        }
    }

    let records = inputs.client.into_iter().chain(Some(inputs.server));
    for record in records {
        if record.attributes.disallow_forwardable {
            flags &= !ticket_flags::FORWARDABLE;
        }
        if record.attributes.disallow_proxiable {
            flags &= !ticket_flags::PROXIABLE;
        }
    }

    if inputs.server.attributes.ok_as_delegate {
        flags |= ticket_flags::OK_AS_DELEGATE;
    }

    return flags;
}

/// Forwardable flag of a protocol transition ticket. It is cleared, never
/// refused, unless the user may have forwardable tickets, the service
/// ticket is forwardable and the service is trusted to authenticate as a
/// delegate.
pub fn protocol_transition_flags(
    flags: u32,
    user: Option<&PrincipalRecord>,
    header_flags: u32,
    service: &PrincipalRecord,
) -> u32 {
    let user_disallows =
        user.map_or(false, |u| u.attributes.disallow_forwardable);

    if user_disallows
        || !has_flag(header_flags, ticket_flags::FORWARDABLE)
        || !service.attributes.ok_to_auth_as_delegate
    {
        return flags & !ticket_flags::FORWARDABLE;
    }

    return flags;
}

/// Part of the reply readable by the client, mirroring the ticket.
pub fn reply_part(
    body: &TicketBody,
    server: &Principal,
    nonce: u32,
    key_expiration: Option<KerberosTime>,
) -> EncReplyPart {
    return EncReplyPart {
        session_key: body.session_key.clone(),
        last_req: vec![LastReqEntry {
            lr_type: 0,
            lr_value: Utc.timestamp(0, 0),
        }],
        nonce,
        key_expiration,
        flags: body.flags,
        times: body.times,
        server: server.clone(),
        addresses: body.addresses.clone(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::Attributes;
    use crate::core::times::LifetimeLimits;
    use chrono::Duration;

    fn record(name: &str) -> PrincipalRecord {
        return PrincipalRecord::new(Principal::user(name, "EXAMPLE.COM"));
    }

    fn inputs<'a>(
        options: u32,
        server: &'a PrincipalRecord,
        header_flags: Option<u32>,
    ) -> AssembleInputs<'a> {
        return AssembleInputs {
            options: KdcOptions::from(options),
            times: TimeRequest {
                now: Utc.timestamp(1_600_000_000, 0),
                options: KdcOptions::from(options),
                from: None,
                till: None,
                rtime: None,
                subject: None,
                evidence: None,
                limits: LifetimeLimits {
                    max_life: Some(Duration::hours(10)),
                    max_renewable_life: Some(Duration::days(7)),
                },
            },
            client: None,
            server,
            header_flags,
            preauthenticated: false,
        };
    }

    #[test]
    fn test_initial_flags() {
        let server = record("krbtgt");
        let mut inputs = inputs(
            kdc_options::FORWARDABLE | kdc_options::RENEWABLE,
            &server,
            None,
        );
        inputs.preauthenticated = true;

        let assembled = assemble(&inputs);
        assert!(has_flag(assembled.flags, ticket_flags::INITIAL));
        assert!(has_flag(assembled.flags, ticket_flags::PRE_AUTHENT));
        assert!(has_flag(assembled.flags, ticket_flags::FORWARDABLE));
        assert!(has_flag(assembled.flags, ticket_flags::RENEWABLE));
        assert_eq!(None, assembled.times.starttime);
    }

    #[test]
    fn test_tgs_inherits_from_header() {
        let server = record("svc");
        let header = ticket_flags::PRE_AUTHENT | ticket_flags::PROXIABLE;
        let flags = ticket_flags_for(&inputs(
            kdc_options::FORWARDABLE | kdc_options::PROXIABLE,
            &server,
            Some(header),
        ));
        assert!(!has_flag(flags, ticket_flags::FORWARDABLE));
        assert!(has_flag(flags, ticket_flags::PROXIABLE));
        assert!(has_flag(flags, ticket_flags::PRE_AUTHENT));
        assert!(!has_flag(flags, ticket_flags::INITIAL));
    }

    #[test]
    fn test_postdated_is_invalid() {
        let server = record("svc");
        let flags = ticket_flags_for(&inputs(kdc_options::POSTDATED, &server, None));
        assert!(has_flag(flags, ticket_flags::POSTDATE));
        assert!(has_flag(flags, ticket_flags::INVALID));
    }

    #[test]
    fn test_validate_clears_invalid() {
        let server = record("svc");
        let header = ticket_flags::POSTDATE | ticket_flags::INVALID;
        let flags = ticket_flags_for(&inputs(kdc_options::VALIDATE, &server, Some(header)));
        assert_eq!(ticket_flags::POSTDATE, flags);
    }

    #[test]
    fn test_server_attributes() {
        let server = record("svc").with_attributes(Attributes {
            ok_as_delegate: true,
            disallow_forwardable: true,
            ..Attributes::default()
        });
        let flags = ticket_flags_for(&inputs(kdc_options::FORWARDABLE, &server, None));
        assert!(has_flag(flags, ticket_flags::OK_AS_DELEGATE));
        assert!(!has_flag(flags, ticket_flags::FORWARDABLE));
    }

    #[test]
    fn test_protocol_transition_forwardable() {
        let user = record("alice");
        let service = record("svc").with_attributes(Attributes {
            ok_to_auth_as_delegate: true,
            ..Attributes::default()
        });

        let flags = ticket_flags::FORWARDABLE;
        assert_eq!(
            0,
            protocol_transition_flags(flags, Some(&user), 0, &service)
        );
        assert_eq!(
            flags,
            protocol_transition_flags(flags, Some(&user), ticket_flags::FORWARDABLE, &service)
        );
        assert_eq!(
            0,
            protocol_transition_flags(flags, Some(&user), ticket_flags::FORWARDABLE, &record("svc"))
        );
    }
}
