use super::database::PrincipalRecord;
use super::realm::RealmConfig;
use super::request::KdcOptions;
use super::ticket::{KerberosTime, TicketTimes};
use chrono::{Duration, TimeZone, Utc};
use kerberos_constants::kdc_options;

/// Latest time representable in a ticket.
pub fn kdc_infinity() -> KerberosTime {
    return Utc.timestamp(2147483647, 0);
}

/// Lifetime ceilings of a ticket, from the realm and the principals
/// involved. `None` means unlimited.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LifetimeLimits {
    pub max_life: Option<Duration>,
    pub max_renewable_life: Option<Duration>,
}

impl LifetimeLimits {
    pub fn new(
        realm: &RealmConfig,
        client: Option<&PrincipalRecord>,
        server: Option<&PrincipalRecord>,
    ) -> Self {
        let mut limits = Self {
            max_life: realm.max_life,
            max_renewable_life: Some(realm.max_renewable_life),
        };

        for record in client.into_iter().chain(server.into_iter()) {
            limits.max_life = min_limit(limits.max_life, record.max_life);
            limits.max_renewable_life = min_limit(
                limits.max_renewable_life,
                record.max_renewable_life,
            );
        }

        return limits;
    }
}

fn min_limit(a: Option<Duration>, b: Option<Duration>) -> Option<Duration> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn add_limit(start: KerberosTime, limit: Option<Duration>) -> KerberosTime {
    return limit
        .and_then(|limit| start.checked_add_signed(limit))
        .unwrap_or_else(kdc_infinity)
        .min(kdc_infinity());
}

/// Inputs of the ticket time computation.
#[derive(Clone, Copy, Debug)]
pub struct TimeRequest<'a> {
    pub now: KerberosTime,
    pub options: KdcOptions,
    pub from: Option<KerberosTime>,
    pub till: Option<KerberosTime>,
    pub rtime: Option<KerberosTime>,
    /// Times of the ticket the new one derives from, in TGS requests.
    pub subject: Option<&'a TicketTimes>,
    /// Times of the evidence ticket in constrained delegation. The new
    /// ticket keeps its authtime and does not outlive it.
    pub evidence: Option<&'a TicketTimes>,
    pub limits: LifetimeLimits,
}

/// Times of the new ticket. The starttime is kept even when equal to the
/// authtime, it is elided when the reply is assembled.
pub fn compute_times(request: &TimeRequest) -> TicketTimes {
    if let Some(subject) = request.subject {
        if request.options.has(kdc_options::VALIDATE) {
            return *subject;
        }

        if request.options.has(kdc_options::RENEW) {
            return renewed_times(subject, request.now);
        }
    }

    let authtime = request
        .evidence
        .or(request.subject)
        .map(|subject| subject.authtime)
        .unwrap_or(request.now);

    let start = match request.from {
        Some(from) if request.options.has(kdc_options::POSTDATED) => from,
        _ => request.now,
    };

    let endtime = ticket_endtime(request, start);
    let renew_till = ticket_renew_till(request, start, endtime);

    return TicketTimes {
        authtime,
        starttime: Some(start),
        endtime,
        renew_till,
    };
}

/// A renewed ticket keeps its lifetime, starting now, but never goes past
/// its renew-till.
fn renewed_times(subject: &TicketTimes, now: KerberosTime) -> TicketTimes {
    let old_life = subject.endtime - subject.start();
    let renew_till = subject.renew_till.unwrap_or(subject.endtime);
    let endtime = now
        .checked_add_signed(old_life)
        .unwrap_or_else(kdc_infinity)
        .min(renew_till);

    return TicketTimes {
        authtime: subject.authtime,
        starttime: Some(now),
        endtime,
        renew_till: subject.renew_till,
    };
}

fn requested_till(request: &TimeRequest) -> KerberosTime {
    return request.till.unwrap_or_else(kdc_infinity).min(kdc_infinity());
}

fn ticket_endtime(request: &TimeRequest, start: KerberosTime) -> KerberosTime {
    let mut till = requested_till(request);

    if let Some(subject) = request.subject {
        till = till.min(subject.endtime);
    }
    if let Some(evidence) = request.evidence {
        till = till.min(evidence.endtime);
    }

    return till.min(add_limit(start, request.limits.max_life));
}

fn ticket_renew_till(
    request: &TimeRequest,
    start: KerberosTime,
    endtime: KerberosTime,
) -> Option<KerberosTime> {
    let till = requested_till(request);

    let mut rtime = if request.options.has(kdc_options::RENEWABLE) {
        request.rtime.unwrap_or_else(kdc_infinity)
    } else if request.options.has(kdc_options::RENEWABLE_OK) && till > endtime
    {
        till
    } else {
        return None;
    };

    if let Some(subject) = request.subject {
        rtime = rtime.min(subject.renew_till.unwrap_or(Utc.timestamp(0, 0)));
    }

    rtime = rtime.min(add_limit(start, request.limits.max_renewable_life));

    if rtime > endtime {
        return Some(rtime);
    }
    return None;
}
