use crate::core::kdc_error::KdcError;
use crate::core::principal::Principal;
use crate::core::request::KdcRequest;
use crate::core::stringifier::etypes_to_string;
use crate::core::ticket::KerberosTime;
use log::{info, warn};

/// Summary line of a request, written once when the request finishes.
pub struct RequestLog {
    kind: &'static str,
    etypes: Vec<i32>,
    from: String,
    authtime: Option<KerberosTime>,
    rep_etype: Option<i32>,
    tkt_etype: Option<i32>,
    ses_etype: Option<i32>,
    client: Option<Principal>,
    server: Option<Principal>,
    delegation: Option<String>,
}

impl RequestLog {
    pub fn new(kind: &'static str, request: &KdcRequest, from: &str) -> Self {
        return Self {
            kind,
            etypes: request.etypes.clone(),
            from: from.to_string(),
            authtime: None,
            rep_etype: None,
            tkt_etype: None,
            ses_etype: None,
            client: request.client.clone(),
            server: request.server.clone(),
            delegation: None,
        };
    }

    pub fn set_client(&mut self, client: &Principal) {
        self.client = Some(client.clone());
    }

    pub fn set_server(&mut self, server: &Principal) {
        self.server = Some(server.clone());
    }

    pub fn set_authtime(&mut self, authtime: KerberosTime) {
        self.authtime = Some(authtime);
    }

    pub fn set_etypes(&mut self, rep: i32, tkt: i32, ses: i32) {
        self.rep_etype = Some(rep);
        self.tkt_etype = Some(tkt);
        self.ses_etype = Some(ses);
    }

    /// Notes that the ticket is issued to `user` through delegation.
    pub fn set_delegation(&mut self, kind: &str, user: &Principal) {
        self.delegation = Some(format!("{} for {}", kind, user));
    }

    pub fn success(self, status: &str) {
        info!("{}", self.line(status, None));
    }

    pub fn failure(self, error: &KdcError) {
        warn!("{}", self.line(error.status, Some(error)));
    }

    fn line(&self, status: &str, error: Option<&KdcError>) -> String {
        let mut line = format!(
            "{} ({} etypes {}) {}: {}: authtime {}",
            self.kind,
            self.etypes.len(),
            etypes_to_string(&self.etypes),
            self.from,
            status,
            self.authtime.map(|t| t.timestamp()).unwrap_or(0),
        );

        if let (Some(rep), Some(tkt), Some(ses)) =
            (self.rep_etype, self.tkt_etype, self.ses_etype)
        {
            line.push_str(&format!(
                ", etypes {{rep={} tkt={} ses={}}}",
                rep, tkt, ses
            ));
        }

        line.push_str(&format!(
            ", {} for {}",
            principal_or_unknown(&self.client),
            principal_or_unknown(&self.server)
        ));

        if let Some(delegation) = &self.delegation {
            line.push_str(&format!(", {}", delegation));
        }

        if let Some(error) = error {
            line.push_str(&format!(", {}", error.wire_text()));
            if let Some(detail) = &error.detail {
                line.push_str(&format!(" ({})", detail));
            }
        }

        return line;
    }
}

fn principal_or_unknown(principal: &Option<Principal>) -> String {
    return principal
        .as_ref()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "<unknown>".to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kerberos_constants::message_types;

    fn request() -> KdcRequest {
        let mut request = KdcRequest::new(message_types::KRB_AS_REQ);
        request.etypes = vec![18, 17, 23];
        request.client = Some(Principal::user("alice", "EXAMPLE.COM"));
        request.server = Some(Principal::tgs("EXAMPLE.COM", "EXAMPLE.COM"));
        return request;
    }

    #[test]
    fn test_success_line() {
        let mut log = RequestLog::new("AS_REQ", &request(), "10.0.0.1");
        log.set_authtime(Utc.timestamp(1_600_000_000, 0));
        log.set_etypes(18, 18, 18);

        assert_eq!(
            "AS_REQ (3 etypes {18 17 23}) 10.0.0.1: ISSUE: authtime 1600000000, etypes {rep=18 tkt=18 ses=18}, alice@EXAMPLE.COM for krbtgt/EXAMPLE.COM@EXAMPLE.COM",
            log.line("ISSUE", None)
        );
    }

    #[test]
    fn test_failure_line() {
        let log = RequestLog::new("TGS_REQ", &request(), "10.0.0.1");
        let err = KdcError::unknown_server("LOOKING_UP_SERVER");
        let line = log.line(err.status, Some(&err));

        assert!(line.starts_with("TGS_REQ (3 etypes {18 17 23}) 10.0.0.1: LOOKING_UP_SERVER: authtime 0, alice@EXAMPLE.COM for "));
        assert!(line.ends_with(&err.wire_text()));
    }
}
