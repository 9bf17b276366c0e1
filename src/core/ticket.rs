use super::crypto::SessionKey;
use super::principal::Principal;
use super::transited::TransitedPath;
use chrono::{DateTime, Utc};

pub type KerberosTime = DateTime<Utc>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPart {
    pub etype: i32,
    pub kvno: Option<u32>,
    pub cipher: Vec<u8>,
}

impl EncryptedPart {
    pub fn new(etype: i32, kvno: Option<u32>, cipher: Vec<u8>) -> Self {
        return Self {
            etype,
            kvno,
            cipher,
        };
    }
}

/// A ticket as seen on the wire: the server it is for and the part
/// encrypted with the server key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub server: Principal,
    pub enc_part: EncryptedPart,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TicketTimes {
    pub authtime: KerberosTime,
    pub starttime: Option<KerberosTime>,
    pub endtime: KerberosTime,
    pub renew_till: Option<KerberosTime>,
}

impl TicketTimes {
    /// Effective start of validity. An absent starttime means authtime.
    pub fn start(&self) -> KerberosTime {
        return self.starttime.unwrap_or(self.authtime);
    }

    /// Drops the starttime when it carries no information.
    pub fn elide_starttime(mut self) -> Self {
        if self.starttime == Some(self.authtime) {
            self.starttime = None;
        }
        return self;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthDataEntry {
    pub ad_type: i32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAddress {
    pub addr_type: i32,
    pub address: Vec<u8>,
}

/// The decrypted contents of a ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketBody {
    pub flags: u32,
    pub session_key: SessionKey,
    pub client: Principal,
    pub transited: TransitedPath,
    pub times: TicketTimes,
    pub addresses: Option<Vec<HostAddress>>,
    pub authorization_data: Vec<AuthDataEntry>,
}

impl TicketBody {
    pub fn has_flag(&self, flag: u32) -> bool {
        return self.flags & flag != 0;
    }
}

/// A ticket presented to the KDC, already decrypted by the caller or by the
/// crypto provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptedTicket {
    pub ticket: Ticket,
    pub body: TicketBody,
}

impl DecryptedTicket {
    pub fn new(ticket: Ticket, body: TicketBody) -> Self {
        return Self { ticket, body };
    }

    pub fn server(&self) -> &Principal {
        return &self.ticket.server;
    }

    pub fn client(&self) -> &Principal {
        return &self.body.client;
    }

    /// Realm of the KDC that issued the ticket.
    pub fn issuer_realm(&self) -> &str {
        return &self.ticket.server.realm;
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        return self.body.has_flag(flag);
    }
}

pub fn has_flag(flags: u32, flag: u32) -> bool {
    return flags & flag != 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_elide_starttime() {
        let now = Utc::now();
        let times = TicketTimes {
            authtime: now,
            starttime: Some(now),
            endtime: now + Duration::hours(1),
            renew_till: None,
        };
        assert_eq!(None, times.elide_starttime().starttime);

        let later = TicketTimes {
            starttime: Some(now + Duration::minutes(5)),
            ..times
        };
        assert_eq!(later.starttime, later.elide_starttime().starttime);
        assert_eq!(now + Duration::minutes(5), later.start());
    }
}
