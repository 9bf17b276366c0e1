use super::crypto::SessionKey;
use super::principal::Principal;
use super::request::PaData;
use super::ticket::{EncryptedPart, HostAddress, KerberosTime, Ticket, TicketTimes};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LastReqEntry {
    pub lr_type: i32,
    pub lr_value: KerberosTime,
}

/// Reply contents that only the client can read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncReplyPart {
    pub session_key: SessionKey,
    pub last_req: Vec<LastReqEntry>,
    pub nonce: u32,
    pub key_expiration: Option<KerberosTime>,
    pub flags: u32,
    pub times: TicketTimes,
    pub server: Principal,
    pub addresses: Option<Vec<HostAddress>>,
}

/// Key that protects the reply, with its key usage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplyKey {
    pub key: SessionKey,
    pub kvno: Option<u32>,
    pub usage: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct KdcReply {
    pub msg_type: i32,
    pub padata: Vec<PaData>,
    pub client: Principal,
    pub ticket: Ticket,
    pub enc_part: EncReplyPart,
    /// `enc_part` encrypted with the reply key.
    pub sealed_part: EncryptedPart,
}

/// Error returned to the client.
#[derive(Clone, Debug, PartialEq)]
pub struct KdcErrorReply {
    pub error_code: i32,
    pub status: &'static str,
    pub e_text: String,
    pub stime: KerberosTime,
    pub realm: String,
    pub server: Option<Principal>,
    pub client: Option<Principal>,
    /// Realm where the client should retry, for client referrals.
    pub client_realm: Option<String>,
    pub e_data: Vec<PaData>,
}
