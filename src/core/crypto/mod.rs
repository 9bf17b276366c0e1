mod keys;
pub use keys::{KeyBytes, KeyEntry, SessionKey};

mod kerberos;
pub use kerberos::KerberosCrypto;

use super::database::PrincipalRecord;
use super::principal::Principal;
use super::reply::{EncReplyPart, ReplyKey};
use super::request::ForUser;
use super::ticket::{EncryptedPart, Ticket, TicketBody};
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CryptoError {
    UnsupportedEtype(i32),
    /// Decryption or checksum verification failed.
    Integrity(String),
    Encoding(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CryptoError::UnsupportedEtype(etype) => {
                write!(f, "Not supported etype: '{}'", etype)
            }
            CryptoError::Integrity(s) => write!(f, "Integrity error: {}", s),
            CryptoError::Encoding(s) => write!(f, "Encoding error: {}", s),
        }
    }
}

pub type CryptoResult<T> = std::result::Result<T, CryptoError>;

/// Key used to encrypt or decrypt a ticket: a long-term server key, or a
/// session key in user-to-user exchanges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TicketKey {
    pub etype: i32,
    pub kvno: Option<u32>,
    pub key: KeyBytes,
}

impl From<&KeyEntry> for TicketKey {
    fn from(entry: &KeyEntry) -> Self {
        return Self {
            etype: entry.etype,
            kvno: Some(entry.kvno),
            key: entry.key.clone(),
        };
    }
}

impl From<&SessionKey> for TicketKey {
    fn from(session_key: &SessionKey) -> Self {
        return Self {
            etype: session_key.etype,
            kvno: None,
            key: session_key.key.clone(),
        };
    }
}

/// Result of checking the authorization data of a ticket.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthDataVerdict {
    /// Client identity signed into the authorization data, if any. `None`
    /// when the ticket carries no PAC.
    pub client: Option<Principal>,
}

/// Cryptographic operations the KDC relies on. Wire encoding of the
/// encrypted parts is also left to the provider.
pub trait CryptoProvider: Send + Sync {
    fn supported_etypes(&self) -> Vec<i32>;

    fn make_random_key(&self, etype: i32) -> CryptoResult<SessionKey>;

    fn encrypt(
        &self,
        key: &KeyBytes,
        etype: i32,
        usage: i32,
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>>;

    fn decrypt(
        &self,
        key: &KeyBytes,
        etype: i32,
        usage: i32,
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>>;

    fn encrypt_ticket(
        &self,
        key: &TicketKey,
        body: &TicketBody,
    ) -> CryptoResult<EncryptedPart>;

    fn decrypt_ticket(
        &self,
        key: &TicketKey,
        ticket: &Ticket,
    ) -> CryptoResult<TicketBody>;

    /// Encrypts the client part of an AS or TGS reply.
    fn seal_reply(
        &self,
        key: &ReplyKey,
        msg_type: i32,
        part: &EncReplyPart,
    ) -> CryptoResult<EncryptedPart>;

    /// Verifies the authorization data of a ticket. The server signature is
    /// checked with `server_key`, the key the ticket was encrypted with.
    /// The KDC signature is checked with `tgs_key` when the ticket was
    /// issued by this realm, and skipped for tickets issued by a foreign
    /// KDC, whose key is unknown here.
    fn verify_authdata(
        &self,
        body: &TicketBody,
        server_key: &KeyEntry,
        tgs_key: Option<&KeyEntry>,
    ) -> CryptoResult<AuthDataVerdict>;

    /// Verifies the checksum of an S4U2Self identity assertion, made with
    /// the session key of the ticket that came with it.
    fn verify_for_user(
        &self,
        for_user: &ForUser,
        session_key: &SessionKey,
    ) -> CryptoResult<()>;

    /// Session key type for a ticket: the first requested type supported
    /// by the KDC and, when the server has keys, by the server too.
    fn select_session_etype(
        &self,
        requested: &[i32],
        server: Option<&PrincipalRecord>,
    ) -> Option<i32> {
        let supported = self.supported_etypes();
        return requested
            .iter()
            .find(|etype| {
                supported.contains(etype)
                    && server.map_or(true, |s| {
                        s.keys.is_empty() || s.key_etypes().contains(etype)
                    })
            })
            .cloned();
    }
}
