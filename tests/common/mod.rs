#![allow(dead_code)]

use cerbero_kdc::core::audit::{AuditRecord, AuditSink};
use cerbero_kdc::core::crypto::{
    AuthDataVerdict, CryptoError, CryptoProvider, CryptoResult, KeyBytes,
    KeyEntry, SessionKey, TicketKey,
};
use cerbero_kdc::core::database::{Attributes, MemoryDb, PrincipalRecord};
use cerbero_kdc::core::reply::{EncReplyPart, ReplyKey};
use cerbero_kdc::core::request::{ForUser, KdcRequest};
use cerbero_kdc::core::ticket::{
    DecryptedTicket, EncryptedPart, KerberosTime, Ticket, TicketBody,
    TicketTimes,
};
use cerbero_kdc::core::transited::TransitedPath;
use cerbero_kdc::core::{
    AuditSinks, Kdc, Principal, RealmConfig, RealmContext,
};
use chrono::{Duration, TimeZone, Utc};
use kerberos_constants::{etypes, message_types};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub const REALM: &str = "EXAMPLE.COM";
pub const AES256: i32 = etypes::AES256_CTS_HMAC_SHA1_96;

pub fn t0() -> KerberosTime {
    return Utc.timestamp(1_600_000_000, 0);
}

pub fn alice() -> Principal {
    return Principal::user("alice", REALM);
}

pub fn bob() -> Principal {
    return Principal::user("bob", REALM);
}

pub fn krbtgt() -> Principal {
    return Principal::tgs(REALM, REALM);
}

pub fn web_service() -> Principal {
    return Principal::service("HTTP", "app.example.com", REALM);
}

pub fn file_service() -> Principal {
    return Principal::service("cifs", "fs.example.com", REALM);
}

pub fn ldap_service() -> Principal {
    return Principal::service("ldap", "dc.example.com", REALM);
}

pub fn key(byte: u8) -> KeyEntry {
    return KeyEntry::new(2, AES256, KeyBytes::new(vec![byte; 32]));
}

/// Crypto provider that does not encrypt: ciphertexts are the key bytes
/// followed by the plaintext, and ticket bodies are kept aside under their
/// ciphertext.
pub struct FakeCrypto {
    tickets: Mutex<HashMap<Vec<u8>, TicketBody>>,
    counter: AtomicU32,
    /// Identity vouched for by the authorization data of any ticket.
    pub authdata_client: Option<Principal>,
    pub fail_random_key: bool,
    pub fail_seal_reply: bool,
}

impl FakeCrypto {
    pub fn new() -> Self {
        return Self {
            tickets: Mutex::new(HashMap::new()),
            counter: AtomicU32::new(1),
            authdata_client: None,
            fail_random_key: false,
            fail_seal_reply: false,
        };
    }

    /// Body of a ticket issued through this provider.
    pub fn ticket_body(&self, ticket: &Ticket) -> Option<TicketBody> {
        return self
            .tickets
            .lock()
            .unwrap()
            .get(&ticket.enc_part.cipher)
            .cloned();
    }

    /// A ticket for `server`, sealed with its key.
    pub fn seal(
        &self,
        server: &Principal,
        server_key: &KeyEntry,
        body: TicketBody,
    ) -> DecryptedTicket {
        let enc_part = self
            .encrypt_ticket(&TicketKey::from(server_key), &body)
            .unwrap();
        let ticket = Ticket {
            server: server.clone(),
            enc_part,
        };
        return DecryptedTicket::new(ticket, body);
    }
}

fn strip_key(key: &KeyBytes, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let key = key.as_bytes();
    if ciphertext.len() < key.len() || &ciphertext[..key.len()] != key {
        return Err(CryptoError::Integrity("wrong key".to_string()));
    }
    return Ok(ciphertext[key.len()..].to_vec());
}

impl CryptoProvider for FakeCrypto {
    fn supported_etypes(&self) -> Vec<i32> {
        return vec![AES256, etypes::AES128_CTS_HMAC_SHA1_96, etypes::RC4_HMAC];
    }

    fn make_random_key(&self, etype: i32) -> CryptoResult<SessionKey> {
        if self.fail_random_key {
            return Err(CryptoError::Encoding("no entropy".to_string()));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) as u8;
        return Ok(SessionKey::new(etype, KeyBytes::new(vec![n; 32])));
    }

    fn encrypt(
        &self,
        key: &KeyBytes,
        _etype: i32,
        _usage: i32,
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let mut ciphertext = key.as_bytes().to_vec();
        ciphertext.extend_from_slice(plaintext);
        return Ok(ciphertext);
    }

    fn decrypt(
        &self,
        key: &KeyBytes,
        _etype: i32,
        _usage: i32,
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        return strip_key(key, ciphertext);
    }

    fn encrypt_ticket(
        &self,
        key: &TicketKey,
        body: &TicketBody,
    ) -> CryptoResult<EncryptedPart> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut cipher = key.key.as_bytes().to_vec();
        cipher.extend_from_slice(&n.to_be_bytes());
        self.tickets
            .lock()
            .unwrap()
            .insert(cipher.clone(), body.clone());
        return Ok(EncryptedPart::new(key.etype, key.kvno, cipher));
    }

    fn decrypt_ticket(
        &self,
        key: &TicketKey,
        ticket: &Ticket,
    ) -> CryptoResult<TicketBody> {
        strip_key(&key.key, &ticket.enc_part.cipher)?;
        return self
            .ticket_body(ticket)
            .ok_or_else(|| CryptoError::Integrity("unknown ticket".to_string()));
    }

    fn seal_reply(
        &self,
        key: &ReplyKey,
        msg_type: i32,
        _part: &EncReplyPart,
    ) -> CryptoResult<EncryptedPart> {
        if self.fail_seal_reply {
            return Err(CryptoError::Encoding("reply too large".to_string()));
        }
        let mut cipher = key.key.key.as_bytes().to_vec();
        cipher.push(msg_type as u8);
        return Ok(EncryptedPart::new(key.key.etype, key.kvno, cipher));
    }

    fn verify_authdata(
        &self,
        _body: &TicketBody,
        _server_key: &KeyEntry,
        _tgs_key: Option<&KeyEntry>,
    ) -> CryptoResult<AuthDataVerdict> {
        return Ok(AuthDataVerdict {
            client: self.authdata_client.clone(),
        });
    }

    /// The checksum of the assertion is the session key itself.
    fn verify_for_user(
        &self,
        for_user: &ForUser,
        session_key: &SessionKey,
    ) -> CryptoResult<()> {
        if for_user.checksum != session_key.key.as_bytes() {
            return Err(CryptoError::Integrity("bad checksum".to_string()));
        }
        return Ok(());
    }
}

/// Audit sink that keeps the records in memory.
#[derive(Clone, Default)]
pub struct RecordingSink {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        return Self::default();
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        return self.records.lock().unwrap().clone();
    }
}

impl AuditSink for RecordingSink {
    fn record(&self, record: &AuditRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

pub fn record(principal: Principal, key: KeyEntry) -> PrincipalRecord {
    return PrincipalRecord::new(principal).with_key(key);
}

/// Database of EXAMPLE.COM with users, services and a cross-realm TGS
/// towards OTHER.ORG.
pub fn test_db() -> MemoryDb {
    let mut db = MemoryDb::new(REALM);
    db.add(record(krbtgt(), key(0x11)));
    db.add(record(alice(), key(0x21)));
    db.add(record(bob(), key(0x22)));

    let mut web = record(web_service(), key(0x31)).with_attributes(Attributes {
        ok_to_auth_as_delegate: true,
        ..Attributes::default()
    });
    web.allowed_to_delegate_to.push(file_service());
    db.add(web);

    db.add(record(file_service(), key(0x41)));
    db.add(record(ldap_service(), key(0x42)));
    db.add(record(Principal::tgs("OTHER.ORG", REALM), key(0x51)));
    return db;
}

pub struct TestKdc {
    pub kdc: Kdc,
    pub crypto: Arc<FakeCrypto>,
    pub audit: RecordingSink,
}

impl TestKdc {
    pub fn records(&self) -> Vec<AuditRecord> {
        return self.audit.records();
    }
}

pub fn test_kdc(config: RealmConfig, db: MemoryDb, crypto: FakeCrypto, now: KerberosTime) -> TestKdc {
    let crypto = Arc::new(crypto);
    let audit = RecordingSink::new();
    let kdc = Kdc::new(RealmContext::new(config, Arc::new(db)), crypto.clone())
        .with_audit(AuditSinks::new().with_sink(Box::new(audit.clone())))
        .with_clock(Box::new(move || now));

    return TestKdc { kdc, crypto, audit };
}

pub fn default_kdc(now: KerberosTime) -> TestKdc {
    return test_kdc(RealmConfig::new(REALM), test_db(), FakeCrypto::new(), now);
}

pub fn as_request(client: Principal, server: Principal) -> KdcRequest {
    let mut request = KdcRequest::new(message_types::KRB_AS_REQ);
    request.client = Some(client);
    request.server = Some(server);
    request.nonce = 12345;
    request.etypes = vec![AES256];
    return request;
}

pub fn tgs_request(server: Principal, options: u32) -> KdcRequest {
    let mut request = KdcRequest::new(message_types::KRB_TGS_REQ);
    request.server = Some(server);
    request.options = options.into();
    request.nonce = 54321;
    request.etypes = vec![AES256];
    return request;
}

pub fn times(
    authtime: KerberosTime,
    endtime: KerberosTime,
    renew_till: Option<KerberosTime>,
) -> TicketTimes {
    return TicketTimes {
        authtime,
        starttime: Some(authtime),
        endtime,
        renew_till,
    };
}

pub fn ticket_body(client: Principal, flags: u32, times: TicketTimes) -> TicketBody {
    return TicketBody {
        flags,
        session_key: SessionKey::new(AES256, KeyBytes::new(vec![0x77; 32])),
        client,
        transited: TransitedPath::empty(),
        times,
        addresses: None,
        authorization_data: Vec::new(),
    };
}

/// Ticket granting ticket of the local realm, valid for ten hours since
/// `authtime`.
pub fn tgt(crypto: &FakeCrypto, client: Principal, flags: u32, authtime: KerberosTime) -> DecryptedTicket {
    let body = ticket_body(client, flags, times(authtime, authtime + Duration::hours(10), None));
    return crypto.seal(&krbtgt(), &key(0x11), body);
}
