use super::principal::Principal;
use super::ticket::{HostAddress, KerberosTime, Ticket};
use kerberos_constants::kdc_options;

/// Padata type of the S4U2Self request carrying an X.509 certificate.
pub const PA_S4U_X509_USER: i32 = 130;

/// Options that turn off any referral processing.
pub const NO_REFERRAL_OPTION: u32 =
    kdc_options::VALIDATE | kdc_options::RENEW | kdc_options::ENC_TKT_IN_SKEY;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct KdcOptions(pub u32);

impl KdcOptions {
    pub fn has(&self, option: u32) -> bool {
        return self.0 & option != 0;
    }

    pub fn has_any(&self, options: u32) -> bool {
        return self.0 & options != 0;
    }
}

impl From<u32> for KdcOptions {
    fn from(options: u32) -> Self {
        return Self(options);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaData {
    pub padata_type: i32,
    pub value: Vec<u8>,
}

impl PaData {
    pub fn new(padata_type: i32, value: Vec<u8>) -> Self {
        return Self { padata_type, value };
    }
}

/// Identity asserted by a service that requests a ticket to itself on
/// behalf of a user (S4U2Self).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForUser {
    pub user: Principal,
    pub cksumtype: i32,
    pub checksum: Vec<u8>,
    pub auth_package: String,
}

/// A KDC request, already decoded from the wire.
#[derive(Clone, Debug, PartialEq)]
pub struct KdcRequest {
    pub msg_type: i32,
    pub options: KdcOptions,
    pub client: Option<Principal>,
    pub server: Option<Principal>,
    pub from: Option<KerberosTime>,
    /// `None` means no limit was requested.
    pub till: Option<KerberosTime>,
    pub rtime: Option<KerberosTime>,
    pub nonce: u32,
    pub etypes: Vec<i32>,
    pub addresses: Option<Vec<HostAddress>>,
    pub padata: Vec<PaData>,
    pub additional_tickets: Vec<Ticket>,
    pub for_user: Option<ForUser>,
    /// Inner request of an armored request, decrypted by the caller.
    pub inner: Option<Box<KdcRequest>>,
}

impl KdcRequest {
    pub fn new(msg_type: i32) -> Self {
        return Self {
            msg_type,
            options: KdcOptions::default(),
            client: None,
            server: None,
            from: None,
            till: None,
            rtime: None,
            nonce: 0,
            etypes: Vec::new(),
            addresses: None,
            padata: Vec::new(),
            additional_tickets: Vec::new(),
            for_user: None,
            inner: None,
        };
    }

    /// The request to process: the inner request for armored requests,
    /// otherwise the request itself.
    pub fn unwrap_envelope(self) -> KdcRequest {
        match self.inner {
            Some(inner) => *inner,
            None => self,
        }
    }

    pub fn find_padata(&self, padata_type: i32) -> Option<&PaData> {
        return self.padata.iter().find(|p| p.padata_type == padata_type);
    }

    /// Certificate of an S4U2Self request made with X.509 user identity.
    pub fn client_certificate(&self) -> Option<&[u8]> {
        return self
            .find_padata(PA_S4U_X509_USER)
            .filter(|p| !p.value.is_empty())
            .map(|p| p.value.as_slice());
    }

    pub fn second_ticket(&self) -> Option<&Ticket> {
        return self.additional_tickets.first();
    }
}
