use crate::core::crypto::KeyEntry;
use crate::core::principal::Principal;
use chrono::{DateTime, Duration, Utc};

/// Per principal switches that change how tickets are issued for it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Attributes {
    /// No tickets are issued to or for the principal.
    pub disabled: bool,
    pub requires_preauth: bool,
    /// Tickets for this server carry no authorization data.
    pub no_auth_data_required: bool,
    /// The server is trusted for delegation, reflected in the
    /// ok-as-delegate ticket flag.
    pub ok_as_delegate: bool,
    /// The service may obtain forwardable tickets through protocol
    /// transition.
    pub ok_to_auth_as_delegate: bool,
    pub disallow_forwardable: bool,
    pub disallow_proxiable: bool,
    pub disallow_postdated: bool,
    pub disallow_renewable: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PrincipalRecord {
    pub principal: Principal,
    pub attributes: Attributes,
    pub keys: Vec<KeyEntry>,
    pub max_life: Option<Duration>,
    pub max_renewable_life: Option<Duration>,
    pub expiration: Option<DateTime<Utc>>,
    pub pw_expiration: Option<DateTime<Utc>>,
    /// Services this principal may obtain tickets for on behalf of others.
    pub allowed_to_delegate_to: Vec<Principal>,
    /// X.509 certificates (DER) that identify this principal.
    pub certificates: Vec<Vec<u8>>,
}

impl PrincipalRecord {
    pub fn new(principal: Principal) -> Self {
        return Self {
            principal,
            attributes: Attributes::default(),
            keys: Vec::new(),
            max_life: None,
            max_renewable_life: None,
            expiration: None,
            pw_expiration: None,
            allowed_to_delegate_to: Vec::new(),
            certificates: Vec::new(),
        };
    }

    pub fn with_key(mut self, key: KeyEntry) -> Self {
        self.keys.push(key);
        return self;
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        return self;
    }

    /// Key of the given type with the highest version.
    pub fn find_key(&self, etype: i32) -> Option<&KeyEntry> {
        return self
            .keys
            .iter()
            .filter(|k| k.etype == etype)
            .max_by_key(|k| k.kvno);
    }

    /// Key of the given type and version. Without version the latest one.
    pub fn find_key_version(
        &self,
        etype: i32,
        kvno: Option<u32>,
    ) -> Option<&KeyEntry> {
        return match kvno {
            Some(kvno) => self
                .keys
                .iter()
                .find(|k| k.etype == etype && k.kvno == kvno),
            None => self.find_key(etype),
        };
    }

    /// Key used to encrypt tickets for this principal: the first key of the
    /// latest version with a supported type, in database order.
    pub fn ticket_key(&self, supported: &[i32]) -> Option<&KeyEntry> {
        let latest = self.keys.iter().map(|k| k.kvno).max()?;
        return self
            .keys
            .iter()
            .find(|k| k.kvno == latest && supported.contains(&k.etype));
    }

    pub fn key_etypes(&self) -> Vec<i32> {
        let mut etypes = Vec::new();
        for key in self.keys.iter() {
            if !etypes.contains(&key.etype) {
                etypes.push(key.etype);
            }
        }
        return etypes;
    }

    pub fn may_delegate_to(&self, service: &Principal) -> bool {
        return self.allowed_to_delegate_to.iter().any(|p| p == service);
    }
}
