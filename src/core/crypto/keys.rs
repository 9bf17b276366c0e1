use rand::RngCore;
use std::fmt;
use zeroize::Zeroizing;

/// Raw key bytes, wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyBytes(Zeroizing<Vec<u8>>);

impl KeyBytes {
    pub fn new(bytes: Vec<u8>) -> Self {
        return Self(Zeroizing::new(bytes));
    }

    pub fn random(size: usize) -> Self {
        let mut bytes = vec![0; size];
        rand::thread_rng().fill_bytes(&mut bytes);
        return Self::new(bytes);
    }

    pub fn as_bytes(&self) -> &[u8] {
        return &self.0;
    }

    pub fn len(&self) -> usize {
        return self.0.len();
    }
}

impl fmt::Debug for KeyBytes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyBytes(<{} bytes>)", self.0.len())
    }
}

impl From<Vec<u8>> for KeyBytes {
    fn from(bytes: Vec<u8>) -> Self {
        return Self::new(bytes);
    }
}

impl From<&[u8]> for KeyBytes {
    fn from(bytes: &[u8]) -> Self {
        return Self::new(bytes.to_vec());
    }
}

/// Session key shared by the client and the service of a ticket.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionKey {
    pub etype: i32,
    pub key: KeyBytes,
}

impl SessionKey {
    pub fn new(etype: i32, key: KeyBytes) -> Self {
        return Self { etype, key };
    }
}

/// Long-term key of a principal, as stored in the database.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyEntry {
    pub kvno: u32,
    pub etype: i32,
    pub key: KeyBytes,
    pub salt: Option<String>,
}

impl KeyEntry {
    pub fn new(kvno: u32, etype: i32, key: KeyBytes) -> Self {
        return Self {
            kvno,
            etype,
            key,
            salt: None,
        };
    }
}
