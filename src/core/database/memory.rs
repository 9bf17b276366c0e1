use super::{LookupError, LookupFlags, LookupResult, PrincipalDb, PrincipalRecord};
use crate::core::principal::Principal;
use std::collections::HashMap;

/// Principal database kept in memory, filled when the KDC is configured.
pub struct MemoryDb {
    realm: String,
    records: HashMap<Principal, PrincipalRecord>,
    aliases: HashMap<Principal, Principal>,
}

impl MemoryDb {
    pub fn new(realm: &str) -> Self {
        return Self {
            realm: realm.to_string(),
            records: HashMap::new(),
            aliases: HashMap::new(),
        };
    }

    pub fn realm(&self) -> &str {
        return &self.realm;
    }

    /// Adds or replaces a principal record. Keys of an existing record are
    /// kept when the new one has none.
    pub fn add(&mut self, mut record: PrincipalRecord) {
        if record.keys.is_empty() {
            if let Some(previous) = self.records.get(&record.principal) {
                record.keys = previous.keys.clone();
            }
        }
        self.records.insert(record.principal.clone(), record);
    }

    pub fn add_alias(&mut self, alias: Principal, canonical: Principal) {
        self.aliases.insert(alias, canonical);
    }

    pub fn get(&self, principal: &Principal) -> Option<&PrincipalRecord> {
        return self.records.get(principal);
    }

    pub fn get_mut(&mut self, principal: &Principal) -> Option<&mut PrincipalRecord> {
        return self.records.get_mut(principal);
    }

    pub fn len(&self) -> usize {
        return self.records.len();
    }

    fn is_foreign(&self, principal: &Principal) -> bool {
        return principal.realm != self.realm && !principal.is_tgs();
    }
}

impl PrincipalDb for MemoryDb {
    fn id(&self) -> &str {
        return "memory";
    }

    fn lookup(&self, principal: &Principal, flags: LookupFlags) -> LookupResult {
        if !self.is_foreign(principal) || flags.map_foreign {
            if let Some(record) = self.records.get(principal) {
                return Ok(record.clone());
            }
        }

        if flags.canonicalize {
            if let Some(canonical) = self.aliases.get(principal) {
                if let Some(record) = self.records.get(canonical) {
                    return Ok(record.clone());
                }
            }
        }

        if flags.allow_referral && self.is_foreign(principal) {
            let tgs = Principal::tgs(&principal.realm, &self.realm);
            if let Some(record) = self.records.get(&tgs) {
                return Ok(record.clone());
            }
        }

        return Err(LookupError::NotFound);
    }

    fn lookup_certificate(
        &self,
        certificate: &[u8],
        _principal: &Principal,
        _flags: LookupFlags,
    ) -> LookupResult {
        return self
            .records
            .values()
            .find(|r| r.certificates.iter().any(|c| c == certificate))
            .cloned()
            .ok_or(LookupError::NotFound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> MemoryDb {
        let mut db = MemoryDb::new("EXAMPLE.COM");
        db.add(PrincipalRecord::new(Principal::user("alice", "EXAMPLE.COM")));
        db.add(PrincipalRecord::new(Principal::tgs("OTHER.COM", "EXAMPLE.COM")));
        db.add(PrincipalRecord::new(Principal::user("bob", "OTHER.COM")));
        db.add_alias(
            Principal::user("alice.smith", "EXAMPLE.COM"),
            Principal::user("alice", "EXAMPLE.COM"),
        );
        return db;
    }

    #[test]
    fn test_exact_lookup() {
        let db = db();
        let record = db
            .lookup(&Principal::user("alice", "EXAMPLE.COM"), LookupFlags::client())
            .unwrap();
        assert_eq!(Principal::user("alice", "EXAMPLE.COM"), record.principal);
        assert_eq!(
            Err(LookupError::NotFound),
            db.lookup(&Principal::user("carol", "EXAMPLE.COM"), LookupFlags::client())
        );
    }

    #[test]
    fn test_alias_needs_canonicalize() {
        let db = db();
        let alias = Principal::user("alice.smith", "EXAMPLE.COM");
        assert!(db.lookup(&alias, LookupFlags::client()).is_err());
        let record = db
            .lookup(&alias, LookupFlags::client().canonicalize(true))
            .unwrap();
        assert_eq!("alice", record.principal.name());
    }

    #[test]
    fn test_foreign_principal_needs_mapping() {
        let db = db();
        let bob = Principal::user("bob", "OTHER.COM");
        assert!(db.lookup(&bob, LookupFlags::client()).is_err());
        assert!(db.lookup(&bob, LookupFlags::client().map_foreign(true)).is_ok());
    }

    #[test]
    fn test_referral_to_cross_realm_tgs() {
        let db = db();
        let service = Principal::service("host", "files.other.com", "OTHER.COM");
        let record = db
            .lookup(&service, LookupFlags::server().allow_referral(true))
            .unwrap();
        assert_eq!(Principal::tgs("OTHER.COM", "EXAMPLE.COM"), record.principal);
        assert!(db.lookup(&service, LookupFlags::server()).is_err());
    }

    #[test]
    fn test_certificate_lookup() {
        let mut db = db();
        let mut record = PrincipalRecord::new(Principal::user("carol", "EXAMPLE.COM"));
        record.certificates.push(vec![0x30, 0x82, 0x01]);
        db.add(record);

        let found = db
            .lookup_certificate(&[0x30, 0x82, 0x01], &Principal::user("x", "EXAMPLE.COM"), LookupFlags::client())
            .unwrap();
        assert_eq!("carol", found.principal.name());
    }
}
