//! Resolution of the server of a TGS request, following referrals to other
//! realms when the server is not in the local database.

use super::database::{LookupError, LookupFlags, PrincipalRecord};
use super::kdc_error::{ErrorClass, KdcError};
use super::principal::Principal;
use super::realm::RealmContext;
use super::realm_tree::realm_path;
use super::request::{KdcOptions, NO_REFERRAL_OPTION};
use kerberos_constants::error_codes;
use kerberos_constants::{kdc_options, principal_names};
use log::debug;

/// Server found for a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub record: PrincipalRecord,
    /// The server is the TGS of another realm, reached instead of the
    /// requested server.
    pub is_referral: bool,
}

impl Resolution {
    fn new(record: PrincipalRecord, requested: &Principal) -> Self {
        let is_referral =
            record.principal.is_cross_tgs() && &record.principal != requested;
        return Self {
            record,
            is_referral,
        };
    }
}

fn lookup_error(err: LookupError, status: &'static str) -> KdcError {
    return err.into_kdc_error(KdcError::unknown_server(status), status);
}

/// Finds the server of a TGS request.
///
/// The requested server is looked up first. If it does not exist, and
/// referrals are allowed, the TGS of the realm of the host named by the
/// server is tried, and then the TGS of every realm on the path towards
/// the target realm, from the closest to the target.
pub fn resolve(
    realm: &RealmContext,
    requested: &Principal,
    options: KdcOptions,
) -> Result<Resolution, KdcError> {
    let allow_referral = !options.has_any(NO_REFERRAL_OPTION);
    let flags = LookupFlags::server()
        .canonicalize(options.has(kdc_options::CANONICALIZE))
        .allow_referral(
            allow_referral && options.has(kdc_options::CANONICALIZE),
        );

    match realm.db.lookup(requested, flags) {
        Ok(record) => return Ok(Resolution::new(record, requested)),
        Err(LookupError::NotFound) if allow_referral => {}
        Err(err) => return Err(lookup_error(err, "LOOKING_UP_SERVER")),
    }

    let mut target = requested.clone();
    if !requested.is_cross_tgs() {
        let referral_tgs = find_referral_tgs(realm, requested, options)
            .ok_or_else(|| KdcError::unknown_server("LOOKING_UP_SERVER"))?;

        debug!("Trying referral {} for {}", referral_tgs, requested);
        match realm.db.lookup(&referral_tgs, flags) {
            Ok(record) => return Ok(Resolution::new(record, requested)),
            Err(LookupError::NotFound) => {}
            Err(err) => return Err(lookup_error(err, "LOOKING_UP_SERVER")),
        }
        target = referral_tgs;
    }

    let record = find_alternate_tgs(realm, &target)?;
    return Ok(Resolution::new(record, requested));
}

/// Whether a request for `server` may be answered with a referral derived
/// from the host name in the server principal.
pub fn is_referral_req(
    realm: &RealmContext,
    server: &Principal,
    options: KdcOptions,
) -> bool {
    if !options.has(kdc_options::CANONICALIZE)
        || options.has(kdc_options::ENC_TKT_IN_SKEY)
    {
        return false;
    }

    if server.components.len() != 2 {
        return false;
    }

    let service = &server.components[0];
    let config = &realm.config;

    match server.name_type {
        principal_names::NT_UNKNOWN | principal_names::NT_SRV_HST => {
            if server.name_type == principal_names::NT_UNKNOWN
                && !config.host_based_services.contains_service(service)
            {
                return false;
            }
            return !config.no_referral.contains_service(service);
        }
        _ => return false,
    }
}

/// Cross-realm TGS of the realm of the host named by the server, as
/// `krbtgt/HOST.REALM@LOCAL.REALM`.
pub fn find_referral_tgs(
    realm: &RealmContext,
    server: &Principal,
    options: KdcOptions,
) -> Option<Principal> {
    if !is_referral_req(realm, server, options) {
        return None;
    }

    let hostname = server.component(1)?;
    if !hostname.contains('.') {
        return None;
    }

    let host_realm = realm.config.host_realm.realm_of_host(hostname)?;
    if host_realm.is_empty() || host_realm == server.realm {
        return None;
    }

    return Some(Principal::tgs(&host_realm, &server.realm));
}

/// Walks the realms between the local realm and the target realm of a
/// cross-realm TGS, from the closest to the target, and returns the first
/// TGS found in the database.
pub fn find_alternate_tgs(
    realm: &RealmContext,
    cross_tgs: &Principal,
) -> Result<PrincipalRecord, KdcError> {
    let target = match cross_tgs.component(1) {
        Some(target) => target,
        None => return Err(KdcError::unknown_server("LOOKING_UP_SERVER")),
    };

    let path = realm_path(&realm.config.capaths, realm.name(), target);

    // the first realm is the local one, krbtgt/LOCAL@LOCAL is no referral
    for hop in path.iter().skip(1).rev() {
        let tgs = Principal::tgs(hop, realm.name());
        if &tgs == cross_tgs {
            continue;
        }

        match realm.db.lookup(&tgs, LookupFlags::server()) {
            Ok(record) => {
                debug!("Alternate TGT {} for {}", tgs, cross_tgs);
                return Ok(record);
            }
            Err(LookupError::NotFound) => continue,
            Err(err) => return Err(lookup_error(err, "UNKNOWN_SERVER")),
        }
    }

    return Err(KdcError::new(
        ErrorClass::UnknownServer,
        error_codes::KDC_ERR_S_PRINCIPAL_UNKNOWN,
        "UNKNOWN_SERVER",
    )
    .with_detail(&format!("no TGS on the path to {}", target)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::database::{
        LookupResult, MemoryDb, PrincipalDb,
    };
    use crate::core::host_realm::HostRealmMapper;
    use crate::core::realm::RealmConfig;
    use crate::core::service_list::ServiceList;
    use proptest::prelude::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingDb {
        inner: MemoryDb,
        lookups: AtomicUsize,
        unavailable: bool,
    }

    impl PrincipalDb for CountingDb {
        fn id(&self) -> &str {
            return "counting";
        }

        fn lookup(
            &self,
            principal: &Principal,
            flags: LookupFlags,
        ) -> LookupResult {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.unavailable && principal.is_tgs() {
                return Err(LookupError::Unavailable("locked".to_string()));
            }
            return self.inner.lookup(principal, flags);
        }
    }

    fn context(db: MemoryDb, config: RealmConfig) -> RealmContext {
        return RealmContext::new(config, Arc::new(db));
    }

    fn config() -> RealmConfig {
        let mut config = RealmConfig::new("A.EXAMPLE.COM");
        let mut domain_realm = HashMap::new();
        domain_realm.insert(".b.example.com".to_string(), "B.EXAMPLE.COM".to_string());
        config.host_realm = HostRealmMapper::new(domain_realm);
        return config;
    }

    fn db() -> MemoryDb {
        let mut db = MemoryDb::new("A.EXAMPLE.COM");
        db.add(PrincipalRecord::new(Principal::service(
            "host",
            "web.a.example.com",
            "A.EXAMPLE.COM",
        )));
        db.add(PrincipalRecord::new(Principal::tgs("A.EXAMPLE.COM", "A.EXAMPLE.COM")));
        db.add(PrincipalRecord::new(Principal::tgs("EXAMPLE.COM", "A.EXAMPLE.COM")));
        return db;
    }

    fn canonicalize() -> KdcOptions {
        return KdcOptions::from(kdc_options::CANONICALIZE);
    }

    #[test]
    fn test_resolve_local_server() {
        let realm = context(db(), config());
        let server = Principal::service("host", "web.a.example.com", "A.EXAMPLE.COM");
        let resolution = resolve(&realm, &server, canonicalize()).unwrap();
        assert_eq!(server, resolution.record.principal);
        assert!(!resolution.is_referral);
    }

    #[test]
    fn test_resolve_host_referral_through_parent() {
        let realm = context(db(), config());
        let server = Principal::service("host", "db.b.example.com", "A.EXAMPLE.COM");

        let resolution = resolve(&realm, &server, canonicalize()).unwrap();
        assert_eq!(
            Principal::tgs("EXAMPLE.COM", "A.EXAMPLE.COM"),
            resolution.record.principal
        );
        assert!(resolution.is_referral);
    }

    #[test]
    fn test_resolve_direct_referral() {
        let mut db = db();
        db.add(PrincipalRecord::new(Principal::tgs("B.EXAMPLE.COM", "A.EXAMPLE.COM")));
        let realm = context(db, config());
        let server = Principal::service("host", "db.b.example.com", "A.EXAMPLE.COM");

        let resolution = resolve(&realm, &server, canonicalize()).unwrap();
        assert_eq!(
            Principal::tgs("B.EXAMPLE.COM", "A.EXAMPLE.COM"),
            resolution.record.principal
        );
    }

    #[test]
    fn test_no_referral_without_canonicalize() {
        let realm = context(db(), config());
        let server = Principal::service("host", "db.b.example.com", "A.EXAMPLE.COM");

        let err = resolve(&realm, &server, KdcOptions::default()).unwrap_err();
        assert_eq!(error_codes::KDC_ERR_S_PRINCIPAL_UNKNOWN, err.code);
        assert_eq!("LOOKING_UP_SERVER", err.status);
    }

    #[test]
    fn test_no_referral_for_user_to_user() {
        let realm = context(db(), config());
        let server = Principal::service("host", "db.b.example.com", "A.EXAMPLE.COM");
        let options = KdcOptions::from(
            kdc_options::CANONICALIZE | kdc_options::ENC_TKT_IN_SKEY,
        );

        let err = resolve(&realm, &server, options).unwrap_err();
        assert_eq!(ErrorClass::UnknownPrincipal, err.class);
    }

    #[test]
    fn test_wildcard_deny_list() {
        let mut config = config();
        config.no_referral = ServiceList::new("*");
        let realm = context(db(), config);
        let server = Principal::service("HTTP", "db.b.example.com", "A.EXAMPLE.COM");

        assert!(!is_referral_req(&realm, &server, canonicalize()));
        let err = resolve(&realm, &server, canonicalize()).unwrap_err();
        assert_eq!(error_codes::KDC_ERR_S_PRINCIPAL_UNKNOWN, err.code);
        assert_eq!("LOOKING_UP_SERVER", err.status);
    }

    #[test]
    fn test_unknown_name_type_needs_host_based_list() {
        let mut config = config();
        let realm = context(db(), config.clone());
        let mut server = Principal::service("HTTP", "db.b.example.com", "A.EXAMPLE.COM");
        server.name_type = principal_names::NT_UNKNOWN;
        assert!(!is_referral_req(&realm, &server, canonicalize()));

        config.host_based_services = ServiceList::new("ldap, HTTP");
        let realm = context(db(), config);
        assert!(is_referral_req(&realm, &server, canonicalize()));

        server.name_type = principal_names::NT_PRINCIPAL;
        assert!(!is_referral_req(&realm, &server, canonicalize()));
    }

    #[test]
    fn test_referral_needs_dotted_host() {
        let realm = context(db(), config());
        let server = Principal::service("host", "localhost", "A.EXAMPLE.COM");
        assert_eq!(None, find_referral_tgs(&realm, &server, canonicalize()));
    }

    #[test]
    fn test_alternate_tgs_for_cross_tgs() {
        let realm = context(db(), config());
        let server = Principal::tgs("C.B.EXAMPLE.COM", "A.EXAMPLE.COM");

        let resolution = resolve(&realm, &server, KdcOptions::default()).unwrap();
        assert_eq!(
            Principal::tgs("EXAMPLE.COM", "A.EXAMPLE.COM"),
            resolution.record.principal
        );
        assert!(resolution.is_referral);
    }

    #[test]
    fn test_alternate_tgs_exhausted() {
        let realm = context(MemoryDb::new("A.EXAMPLE.COM"), config());
        let server = Principal::tgs("OTHER.ORG", "A.EXAMPLE.COM");

        let err = resolve(&realm, &server, KdcOptions::default()).unwrap_err();
        assert_eq!(ErrorClass::UnknownServer, err.class);
        assert_eq!("UNKNOWN_SERVER", err.status);
    }

    #[test]
    fn test_unavailable_aborts_walk() {
        let db = CountingDb {
            inner: db(),
            lookups: AtomicUsize::new(0),
            unavailable: true,
        };
        let realm = RealmContext::new(config(), Arc::new(db));
        let server = Principal::tgs("C.B.EXAMPLE.COM", "A.EXAMPLE.COM");

        let err = resolve(&realm, &server, KdcOptions::default()).unwrap_err();
        assert_eq!(ErrorClass::Unavailable, err.class);
        assert_eq!(error_codes::KDC_ERR_SVC_UNAVAILABLE, err.code);
    }

    fn realm_name() -> impl Strategy<Value = String> {
        return prop::collection::vec("[A-C]{1,2}", 1..5)
            .prop_map(|labels| labels.join("."));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn resolve_terminates_within_path_length(
            target in realm_name(),
            known in prop::collection::vec(realm_name(), 0..6),
        ) {
            let local = "A.EXAMPLE.COM";
            let mut inner = MemoryDb::new(local);
            for realm in &known {
                inner.add(PrincipalRecord::new(Principal::tgs(realm, local)));
            }
            let db = Arc::new(CountingDb {
                inner,
                lookups: AtomicUsize::new(0),
                unavailable: false,
            });
            let realm = RealmContext::new(RealmConfig::new(local), db.clone());
            let server = Principal::tgs(&target, local);

            let result = resolve(&realm, &server, KdcOptions::default());
            let bound = realm_path(&realm.config.capaths, local, &target).len() + 1;
            prop_assert!(db.lookups.load(Ordering::SeqCst) <= bound);

            if let Ok(resolution) = result {
                prop_assert!(resolution.record.principal.is_tgs());
            }
        }
    }
}
