use super::database::PrincipalDb;
use super::host_realm::HostRealmMapper;
use super::principal::Principal;
use super::realm_tree::Capaths;
use super::service_list::ServiceList;
use chrono::Duration;
use std::sync::Arc;

/// Settings of the realm served by the KDC.
#[derive(Clone, Debug)]
pub struct RealmConfig {
    pub name: String,
    /// `None` means tickets have no realm lifetime limit.
    pub max_life: Option<Duration>,
    /// A zero duration disables renewable tickets.
    pub max_renewable_life: Duration,
    pub clock_skew: Duration,
    /// Reject tickets whose transited path could not be checked.
    pub reject_bad_transit: bool,
    /// Services whose two component names carry a host name, for which
    /// referrals are derived from the host realm.
    pub host_based_services: ServiceList,
    /// Services never referred to another realm.
    pub no_referral: ServiceList,
    /// Hide the reason of client failures behind generic errors.
    pub vague_errors: bool,
    pub capaths: Capaths,
    pub host_realm: HostRealmMapper,
}

impl RealmConfig {
    pub fn new(name: &str) -> Self {
        return Self {
            name: name.to_string(),
            max_life: Some(Duration::hours(10)),
            max_renewable_life: Duration::days(7),
            clock_skew: Duration::minutes(5),
            reject_bad_transit: true,
            host_based_services: ServiceList::default(),
            no_referral: ServiceList::default(),
            vague_errors: false,
            capaths: Capaths::new(),
            host_realm: HostRealmMapper::default(),
        };
    }
}

/// Immutable realm settings together with the principal database, shared by
/// every request of the realm.
#[derive(Clone)]
pub struct RealmContext {
    pub config: RealmConfig,
    pub db: Arc<dyn PrincipalDb>,
}

impl RealmContext {
    pub fn new(config: RealmConfig, db: Arc<dyn PrincipalDb>) -> Self {
        return Self { config, db };
    }

    pub fn name(&self) -> &str {
        return &self.config.name;
    }

    /// The ticket-granting service of the realm, `krbtgt/REALM@REALM`.
    pub fn tgs_principal(&self) -> Principal {
        return Principal::tgs(&self.config.name, &self.config.name);
    }

    pub fn is_local(&self, realm: &str) -> bool {
        return self.config.name == realm;
    }
}
