//! YAML configuration of the realm served by the KDC.

use crate::core::database::load_keytab_db;
use crate::core::realm_tree::Capaths;
use crate::core::{HostRealmMapper, MemoryDb, RealmConfig, ServiceList};
use crate::error::Error;
use crate::Result;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::{IpAddr, SocketAddr};

const DNS_PORT: u16 = 53;

/// Realm configuration as written in the YAML file. Missing fields take
/// the defaults of [`RealmConfig::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdcConfig {
    pub realm: String,

    /// Maximum ticket lifetime in seconds, 0 for unlimited.
    #[serde(default = "default_max_life")]
    pub max_life: u64,

    /// Maximum renewable lifetime in seconds, 0 disables renewal.
    #[serde(default = "default_max_renewable_life")]
    pub max_renewable_life: u64,

    /// Accepted clock skew in seconds.
    #[serde(default = "default_clock_skew")]
    pub clock_skew: u64,

    #[serde(default = "default_reject_bad_transit")]
    pub reject_bad_transit: bool,

    /// Services with host based names eligible for referrals, separated by
    /// spaces or commas. `*` matches any service.
    #[serde(default)]
    pub host_based_services: String,

    /// Services never referred to another realm.
    #[serde(default)]
    pub no_host_referral: String,

    #[serde(default)]
    pub vague_errors: bool,

    /// Query `_kerberos` TXT records to map hosts to realms.
    #[serde(default)]
    pub dns_lookup_realm: bool,

    /// Name servers for realm lookups, system ones when empty.
    #[serde(default)]
    pub dns_servers: Vec<String>,

    #[serde(default)]
    pub domain_realm: HashMap<String, String>,

    #[serde(default)]
    pub capaths: Capaths,

    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Keytab with the keys of the realm principals.
    #[serde(default)]
    pub keytab: Option<String>,
}

fn default_max_life() -> u64 {
    36000 // 10 hours
}

fn default_max_renewable_life() -> u64 {
    604800 // 7 days
}

fn default_clock_skew() -> u64 {
    300
}

fn default_reject_bad_transit() -> bool {
    true
}

impl KdcConfig {
    pub fn new(realm: &str) -> Self {
        return Self {
            realm: realm.to_string(),
            max_life: default_max_life(),
            max_renewable_life: default_max_renewable_life(),
            clock_skew: default_clock_skew(),
            reject_bad_transit: default_reject_bad_transit(),
            host_based_services: String::new(),
            no_host_referral: String::new(),
            vague_errors: false,
            dns_lookup_realm: false,
            dns_servers: Vec::new(),
            domain_realm: HashMap::new(),
            capaths: Capaths::new(),
            database: DatabaseConfig::default(),
        };
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        return serde_yaml::from_str(yaml).map_err(|err| {
            Error::ConfigError(format!("Unable to parse configuration: {}", err))
        });
    }

    pub fn from_file(filepath: &str) -> Result<Self> {
        let data = fs::read_to_string(filepath).map_err(|err| {
            (format!("Unable to read the file {}", filepath), err)
        })?;
        return Self::from_yaml(&data);
    }

    /// Checks the values and builds the settings used by the KDC.
    pub fn to_realm_config(&self) -> Result<RealmConfig> {
        validate_realm(&self.realm)?;

        let mut config = RealmConfig::new(&self.realm);
        config.max_life = match self.max_life {
            0 => None,
            secs => Some(seconds("max_life", secs)?),
        };
        config.max_renewable_life =
            seconds("max_renewable_life", self.max_renewable_life)?;
        config.clock_skew = seconds("clock_skew", self.clock_skew)?;
        config.reject_bad_transit = self.reject_bad_transit;
        config.host_based_services =
            ServiceList::new(&self.host_based_services);
        config.no_referral = ServiceList::new(&self.no_host_referral);
        config.vague_errors = self.vague_errors;

        for (client, servers) in self.capaths.iter() {
            validate_realm(client)?;
            for (server, path) in servers.iter() {
                validate_realm(server)?;
                for realm in path.iter().filter(|r| r.as_str() != ".") {
                    validate_realm(realm)?;
                }
            }
        }
        config.capaths = self.capaths.clone();

        let mut host_realm = HostRealmMapper::new(self.domain_realm.clone());
        if self.dns_lookup_realm {
            let servers = self
                .dns_servers
                .iter()
                .map(|s| parse_dns_server(s))
                .collect::<Result<Vec<SocketAddr>>>()?;
            host_realm = host_realm.with_dns_lookup(servers);
        }
        config.host_realm = host_realm;

        return Ok(config);
    }

    /// Loads the principal database of the realm.
    pub fn open_database(&self) -> Result<MemoryDb> {
        let keytab = self.database.keytab.as_ref().ok_or_else(|| {
            Error::ConfigError("no keytab database configured".to_string())
        })?;
        return load_keytab_db(keytab, &self.realm);
    }
}

fn validate_realm(realm: &str) -> Result<()> {
    if realm.is_empty() {
        return Err(Error::ConfigError("empty realm name".to_string()));
    }

    if realm.contains(|c: char| c == '@' || c == '/' || c.is_whitespace()) {
        return Err(Error::ConfigError(format!(
            "invalid realm name '{}'",
            realm
        )));
    }

    return Ok(());
}

fn seconds(field: &str, secs: u64) -> Result<Duration> {
    if secs > i64::MAX as u64 / 1000 {
        return Err(Error::ConfigError(format!(
            "{} is out of range: {}",
            field, secs
        )));
    }
    return Ok(Duration::seconds(secs as i64));
}

fn parse_dns_server(server: &str) -> Result<SocketAddr> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }

    let ip = server.parse::<IpAddr>().map_err(|_| {
        Error::ConfigError(format!("invalid DNS server '{}'", server))
    })?;
    return Ok(SocketAddr::new(ip, DNS_PORT));
}
