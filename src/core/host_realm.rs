use log::debug;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::str;
use trust_dns_resolver::config::{
    NameServerConfig, Protocol, ResolverConfig, ResolverOpts,
};
use trust_dns_resolver::Resolver;

/// Maps host names to the realm they belong to.
///
/// The static `domain_realm` table is consulted first, with entries that
/// are either a full host name or a domain suffix starting by a dot. When
/// enabled, the `_kerberos` TXT records of the host domains are queried
/// next. As a last resort the realm is derived from the host domain in
/// uppercase.
#[derive(Clone, Debug, Default)]
pub struct HostRealmMapper {
    domain_realm: HashMap<String, String>,
    dns_lookup: bool,
    dns_servers: Vec<SocketAddr>,
}

impl HostRealmMapper {
    pub fn new(domain_realm: HashMap<String, String>) -> Self {
        let domain_realm = domain_realm
            .into_iter()
            .map(|(domain, realm)| (domain.to_lowercase(), realm))
            .collect();

        return Self {
            domain_realm,
            dns_lookup: false,
            dns_servers: Vec::new(),
        };
    }

    pub fn with_dns_lookup(mut self, dns_servers: Vec<SocketAddr>) -> Self {
        self.dns_lookup = true;
        self.dns_servers = dns_servers;
        return self;
    }

    /// Realm of the given host. `None` when no realm can be determined.
    pub fn realm_of_host(&self, host: &str) -> Option<String> {
        let host = host.trim_end_matches('.').to_lowercase();
        if host.is_empty() {
            return None;
        }

        if let Some(realm) = self.table_realm(&host) {
            return Some(realm);
        }

        if self.dns_lookup {
            if let Some(realm) = self.dns_realm(&host) {
                return Some(realm);
            }
        }

        return fallback_realm(&host);
    }

    fn table_realm(&self, host: &str) -> Option<String> {
        if let Some(realm) = self.domain_realm.get(host) {
            return Some(realm.clone());
        }

        for (pos, _) in host.match_indices('.') {
            let suffix = &host[pos..];
            if let Some(realm) = self.domain_realm.get(suffix) {
                return Some(realm.clone());
            }
        }

        return None;
    }

    fn dns_realm(&self, host: &str) -> Option<String> {
        let resolver = match self.resolver() {
            Ok(resolver) => resolver,
            Err(err) => {
                debug!("Unable to create DNS resolver: {}", err);
                return None;
            }
        };

        let mut domain = host;
        loop {
            let query = format!("_kerberos.{}", domain);
            match resolver.txt_lookup(query.as_str()) {
                Ok(lookup) => {
                    for txt in lookup.iter() {
                        for data in txt.txt_data() {
                            if let Ok(realm) = str::from_utf8(data) {
                                if !realm.is_empty() {
                                    return Some(realm.to_string());
                                }
                            }
                        }
                    }
                }
                Err(err) => debug!("No realm TXT record for {}: {}", domain, err),
            }

            domain = match domain.find('.') {
                Some(pos) => &domain[pos + 1..],
                None => return None,
            };
        }
    }

    fn resolver(&self) -> Result<Resolver, String> {
        if self.dns_servers.is_empty() {
            return Resolver::from_system_conf().map_err(|err| {
                format!("Unable to use dns system configuration: {}", err)
            });
        }

        let mut resolver_config = ResolverConfig::new();
        for server in self.dns_servers.iter() {
            resolver_config.add_name_server(NameServerConfig {
                socket_addr: *server,
                protocol: Protocol::Udp,
                tls_dns_name: None,
                trust_nx_responses: false,
            });
        }

        return Resolver::new(resolver_config, ResolverOpts::default())
            .map_err(|err| format!("Unable to create resolver: {}", err));
    }
}

/// Uppercased domain of the host, i.e. everything after the first label.
fn fallback_realm(host: &str) -> Option<String> {
    let pos = host.find('.')?;
    let domain = &host[pos + 1..];
    if domain.is_empty() {
        return None;
    }
    return Some(domain.to_uppercase());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> HostRealmMapper {
        let mut table = HashMap::new();
        table.insert(".corp.example.com".to_string(), "CORP.EXAMPLE.COM".to_string());
        table.insert("odd.example.com".to_string(), "ODD.REALM".to_string());
        return HostRealmMapper::new(table);
    }

    #[test]
    fn test_exact_host_entry() {
        assert_eq!(
            Some("ODD.REALM".to_string()),
            mapper().realm_of_host("odd.example.com")
        );
    }

    #[test]
    fn test_domain_suffix_entry() {
        assert_eq!(
            Some("CORP.EXAMPLE.COM".to_string()),
            mapper().realm_of_host("Web01.Corp.Example.Com.")
        );
    }

    #[test]
    fn test_fallback_to_domain() {
        assert_eq!(
            Some("OTHER.ORG".to_string()),
            mapper().realm_of_host("files.other.org")
        );
        assert_eq!(None, mapper().realm_of_host("localhost"));
        assert_eq!(None, mapper().realm_of_host("."));
    }
}
