use kerberos_constants::principal_names;
use std::convert::TryFrom;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const TGS_NAME: &str = "krbtgt";
pub const WELLKNOWN_NAME: &str = "WELLKNOWN";
pub const ANONYMOUS_NAME: &str = "ANONYMOUS";
pub const ANONYMOUS_REALM: &str = "WELLKNOWN:ANONYMOUS";

/// Name type of well-known principals, such as the anonymous one.
pub const NT_WELLKNOWN: i32 = 11;

/// A Kerberos principal: name type, ordered name components and realm.
///
/// Comparison is exact over the components and the realm. The name type is
/// a hint carried along and does not take part in the identity.
#[derive(Clone, Debug)]
pub struct Principal {
    pub name_type: i32,
    pub components: Vec<String>,
    pub realm: String,
}

impl Principal {
    pub fn new(name_type: i32, components: Vec<String>, realm: String) -> Self {
        return Self {
            name_type,
            components,
            realm,
        };
    }

    pub fn user(name: &str, realm: &str) -> Self {
        return Self::new(
            principal_names::NT_PRINCIPAL,
            vec![name.to_string()],
            realm.to_string(),
        );
    }

    pub fn service(service: &str, host: &str, realm: &str) -> Self {
        return Self::new(
            principal_names::NT_SRV_HST,
            vec![service.to_string(), host.to_string()],
            realm.to_string(),
        );
    }

    /// The ticket granting service principal `krbtgt/<target>@<issuer>`,
    /// which is used to obtain tickets for `target` from `issuer`.
    pub fn tgs(target_realm: &str, issuer_realm: &str) -> Self {
        return Self::new(
            principal_names::NT_SRV_INST,
            vec![TGS_NAME.to_string(), target_realm.to_string()],
            issuer_realm.to_string(),
        );
    }

    pub fn anonymous() -> Self {
        return Self::new(
            NT_WELLKNOWN,
            vec![WELLKNOWN_NAME.to_string(), ANONYMOUS_NAME.to_string()],
            ANONYMOUS_REALM.to_string(),
        );
    }

    pub fn component(&self, index: usize) -> Option<&str> {
        return self.components.get(index).map(|c| c.as_str());
    }

    pub fn with_realm(&self, realm: &str) -> Self {
        let mut principal = self.clone();
        principal.realm = realm.to_string();
        return principal;
    }

    /// Name without the realm, components joined by '/'.
    pub fn name(&self) -> String {
        return self.components.join("/");
    }

    pub fn is_tgs(&self) -> bool {
        return self.components.len() == 2 && self.components[0] == TGS_NAME;
    }

    /// Whether this is a TGS principal whose target realm is not its own
    /// realm, as `krbtgt/OTHER.REALM@LOCAL.REALM`.
    pub fn is_cross_tgs(&self) -> bool {
        return self.is_tgs() && self.components[1] != self.realm;
    }

    pub fn is_local_tgs(&self, realm: &str) -> bool {
        return self.is_tgs()
            && self.components[1] == realm
            && self.realm == realm;
    }

    /// Anonymous principals are recognized by name, whatever the realm.
    pub fn is_anonymous(&self) -> bool {
        return self.components.len() == 2
            && self.components[0] == WELLKNOWN_NAME
            && self.components[1] == ANONYMOUS_NAME;
    }

    pub fn same_name(&self, other: &Principal) -> bool {
        return self.components == other.components;
    }
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        return self.realm == other.realm && self.components == other.components;
    }
}

impl Eq for Principal {}

impl Hash for Principal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
        self.realm.hash(state);
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.name(), self.realm)
    }
}

impl TryFrom<&str> for Principal {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let (name, realm) = match value.rfind('@') {
            Some(pos) => (&value[..pos], &value[pos + 1..]),
            None => {
                return Err(format!(
                    "Invalid principal '{}', it must be <name>@<realm>",
                    value
                ))
            }
        };

        let components: Vec<String> =
            name.split('/').map(|c| c.to_string()).collect();

        if realm.is_empty() || components.iter().any(|c| c.is_empty()) {
            return Err(format!(
                "Invalid principal '{}', it must be <name>@<realm>",
                value
            ));
        }

        let name_type = if components.len() == 2 && components[0] == TGS_NAME
        {
            principal_names::NT_SRV_INST
        } else if components.len() == 2 {
            principal_names::NT_SRV_HST
        } else {
            principal_names::NT_PRINCIPAL
        };

        return Ok(Self::new(name_type, components, realm.to_string()));
    }
}

impl TryFrom<&String> for Principal {
    type Error = String;

    fn try_from(value: &String) -> Result<Self, Self::Error> {
        return Self::try_from(value.as_str());
    }
}

impl TryFrom<String> for Principal {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        return Self::try_from(&value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_principal() {
        let p = Principal::try_from("host/web.example.com@EXAMPLE.COM").unwrap();
        assert_eq!(vec!["host", "web.example.com"], p.components);
        assert_eq!("EXAMPLE.COM", p.realm);
        assert_eq!(principal_names::NT_SRV_HST, p.name_type);
        assert_eq!("host/web.example.com@EXAMPLE.COM", p.to_string());
    }

    #[test]
    fn test_parse_invalid_principals() {
        assert!(Principal::try_from("alice").is_err());
        assert!(Principal::try_from("alice@").is_err());
        assert!(Principal::try_from("host//x@R").is_err());
    }

    #[test]
    fn test_equality_ignores_name_type() {
        let mut a = Principal::user("alice", "EXAMPLE.COM");
        let b = Principal::user("alice", "EXAMPLE.COM");
        a.name_type = principal_names::NT_ENTERPRISE;
        assert_eq!(a, b);
        assert_ne!(a, b.with_realm("OTHER.COM"));
    }

    #[test]
    fn test_tgs_kinds() {
        let local = Principal::tgs("EXAMPLE.COM", "EXAMPLE.COM");
        let cross = Principal::tgs("OTHER.COM", "EXAMPLE.COM");
        assert!(local.is_tgs());
        assert!(!local.is_cross_tgs());
        assert!(local.is_local_tgs("EXAMPLE.COM"));
        assert!(cross.is_cross_tgs());
        assert!(!cross.is_local_tgs("EXAMPLE.COM"));
        assert!(!Principal::user("krbtgt", "EXAMPLE.COM").is_tgs());
    }

    #[test]
    fn test_anonymous() {
        assert!(Principal::anonymous().is_anonymous());
        assert!(Principal::anonymous().with_realm("EXAMPLE.COM").is_anonymous());
        assert!(!Principal::user("anonymous", "EXAMPLE.COM").is_anonymous());
    }
}
