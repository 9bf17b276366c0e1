use crate::core::principal::Principal;
use chrono::{DateTime, TimeZone, Utc};
use kerberos_asn1::{KerberosTime, PrincipalName};

pub fn principal_from_name(name: &PrincipalName, realm: &str) -> Principal {
    return Principal::new(
        name.name_type,
        name.name_string.clone(),
        realm.to_string(),
    );
}

pub fn principal_name(principal: &Principal) -> PrincipalName {
    return PrincipalName {
        name_type: principal.name_type,
        name_string: principal.components.clone(),
    };
}

pub fn to_kerberos_time(time: &DateTime<Utc>) -> KerberosTime {
    return time.clone().into();
}

pub fn from_kerberos_time(time: &KerberosTime) -> DateTime<Utc> {
    return Utc.timestamp(time.timestamp(), 0);
}
