use super::{MemoryDb, PrincipalRecord};
use crate::core::crypto::{KeyBytes, KeyEntry};
use crate::core::principal::Principal;
use crate::error::Error;
use crate::Result;
use kerberos_keytab::Keytab;
use log::debug;
use std::fs;

pub fn load_file_keytab(filepath: &str) -> Result<Keytab> {
    let data = fs::read(filepath).map_err(|err| {
        let message = format!("Unable to read the file '{}'", filepath);
        (message, err)
    })?;

    match Keytab::parse(&data) {
        Ok((_, keytab)) => return Ok(keytab),
        Err(_) => {
            return Err(Error::DataError(format!(
                "Error parsing keytab file '{}'",
                filepath
            )));
        }
    }
}

/// Builds the principal database of `realm` from the keytab entries. Each
/// entry adds a key to the record of its principal.
pub fn keytab_to_db(keytab: Keytab, realm: &str) -> Result<MemoryDb> {
    let mut db = MemoryDb::new(realm);

    for entry in keytab.entries {
        let entry_realm = String::from_utf8(entry.realm.data).map_err(|_| {
            Error::DataError("Invalid realm in keytab entry".to_string())
        })?;

        let mut components = Vec::new();
        for component in entry.components {
            components.push(String::from_utf8(component.data).map_err(|_| {
                Error::DataError("Invalid name in keytab entry".to_string())
            })?);
        }

        let principal =
            Principal::new(entry.name_type as i32, components, entry_realm);
        let kvno = entry.vno.unwrap_or(entry.vno8 as u32);
        let key = KeyEntry::new(
            kvno,
            entry.key.keytype as i32,
            KeyBytes::new(entry.key.keyvalue),
        );

        debug!("Keytab key {} (kvno {}) for {}", key.etype, kvno, principal);

        if db.get(&principal).is_none() {
            db.add(PrincipalRecord::new(principal.clone()));
        }
        if let Some(record) = db.get_mut(&principal) {
            record.keys.push(key);
        }
    }

    return Ok(db);
}

pub fn load_keytab_db(filepath: &str, realm: &str) -> Result<MemoryDb> {
    let keytab = load_file_keytab(filepath)?;
    return keytab_to_db(keytab, realm);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_keytab() {
        let err = load_keytab_db("/nonexistent/kdc.keytab", "EXAMPLE.COM").err().unwrap();
        assert!(err.is_not_found_error());
    }

    #[test]
    fn test_invalid_keytab() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let err = load_keytab_db(&path, "EXAMPLE.COM").err().unwrap();
        assert!(err.is_data_error());
    }
}
