use cerbero_kdc::core::transited::{
    add_realm, decode_realms, TransitedPath, DOMAIN_X500_COMPRESS,
};
use cerbero_kdc::Result;

pub fn transit(
    path: &str,
    client_realm: &str,
    server_realm: &str,
    add: Option<&str>,
) -> Result<()> {
    let mut path =
        TransitedPath::new(DOMAIN_X500_COMPRESS, path.as_bytes().to_vec());

    if let Some(realm) = add {
        path = add_realm(&path, realm, client_realm, server_realm)
            .map_err(|err| format!("Unable to add {}: {}", realm, err))?;
        println!("{}", String::from_utf8_lossy(&path.contents));
    }

    let realms = decode_realms(&path.contents, client_realm, server_realm)
        .map_err(|err| format!("Invalid transited path: {}", err))?;

    for realm in realms {
        println!("{}", realm);
    }

    return Ok(());
}
