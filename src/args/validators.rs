use std::net::IpAddr;

pub fn is_realm(v: String) -> Result<(), String> {
    if v.is_empty() || v.contains(|c: char| c == '@' || c == '/') {
        return Err(format!("Invalid realm '{}'", v));
    }

    return Ok(());
}

pub fn is_ip(v: String) -> Result<(), String> {
    v.parse::<IpAddr>()
        .map_err(|_| format!("Invalid IP address '{}'", v))?;
    return Ok(());
}
