//! Transited realm paths in the domain-X500-compress encoding.
//!
//! The contents are a comma separated list of realms. A realm ending with a
//! dot is completed with the previous realm (`MIT.` after `EDU` means
//! `MIT.EDU`), and a realm starting with a slash is appended to it (`/HP`
//! after `/COM` means `/COM/HP`). Empty subfields at the start or the end
//! stand for all the realms between the client realm and the first one, or
//! between the last one and the server realm. A backslash escapes the next
//! character.

use super::kdc_error::KdcError;
use super::realm_tree::{hierarchical_path, realm_path, Capaths};
use kerberos_constants::error_codes;
use log::debug;
use std::fmt;
use std::str;

pub const DOMAIN_X500_COMPRESS: i32 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransitedPath {
    pub tr_type: i32,
    pub contents: Vec<u8>,
}

impl TransitedPath {
    pub fn new(tr_type: i32, contents: Vec<u8>) -> Self {
        return Self { tr_type, contents };
    }

    pub fn empty() -> Self {
        return Self::new(DOMAIN_X500_COMPRESS, Vec::new());
    }

    pub fn is_empty(&self) -> bool {
        return self.contents.is_empty();
    }
}

impl Default for TransitedPath {
    fn default() -> Self {
        return Self::empty();
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitError {
    UnsupportedType(i32),
    InvalidEncoding(String),
    /// A realm in the path is not in the allowed path between the client
    /// and the server realms.
    BadRealm(String),
}

impl fmt::Display for TransitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransitError::UnsupportedType(t) => {
                write!(f, "Unsupported transited encoding {}", t)
            }
            TransitError::InvalidEncoding(s) => {
                write!(f, "Invalid transited encoding: {}", s)
            }
            TransitError::BadRealm(r) => {
                write!(f, "Realm {} not allowed in transited path", r)
            }
        }
    }
}

#[derive(Debug, PartialEq)]
enum Subfield {
    Gap,
    Full(String),
    /// Ends with a dot, the previous realm is appended.
    Prefix(String),
    /// Starts with a slash, appended to the previous realm.
    Suffix(String),
}

fn split_subfields(contents: &str) -> Result<Vec<Subfield>, TransitError> {
    if contents.is_empty() {
        return Ok(Vec::new());
    }

    let mut raw_fields: Vec<Vec<(char, bool)>> = vec![Vec::new()];
    let mut chars = contents.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| {
                    TransitError::InvalidEncoding(
                        "dangling escape character".to_string(),
                    )
                })?;
                if let Some(field) = raw_fields.last_mut() {
                    field.push((escaped, true));
                }
            }
            ',' => raw_fields.push(Vec::new()),
            _ => {
                if let Some(field) = raw_fields.last_mut() {
                    field.push((c, false));
                }
            }
        }
    }

    let subfields = raw_fields
        .into_iter()
        .map(|field| {
            let text: String = field.iter().map(|(c, _)| *c).collect();
            match (field.first(), field.last()) {
                (None, _) => Subfield::Gap,
                (Some((' ', false)), _) => Subfield::Full(text[1..].to_string()),
                (Some(('/', false)), _) => Subfield::Suffix(text),
                (_, Some(('.', false))) => Subfield::Prefix(text),
                _ => Subfield::Full(text),
            }
        })
        .collect();

    return Ok(subfields);
}

enum Item {
    Gap,
    Realm(String),
}

fn expand_items(subfields: Vec<Subfield>) -> Vec<Item> {
    let mut items = Vec::new();
    let mut prev: Option<String> = None;

    for subfield in subfields {
        let realm = match subfield {
            Subfield::Gap => {
                items.push(Item::Gap);
                continue;
            }
            Subfield::Full(name) => name,
            Subfield::Prefix(name) => match &prev {
                Some(p) => format!("{}{}", name, p),
                None => name,
            },
            Subfield::Suffix(name) => match &prev {
                Some(p) => format!("{}{}", p, name),
                None => name,
            },
        };
        prev = Some(realm.clone());
        items.push(Item::Realm(realm));
    }

    return items;
}

fn parse_items(contents: &[u8]) -> Result<Vec<Item>, TransitError> {
    let contents = str::from_utf8(contents).map_err(|_| {
        TransitError::InvalidEncoding("contents are not UTF-8".to_string())
    })?;
    return Ok(expand_items(split_subfields(contents)?));
}

/// Realms listed in the transited contents, with the abbreviations and the
/// gaps expanded.
pub fn decode_realms(
    contents: &[u8],
    client_realm: &str,
    server_realm: &str,
) -> Result<Vec<String>, TransitError> {
    let items = parse_items(contents)?;
    let mut realms = Vec::new();

    for (i, item) in items.iter().enumerate() {
        match item {
            Item::Realm(realm) => realms.push(realm.clone()),
            Item::Gap => {
                let left = items[..i]
                    .iter()
                    .rev()
                    .find_map(|item| match item {
                        Item::Realm(r) => Some(r.as_str()),
                        Item::Gap => None,
                    })
                    .unwrap_or(client_realm);
                let right = items[i + 1..]
                    .iter()
                    .find_map(|item| match item {
                        Item::Realm(r) => Some(r.as_str()),
                        Item::Gap => None,
                    })
                    .unwrap_or(server_realm);

                let path = hierarchical_path(left, right);
                if path.len() > 2 {
                    for realm in &path[1..path.len() - 1] {
                        realms.push(realm.clone());
                    }
                }
            }
        }
    }

    return Ok(realms);
}

fn escape(name: &str) -> String {
    let count = name.chars().count();
    let mut escaped = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let special = c == ','
            || c == '\\'
            || (i == 0 && (c == ' ' || c == '/'))
            || (i == count - 1 && c == '.');
        if special {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    return escaped;
}

/// Shortest subfield that decodes to `realm` when following `prev`.
fn abbreviate(realm: &str, prev: Option<&str>) -> String {
    if let Some(prev) = prev {
        if !prev.is_empty() {
            let dotted = format!(".{}", prev);
            if realm.len() > dotted.len() && realm.ends_with(&dotted) {
                let head = &realm[..realm.len() - dotted.len()];
                return format!("{}.", escape(head));
            }

            let slashed = format!("{}/", prev);
            if realm.starts_with(&slashed) {
                let tail = &realm[slashed.len()..];
                return format!("/{}", escape(tail));
            }
        }
    }

    return escape(realm);
}

fn encode_realms(realms: &[String]) -> Vec<u8> {
    let mut fields = Vec::with_capacity(realms.len());
    let mut prev: Option<&str> = None;
    for realm in realms {
        fields.push(abbreviate(realm, prev));
        prev = Some(realm);
    }
    return fields.join(",").into_bytes();
}

/// Returns a new path with `realm` appended. The given path is never
/// modified, and a realm already listed leaves the path as it is.
pub fn add_realm(
    path: &TransitedPath,
    realm: &str,
    client_realm: &str,
    server_realm: &str,
) -> Result<TransitedPath, TransitError> {
    if path.tr_type != DOMAIN_X500_COMPRESS {
        return Err(TransitError::UnsupportedType(path.tr_type));
    }

    if realm.is_empty() {
        return Err(TransitError::InvalidEncoding("empty realm".to_string()));
    }

    let realms = decode_realms(&path.contents, client_realm, server_realm)?;
    if realms.iter().any(|r| r == realm) {
        return Ok(path.clone());
    }

    let items = parse_items(&path.contents)?;
    let contents = match items.last() {
        None => encode_realms(&[realm.to_string()]),
        Some(Item::Gap) => {
            // a trailing gap would now end at the new realm, so the
            // expanded realms are written out instead
            let mut all = realms;
            all.push(realm.to_string());
            encode_realms(&all)
        }
        Some(Item::Realm(last)) => {
            let mut contents = path.contents.clone();
            contents.push(b',');
            contents.extend(abbreviate(realm, Some(last)).into_bytes());
            contents
        }
    };

    return Ok(TransitedPath::new(DOMAIN_X500_COMPRESS, contents));
}

/// Transited path of a ticket issued by the local realm from a ticket
/// issued by `issuer_realm`.
///
/// Tickets issued by the local realm itself, or by the realm of the client,
/// keep their path. Otherwise the issuer realm is added.
pub fn compute(
    transited: &TransitedPath,
    issuer_realm: &str,
    client_realm: &str,
    local_realm: &str,
    server_realm: &str,
) -> Result<TransitedPath, KdcError> {
    if issuer_realm == local_realm || issuer_realm == client_realm {
        return Ok(transited.clone());
    }

    if transited.tr_type != DOMAIN_X500_COMPRESS {
        return Err(KdcError::policy(
            error_codes::KDC_ERR_TRTYPE_NOSUPP,
            "VALIDATE_TRANSIT_TYPE",
        ));
    }

    return add_realm(transited, issuer_realm, client_realm, server_realm)
        .map_err(|err| {
            debug!("Unable to add {} to transited path: {}", issuer_realm, err);
            KdcError::internal("ADD_TO_TRANSITED_LIST", &err.to_string())
        });
}

/// Checks that every realm of the path lies on the allowed path from the
/// client realm to the server realm.
pub fn check_transited_list(
    path: &TransitedPath,
    client_realm: &str,
    server_realm: &str,
    capaths: &Capaths,
) -> Result<(), TransitError> {
    if path.tr_type != DOMAIN_X500_COMPRESS {
        return Err(TransitError::UnsupportedType(path.tr_type));
    }

    let realms = decode_realms(&path.contents, client_realm, server_realm)?;
    if realms.is_empty() {
        return Ok(());
    }

    let allowed = realm_path(capaths, client_realm, server_realm);
    for realm in realms {
        if !allowed.contains(&realm) {
            return Err(TransitError::BadRealm(realm));
        }
    }

    return Ok(());
}
