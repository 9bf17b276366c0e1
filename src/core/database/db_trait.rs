use super::PrincipalRecord;
use crate::core::kdc_error::KdcError;
use crate::core::principal::Principal;
use std::fmt;

/// Options of a principal lookup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LookupFlags {
    /// The principal is looked up as the client of a request.
    pub client: bool,
    /// Aliases may be followed to the canonical principal.
    pub canonicalize: bool,
    /// A cross-realm TGS towards the realm of the principal may be returned
    /// when the principal is not local.
    pub allow_referral: bool,
    /// Principals of foreign realms may be mapped to local entries.
    pub map_foreign: bool,
}

impl LookupFlags {
    pub fn client() -> Self {
        return Self {
            client: true,
            ..Self::default()
        };
    }

    pub fn server() -> Self {
        return Self::default();
    }

    pub fn canonicalize(mut self, canonicalize: bool) -> Self {
        self.canonicalize = canonicalize;
        return self;
    }

    pub fn allow_referral(mut self, allow_referral: bool) -> Self {
        self.allow_referral = allow_referral;
        return self;
    }

    pub fn map_foreign(mut self, map_foreign: bool) -> Self {
        self.map_foreign = map_foreign;
        return self;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LookupError {
    NotFound,
    /// The database cannot be reached right now, the request may be retried.
    Unavailable(String),
    Internal(String),
}

impl fmt::Display for LookupError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LookupError::NotFound => write!(f, "Principal not found"),
            LookupError::Unavailable(s) => {
                write!(f, "Database unavailable: {}", s)
            }
            LookupError::Internal(s) => write!(f, "Database error: {}", s),
        }
    }
}

impl LookupError {
    /// Error of the request that needed the principal, `not_found` being
    /// the one when the principal does not exist.
    pub fn into_kdc_error(
        self,
        not_found: KdcError,
        status: &'static str,
    ) -> KdcError {
        match self {
            LookupError::NotFound => return not_found,
            LookupError::Unavailable(s) => {
                return KdcError::unavailable(status).with_detail(&s)
            }
            LookupError::Internal(s) => return KdcError::internal(status, &s),
        }
    }
}

pub type LookupResult = std::result::Result<PrincipalRecord, LookupError>;

/// Storage of the principals of the realm.
pub trait PrincipalDb: Send + Sync {
    fn id(&self) -> &str;

    fn lookup(&self, principal: &Principal, flags: LookupFlags) -> LookupResult;

    /// Retrieves the principal identified by an X.509 certificate, when
    /// the request carries one instead of a plain client name.
    fn lookup_certificate(
        &self,
        _certificate: &[u8],
        _principal: &Principal,
        _flags: LookupFlags,
    ) -> LookupResult {
        return Err(LookupError::NotFound);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kerberos_constants::error_codes;

    #[test]
    fn test_not_found_keeps_given_error() {
        let err = LookupError::NotFound.into_kdc_error(
            KdcError::unknown_client("LOOKING_UP_CLIENT"),
            "LOOKING_UP_CLIENT",
        );
        assert_eq!(error_codes::KDC_ERR_C_PRINCIPAL_UNKNOWN, err.code);
    }

    #[test]
    fn test_unavailable_lookup() {
        let err = LookupError::Unavailable("locked".to_string()).into_kdc_error(
            KdcError::unknown_client("LOOKING_UP_CLIENT"),
            "LOOKING_UP_CLIENT",
        );
        assert_eq!(error_codes::KDC_ERR_SVC_UNAVAILABLE, err.code);
        assert_eq!("LOOKING_UP_CLIENT", err.status);
        assert_eq!(Some("locked".to_string()), err.detail);
    }

    #[test]
    fn test_internal_lookup_is_generic() {
        let err = LookupError::Internal("corrupted".to_string()).into_kdc_error(
            KdcError::unknown_server("LOOKING_UP_SERVER"),
            "LOOKING_UP_SERVER",
        );
        assert_eq!(error_codes::KRB_ERR_GENERIC, err.wire_code());
    }
}
