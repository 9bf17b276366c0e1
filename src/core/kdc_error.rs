use super::principal::Principal;
use super::request::PaData;
use kerberos_constants::error_codes;
use serde::Serialize;
use std::fmt;

/// Kind of rule broken by a rejected request, reported to the audit sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// Rules of the protocol itself, such as delegation constraints.
    ProtocolConstraint,
    /// Rules configured for the realm.
    LocalPolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Malformed,
    UnknownPrincipal,
    /// The server could not be found even after following referrals.
    UnknownServer,
    Policy,
    Unavailable,
    Internal,
}

/// Failure of a request, carrying the protocol error code returned to the
/// client and the short status tag used in logs and audit records.
#[derive(Clone, Debug, PartialEq)]
pub struct KdcError {
    pub class: ErrorClass,
    pub code: i32,
    pub status: &'static str,
    pub detail: Option<String>,
    pub violation: Option<Violation>,
    pub client_referral: Option<Principal>,
    pub e_data: Vec<PaData>,
}

impl KdcError {
    pub fn new(class: ErrorClass, code: i32, status: &'static str) -> Self {
        return Self {
            class,
            code,
            status,
            detail: None,
            violation: None,
            client_referral: None,
            e_data: Vec::new(),
        };
    }

    pub fn malformed(code: i32, status: &'static str) -> Self {
        return Self::new(ErrorClass::Malformed, code, status);
    }

    pub fn unknown_client(status: &'static str) -> Self {
        return Self::new(
            ErrorClass::UnknownPrincipal,
            error_codes::KDC_ERR_C_PRINCIPAL_UNKNOWN,
            status,
        );
    }

    pub fn unknown_server(status: &'static str) -> Self {
        return Self::new(
            ErrorClass::UnknownPrincipal,
            error_codes::KDC_ERR_S_PRINCIPAL_UNKNOWN,
            status,
        );
    }

    pub fn policy(code: i32, status: &'static str) -> Self {
        return Self::new(ErrorClass::Policy, code, status);
    }

    pub fn unavailable(status: &'static str) -> Self {
        return Self::new(
            ErrorClass::Unavailable,
            error_codes::KDC_ERR_SVC_UNAVAILABLE,
            status,
        );
    }

    pub fn internal(status: &'static str, detail: &str) -> Self {
        return Self::new(
            ErrorClass::Internal,
            error_codes::KRB_ERR_GENERIC,
            status,
        )
        .with_detail(detail);
    }

    pub fn with_detail(mut self, detail: &str) -> Self {
        self.detail = Some(detail.to_string());
        return self;
    }

    pub fn with_violation(mut self, violation: Violation) -> Self {
        self.violation = Some(violation);
        return self;
    }

    pub fn with_client_referral(mut self, client: Principal) -> Self {
        self.client_referral = Some(client);
        return self;
    }

    pub fn with_e_data(mut self, e_data: Vec<PaData>) -> Self {
        self.e_data = e_data;
        return self;
    }

    /// Error code sent to the client. Internal failures never leak their
    /// code.
    pub fn wire_code(&self) -> i32 {
        if self.class == ErrorClass::Internal {
            return error_codes::KRB_ERR_GENERIC;
        }
        return self.code;
    }

    /// Text sent to the client. Internal details stay in the logs.
    pub fn wire_text(&self) -> String {
        if self.class == ErrorClass::Internal {
            return "Internal error".to_string();
        }
        return error_codes::error_code_to_string(self.code);
    }
}

impl fmt::Display for KdcError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.status)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        return Ok(());
    }
}

impl std::error::Error for KdcError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_is_generic_on_wire() {
        let err = KdcError::internal("MAKE_RANDOM_KEY", "rng failure");
        assert_eq!(error_codes::KRB_ERR_GENERIC, err.wire_code());
        assert!(!err.wire_text().contains("rng"));
        assert_eq!("MAKE_RANDOM_KEY: rng failure", err.to_string());
    }

    #[test]
    fn test_policy_error_keeps_code() {
        let err = KdcError::policy(error_codes::KDC_ERR_BADOPTION, "NOT_ALLOWED_TO_DELEGATE")
            .with_violation(Violation::ProtocolConstraint);
        assert_eq!(error_codes::KDC_ERR_BADOPTION, err.wire_code());
        assert_eq!(Some(Violation::ProtocolConstraint), err.violation);
    }
}
