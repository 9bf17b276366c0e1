use super::database::PrincipalRecord;
use super::kdc_error::KdcError;
use super::ticket::{AuthDataEntry, TicketBody};

pub struct AuthDataContext<'a> {
    pub msg_type: i32,
    pub server: &'a PrincipalRecord,
    /// Ticket the new one derives from: the header ticket, or the evidence
    /// ticket in constrained delegation.
    pub subject: Option<&'a TicketBody>,
    /// Authorization data is produced even for servers that opt out, as
    /// protocol transition tickets may be used for further delegation.
    pub force: bool,
}

/// Produces the authorization data of new tickets.
pub trait AuthDataHook: Send + Sync {
    fn authorization_data(
        &self,
        context: &AuthDataContext,
    ) -> Result<Vec<AuthDataEntry>, KdcError>;
}

/// Carries the authorization data of the subject ticket into the new
/// ticket. Initial tickets get none.
#[derive(Clone, Debug, Default)]
pub struct CopyAuthData {}

impl CopyAuthData {
    pub fn new() -> Self {
        return Self {};
    }
}

impl AuthDataHook for CopyAuthData {
    fn authorization_data(
        &self,
        context: &AuthDataContext,
    ) -> Result<Vec<AuthDataEntry>, KdcError> {
        if context.server.attributes.no_auth_data_required && !context.force {
            return Ok(Vec::new());
        }

        return Ok(context
            .subject
            .map(|subject| subject.authorization_data.clone())
            .unwrap_or_default());
    }
}
