use super::crypto::CryptoProvider;
use super::database::PrincipalRecord;
use super::forge::{
    decode_encrypted_timestamp, decode_timestamp, encode_etype_info2,
};
use super::kdc_error::KdcError;
use super::request::{KdcRequest, PaData};
use super::ticket::KerberosTime;
use chrono::Duration;
use kerberos_constants::error_codes;
use kerberos_constants::key_usages::KEY_USAGE_AS_REQ_TIMESTAMP;
use kerberos_constants::pa_data_types::{PA_ENC_TIMESTAMP, PA_ETYPE_INFO2};
use log::debug;

pub struct PreauthContext<'a> {
    pub request: &'a KdcRequest,
    pub client: &'a PrincipalRecord,
    pub crypto: &'a dyn CryptoProvider,
    pub now: KerberosTime,
    pub clock_skew: Duration,
}

/// A pre-authentication mechanism of AS requests.
pub trait PreauthModule: Send + Sync {
    fn padata_type(&self) -> i32;

    /// Padata sent to clients that did not pre-authenticate, telling them
    /// how to do it.
    fn hints(&self, context: &PreauthContext) -> Vec<PaData>;

    /// Checks the padata of this module sent by the client.
    fn verify(
        &self,
        context: &PreauthContext,
        padata: &PaData,
    ) -> Result<(), KdcError>;
}

/// Encrypted timestamp pre-authentication: the client encrypts the current
/// time with its long-term key.
#[derive(Clone, Debug, Default)]
pub struct EncTimestamp {}

impl EncTimestamp {
    pub fn new() -> Self {
        return Self {};
    }
}

fn preauth_failed(detail: &str) -> KdcError {
    return KdcError::policy(error_codes::KDC_ERR_PREAUTH_FAILED, "PREAUTH_FAILED")
        .with_detail(detail);
}

impl PreauthModule for EncTimestamp {
    fn padata_type(&self) -> i32 {
        return PA_ENC_TIMESTAMP;
    }

    fn hints(&self, context: &PreauthContext) -> Vec<PaData> {
        let mut entries = Vec::new();
        for etype in context.request.etypes.iter() {
            if let Some(key) = context.client.find_key(*etype) {
                entries.push((key.etype, key.salt.clone()));
            }
        }

        let mut hints = vec![PaData::new(PA_ENC_TIMESTAMP, Vec::new())];
        if !entries.is_empty() {
            hints.push(PaData::new(PA_ETYPE_INFO2, encode_etype_info2(&entries)));
        }
        return hints;
    }

    fn verify(
        &self,
        context: &PreauthContext,
        padata: &PaData,
    ) -> Result<(), KdcError> {
        let encrypted = decode_encrypted_timestamp(&padata.value)
            .map_err(|err| preauth_failed(&err))?;

        let key = context
            .client
            .find_key_version(encrypted.etype, encrypted.kvno)
            .or_else(|| context.client.find_key(encrypted.etype))
            .ok_or_else(|| {
                KdcError::policy(
                    error_codes::KDC_ERR_ETYPE_NOSUPP,
                    "PREAUTH_FAILED",
                )
                .with_detail(&format!("no client key of etype {}", encrypted.etype))
            })?;

        let raw = context
            .crypto
            .decrypt(
                &key.key,
                encrypted.etype,
                KEY_USAGE_AS_REQ_TIMESTAMP,
                &encrypted.cipher,
            )
            .map_err(|err| preauth_failed(&err.to_string()))?;

        let timestamp = decode_timestamp(&raw).map_err(|err| preauth_failed(&err))?;

        let skew = context.clock_skew;
        if timestamp > context.now + skew || timestamp < context.now - skew {
            return Err(KdcError::policy(error_codes::KRB_AP_ERR_SKEW, "PREAUTH_FAILED")
                .with_detail("timestamp out of clock skew"));
        }

        return Ok(());
    }
}

/// Runs the modules over the padata of an AS request. Returns whether the
/// client pre-authenticated.
///
/// Clients that require pre-authentication and sent nothing usable get
/// PREAUTH_REQUIRED with the hints of every module.
pub fn verify_preauth(
    modules: &[Box<dyn PreauthModule>],
    context: &PreauthContext,
) -> Result<bool, KdcError> {
    for padata in context.request.padata.iter() {
        let module = modules
            .iter()
            .find(|m| m.padata_type() == padata.padata_type);

        if let Some(module) = module {
            module.verify(context, padata)?;
            debug!(
                "{} pre-authenticated with padata {}",
                context.client.principal, padata.padata_type
            );
            return Ok(true);
        }
    }

    if context.client.attributes.requires_preauth {
        let e_data = modules.iter().flat_map(|m| m.hints(context)).collect();
        return Err(KdcError::policy(
            error_codes::KDC_ERR_PREAUTH_REQUIRED,
            "NEEDED_PREAUTH",
        )
        .with_e_data(e_data));
    }

    return Ok(false);
}
