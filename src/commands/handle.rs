use cerbero_kdc::config::KdcConfig;
use cerbero_kdc::core::audit::{JsonAuditSink, LogAuditSink};
use cerbero_kdc::core::forge::decode_kdc_req;
use cerbero_kdc::core::stringifier::{
    kdc_error_reply_to_string, kdc_reply_to_string,
};
use cerbero_kdc::core::{
    AuditSinks, Kdc, KerberosCrypto, Outcome, RealmContext,
};
use cerbero_kdc::Result;
use log::info;
use std::fs;
use std::sync::Arc;

pub fn handle(
    config_file: &str,
    request_file: &str,
    out_file: Option<&str>,
    from: &str,
    audit_file: Option<&str>,
) -> Result<()> {
    let config = KdcConfig::from_file(config_file)?;
    let realm_config = config.to_realm_config()?;
    let db = config.open_database()?;
    info!("Loaded {} principals of {}", db.len(), config.realm);

    let mut audit = AuditSinks::new().with_sink(Box::new(LogAuditSink::new()));
    if let Some(audit_file) = audit_file {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(audit_file)
            .map_err(|err| {
                (format!("Unable to open the file {}", audit_file), err)
            })?;
        audit = audit.with_sink(Box::new(JsonAuditSink::new(file)));
    }

    let kdc = Kdc::new(
        RealmContext::new(realm_config, Arc::new(db)),
        Arc::new(KerberosCrypto::new()),
    )
    .with_audit(audit);

    let raw_request = fs::read(request_file).map_err(|err| {
        (format!("Unable to read the file {}", request_file), err)
    })?;
    let request = decode_kdc_req(&raw_request)?;

    kdc.start()?;
    let outcome = kdc.handle(request, from);
    kdc.stop();

    match &outcome {
        Outcome::Reply(reply) => println!("{}", kdc_reply_to_string(reply, 0)),
        Outcome::Error(error) => {
            println!("{}", kdc_error_reply_to_string(error, 0))
        }
    }

    if let Some(out_file) = out_file {
        let raw_reply = outcome.build()?;
        fs::write(out_file, &raw_reply).map_err(|err| {
            (format!("Unable to write the file {}", out_file), err)
        })?;
        info!("Save reply in {}", out_file);
    }

    return Ok(());
}
