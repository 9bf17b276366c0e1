use super::pa_data::{encode_method_data, padata_to_asn1};
use super::principal_name::{principal_name, to_kerberos_time};
use super::ticket::{
    encrypted_part_to_asn1, encryption_key, host_addresses_to_asn1,
    ticket_to_asn1,
};
use crate::core::reply::{EncReplyPart, KdcErrorReply, KdcReply};
use kerberos_asn1::{
    AsRep, Asn1Object, EncAsRepPart, EncKdcRepPart, EncTgsRepPart, KrbError,
    LastReqEntry, PrincipalName, TgsRep,
};
use kerberos_constants::message_types;

fn last_req(part: &EncReplyPart) -> Vec<LastReqEntry> {
    return part
        .last_req
        .iter()
        .map(|lr| LastReqEntry {
            lr_type: lr.lr_type,
            lr_value: to_kerberos_time(&lr.lr_value),
        })
        .collect();
}

/// Fields shared by the encrypted parts of AS-REP and TGS-REP, which only
/// differ in their application tag.
fn enc_kdc_rep_part(part: &EncReplyPart) -> EncKdcRepPart {
    let mut enc_part = EncKdcRepPart::default();
    enc_part.key = encryption_key(&part.session_key);
    enc_part.last_req = last_req(part);
    enc_part.nonce = part.nonce;
    enc_part.key_expiration = part.key_expiration.as_ref().map(to_kerberos_time);
    enc_part.flags = part.flags.into();
    enc_part.authtime = to_kerberos_time(&part.times.authtime);
    enc_part.starttime = part.times.starttime.as_ref().map(to_kerberos_time);
    enc_part.endtime = to_kerberos_time(&part.times.endtime);
    enc_part.renew_till = part.times.renew_till.as_ref().map(to_kerberos_time);
    enc_part.srealm = part.server.realm.clone();
    enc_part.sname = principal_name(&part.server);
    enc_part.caddr = host_addresses_to_asn1(&part.addresses);
    return enc_part;
}

/// Encodes the client part of a reply of the given message type.
pub fn encode_enc_reply_part(
    part: &EncReplyPart,
    msg_type: i32,
) -> Result<Vec<u8>, String> {
    let enc_part = enc_kdc_rep_part(part);
    match msg_type {
        message_types::KRB_AS_REP => {
            return Ok(EncAsRepPart::from(enc_part).build())
        }
        message_types::KRB_TGS_REP => {
            return Ok(EncTgsRepPart::from(enc_part).build())
        }
        _ => return Err(format!("Unexpected reply type {}", msg_type)),
    }
}

/// Encodes an AS-REP or a TGS-REP.
pub fn build_kdc_rep(reply: &KdcReply) -> Result<Vec<u8>, String> {
    let padata = if reply.padata.is_empty() {
        None
    } else {
        Some(reply.padata.iter().map(padata_to_asn1).collect())
    };

    match reply.msg_type {
        message_types::KRB_AS_REP => {
            let mut as_rep = AsRep::default();
            as_rep.pvno = 5;
            as_rep.msg_type = message_types::KRB_AS_REP;
            as_rep.padata = padata;
            as_rep.crealm = reply.client.realm.clone();
            as_rep.cname = principal_name(&reply.client);
            as_rep.ticket = ticket_to_asn1(&reply.ticket);
            as_rep.enc_part = encrypted_part_to_asn1(&reply.sealed_part);
            return Ok(as_rep.build());
        }
        message_types::KRB_TGS_REP => {
            let mut tgs_rep = TgsRep::default();
            tgs_rep.pvno = 5;
            tgs_rep.msg_type = message_types::KRB_TGS_REP;
            tgs_rep.padata = padata;
            tgs_rep.crealm = reply.client.realm.clone();
            tgs_rep.cname = principal_name(&reply.client);
            tgs_rep.ticket = ticket_to_asn1(&reply.ticket);
            tgs_rep.enc_part = encrypted_part_to_asn1(&reply.sealed_part);
            return Ok(tgs_rep.build());
        }
        _ => return Err(format!("Unexpected reply type {}", reply.msg_type)),
    }
}

pub fn build_krb_error(error: &KdcErrorReply) -> Vec<u8> {
    let mut krb_error = KrbError::default();
    krb_error.pvno = 5;
    krb_error.msg_type = message_types::KRB_ERROR;
    krb_error.stime = to_kerberos_time(&error.stime);
    krb_error.susec = 0;
    krb_error.error_code = error.error_code;
    krb_error.crealm = error
        .client_realm
        .clone()
        .or_else(|| error.client.as_ref().map(|c| c.realm.clone()));
    krb_error.cname = error.client.as_ref().map(principal_name);
    krb_error.realm = error.realm.clone();
    krb_error.sname = match &error.server {
        Some(server) => principal_name(server),
        None => PrincipalName {
            name_type: 0,
            name_string: Vec::new(),
        },
    };
    krb_error.e_text = Some(error.e_text.clone());
    if !error.e_data.is_empty() {
        krb_error.e_data = Some(encode_method_data(&error.e_data));
    }

    return krb_error.build();
}
