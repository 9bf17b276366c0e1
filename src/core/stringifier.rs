use crate::core::principal::Principal;
use crate::core::reply::{KdcErrorReply, KdcReply};
use crate::core::request::PaData;
use crate::core::ticket::{EncryptedPart, KerberosTime, Ticket, TicketTimes};
use chrono::Local;
use kerberos_constants::etypes;
use kerberos_constants::message_types;
use kerberos_constants::pa_data_types;
use kerberos_constants::principal_names;
use kerberos_constants::ticket_flags;

const NONE: &str = "-";
const UNKNOWN: &str = "???";

pub fn kdc_reply_to_string(reply: &KdcReply, indent_level: usize) -> String {
    let indentation = indent(indent_level);
    let part = &reply.enc_part;
    format!(
        "{}msg-type: {}\n\
         {}padata: {}\n\
         {}client: {}\n\
         {}ticket:\n{}\n\
         {}enc-part:\n{}\n\
         {}session-key: {}\n\
         {}nonce: {}\n\
         {}flags: {}\n\
         {}times:\n{}\n\
         {}server: {}",
        indentation,
        msg_type_to_string(reply.msg_type),
        indentation,
        padatas_or_none(&reply.padata, indent_level + 2),
        indentation,
        principal_to_string(&reply.client),
        indentation,
        ticket_to_string(&reply.ticket, indent_level + 2),
        indentation,
        encrypted_part_to_string(&reply.sealed_part, indent_level + 2),
        indentation,
        etype_to_string(part.session_key.etype),
        indentation,
        part.nonce,
        indentation,
        kerberos_flags_to_string(part.flags),
        indentation,
        ticket_times_to_string(&part.times, indent_level + 2),
        indentation,
        principal_to_string(&part.server),
    )
}

pub fn kdc_error_reply_to_string(
    error: &KdcErrorReply,
    indent_level: usize,
) -> String {
    let indentation = indent(indent_level);
    format!(
        "{}error-code: {}\n\
         {}status: {}\n\
         {}e-text: {}\n\
         {}stime: {}\n\
         {}realm: {}\n\
         {}client: {}\n\
         {}client-realm: {}\n\
         {}server: {}\n\
         {}e-data: {}",
        indentation,
        error.error_code,
        indentation,
        error.status,
        indentation,
        error.e_text,
        indentation,
        kerberos_time_to_string(&error.stime),
        indentation,
        error.realm,
        indentation,
        error
            .client
            .as_ref()
            .map(principal_to_string)
            .unwrap_or(NONE.into()),
        indentation,
        error.client_realm.as_deref().unwrap_or(NONE),
        indentation,
        error
            .server
            .as_ref()
            .map(principal_to_string)
            .unwrap_or(NONE.into()),
        indentation,
        padatas_or_none(&error.e_data, indent_level + 2),
    )
}

fn padatas_or_none(padatas: &[PaData], indent_level: usize) -> String {
    if padatas.is_empty() {
        return NONE.into();
    }
    return format!("\n{}", padatas_to_string(padatas, indent_level));
}

pub fn padatas_to_string(padatas: &[PaData], indent_level: usize) -> String {
    let indentation = indent(indent_level);
    let mut vs = Vec::new();

    for (i, pd) in padatas.iter().enumerate() {
        vs.push(format!(
            "{}[{}]\n\
             {}",
            indentation,
            i,
            padata_to_string(pd, indent_level)
        ))
    }

    return vs.join("\n");
}

pub fn padata_to_string(padata: &PaData, indent_level: usize) -> String {
    let indentation = indent(indent_level);
    format!(
        "{}padata-type: {}\n\
         {}padata-value: {}",
        indentation,
        padata_type_to_string(padata.padata_type),
        indentation,
        octet_string_to_string(&padata.value)
    )
}

pub fn padata_type_to_string(padata_type: i32) -> String {
    format!("{} -> {}", padata_type, padata_type_name(padata_type))
}

pub fn padata_type_name(padata_type: i32) -> &'static str {
    match padata_type {
        pa_data_types::PA_TGS_REQ => "pa-tgs-req",
        pa_data_types::PA_ENC_TIMESTAMP => "pa-enc-timestamp",
        pa_data_types::PA_PW_SALT => "pa-pw-salt",
        pa_data_types::PA_ETYPE_INFO => "pa-etype-info",
        pa_data_types::PA_PK_AS_REQ => "pa-pk-as-req",
        pa_data_types::PA_PK_AS_REP => "pa-pk-as-rep",
        pa_data_types::PA_ETYPE_INFO2 => "pa-etype-info2",
        pa_data_types::PA_SVR_REFERRAL_INFO => {
            "pa-srv-referral-info | pa-use-specified-kvno"
        }
        pa_data_types::PA_PAC_REQUEST => "pa-pac-request",
        pa_data_types::PA_FOR_USER => "pa-for-user",
        pa_data_types::PA_FX_COOKIE => "pa-fx-cookie",
        pa_data_types::PA_FX_FAST => "pa-fx-fast",
        pa_data_types::PA_FX_ERROR => "pa-fx-error",
        pa_data_types::PA_ENCRYPTED_CHALLENGE => "pa-encrypted-challenge",
        pa_data_types::PA_SUPPORTED_ENCTYPES => "pa-supported-enctypes",
        pa_data_types::PA_PAC_OPTIONS => "pa-pac-options",
        crate::core::request::PA_S4U_X509_USER => "pa-s4u-x509-user",
        _ => UNKNOWN,
    }
}

pub fn msg_type_to_string(msg_type: i32) -> String {
    format!("{} -> {}", msg_type, msg_type_name(msg_type))
}

pub fn msg_type_name(msg_type: i32) -> &'static str {
    match msg_type {
        message_types::KRB_AS_REQ => "krb-as-req",
        message_types::KRB_AS_REP => "krb-as-rep",
        message_types::KRB_TGS_REQ => "krb-tgs-req",
        message_types::KRB_TGS_REP => "krb-tgs-rep",
        message_types::KRB_AP_REQ => "krb-ap-req",
        message_types::KRB_AP_REP => "krb-ap-rep",
        message_types::KRB_ERROR => "krb-error",
        _ => UNKNOWN,
    }
}

pub fn ticket_to_string(tkt: &Ticket, indent_level: usize) -> String {
    let indentation = indent(indent_level);
    format!(
        "{}sname: {}\n\
         {}enc-part:\n{}",
        indentation,
        principal_to_string(&tkt.server),
        indentation,
        encrypted_part_to_string(&tkt.enc_part, indent_level + 2)
    )
}

pub fn encrypted_part_to_string(
    ed: &EncryptedPart,
    indent_level: usize,
) -> String {
    let indentation = indent(indent_level);
    format!(
        "{}etype: {}\n\
         {}kvno: {}\n\
         {}cipher: {}",
        indentation,
        etype_to_string(ed.etype),
        indentation,
        ed.kvno.map(|v| format!("{}", v)).unwrap_or(NONE.into()),
        indentation,
        format!("{} bytes", ed.cipher.len())
    )
}

pub fn ticket_times_to_string(
    times: &TicketTimes,
    indent_level: usize,
) -> String {
    let indentation = indent(indent_level);
    format!(
        "{}authtime: {}\n\
         {}starttime: {}\n\
         {}endtime: {}\n\
         {}renew-till: {}",
        indentation,
        kerberos_time_to_string(&times.authtime),
        indentation,
        times
            .starttime
            .as_ref()
            .map(kerberos_time_to_string)
            .unwrap_or(NONE.into()),
        indentation,
        kerberos_time_to_string(&times.endtime),
        indentation,
        times
            .renew_till
            .as_ref()
            .map(kerberos_time_to_string)
            .unwrap_or(NONE.into()),
    )
}

fn indent(level: usize) -> String {
    let mut ind = "".to_string();
    for _ in 0..level {
        ind = format!(" {}", ind);
    }
    return ind;
}

pub fn octet_string_to_string(os: &[u8]) -> String {
    let mut vs = Vec::new();

    for o in os.iter() {
        vs.push(format!("{:02x}", o));
    }
    return vs.join("");
}

pub fn principal_to_string(principal: &Principal) -> String {
    format!("{} ({})", principal, name_type_name(principal.name_type))
}

pub fn kerberos_time_to_string(krb_time: &KerberosTime) -> String {
    krb_time
        .with_timezone(&Local)
        .format("%m/%d/%Y %H:%M:%S")
        .to_string()
}

pub fn kerberos_flags_to_string(flags: u32) -> String {
    let mut flags_strs = Vec::new();

    if (flags & ticket_flags::FORWARDABLE) != 0 {
        flags_strs.push("forwardable")
    }
    if (flags & ticket_flags::FORWARDED) != 0 {
        flags_strs.push("forwarded")
    }
    if (flags & ticket_flags::PROXIABLE) != 0 {
        flags_strs.push("proxiable")
    }
    if (flags & ticket_flags::PROXY) != 0 {
        flags_strs.push("proxy")
    }
    if (flags & ticket_flags::MAY_POSTDATE) != 0 {
        flags_strs.push("may_postdate")
    }
    if (flags & ticket_flags::POSTDATE) != 0 {
        flags_strs.push("postdate")
    }
    if (flags & ticket_flags::RENEWABLE) != 0 {
        flags_strs.push("renewable")
    }
    if (flags & ticket_flags::INITIAL) != 0 {
        flags_strs.push("initial")
    }
    if (flags & ticket_flags::INVALID) != 0 {
        flags_strs.push("invalid")
    }
    if (flags & ticket_flags::HW_AUTHENT) != 0 {
        flags_strs.push("hw_authent")
    }
    if (flags & ticket_flags::PRE_AUTHENT) != 0 {
        flags_strs.push("pre_authent")
    }
    if (flags & ticket_flags::TRANSITED_POLICY_CHECKED) != 0 {
        flags_strs.push("transited_policy_checked")
    }
    if (flags & ticket_flags::OK_AS_DELEGATE) != 0 {
        flags_strs.push("ok_as_delegate")
    }
    if (flags & ticket_flags::REQUEST_ANONYMOUS) != 0 {
        flags_strs.push("anonymous")
    }
    if (flags & ticket_flags::NAME_CANONICALIZE) != 0 {
        flags_strs.push("name_canonicalize")
    }

    return format!("{:#06x} -> {}", flags, flags_strs.join(" "));
}

pub fn etype_to_string(etype: i32) -> String {
    format!("{} -> {}", etype, etype_name(etype))
}

/// Requested etypes as they appear in the request summary, `{18 17 23}`.
pub fn etypes_to_string(etypes: &[i32]) -> String {
    let etypes: Vec<String> = etypes.iter().map(|e| e.to_string()).collect();
    return format!("{{{}}}", etypes.join(" "));
}

pub fn etype_name(etype: i32) -> &'static str {
    match etype {
        etypes::AES128_CTS_HMAC_SHA1_96 => "aes128-cts-hmac-sha1-96",
        etypes::AES256_CTS_HMAC_SHA1_96 => "aes256-cts-hmac-sha1-96",
        etypes::DES_CBC_CRC => "des-cbc-crc",
        etypes::DES_CBC_MD5 => "des-cbc-md5",
        etypes::NO_ENCRYPTION => "no encryption",
        etypes::RC4_HMAC => "rc4-hmac",
        etypes::RC4_HMAC_EXP => "rc4-hmac-exp",
        etypes::RC4_HMAC_OLD_EXP => "rc4-hmac-old-exp",
        _ => UNKNOWN,
    }
}

fn name_type_name(name_type: i32) -> &'static str {
    match name_type {
        principal_names::NT_UNKNOWN => "nt-unknown",
        principal_names::NT_PRINCIPAL => "nt-principal",
        principal_names::NT_SRV_INST => "nt-srv-inst",
        principal_names::NT_SRV_HST => "nt-srv-hst",
        principal_names::NT_SRV_XHST => "nt-srv-xhst",
        principal_names::NT_UID => "nt-uid",
        principal_names::NT_X500_PRINCIPAL => "nt-x500-principal",
        principal_names::NT_SMTP_NAME => "nt-smtp-name",
        principal_names::NT_ENTERPRISE => "nt-enterprise",
        crate::core::principal::NT_WELLKNOWN => "nt-wellknown",
        _ => UNKNOWN,
    }
}
