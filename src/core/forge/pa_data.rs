use super::principal_name::{from_kerberos_time, principal_from_name};
use super::ticket::encrypted_part_from_asn1;
use crate::core::request::{ForUser, PaData};
use crate::core::ticket::{EncryptedPart, KerberosTime};
use kerberos_asn1;
use kerberos_asn1::{
    Asn1Object, EncryptedData, EtypeInfo2Entry, PaEncTsEnc, PaForUser,
};

/// Decodes the identity asserted in a PA-FOR-USER padata.
pub fn decode_for_user(raw: &[u8]) -> Result<ForUser, String> {
    let (_, pa_for_user) = PaForUser::parse(raw)
        .map_err(|_| format!("Error parsing PA-FOR-USER"))?;

    return Ok(ForUser {
        user: principal_from_name(
            &pa_for_user.username,
            &pa_for_user.userrealm,
        ),
        cksumtype: pa_for_user.cksum.cksumtype,
        checksum: pa_for_user.cksum.checksum,
        auth_package: pa_for_user.auth_package,
    });
}

/// Encrypted timestamp of a PA-ENC-TIMESTAMP padata.
pub fn decode_encrypted_timestamp(raw: &[u8]) -> Result<EncryptedPart, String> {
    let (_, encrypted_data) = EncryptedData::parse(raw)
        .map_err(|_| format!("Error parsing PA-ENC-TIMESTAMP"))?;
    return Ok(encrypted_part_from_asn1(&encrypted_data));
}

/// Timestamp of a decrypted PA-ENC-TS-ENC.
pub fn decode_timestamp(raw: &[u8]) -> Result<KerberosTime, String> {
    let (_, timestamp) = PaEncTsEnc::parse(raw)
        .map_err(|_| format!("Error parsing PA-ENC-TS-ENC"))?;
    return Ok(from_kerberos_time(&timestamp.patimestamp));
}

pub fn padata_to_asn1(padata: &PaData) -> kerberos_asn1::PaData {
    return kerberos_asn1::PaData::new(padata.padata_type, padata.value.clone());
}

pub fn padata_from_asn1(padata: &kerberos_asn1::PaData) -> PaData {
    return PaData::new(padata.padata_type, padata.padata_value.clone());
}

/// METHOD-DATA encoding of a list of padata, as sent in the e-data of
/// errors.
pub fn encode_method_data(padata: &[PaData]) -> Vec<u8> {
    let method_data: Vec<kerberos_asn1::PaData> =
        padata.iter().map(padata_to_asn1).collect();
    return method_data.build();
}

/// ETYPE-INFO2 with the given encryption types and salts.
pub fn encode_etype_info2(entries: &[(i32, Option<String>)]) -> Vec<u8> {
    let etype_info2: Vec<EtypeInfo2Entry> = entries
        .iter()
        .map(|(etype, salt)| {
            let mut entry = EtypeInfo2Entry::default();
            entry.etype = *etype;
            entry.salt = salt.clone();
            entry
        })
        .collect();
    return etype_info2.build();
}
