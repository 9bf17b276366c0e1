use super::{
    AuthDataVerdict, CryptoError, CryptoProvider, CryptoResult, KeyBytes,
    KeyEntry, SessionKey, TicketKey,
};
use crate::core::forge;
use crate::core::principal::Principal;
use crate::core::reply::{EncReplyPart, ReplyKey};
use crate::core::request::ForUser;
use crate::core::ticket::{EncryptedPart, Ticket, TicketBody};
use kerberos_constants::checksum_types;
use kerberos_constants::etypes;
use kerberos_constants::key_usages::{
    KEY_USAGE_AS_REP_TICKET, KEY_USAGE_KERB_NON_KERB_CKSUM_SALT,
};
use kerberos_crypto::{
    checksum_hmac_md5, checksum_sha_aes, new_kerberos_cipher, AesSizes, Key,
};
use ms_pac::{
    HMAC_SHA1_96_AES128, HMAC_SHA1_96_AES256, KERB_CHECKSUM_HMAC_MD5,
    PAC_SIGNATURE_DATA,
};

/// Provider backed by the `kerberos_crypto` ciphers, with the encrypted
/// parts encoded in ASN.1 DER.
///
/// Authorization data is checked through the PAC signatures, and the
/// client of a verified PAC is the identity it vouches for.
pub struct KerberosCrypto {
    etypes: Vec<i32>,
}

impl KerberosCrypto {
    pub fn new() -> Self {
        return Self {
            etypes: vec![
                etypes::AES256_CTS_HMAC_SHA1_96,
                etypes::AES128_CTS_HMAC_SHA1_96,
                etypes::RC4_HMAC,
            ],
        };
    }

    /// Restricts the encryption types, keeping the given order.
    pub fn with_etypes(etypes: Vec<i32>) -> Self {
        return Self { etypes };
    }
}

impl Default for KerberosCrypto {
    fn default() -> Self {
        return Self::new();
    }
}

impl CryptoProvider for KerberosCrypto {
    fn supported_etypes(&self) -> Vec<i32> {
        return self.etypes.clone();
    }

    fn make_random_key(&self, etype: i32) -> CryptoResult<SessionKey> {
        if !self.etypes.contains(&etype) {
            return Err(CryptoError::UnsupportedEtype(etype));
        }

        let key = Key::random(etype)
            .map_err(|_| CryptoError::UnsupportedEtype(etype))?;

        return Ok(SessionKey::new(etype, KeyBytes::from(key.as_bytes())));
    }

    fn encrypt(
        &self,
        key: &KeyBytes,
        etype: i32,
        usage: i32,
        plaintext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let cipher = new_kerberos_cipher(etype)
            .map_err(|_| CryptoError::UnsupportedEtype(etype))?;
        return Ok(cipher.encrypt(key.as_bytes(), usage, plaintext));
    }

    fn decrypt(
        &self,
        key: &KeyBytes,
        etype: i32,
        usage: i32,
        ciphertext: &[u8],
    ) -> CryptoResult<Vec<u8>> {
        let cipher = new_kerberos_cipher(etype)
            .map_err(|_| CryptoError::UnsupportedEtype(etype))?;
        return cipher
            .decrypt(key.as_bytes(), usage, ciphertext)
            .map_err(|err| CryptoError::Integrity(format!("{}", err)));
    }

    fn encrypt_ticket(
        &self,
        key: &TicketKey,
        body: &TicketBody,
    ) -> CryptoResult<EncryptedPart> {
        let raw_body = forge::encode_ticket_body(body);
        let cipher = self.encrypt(
            &key.key,
            key.etype,
            KEY_USAGE_AS_REP_TICKET,
            &raw_body,
        )?;
        return Ok(EncryptedPart::new(key.etype, key.kvno, cipher));
    }

    fn decrypt_ticket(
        &self,
        key: &TicketKey,
        ticket: &Ticket,
    ) -> CryptoResult<TicketBody> {
        if ticket.enc_part.etype != key.etype {
            return Err(CryptoError::Integrity(format!(
                "ticket encrypted with etype {} but key is {}",
                ticket.enc_part.etype, key.etype
            )));
        }

        let raw_body = self.decrypt(
            &key.key,
            key.etype,
            KEY_USAGE_AS_REP_TICKET,
            &ticket.enc_part.cipher,
        )?;

        return forge::decode_ticket_body(&raw_body)
            .map_err(|err| CryptoError::Encoding(err));
    }

    fn seal_reply(
        &self,
        key: &ReplyKey,
        msg_type: i32,
        part: &EncReplyPart,
    ) -> CryptoResult<EncryptedPart> {
        let raw_part = forge::encode_enc_reply_part(part, msg_type)
            .map_err(|err| CryptoError::Encoding(err))?;
        let cipher =
            self.encrypt(&key.key.key, key.key.etype, key.usage, &raw_part)?;
        return Ok(EncryptedPart::new(key.key.etype, key.kvno, cipher));
    }

    fn verify_authdata(
        &self,
        body: &TicketBody,
        server_key: &KeyEntry,
        tgs_key: Option<&KeyEntry>,
    ) -> CryptoResult<AuthDataVerdict> {
        let pac = match forge::find_pac(&body.authorization_data)
            .map_err(|err| CryptoError::Encoding(err))?
        {
            Some(pac) => pac,
            None => return Ok(AuthDataVerdict::default()),
        };

        let server_signature = pac.server_signature().ok_or_else(|| {
            CryptoError::Integrity("PAC without server signature".to_string())
        })?;
        let kdc_signature = pac.kdc_signature().ok_or_else(|| {
            CryptoError::Integrity("PAC without KDC signature".to_string())
        })?;

        verify_pac_signature(
            server_key,
            &pac.unsigned_data(),
            server_signature,
            "server",
        )?;

        if let Some(tgs_key) = tgs_key {
            verify_pac_signature(
                tgs_key,
                &server_signature.Signature,
                kdc_signature,
                "KDC",
            )?;
        }

        let name = pac.client_name().ok_or_else(|| {
            CryptoError::Integrity("PAC without client info".to_string())
        })?;

        if name != body.client.name() {
            return Err(CryptoError::Integrity(format!(
                "PAC of {} in ticket of {}",
                name, body.client
            )));
        }

        let realm = match pac.dns_domain_name() {
            Some(domain) => domain.to_uppercase(),
            None => body.client.realm.clone(),
        };

        let client = Principal::new(
            body.client.name_type,
            name.split('/').map(|s| s.to_string()).collect(),
            realm,
        );

        return Ok(AuthDataVerdict {
            client: Some(client),
        });
    }

    fn verify_for_user(
        &self,
        for_user: &ForUser,
        session_key: &SessionKey,
    ) -> CryptoResult<()> {
        if for_user.cksumtype != checksum_types::HMAC_MD5 {
            return Err(CryptoError::Integrity(format!(
                "unsupported PA-FOR-USER checksum type {}",
                for_user.cksumtype
            )));
        }

        let checksum = checksum_hmac_md5(
            session_key.key.as_bytes(),
            KEY_USAGE_KERB_NON_KERB_CKSUM_SALT,
            &for_user_checksum_data(for_user),
        );

        if checksum != for_user.checksum {
            return Err(CryptoError::Integrity(
                "PA-FOR-USER checksum mismatch".to_string(),
            ));
        }

        return Ok(());
    }
}

/// Keyed checksum of PAC data, along with the PAC signature type matching
/// the etype of the key.
fn pac_checksum(key: &KeyEntry, data: &[u8]) -> CryptoResult<(i32, Vec<u8>)> {
    let raw_key = key.key.as_bytes();
    let usage = KEY_USAGE_KERB_NON_KERB_CKSUM_SALT;

    return match key.etype {
        etypes::AES256_CTS_HMAC_SHA1_96 => Ok((
            HMAC_SHA1_96_AES256,
            checksum_sha_aes(raw_key, usage, data, &AesSizes::Aes256),
        )),
        etypes::AES128_CTS_HMAC_SHA1_96 => Ok((
            HMAC_SHA1_96_AES128,
            checksum_sha_aes(raw_key, usage, data, &AesSizes::Aes128),
        )),
        etypes::RC4_HMAC => {
            Ok((KERB_CHECKSUM_HMAC_MD5, checksum_hmac_md5(raw_key, usage, data)))
        }
        etype => Err(CryptoError::UnsupportedEtype(etype)),
    };
}

fn verify_pac_signature(
    key: &KeyEntry,
    data: &[u8],
    signature: &PAC_SIGNATURE_DATA,
    signer: &str,
) -> CryptoResult<()> {
    let (signature_type, checksum) = pac_checksum(key, data)?;

    if signature_type != signature.SignatureType {
        return Err(CryptoError::Integrity(format!(
            "PAC {} signature of type {} checked with key of etype {}",
            signer, signature.SignatureType, key.etype
        )));
    }

    if checksum != signature.Signature {
        return Err(CryptoError::Integrity(format!(
            "PAC {} signature mismatch",
            signer
        )));
    }

    return Ok(());
}

/// Data covered by the PA-FOR-USER checksum: name type (little endian),
/// name components, realm and authentication package.
fn for_user_checksum_data(for_user: &ForUser) -> Vec<u8> {
    let mut data = for_user.user.name_type.to_le_bytes().to_vec();
    for component in for_user.user.components.iter() {
        data.extend_from_slice(component.as_bytes());
    }
    data.extend_from_slice(for_user.user.realm.as_bytes());
    data.extend_from_slice(for_user.auth_package.as_bytes());
    return data;
}
