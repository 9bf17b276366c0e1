use super::principal_name::{
    from_kerberos_time, principal_from_name, principal_name, to_kerberos_time,
};
use crate::core::crypto::{KeyBytes, SessionKey};
use crate::core::ticket::{
    AuthDataEntry, EncryptedPart, HostAddress, Ticket, TicketBody,
    TicketTimes,
};
use crate::core::transited::TransitedPath;
use kerberos_asn1;
use kerberos_asn1::{
    Asn1Object, AuthorizationDataEntry, EncTicketPart, EncryptedData,
    EncryptionKey, TransitedEncoding,
};

pub fn encrypted_part_from_asn1(data: &EncryptedData) -> EncryptedPart {
    return EncryptedPart::new(data.etype, data.kvno, data.cipher.clone());
}

pub fn encrypted_part_to_asn1(part: &EncryptedPart) -> EncryptedData {
    return EncryptedData::new(part.etype, part.kvno, part.cipher.clone());
}

pub fn ticket_from_asn1(ticket: &kerberos_asn1::Ticket) -> Ticket {
    return Ticket {
        server: principal_from_name(&ticket.sname, &ticket.realm),
        enc_part: encrypted_part_from_asn1(&ticket.enc_part),
    };
}

pub fn ticket_to_asn1(ticket: &Ticket) -> kerberos_asn1::Ticket {
    return kerberos_asn1::Ticket {
        tkt_vno: 5,
        realm: ticket.server.realm.clone(),
        sname: principal_name(&ticket.server),
        enc_part: encrypted_part_to_asn1(&ticket.enc_part),
    };
}

pub fn host_addresses_from_asn1(
    addresses: &Option<Vec<kerberos_asn1::HostAddress>>,
) -> Option<Vec<HostAddress>> {
    return addresses.as_ref().map(|addresses| {
        addresses
            .iter()
            .map(|a| HostAddress {
                addr_type: a.addr_type,
                address: a.address.clone(),
            })
            .collect()
    });
}

pub fn host_addresses_to_asn1(
    addresses: &Option<Vec<HostAddress>>,
) -> Option<Vec<kerberos_asn1::HostAddress>> {
    return addresses.as_ref().map(|addresses| {
        addresses
            .iter()
            .map(|a| kerberos_asn1::HostAddress {
                addr_type: a.addr_type,
                address: a.address.clone(),
            })
            .collect()
    });
}

pub fn encryption_key(session_key: &SessionKey) -> EncryptionKey {
    return EncryptionKey {
        keytype: session_key.etype,
        keyvalue: session_key.key.as_bytes().to_vec(),
    };
}

pub fn encode_ticket_body(body: &TicketBody) -> Vec<u8> {
    let authorization_data = if body.authorization_data.is_empty() {
        None
    } else {
        Some(
            body.authorization_data
                .iter()
                .map(|ad| AuthorizationDataEntry {
                    ad_type: ad.ad_type,
                    ad_data: ad.data.clone(),
                })
                .collect(),
        )
    };

    let enc_ticket_part = EncTicketPart {
        flags: body.flags.into(),
        key: encryption_key(&body.session_key),
        crealm: body.client.realm.clone(),
        cname: principal_name(&body.client),
        transited: TransitedEncoding {
            tr_type: body.transited.tr_type,
            contents: body.transited.contents.clone(),
        },
        authtime: to_kerberos_time(&body.times.authtime),
        starttime: body.times.starttime.as_ref().map(to_kerberos_time),
        endtime: to_kerberos_time(&body.times.endtime),
        renew_till: body.times.renew_till.as_ref().map(to_kerberos_time),
        caddr: host_addresses_to_asn1(&body.addresses),
        authorization_data,
    };

    return enc_ticket_part.build();
}

pub fn decode_ticket_body(raw: &[u8]) -> Result<TicketBody, String> {
    let (_, enc_ticket_part) = EncTicketPart::parse(raw)
        .map_err(|_| format!("Error parsing EncTicketPart"))?;

    let authorization_data = enc_ticket_part
        .authorization_data
        .unwrap_or_default()
        .into_iter()
        .map(|ad| AuthDataEntry {
            ad_type: ad.ad_type,
            data: ad.ad_data,
        })
        .collect();

    return Ok(TicketBody {
        flags: enc_ticket_part.flags.flags,
        session_key: SessionKey::new(
            enc_ticket_part.key.keytype,
            KeyBytes::new(enc_ticket_part.key.keyvalue),
        ),
        client: principal_from_name(
            &enc_ticket_part.cname,
            &enc_ticket_part.crealm,
        ),
        transited: TransitedPath::new(
            enc_ticket_part.transited.tr_type,
            enc_ticket_part.transited.contents,
        ),
        times: TicketTimes {
            authtime: from_kerberos_time(&enc_ticket_part.authtime),
            starttime: enc_ticket_part
                .starttime
                .as_ref()
                .map(from_kerberos_time),
            endtime: from_kerberos_time(&enc_ticket_part.endtime),
            renew_till: enc_ticket_part
                .renew_till
                .as_ref()
                .map(from_kerberos_time),
        },
        addresses: host_addresses_from_asn1(&enc_ticket_part.caddr),
        authorization_data,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::principal::Principal;
    use chrono::{Duration, TimeZone, Utc};
    use kerberos_constants::{etypes, ticket_flags};

    #[test]
    fn test_ticket_body_encoding() {
        let authtime = Utc.timestamp(1_600_000_000, 0);
        let body = TicketBody {
            flags: ticket_flags::FORWARDABLE | ticket_flags::RENEWABLE,
            session_key: SessionKey::new(etypes::AES256_CTS_HMAC_SHA1_96, KeyBytes::new(vec![7; 32])),
            client: Principal::user("alice", "EXAMPLE.COM"),
            transited: TransitedPath::new(1, b"OTHER.COM".to_vec()),
            times: TicketTimes {
                authtime,
                starttime: None,
                endtime: authtime + Duration::hours(10),
                renew_till: Some(authtime + Duration::days(7)),
            },
            addresses: None,
            authorization_data: vec![AuthDataEntry { ad_type: 1, data: vec![0x30, 0x00] }],
        };

        let decoded = decode_ticket_body(&encode_ticket_body(&body)).unwrap();
        assert_eq!(body, decoded);
        assert!(decode_ticket_body(&[0x01, 0x02]).is_err());
    }
}
