use super::pa_data::{decode_for_user, padata_from_asn1};
use super::principal_name::{from_kerberos_time, principal_from_name};
use super::ticket::{host_addresses_from_asn1, ticket_from_asn1};
use crate::core::request::{KdcOptions, KdcRequest};
use crate::error::Error;
use crate::Result;
use kerberos_asn1::{AsReq, Asn1Object, KdcReqBody, PaData, TgsReq};
use kerberos_constants::pa_data_types;
use log::debug;

/// Decodes an AS-REQ or a TGS-REQ.
pub fn decode_kdc_req(raw: &[u8]) -> Result<KdcRequest> {
    if let Ok((_, as_req)) = AsReq::parse(raw) {
        return kdc_request(as_req.msg_type, as_req.padata, as_req.req_body);
    }

    match TgsReq::parse(raw) {
        Ok((_, tgs_req)) => {
            return kdc_request(
                tgs_req.msg_type,
                tgs_req.padata,
                tgs_req.req_body,
            );
        }
        Err(_) => {
            return Err(Error::DataError(
                "Unable to parse KDC request".to_string(),
            ));
        }
    }
}

fn kdc_request(
    msg_type: i32,
    padata: Option<Vec<PaData>>,
    body: KdcReqBody,
) -> Result<KdcRequest> {
    let mut request = KdcRequest::new(msg_type);

    request.options = KdcOptions::from(body.kdc_options.flags);
    request.client = body
        .cname
        .as_ref()
        .map(|cname| principal_from_name(cname, &body.realm));
    request.server = body
        .sname
        .as_ref()
        .map(|sname| principal_from_name(sname, &body.realm));
    request.from = body.from.as_ref().map(from_kerberos_time);

    // a zero till asks for the longest lifetime allowed
    if body.till.timestamp() != 0 {
        request.till = Some(from_kerberos_time(&body.till));
    }

    request.rtime = body
        .rtime
        .as_ref()
        .filter(|rtime| rtime.timestamp() != 0)
        .map(from_kerberos_time);
    request.nonce = body.nonce;
    request.etypes = body.etypes.clone();
    request.addresses = host_addresses_from_asn1(&body.addresses);

    if let Some(tickets) = &body.additional_tickets {
        request.additional_tickets =
            tickets.iter().map(ticket_from_asn1).collect();
    }

    for padata in padata.unwrap_or_default() {
        if padata.padata_type == pa_data_types::PA_FOR_USER {
            let for_user = decode_for_user(&padata.padata_value)
                .map_err(|err| Error::DataError(err))?;
            debug!("S4U2Self request for {}", for_user.user);
            request.for_user = Some(for_user);
        }
        request.padata.push(padata_from_asn1(&padata));
    }

    return Ok(request);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use kerberos_asn1::{KdcReq, PrincipalName};
    use kerberos_constants::{kdc_options, message_types, principal_names};

    fn as_req() -> AsReq {
        let mut req = KdcReq::default();
        req.req_body.kdc_options =
            (kdc_options::FORWARDABLE | kdc_options::CANONICALIZE).into();
        req.req_body.cname = Some(PrincipalName {
            name_type: principal_names::NT_PRINCIPAL,
            name_string: vec!["alice".to_string()],
        });
        req.req_body.realm = "EXAMPLE.COM".to_string();
        req.req_body.sname = Some(PrincipalName {
            name_type: principal_names::NT_SRV_INST,
            name_string: vec!["krbtgt".to_string(), "EXAMPLE.COM".to_string()],
        });
        req.req_body.till = (Utc::now() + Duration::hours(10)).into();
        req.req_body.nonce = 12345;
        req.req_body.etypes = vec![18, 17];
        return req.into();
    }

    #[test]
    fn test_decode_as_req() {
        let request = decode_kdc_req(&as_req().build()).unwrap();
        assert_eq!(message_types::KRB_AS_REQ, request.msg_type);
        assert!(request.options.has(kdc_options::CANONICALIZE));
        assert_eq!("alice@EXAMPLE.COM", request.client.unwrap().to_string());
        assert!(request.server.unwrap().is_local_tgs("EXAMPLE.COM"));
        assert_eq!(12345, request.nonce);
        assert_eq!(vec![18, 17], request.etypes);
        assert!(request.till.is_some());
        assert!(request.for_user.is_none());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(decode_kdc_req(&[0x6a, 0x01, 0x00]).is_err());
    }
}
