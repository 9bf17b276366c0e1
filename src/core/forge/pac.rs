//! Privilege attribute certificates (PAC) of [MS-PAC], found in the
//! authorization data of tickets issued by Active Directory compatible KDCs.

use crate::core::ticket::AuthDataEntry;
use kerberos_asn1::{AdIfRelevant, Asn1Object};
use kerberos_constants::ad_types;
use ms_dtyp::FILETIME;
use ms_pac::{
    HMAC_SHA1_96_AES128, HMAC_SHA1_96_AES256, HMAC_SHA1_96_AES_SIGN_SIZE,
    KERB_CHECKSUM_HMAC_MD5, KERB_CHECKSUM_HMAC_MD5_SIGN_SIZE, PACTYPE,
    PAC_CLIENT_INFO, PAC_CLIENT_INFO_TYPE, PAC_INFO_BUFFER,
    PAC_PRIVSVR_CHECKSUM, PAC_SERVER_CHECKSUM, PAC_SIGNATURE_DATA,
    PAC_UPN_DNS_INFO, UPN_DNS_INFO,
};
use std::ops::Range;

const PACTYPE_HEADER_SIZE: usize = 8;
const PAC_INFO_BUFFER_SIZE: usize = 16;
const UPN_DNS_INFO_SIZE: usize = 12;

/// A PAC as carried in a ticket. The raw bytes are kept since the
/// signatures are computed over them.
#[derive(Clone, Debug, PartialEq)]
pub struct SignedPac {
    pub pactype: PACTYPE,
    raw: Vec<u8>,
    regions: Vec<Range<usize>>,
}

impl SignedPac {
    pub fn server_signature(&self) -> Option<&PAC_SIGNATURE_DATA> {
        return self.pactype.Buffers.iter().find_map(|buffer| match buffer {
            PAC_INFO_BUFFER::SERVER_CHECKSUM(sign) => Some(sign),
            _ => None,
        });
    }

    pub fn kdc_signature(&self) -> Option<&PAC_SIGNATURE_DATA> {
        return self.pactype.Buffers.iter().find_map(|buffer| match buffer {
            PAC_INFO_BUFFER::PRIVSRV_CHECKSUM(sign) => Some(sign),
            _ => None,
        });
    }

    pub fn client_info(&self) -> Option<&PAC_CLIENT_INFO> {
        return self.pactype.Buffers.iter().find_map(|buffer| match buffer {
            PAC_INFO_BUFFER::CLIENT_INFO(info) => Some(info),
            _ => None,
        });
    }

    /// Name of the client in the client info buffer.
    pub fn client_name(&self) -> Option<String> {
        let info = self.client_info()?;
        return String::from_utf16(&info.Name).ok();
    }

    /// DNS name of the domain of the client, taken from the UPN buffer.
    pub fn dns_domain_name(&self) -> Option<String> {
        for (buffer, region) in
            self.pactype.Buffers.iter().zip(self.regions.iter())
        {
            if let PAC_INFO_BUFFER::UPN_DNS_INFO(info) = buffer {
                let data = &self.raw[region.clone()];
                return read_utf16(
                    data,
                    info.DnsDomainNameOffset as usize,
                    info.DnsDomainNameLength as usize,
                )
                .ok();
            }
        }
        return None;
    }

    /// The PAC with the signature values zeroed, which is what the server
    /// signature covers.
    pub fn unsigned_data(&self) -> Vec<u8> {
        let mut data = self.raw.clone();
        for (buffer, region) in
            self.pactype.Buffers.iter().zip(self.regions.iter())
        {
            let sign = match buffer {
                PAC_INFO_BUFFER::SERVER_CHECKSUM(sign) => sign,
                PAC_INFO_BUFFER::PRIVSRV_CHECKSUM(sign) => sign,
                _ => continue,
            };
            let start = region.start + 4;
            for byte in data[start..start + sign.Signature.len()].iter_mut() {
                *byte = 0;
            }
        }
        return data;
    }
}

/// Looks for the PAC in the authorization data of a ticket, either at the
/// top level or wrapped in AD-IF-RELEVANT. More than one PAC is an error.
pub fn find_pac(
    authorization_data: &[AuthDataEntry],
) -> Result<Option<SignedPac>, String> {
    let mut raw_pacs = Vec::new();

    for entry in authorization_data.iter() {
        match entry.ad_type {
            ad_types::AD_WIN2K_PACK => raw_pacs.push(entry.data.clone()),
            ad_types::AD_IF_RELEVANT => {
                let (_, relevant) = AdIfRelevant::parse(&entry.data)
                    .map_err(|_| "invalid AD-IF-RELEVANT".to_string())?;
                for inner in relevant.into_iter() {
                    if inner.ad_type == ad_types::AD_WIN2K_PACK {
                        raw_pacs.push(inner.ad_data);
                    }
                }
            }
            _ => {}
        }
    }

    if raw_pacs.len() > 1 {
        return Err(format!("{} PACs in authorization data", raw_pacs.len()));
    }

    return match raw_pacs.pop() {
        Some(raw) => Ok(Some(parse_pac(&raw)?)),
        None => Ok(None),
    };
}

/// Decodes a PACTYPE structure. Buffers the KDC does not inspect are kept
/// as raw bytes.
pub fn parse_pac(raw: &[u8]) -> Result<SignedPac, String> {
    let count = read_u32(raw, 0)? as usize;
    let version = read_u32(raw, 4)?;

    if version != 0 {
        return Err(format!("unknown PAC version {}", version));
    }

    let table_end = count
        .checked_mul(PAC_INFO_BUFFER_SIZE)
        .and_then(|size| size.checked_add(PACTYPE_HEADER_SIZE))
        .filter(|end| *end <= raw.len())
        .ok_or_else(|| format!("PAC too short for {} buffers", count))?;

    let mut buffers = Vec::with_capacity(count);
    let mut regions = Vec::with_capacity(count);
    let mut seen_types = Vec::with_capacity(count);

    let mut pos = PACTYPE_HEADER_SIZE;
    while pos < table_end {
        let ul_type = read_u32(raw, pos)?;
        let size = read_u32(raw, pos + 4)? as usize;
        let offset = read_u64(raw, pos + 8)? as usize;
        pos += PAC_INFO_BUFFER_SIZE;

        let end = offset
            .checked_add(size)
            .filter(|end| offset >= table_end && *end <= raw.len())
            .ok_or_else(|| {
                format!("PAC buffer of type {} out of bounds", ul_type)
            })?;

        if seen_types.contains(&ul_type) && is_unique_buffer(ul_type) {
            return Err(format!("duplicated PAC buffer of type {}", ul_type));
        }
        seen_types.push(ul_type);

        buffers.push(parse_info_buffer(ul_type, &raw[offset..end])?);
        regions.push(offset..end);
    }

    return Ok(SignedPac {
        pactype: PACTYPE {
            Version: version,
            Buffers: buffers,
        },
        raw: raw.to_vec(),
        regions,
    });
}

fn is_unique_buffer(ul_type: u32) -> bool {
    return match ul_type {
        PAC_SERVER_CHECKSUM
        | PAC_PRIVSVR_CHECKSUM
        | PAC_CLIENT_INFO_TYPE
        | PAC_UPN_DNS_INFO => true,
        _ => false,
    };
}

fn parse_info_buffer(
    ul_type: u32,
    data: &[u8],
) -> Result<PAC_INFO_BUFFER, String> {
    let buffer = match ul_type {
        PAC_SERVER_CHECKSUM => {
            PAC_INFO_BUFFER::SERVER_CHECKSUM(parse_signature(data)?)
        }
        PAC_PRIVSVR_CHECKSUM => {
            PAC_INFO_BUFFER::PRIVSRV_CHECKSUM(parse_signature(data)?)
        }
        PAC_CLIENT_INFO_TYPE => {
            PAC_INFO_BUFFER::CLIENT_INFO(parse_client_info(data)?)
        }
        PAC_UPN_DNS_INFO => PAC_INFO_BUFFER::UPN_DNS_INFO(parse_upn_dns(data)?),
        _ => PAC_INFO_BUFFER::Raw(ul_type, data.to_vec()),
    };
    return Ok(buffer);
}

fn parse_signature(data: &[u8]) -> Result<PAC_SIGNATURE_DATA, String> {
    let signature_type = read_u32(data, 0)? as i32;
    let size = match signature_type {
        KERB_CHECKSUM_HMAC_MD5 => KERB_CHECKSUM_HMAC_MD5_SIGN_SIZE,
        HMAC_SHA1_96_AES128 | HMAC_SHA1_96_AES256 => {
            HMAC_SHA1_96_AES_SIGN_SIZE
        }
        _ => {
            return Err(format!(
                "unknown PAC signature type {}",
                signature_type
            ))
        }
    };

    let signature = data
        .get(4..4 + size)
        .ok_or_else(|| "PAC signature too short".to_string())?
        .to_vec();

    return Ok(PAC_SIGNATURE_DATA {
        SignatureType: signature_type,
        Signature: signature,
        RODCIdentifier: read_u16(data, 4 + size).ok(),
    });
}

fn parse_client_info(data: &[u8]) -> Result<PAC_CLIENT_INFO, String> {
    let client_id = FILETIME::from(read_u64(data, 0)?);
    let name_length = read_u16(data, 8)? as usize;
    let name = read_utf16_units(data, 10, name_length)?;

    return Ok(PAC_CLIENT_INFO {
        ClientId: client_id,
        Name: name,
    });
}

fn parse_upn_dns(data: &[u8]) -> Result<UPN_DNS_INFO, String> {
    if data.len() < UPN_DNS_INFO_SIZE {
        return Err("PAC UPN buffer too short".to_string());
    }

    let info = UPN_DNS_INFO {
        UpnLength: read_u16(data, 0)?,
        UpnOffset: read_u16(data, 2)?,
        DnsDomainNameLength: read_u16(data, 4)?,
        DnsDomainNameOffset: read_u16(data, 6)?,
        Flags: read_u32(data, 8)?,
    };

    read_utf16(data, info.UpnOffset as usize, info.UpnLength as usize)?;
    read_utf16(
        data,
        info.DnsDomainNameOffset as usize,
        info.DnsDomainNameLength as usize,
    )?;

    return Ok(info);
}

fn read_bytes(data: &[u8], pos: usize, len: usize) -> Result<&[u8], String> {
    return pos
        .checked_add(len)
        .and_then(|end| data.get(pos..end))
        .ok_or_else(|| format!("PAC data truncated at {}", pos));
}

fn read_u16(data: &[u8], pos: usize) -> Result<u16, String> {
    let bytes = read_bytes(data, pos, 2)?;
    return Ok(u16::from_le_bytes([bytes[0], bytes[1]]));
}

fn read_u32(data: &[u8], pos: usize) -> Result<u32, String> {
    let bytes = read_bytes(data, pos, 4)?;
    return Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]));
}

fn read_u64(data: &[u8], pos: usize) -> Result<u64, String> {
    let low = read_u32(data, pos)? as u64;
    let high = read_u32(data, pos + 4)? as u64;
    return Ok(low | (high << 32));
}

/// UTF-16LE code units of a string of `len` bytes.
fn read_utf16_units(
    data: &[u8],
    pos: usize,
    len: usize,
) -> Result<Vec<u16>, String> {
    if len % 2 != 0 {
        return Err(format!("odd length {} of PAC string", len));
    }
    let bytes = read_bytes(data, pos, len)?;
    return Ok(bytes
        .chunks(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect());
}

fn read_utf16(data: &[u8], pos: usize, len: usize) -> Result<String, String> {
    let units = read_utf16_units(data, pos, len)?;
    return String::from_utf16(&units)
        .map_err(|_| "invalid UTF-16 in PAC string".to_string());
}
