//! This module converts between the wire structures and the KDC types

mod principal_name;
pub use principal_name::{
    from_kerberos_time, principal_from_name, principal_name, to_kerberos_time,
};

mod ticket;
pub use ticket::{
    decode_ticket_body, encode_ticket_body, ticket_from_asn1, ticket_to_asn1,
};

mod pa_data;
pub use pa_data::{
    decode_encrypted_timestamp, decode_for_user, decode_timestamp,
    encode_etype_info2, encode_method_data,
};

mod kdc_req;
pub use kdc_req::decode_kdc_req;

mod kdc_rep;
pub use kdc_rep::{build_kdc_rep, build_krb_error, encode_enc_reply_part};

mod ap_req;
pub use ap_req::decrypt_header_ticket;

mod pac;
pub use pac::{find_pac, parse_pac, SignedPac};
