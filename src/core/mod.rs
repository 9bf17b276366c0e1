//! Request processing of a key distribution center: principals, tickets,
//! the realm database and the AS and TGS pipelines.

pub mod principal;
pub use principal::Principal;

pub mod service_list;
pub use service_list::ServiceList;

pub mod realm_tree;
pub mod host_realm;
pub use host_realm::HostRealmMapper;

pub mod realm;
pub use realm::{RealmConfig, RealmContext};

pub mod crypto;
pub use crypto::{CryptoProvider, KerberosCrypto};

pub mod database;
pub use database::{load_keytab_db, MemoryDb, PrincipalDb, PrincipalRecord};

pub mod ticket;
pub mod kdc_error;
pub use kdc_error::KdcError;

pub mod transited;
pub use transited::TransitedPath;

pub mod request;
pub use request::KdcRequest;

pub mod reply;
pub use reply::{KdcErrorReply, KdcReply};

pub mod forge;
pub mod times;
pub mod assembler;
pub mod referral;
pub mod policy;
pub mod delegation;
pub mod preauth;
pub mod authdata;

pub mod audit;
pub use audit::{AuditSink, AuditSinks};

pub mod pipeline;
pub use pipeline::{Kdc, Outcome};

pub mod stringifier;
