//! Request processing core of a Kerberos key distribution center.

pub mod config;
pub mod core;
pub mod error;

pub use error::{Error, Result};
