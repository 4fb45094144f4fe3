//! Helper utilities, functions, and macros.

#[macro_use]
pub(crate) mod print;

#[macro_use]
pub(crate) mod config;

pub(crate) mod error;
pub(crate) mod signing;

pub use error::{logged_err, CardClusterError};
pub use print::logger_init;

pub(crate) use config::parse_toml_config;
pub(crate) use signing::{
    issue_jwt, sign_event, validate_jwt, verify_event, ServerClaims,
};
