//! Crate-wide error type.

use std::error::Error;
use std::fmt;

/// The one error type returned by fallible APIs throughout this crate.
/// Wraps a human-readable message and, optionally, the error it was
/// converted from.
#[derive(Debug, Clone)]
pub struct CardClusterError(pub String);

impl CardClusterError {
    /// Builds a new error from a message.
    pub fn msg<S: Into<String>>(s: S) -> Self {
        CardClusterError(s.into())
    }
}

impl fmt::Display for CardClusterError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CardClusterError: {}", self.0)
    }
}

impl Error for CardClusterError {}

impl From<std::io::Error> for CardClusterError {
    fn from(e: std::io::Error) -> Self {
        CardClusterError(format!("io error: {}", e))
    }
}

impl From<serde_json::Error> for CardClusterError {
    fn from(e: serde_json::Error) -> Self {
        CardClusterError(format!("json error: {}", e))
    }
}

impl From<toml::de::Error> for CardClusterError {
    fn from(e: toml::de::Error) -> Self {
        CardClusterError(format!("config error: {}", e))
    }
}

impl From<reqwest::Error> for CardClusterError {
    fn from(e: reqwest::Error) -> Self {
        CardClusterError(format!("http error: {}", e))
    }
}

impl From<jsonwebtoken::errors::Error> for CardClusterError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        CardClusterError(format!("jwt error: {}", e))
    }
}

impl From<rumqttc::ClientError> for CardClusterError {
    fn from(e: rumqttc::ClientError) -> Self {
        CardClusterError(format!("broker error: {}", e))
    }
}

/// Constructs a [`CardClusterError`], logs it at `error` level, and
/// evaluates to `Err(..)` of it -- for call sites that want both a log
/// line and an early return in one expression.
#[macro_export]
macro_rules! logged_err {
    ($($arg:tt)*) => {{
        let e = $crate::CardClusterError::msg(format!($($arg)*));
        log::error!("{}", e);
        Err(e)
    }};
}

pub use logged_err;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_message() {
        let e = CardClusterError::msg("bad stuff");
        assert_eq!(format!("{}", e), "CardClusterError: bad stuff");
    }

    #[test]
    fn logged_err_macro_returns_err() {
        fn inner() -> Result<(), CardClusterError> {
            logged_err!("boom {}", 42)
        }
        let e = inner().unwrap_err();
        assert!(e.0.contains("boom 42"));
    }
}
