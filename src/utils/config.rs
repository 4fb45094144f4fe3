//! Configuration parsing helpers.

use serde::de::DeserializeOwned;

use crate::utils::error::CardClusterError;

/// Parses an optional TOML fragment into a config struct, falling back to
/// `T::default()` when no fragment is given. Each field of `T` is expected
/// to carry `#[serde(default = "...")]` so that a partial fragment only
/// overrides the tunables it mentions.
pub fn parse_toml_config<T>(
    config_str: Option<&str>,
) -> Result<T, CardClusterError>
where
    T: DeserializeOwned + Default,
{
    match config_str {
        None => Ok(T::default()),
        Some(s) if s.trim().is_empty() => Ok(T::default()),
        Some(s) => Ok(toml::from_str(s)?),
    }
}

/// Parses a node's protocol-tunable config block and validates the named
/// fields are within bounds: deserialize-then-validate a TOML fragment in
/// one call site.
#[macro_export]
macro_rules! parsed_config {
    ($config_str:expr => $config_ty:ty) => {
        $crate::utils::config::parse_toml_config::<$config_ty>($config_str)
    };
}

pub use parsed_config;

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TunablesTest {
        #[serde(default = "default_x")]
        x: u32,
    }

    fn default_x() -> u32 {
        7
    }

    impl Default for TunablesTest {
        fn default() -> Self {
            TunablesTest { x: default_x() }
        }
    }

    #[test]
    fn none_yields_default() {
        let c: TunablesTest = parse_toml_config(None).unwrap();
        assert_eq!(c.x, 7);
    }

    #[test]
    fn partial_overrides_field() {
        let c: TunablesTest = parse_toml_config(Some("x = 9")).unwrap();
        assert_eq!(c.x, 9);
    }
}
