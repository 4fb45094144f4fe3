//! Logger initialization.

use std::sync::OnceLock;

/// This node's identity string, set once at startup and used to prefix
/// log lines so that multi-node integration tests can tell servers apart
/// in a shared log stream.
static ME: OnceLock<String> = OnceLock::new();

/// Initializes the global logger from `RUST_LOG` (default `info`) and
/// records `me` as this process's identity for log prefixing. Idempotent:
/// later calls are no-ops other than updating the identity.
pub fn logger_init(me: &str) {
    let _ = ME.set(me.to_string());
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .try_init();
}

/// Returns this node's identity string, or `"?"` if [`logger_init`] has
/// not run yet.
pub fn me() -> &'static str {
    ME.get().map(|s| s.as_str()).unwrap_or("?")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn me_defaults_before_init() {
        // do not call logger_init here: other tests in the binary may
        // have already set it, and ME is process-global.
        let _ = me();
    }
}
