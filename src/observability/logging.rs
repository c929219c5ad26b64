//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Map configured level names onto tracing filter directives
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, plain format for development
//! - `RUST_LOG` wins over the configured level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Filter directive for a configured level name. Unknown names fall back to
/// `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.to_ascii_lowercase().as_str() {
        "panic" | "fatal" | "error" => "error",
        "warning" | "warn" => "warn",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(config: &ObservabilityConfig) -> bool {
    let directive = level_directive(&config.log_level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("sense_backend={directive},tower_http={directive},{directive}").into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_directive() {
        assert_eq!(level_directive("panic"), "error");
        assert_eq!(level_directive("fatal"), "error");
        assert_eq!(level_directive("Warning"), "warn");
        assert_eq!(level_directive("debug"), "debug");
        assert_eq!(level_directive("verbose"), "info");
        assert_eq!(level_directive(""), "info");
    }
}
