//! tracing subscriber setup. `RUST_LOG` wins over the configured level.

use tracing_subscriber::{filter::Directive, EnvFilter};

use crate::{Result, SignalError};

const QUIET_DEPENDENCIES: [&str; 3] = ["hyper=warn", "reqwest=warn", "rustls=warn"];

/// Filter from `RUST_LOG` when set, else `level` with chatty HTTP crates
/// held at `warn`
pub fn build_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return EnvFilter::try_new(directives)
            .map_err(|e| SignalError::InvalidConfig(format!("RUST_LOG: {e}")));
    }

    let level = normalize_level(level)
        .ok_or_else(|| SignalError::InvalidConfig(format!("unknown log level {level:?}")))?;
    let mut filter = EnvFilter::new(level);
    for directive in QUIET_DEPENDENCIES {
        let directive: Directive = directive
            .parse()
            .map_err(|e| SignalError::InvalidConfig(format!("{directive}: {e}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn normalize_level(level: &str) -> Option<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Some("trace"),
        "debug" => Some("debug"),
        "info" => Some("info"),
        "warn" | "warning" => Some("warn"),
        "error" => Some("error"),
        "off" => Some("off"),
        _ => None,
    }
}

/// Install the global subscriber. Fails if one is already set.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = build_filter(level, rust_log.as_deref())?;

    let installed = if json {
        tracing_subscriber::fmt()
            .json()
            .with_target(true)
            .with_env_filter(filter)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_target(true)
            .with_env_filter(filter)
            .try_init()
    };
    installed.map_err(|e| SignalError::InvalidConfig(format!("logging: {e}")))
}
