use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let database_url = require("DATABASE_URL")?;

    let env = parse_environment(&or_default("SHOPMIRROR_ENV", "development"));

    let bind_addr = or_default("SHOPMIRROR_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("SHOPMIRROR_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("SHOPMIRROR_LOG_LEVEL", "info");

    let source_timezone = or_default("SHOPMIRROR_SOURCE_TIMEZONE", crate::DEFAULT_SOURCE_TIMEZONE)
        .parse::<chrono_tz::Tz>()
        .map_err(|e| invalid("SHOPMIRROR_SOURCE_TIMEZONE", e.to_string()))?;

    let audit_dir = lookup("SHOPMIRROR_AUDIT_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from);

    let sync_concurrency = or_default("SHOPMIRROR_SYNC_CONCURRENCY", "4")
        .parse::<usize>()
        .map_err(|e| invalid("SHOPMIRROR_SYNC_CONCURRENCY", e.to_string()))?
        .max(1);

    let db_max_connections = parse_u32("SHOPMIRROR_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("SHOPMIRROR_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("SHOPMIRROR_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let api_keys = or_default("SHOPMIRROR_API_KEYS", "")
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_owned)
        .collect();

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        source_timezone,
        audit_dir,
        sync_concurrency,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        api_keys,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
