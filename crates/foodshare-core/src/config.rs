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
/// Parsing is decoupled from the process environment so tests can feed a
/// plain `HashMap` instead of mutating global state.
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

    let parse_as = |var: &str, default: &str| -> Result<String, ConfigError> {
        let raw = or_default(var, default);
        if raw.trim().is_empty() {
            return Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: "value is empty".to_string(),
            });
        }
        Ok(raw)
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let database_url = require("DATABASE_URL")?;
    let token_hash_salt = require("FOODSHARE_TOKEN_HASH_SALT")?;
    if token_hash_salt.trim().is_empty() {
        return Err(invalid(
            "FOODSHARE_TOKEN_HASH_SALT",
            "value is empty".to_string(),
        ));
    }

    let env = parse_environment(&or_default("FOODSHARE_ENV", "development"))?;

    let bind_addr = parse_as("FOODSHARE_BIND_ADDR", "0.0.0.0:8000")?
        .parse::<SocketAddr>()
        .map_err(|e| invalid("FOODSHARE_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("FOODSHARE_LOG_LEVEL", "info");
    let categories_path = PathBuf::from(or_default(
        "FOODSHARE_CATEGORIES_PATH",
        "./config/food_categories.yaml",
    ));

    let db_max_connections = parse_as("FOODSHARE_DB_MAX_CONNECTIONS", "10")?
        .parse::<u32>()
        .map_err(|e| invalid("FOODSHARE_DB_MAX_CONNECTIONS", e.to_string()))?;
    let db_min_connections = parse_as("FOODSHARE_DB_MIN_CONNECTIONS", "1")?
        .parse::<u32>()
        .map_err(|e| invalid("FOODSHARE_DB_MIN_CONNECTIONS", e.to_string()))?;
    let db_acquire_timeout_secs = parse_as("FOODSHARE_DB_ACQUIRE_TIMEOUT_SECS", "10")?
        .parse::<u64>()
        .map_err(|e| invalid("FOODSHARE_DB_ACQUIRE_TIMEOUT_SECS", e.to_string()))?;

    let rate_limit_max_requests = parse_as("FOODSHARE_RATE_LIMIT_MAX_REQUESTS", "120")?
        .parse::<usize>()
        .map_err(|e| invalid("FOODSHARE_RATE_LIMIT_MAX_REQUESTS", e.to_string()))?;
    let rate_limit_window_secs = parse_as("FOODSHARE_RATE_LIMIT_WINDOW_SECS", "60")?
        .parse::<u64>()
        .map_err(|e| invalid("FOODSHARE_RATE_LIMIT_WINDOW_SECS", e.to_string()))?;

    let nearby_default_radius_km = parse_as("FOODSHARE_NEARBY_DEFAULT_RADIUS_KM", "10")?
        .parse::<f64>()
        .map_err(|e| invalid("FOODSHARE_NEARBY_DEFAULT_RADIUS_KM", e.to_string()))?;
    if !nearby_default_radius_km.is_finite() || nearby_default_radius_km < 0.0 {
        return Err(invalid(
            "FOODSHARE_NEARBY_DEFAULT_RADIUS_KM",
            format!("must be a finite, non-negative number, got {nearby_default_radius_km}"),
        ));
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        categories_path,
        token_hash_salt,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        rate_limit_max_requests,
        rate_limit_window_secs,
        nearby_default_radius_km,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "FOODSHARE_ENV".to_string(),
            reason: format!("expected development, test, or production, got '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
