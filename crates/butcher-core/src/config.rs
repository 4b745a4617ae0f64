use crate::app_config::{AppConfig, Environment, SmtpConfig, TwilioConfig};
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
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(var.to_string()))
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var).ok().filter(|v| !v.trim().is_empty())
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let parse_num = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let narrow = |var: &str, value: u64| -> ConfigError {
        ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: format!("{value} is out of range"),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let jwt_secret = require("BUTCHER_JWT_SECRET")?;

    let env = parse_environment(&or_default("BUTCHER_ENV", "development"));

    let raw_bind = or_default("BUTCHER_BIND_ADDR", "0.0.0.0:5001");
    let bind_addr = raw_bind
        .parse::<SocketAddr>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: "BUTCHER_BIND_ADDR".to_string(),
            reason: e.to_string(),
        })?;

    let log_level = or_default("BUTCHER_LOG_LEVEL", "info");

    let jwt_ttl_raw = parse_num("BUTCHER_JWT_TTL_HOURS", "168")?;
    let jwt_ttl_hours =
        i64::try_from(jwt_ttl_raw).map_err(|_| narrow("BUTCHER_JWT_TTL_HOURS", jwt_ttl_raw))?;
    if jwt_ttl_hours == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "BUTCHER_JWT_TTL_HOURS".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    let upload_dir = PathBuf::from(or_default("BUTCHER_UPLOAD_DIR", "./uploads"));
    let max_upload_raw = parse_num("BUTCHER_MAX_UPLOAD_BYTES", "5242880")?;
    let max_upload_bytes = usize::try_from(max_upload_raw)
        .map_err(|_| narrow("BUTCHER_MAX_UPLOAD_BYTES", max_upload_raw))?;
    let public_base_url = or_default("BUTCHER_PUBLIC_BASE_URL", "http://localhost:5001")
        .trim_end_matches('/')
        .to_string();
    let cors_origin = optional("BUTCHER_CORS_ORIGIN");

    let max_conn = parse_num("BUTCHER_DB_MAX_CONNECTIONS", "10")?;
    let db_max_connections =
        u32::try_from(max_conn).map_err(|_| narrow("BUTCHER_DB_MAX_CONNECTIONS", max_conn))?;
    let min_conn = parse_num("BUTCHER_DB_MIN_CONNECTIONS", "1")?;
    let db_min_connections =
        u32::try_from(min_conn).map_err(|_| narrow("BUTCHER_DB_MIN_CONNECTIONS", min_conn))?;
    let db_acquire_timeout_secs = parse_num("BUTCHER_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let smtp = match (optional("SMTP_HOST"), optional("SMTP_PASSWORD")) {
        (Some(host), Some(password)) => {
            let port_raw = parse_num("SMTP_PORT", "465")?;
            let port = u16::try_from(port_raw).map_err(|_| narrow("SMTP_PORT", port_raw))?;
            let username = optional("SMTP_USERNAME").unwrap_or_default();
            let from = optional("SMTP_FROM")
                .unwrap_or_else(|| format!("Butcher Shop <{username}>"));
            Some(SmtpConfig {
                host,
                port,
                username,
                password,
                from,
            })
        }
        _ => None,
    };

    let twilio = match (
        optional("TWILIO_ACCOUNT_SID"),
        optional("TWILIO_AUTH_TOKEN"),
        optional("TWILIO_WHATSAPP_FROM"),
    ) {
        (Some(account_sid), Some(auth_token), Some(whatsapp_from)) => Some(TwilioConfig {
            account_sid,
            auth_token,
            whatsapp_from,
        }),
        _ => None,
    };

    let notify_timeout_secs = parse_num("BUTCHER_NOTIFY_TIMEOUT_SECS", "30")?;
    let retries_raw = parse_num("BUTCHER_NOTIFY_MAX_RETRIES", "2")?;
    let notify_max_retries = u32::try_from(retries_raw)
        .map_err(|_| narrow("BUTCHER_NOTIFY_MAX_RETRIES", retries_raw))?;

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        jwt_secret,
        jwt_ttl_hours,
        upload_dir,
        max_upload_bytes,
        public_base_url,
        cors_origin,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        smtp,
        twilio,
        notify_timeout_secs,
        notify_max_retries,
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
