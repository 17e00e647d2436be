use std::str::FromStr;

use thiserror::Error;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://school.db?mode=rwc";

/// One year.
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
/// One week.
pub const MAX_SESSION_CLEANUP_INTERVAL_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Settings read from the process environment after the env files have
/// been loaded. Rocket's own settings come from `ROCKET_*`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub session_ttl_hours: i64,
    pub session_cleanup_interval_secs: u64,
    pub otlp_endpoint: Option<String>,
    pub honeycomb_api_key: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_ttl_hours: 12,
            session_cleanup_interval_secs: 3600,
            otlp_endpoint: None,
            honeycomb_api_key: None,
            bootstrap_admin: None,
        }
    }
}

fn optional(name: &str) -> Option<String> {
    dotenvy::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Parses `name` as a number in `1..=max`, falling back to `default` when
/// unset or blank.
fn parse_positive<T>(name: &'static str, default: T, max: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let Some(raw) = optional(name) else {
        return Ok(default);
    };

    let value = raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        value: raw.clone(),
        reason: e.to_string(),
    })?;

    if value <= T::default() {
        return Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "must be greater than zero".to_string(),
        });
    }

    if value > max {
        return Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: format!("must be at most {}", max),
        });
    }

    Ok(value)
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        // Email and password must be set together; the name is optional.
        let bootstrap_admin = match (
            optional("BOOTSTRAP_ADMIN_EMAIL"),
            optional("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: optional("BOOTSTRAP_ADMIN_NAME")
                    .unwrap_or_else(|| "Administrator".to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Invalid {
                    name: "BOOTSTRAP_ADMIN_PASSWORD",
                    value: String::new(),
                    reason: "required when BOOTSTRAP_ADMIN_EMAIL is set".to_string(),
                });
            }
            _ => None,
        };

        Ok(Self {
            database_url: optional("DATABASE_URL").unwrap_or(defaults.database_url),
            session_ttl_hours: parse_positive(
                "SESSION_TTL_HOURS",
                defaults.session_ttl_hours,
                MAX_SESSION_TTL_HOURS,
            )?,
            session_cleanup_interval_secs: parse_positive(
                "SESSION_CLEANUP_INTERVAL_SECS",
                defaults.session_cleanup_interval_secs,
                MAX_SESSION_CLEANUP_INTERVAL_SECS,
            )?,
            otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
            honeycomb_api_key: optional("HONEYCOMB_API_KEY"),
            bootstrap_admin,
        })
    }
}
