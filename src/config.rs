use std::{env, fmt::Display, str::FromStr};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Runtime settings collected from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub identity_service_url: String,
    pub identity_api_key: Option<String>,
    pub rating_cooldown_hours: i64,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(&lookup, "PORT", 8082)?,
            database_url: required(&lookup, "DATABASE_URL")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            jwt_ttl_hours: parse_or(&lookup, "JWT_TTL_HOURS", 12)?,
            identity_service_url: lookup("IDENTITY_SERVICE_URL")
                .unwrap_or_else(|| "https://identitytoolkit.googleapis.com".to_string()),
            identity_api_key: lookup("IDENTITY_API_KEY").filter(|key| !key.trim().is_empty()),
            rating_cooldown_hours: parse_or(&lookup, "RATING_COOLDOWN_HOURS", 24)?,
        };

        if settings.database_max_connections < 1 {
            return Err(ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                reason: "must be at least 1".into(),
            });
        }
        if settings.jwt_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "JWT_TTL_HOURS",
                reason: "must be positive".into(),
            });
        }
        if settings.rating_cooldown_hours < 0 {
            return Err(ConfigError::Invalid {
                key: "RATING_COOLDOWN_HOURS",
                reason: "must not be negative".into(),
            });
        }

        Ok(settings)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => {
            log::info!("{key} not set, using default: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_values() {
        let settings = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/reviews"),
            ("JWT_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(settings.bind_address(), "127.0.0.1:8082");
        assert_eq!(settings.database_max_connections, 10);
        assert_eq!(settings.jwt_ttl_hours, 12);
        assert_eq!(settings.rating_cooldown_hours, 24);
        assert!(settings.identity_api_key.is_none());
    }

    #[test]
    fn missing_database_url_is_reported() {
        let err = Settings::from_lookup(lookup_from(&[("JWT_SECRET", "s3cret")])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn malformed_port_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/reviews"),
            ("JWT_SECRET", "s3cret"),
            ("PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn zero_pool_size_is_rejected() {
        let err = Settings::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/reviews"),
            ("JWT_SECRET", "s3cret"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                key: "DATABASE_MAX_CONNECTIONS",
                ..
            }
        ));
    }
}
