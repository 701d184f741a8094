//! Environment configuration
//!
//! Everything is read once at startup. `Config::from_lookup` takes the variable
//! source as a closure so parsing can be exercised without touching the process env.

use std::path::PathBuf;

use axum_extra::extract::cookie::{Key, SameSite};
use thiserror::Error;

/// Minimum length of `SECRET_KEY_BASE`, dictated by the cookie signing key.
pub const MIN_SECRET_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("SECRET_KEY_BASE must be at least {MIN_SECRET_LEN} bytes (got {0})")]
    SecretTooShort(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_lowercase).as_deref() {
            Some("prod") | Some("production") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// SMTP relay settings.
///
/// Parsed and reported at startup; nothing in the API sends mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailConfig {
    pub address: String,
    pub port: u16,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub domain: Option<String>,
    pub authentication: &'static str,
    pub enable_starttls_auto: bool,
    /// Host used when building absolute links in messages
    pub default_url_host: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    /// Raw signing secret; `None` means a per-process key is generated
    pub secret_key_base: Option<String>,
    pub storage_path: PathBuf,
    /// Base prepended to attachment URLs, without trailing slash
    pub public_url: Option<String>,
    pub cookie_same_site: SameSite,
    pub bcrypt_cost: u32,
    pub log_level: String,
    pub mail: Option<MailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let environment = Environment::parse(get("ENV").as_deref());

        let port = parse_or("PORT", get("PORT"), 3000u16)?;
        let database_max_connections =
            parse_or("DATABASE_MAX_CONNECTIONS", get("DATABASE_MAX_CONNECTIONS"), 5u32)?;
        let bcrypt_cost = parse_or("BCRYPT_COST", get("BCRYPT_COST"), bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                name: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let secret_key_base = get("SECRET_KEY_BASE");
        match &secret_key_base {
            Some(secret) if secret.len() < MIN_SECRET_LEN => {
                return Err(ConfigError::SecretTooShort(secret.len()));
            }
            None if environment.is_production() => {
                return Err(ConfigError::Missing("SECRET_KEY_BASE"));
            }
            _ => {}
        }

        let cookie_same_site = match get("COOKIE_SAMESITE") {
            None => SameSite::Lax,
            Some(v) => match v.to_lowercase().as_str() {
                "lax" => SameSite::Lax,
                "strict" => SameSite::Strict,
                "none" => SameSite::None,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "COOKIE_SAMESITE",
                        value: v,
                    });
                }
            },
        };

        let public_url = get("URL").map(|u| u.trim_end_matches('/').to_string());

        Ok(Self {
            environment,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
            database_url: get("DATABASE_URL").unwrap_or_else(|| "sqlite://tweeter.db".to_string()),
            database_max_connections,
            secret_key_base,
            storage_path: get("LOCAL_STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("storage")),
            mail: mail_from_lookup(&get, public_url.as_deref())?,
            public_url,
            cookie_same_site,
            bcrypt_cost,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Cookie signing key derived from `SECRET_KEY_BASE`, or a fresh random key.
    pub fn cookie_key(&self) -> Key {
        match &self.secret_key_base {
            // Length checked in from_lookup; Key::from panics below 64 bytes.
            Some(secret) => Key::from(secret.as_bytes()),
            None => Key::generate(),
        }
    }

    /// Session cookies are only marked Secure in production.
    pub fn secure_cookies(&self) -> bool {
        self.environment.is_production()
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: v }),
    }
}

fn mail_from_lookup<F>(get: &F, url: Option<&str>) -> Result<Option<MailConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(address) = get("MAILGUN_SMTP_SERVER") else {
        return Ok(None);
    };
    let port = parse_or("MAILGUN_SMTP_PORT", get("MAILGUN_SMTP_PORT"), 587u16)?;

    Ok(Some(MailConfig {
        address,
        port,
        user_name: get("MAILGUN_SMTP_LOGIN"),
        password: get("MAILGUN_SMTP_PASSWORD"),
        domain: get("MAILGUN_DOMAIN"),
        authentication: "plain",
        enable_starttls_auto: true,
        default_url_host: url.map(str::to_string),
    }))
}
