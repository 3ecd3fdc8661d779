//! Environment-driven settings.
//!
//! # Responsibility
//! - Load `.env` (when present) and read typed settings from the process
//!   environment.
//! - Group optional features (token verification, Cosmos) so they are
//!   either fully configured or absent.
//!
//! # Invariants
//! - Blank variables count as unset.

use crate::cosmos::CosmosSettings;
use crate::db::DatabaseType;
use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const DATABASE_TYPE: &str = "DATABASE_TYPE";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_NAME: &str = "DATABASE_NAME";
pub const JWKS_URL: &str = "JWKS_URL";
pub const JWT_AUDIENCE: &str = "JWT_AUDIENCE";
pub const AZURE_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const COSMOS_ACCOUNT_URI: &str = "COSMOS_ACCOUNT_URI";
pub const COSMOS_ACCOUNT_KEY: &str = "COSMOS_ACCOUNT_KEY";
pub const COSMOS_DATABASE_NAME: &str = "COSMOS_DATABASE_NAME";
pub const COSMOS_CONTAINER_NAME: &str = "COSMOS_CONTAINER_NAME";
pub const COSMOS_USE_RBAC: &str = "COSMOS_USE_RBAC";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const LOG_DIR: &str = "LOG_DIR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "{key} must be set"),
            Self::Invalid { key, message } => write!(f, "{key} is invalid: {message}"),
        }
    }
}

impl Error for ConfigError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub database_type: DatabaseType,
    pub url: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSettings {
    pub jwks_url: String,
    pub audience: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub token: Option<TokenSettings>,
    pub azure_client_id: Option<String>,
    pub cosmos: Option<CosmosSettings>,
    pub log_level: String,
    pub log_dir: Option<PathBuf>,
}

impl Settings {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let database_type = match get(DATABASE_TYPE) {
            Some(raw) => raw
                .parse::<DatabaseType>()
                .map_err(|message| ConfigError::Invalid {
                    key: DATABASE_TYPE,
                    message,
                })?,
            None => DatabaseType::Sqlite,
        };
        let database = DatabaseSettings {
            database_type,
            url: require(DATABASE_URL)?,
            name: get(DATABASE_NAME),
        };

        let token = match (get(JWKS_URL), get(JWT_AUDIENCE)) {
            (Some(jwks_url), Some(audience)) => Some(TokenSettings { jwks_url, audience }),
            (None, None) => None,
            (Some(_), None) => return Err(ConfigError::Missing(JWT_AUDIENCE)),
            (None, Some(_)) => return Err(ConfigError::Missing(JWKS_URL)),
        };

        let cosmos = match get(COSMOS_ACCOUNT_URI) {
            Some(account_uri) => {
                let use_rbac = match get(COSMOS_USE_RBAC) {
                    Some(raw) => parse_bool(COSMOS_USE_RBAC, &raw)?,
                    None => true,
                };
                let account_key = if use_rbac {
                    get(COSMOS_ACCOUNT_KEY).unwrap_or_default()
                } else {
                    require(COSMOS_ACCOUNT_KEY)?
                };
                Some(CosmosSettings {
                    account_uri,
                    account_key,
                    database_name: require(COSMOS_DATABASE_NAME)?,
                    container_name: require(COSMOS_CONTAINER_NAME)?,
                    use_rbac,
                })
            }
            None => None,
        };

        Ok(Self {
            database,
            token,
            azure_client_id: get(AZURE_CLIENT_ID),
            cosmos,
            log_level: get(LOG_LEVEL).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: get(LOG_DIR).map(PathBuf::from),
        })
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            key,
            message: format!("`{other}` is not a boolean"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, Settings};
    use crate::db::DatabaseType;
    use std::collections::HashMap;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn minimal_settings_use_defaults() {
        let settings = settings(&[("DATABASE_URL", "sqlite:///tmp/app.db")]).unwrap();
        assert_eq!(settings.database.database_type, DatabaseType::Sqlite);
        assert_eq!(settings.token, None);
        assert_eq!(settings.cosmos, None);
        assert_eq!(settings.log_dir, None);
    }

    #[test]
    fn database_url_is_required() {
        assert_eq!(
            settings(&[("DATABASE_URL", "  ")]),
            Err(ConfigError::Missing("DATABASE_URL"))
        );
    }

    #[test]
    fn token_settings_come_in_pairs() {
        let err = settings(&[
            ("DATABASE_URL", "sqlite://:memory:"),
            ("JWKS_URL", "https://issuer/keys"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_AUDIENCE"));
    }

    #[test]
    fn cosmos_key_is_required_without_rbac() {
        let err = settings(&[
            ("DATABASE_URL", "sqlite://:memory:"),
            ("COSMOS_ACCOUNT_URI", "https://acct.documents.azure.com:443/"),
            ("COSMOS_DATABASE_NAME", "db"),
            ("COSMOS_CONTAINER_NAME", "items"),
            ("COSMOS_USE_RBAC", "false"),
        ])
        .unwrap_err();
        assert_eq!(err, ConfigError::Missing("COSMOS_ACCOUNT_KEY"));
    }

    #[test]
    fn cosmos_defaults_to_rbac() {
        let settings = settings(&[
            ("DATABASE_URL", "sqlite://:memory:"),
            ("COSMOS_ACCOUNT_URI", "https://acct.documents.azure.com:443/"),
            ("COSMOS_DATABASE_NAME", "db"),
            ("COSMOS_CONTAINER_NAME", "items"),
        ])
        .unwrap();
        assert!(settings.cosmos.unwrap().use_rbac);
    }

    #[test]
    fn unknown_database_type_is_invalid() {
        let err = settings(&[("DATABASE_URL", "x"), ("DATABASE_TYPE", "oracle")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "DATABASE_TYPE", .. }));
    }
}
