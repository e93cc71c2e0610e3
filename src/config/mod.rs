use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("ENCRYPTION_KEY must be exactly 32 bytes, got {0}")]
    EncryptionKeyLength(usize),
    #[error("JWT_SECRET must not be empty")]
    EmptyJwtSecret,
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Process configuration, built once in `main` and threaded into the
/// components that need it. Startup refuses to proceed on malformed values
/// so nothing has to re-validate per request.
#[derive(Clone)]
pub struct Config {
    pub port: u16,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Clone)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub encryption_key: [u8; 32],
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;

        let jwt_secret =
            env::var("JWT_SECRET").map_err(|_| ConfigError::MissingVar("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::EmptyJwtSecret);
        }

        let raw_key =
            env::var("ENCRYPTION_KEY").map_err(|_| ConfigError::MissingVar("ENCRYPTION_KEY"))?;
        let encryption_key = parse_encryption_key(&raw_key)?;

        let port = parse_var("PORT", 3001)?;
        let max_connections = parse_var("DATABASE_MAX_CONNECTIONS", 20)?;

        Ok(Self {
            port,
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            security: SecurityConfig {
                jwt_secret,
                encryption_key,
            },
        })
    }
}

/// The cipher key is the raw bytes of the env value; AES-256 needs exactly 32.
fn parse_encryption_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = raw.as_bytes();
    bytes
        .try_into()
        .map_err(|_| ConfigError::EncryptionKeyLength(bytes.len()))
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(var) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            var,
            value,
        }),
        Err(_) => Ok(default),
    }
}
