use std::env;
use std::fmt::Display;
use std::str::FromStr;

use log::{info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StorageBackend::MongoDb),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("unknown storage backend `{other}`")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub mongodb_uri: String,
    pub database_name: String,
    pub jwt_secret: String,
    pub access_token_hours: i64,
    pub refresh_token_hours: i64,
    pub cors_origin: String,
    pub force_seed: bool,
}

impl Config {
    /// Reads the process environment, falling back to development defaults.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using an insecure development secret");
            "secret".to_string()
        });

        Ok(Self {
            host: load(&lookup, "HOST", "127.0.0.1")?,
            port: load(&lookup, "PORT", "8000")?,
            storage: load(&lookup, "STORAGE", "mongodb")?,
            mongodb_uri: load(&lookup, "MONGODB_URI", "mongodb://localhost:27017")?,
            database_name: load(&lookup, "DATABASE_NAME", "campus_book")?,
            jwt_secret,
            access_token_hours: load(&lookup, "ACCESS_TOKEN_HOURS", "24")?,
            refresh_token_hours: load(&lookup, "REFRESH_TOKEN_HOURS", "168")?,
            cors_origin: load(&lookup, "CORS_ORIGIN", "http://localhost:5173")?,
            force_seed: load(&lookup, "FORCE_SEED", "false")?,
        })
    }
}

fn load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| format!("Invalid {key} value `{raw}`: {e}"))
}
