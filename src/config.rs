use log::info;
use std::fmt::Display;
use std::str::FromStr;

use crate::dotenv;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend {:?}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub app_url: Option<String>,
    pub hint_salt: String,
}

impl Config {
    pub fn load() -> Result<Self, Error> {
        let store_backend = try_load("STORE_BACKEND", "postgres")?;
        let database_url = optional("DATABASE_URL");
        if store_backend == StoreBackend::Postgres && database_url.is_none() {
            return Err(Error::ServerError("DATABASE_URL must be set for the postgres store".into()));
        }
        Ok(Self {
            bind_addr: try_load("BIND_ADDR", "0.0.0.0")?,
            port: try_load("PORT", "8000")?,
            store_backend,
            database_url,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            jwt_secret: dotenv::var("JWT_SECRET").map_err(|_| Error::ServerError("JWT_SECRET must be set".into()))?,
            app_url: optional("APP_URL").map(|url| url.trim_end_matches('/').to_owned()),
            hint_salt: optional("HINT_SALT").unwrap_or_default(),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    dotenv::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, Error>
where
    T::Err: Display,
{
    let value = optional(key).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_owned()
    });
    value.parse().map_err(|e| Error::ServerError(format!("invalid {} value: {}", key, e)))
}
