//! # Configuration
//!
//! All runtime settings come from environment variables (optionally loaded
//! from a `.env` file by `main`). Lookups go through a closure so tests can
//! supply a map instead of touching the process environment.

use chrono::{Duration, Utc};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_ADMIN_PASSWORD: &str = "1234";
const DEFAULT_JWT_SECRET: &str = "dev-secret";
const DEFAULT_JWT_EXPIRATION_MINUTES: i64 = 24 * 60;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_SQLITE_URL: &str = "sqlite:catalog.db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{0} must be set for the selected storage backend")]
    Missing(&'static str),
}

/// Which persistence adapter backs the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    File,
    Sqlite,
    Postgres,
    Mongo,
    Github,
}

impl FromStr for StorageKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "file" | "json" => Ok(StorageKind::File),
            "sqlite" => Ok(StorageKind::Sqlite),
            "postgres" | "postgresql" => Ok(StorageKind::Postgres),
            "mongo" | "mongodb" => Ok(StorageKind::Mongo),
            "github" => Ok(StorageKind::Github),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageKind::Memory => "memory",
            StorageKind::File => "file",
            StorageKind::Sqlite => "sqlite",
            StorageKind::Postgres => "postgres",
            StorageKind::Mongo => "mongo",
            StorageKind::Github => "github",
        };
        f.write_str(name)
    }
}

/// Where the GitHub backend keeps the catalog document
#[derive(Debug, Clone, PartialEq)]
pub struct GithubConfig {
    pub token: String,
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    /// Path of the JSON document inside the repository
    pub path: String,
    pub committer_name: String,
    pub committer_email: String,
    pub api_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Connection string of the SQL or MongoDB backend
    pub database_url: Option<String>,
    /// MongoDB database name; the one in the connection string when unset
    pub mongo_database: Option<String>,
    pub data_dir: PathBuf,
    pub github: Option<GithubConfig>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub storage: StorageConfig,
    pub upload_dir: PathBuf,
    pub public_dir: PathBuf,
    pub admin_password: String,
    pub jwt_secret: String,
    pub jwt_expiration_minutes: i64,
    pub cors_origin: Option<String>,
    pub max_upload_bytes: usize,
    pub seed_on_empty: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // blank values count as unset
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = parse_or(&get, "PORT", DEFAULT_PORT)?;
        let bind_addr = parse_or(&get, "BIND_ADDR", IpAddr::from([0, 0, 0, 0]))?;
        let jwt_expiration_minutes =
            parse_or(&get, "JWT_EXPIRATION_MINUTES", DEFAULT_JWT_EXPIRATION_MINUTES)?;
        if !is_usable_token_lifetime(jwt_expiration_minutes) {
            return Err(ConfigError::Invalid {
                key: "JWT_EXPIRATION_MINUTES",
                value: jwt_expiration_minutes.to_string(),
            });
        }
        let max_upload_bytes = parse_or(&get, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        let seed_on_empty = match get("SEED_ON_EMPTY") {
            Some(value) => parse_bool(&value).ok_or(ConfigError::Invalid {
                key: "SEED_ON_EMPTY",
                value,
            })?,
            None => false,
        };

        let admin_password = get("ADMIN_PASSWORD").unwrap_or_else(|| {
            warn!("ADMIN_PASSWORD not set, using the development default");
            DEFAULT_ADMIN_PASSWORD.to_string()
        });
        let jwt_secret = get("JWT_SECRET").unwrap_or_else(|| {
            warn!("JWT_SECRET not set, using the development default");
            DEFAULT_JWT_SECRET.to_string()
        });

        Ok(Self {
            bind_addr,
            port,
            storage: StorageConfig::from_lookup(&get)?,
            upload_dir: get("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public/uploads")),
            public_dir: get("PUBLIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("public")),
            admin_password,
            jwt_secret,
            jwt_expiration_minutes,
            cors_origin: get("CORS_ORIGIN"),
            max_upload_bytes,
            seed_on_empty,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl StorageConfig {
    fn from_lookup<F>(get: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL");
        let mongo_uri = get("MONGO_URI");
        let kind = match get("STORAGE_BACKEND") {
            Some(value) => StorageKind::from_str(&value).map_err(|_| ConfigError::Invalid {
                key: "STORAGE_BACKEND",
                value,
            })?,
            None => infer_kind(get("DATA_REPO").is_some(), mongo_uri.is_some(), database_url.as_deref()),
        };

        let database_url = match kind {
            StorageKind::Sqlite => Some(database_url.unwrap_or_else(|| DEFAULT_SQLITE_URL.to_string())),
            StorageKind::Postgres => Some(database_url.ok_or(ConfigError::Missing("DATABASE_URL"))?),
            StorageKind::Mongo => Some(
                mongo_uri
                    .or(database_url.filter(|url| url.starts_with("mongodb")))
                    .ok_or(ConfigError::Missing("MONGO_URI"))?,
            ),
            _ => database_url,
        };

        let github = match kind {
            StorageKind::Github => Some(GithubConfig {
                token: get("GITHUB_TOKEN").ok_or(ConfigError::Missing("GITHUB_TOKEN"))?,
                repo: get("DATA_REPO").ok_or(ConfigError::Missing("DATA_REPO"))?,
                branch: get("DATA_BRANCH").unwrap_or_else(|| "main".to_string()),
                path: get("DATA_PATH").unwrap_or_else(|| "data/catalogo.json".to_string()),
                committer_name: get("DATA_COMMITTER_NAME").unwrap_or_else(|| "Catalog Bot".to_string()),
                committer_email: get("DATA_COMMITTER_EMAIL")
                    .unwrap_or_else(|| "bot@example.com".to_string()),
                api_url: get("GITHUB_API_URL").unwrap_or_else(|| "https://api.github.com".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            kind,
            database_url,
            mongo_database: get("MONGO_DB"),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("data")),
            github,
        })
    }
}

fn infer_kind(has_data_repo: bool, has_mongo_uri: bool, database_url: Option<&str>) -> StorageKind {
    match database_url {
        _ if has_data_repo => StorageKind::Github,
        Some(url) if url.starts_with("postgres") => StorageKind::Postgres,
        Some(url) if url.starts_with("sqlite:") => StorageKind::Sqlite,
        Some(url) if url.starts_with("mongodb") => StorageKind::Mongo,
        _ if has_mongo_uri => StorageKind::Mongo,
        _ => StorageKind::File,
    }
}

/// Tokens must expire in the future and at a representable date
fn is_usable_token_lifetime(minutes: i64) -> bool {
    minutes > 0
        && Duration::try_minutes(minutes)
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .is_some()
}

fn parse_or<F, T>(get: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match get(key) {
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
