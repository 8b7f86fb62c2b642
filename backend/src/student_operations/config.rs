use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

pub struct Config {
    pub database_url: String,
    pub db_max_conn: u32,
    pub db_busy_timeout: Duration,
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub max_body_bytes: usize,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
    pub fn from_env() -> Result<Self> {
        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                let url = default_database_url()?;
                info!("DATABASE_URL not set. Using default '{}'.", url);
                url
            }
        };

        if !database_url.starts_with("sqlite:") {
            return Err(anyhow!("Invalid DATABASE_URL: must start with 'sqlite:'"));
        }

        Ok(Self {
            database_url,
            db_max_conn: try_load("DB_MAX_CONN", 10),
            db_busy_timeout: Duration::from_millis(try_load("DB_BUSY_TIMEOUT_MS", 5000)),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: try_load("PORT", 8000),
            static_dir: env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()).into(),
            templates_dir: env::var("TEMPLATES_DIR")
                .unwrap_or_else(|_| "templates".into())
                .into(),
            max_body_bytes: try_load("MAX_BODY_BYTES", 1024 * 1024),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Filesystem path behind a file-backed `sqlite://` URL, if any.
    pub fn database_file(&self) -> Option<PathBuf> {
        let rest = self.database_url.strip_prefix("sqlite://")?;
        let path = rest.split('?').next().unwrap_or(rest);
        if path.is_empty() || path == ":memory:" {
            return None;
        }
        Some(PathBuf::from(path))
    }
}

fn default_database_url() -> Result<String> {
    let db_path = env::current_dir()
        .context("Failed to get current directory")?
        .join("data")
        .join("students.db");
    let db_path_str = db_path
        .to_str()
        .context("Database path contains invalid UTF-8 characters")?
        .replace('\\', "/");
    Ok(format!("sqlite://{}?mode=rwc", db_path_str))
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default: {default}");
            default
        }),
        Err(_) => default,
    }
}
