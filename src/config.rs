use anyhow::{Context, Result};
use clap::Parser;
use std::{env, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub sync_delay_ms: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Cloud drive file model API")]
pub struct Args {
    /// Host to bind to (overrides DRIVE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DRIVE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Session database URL (overrides DRIVE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Milliseconds before a new upload flips to synced (overrides DRIVE_SYNC_DELAY_MS)
    #[arg(long)]
    pub sync_delay_ms: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::merge(Args::parse())
    }

    fn merge(args: Args) -> Result<(Self, bool)> {
        // --- Environment fallback ---
        let env_host = env::var("DRIVE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("DRIVE_PORT", 3000u16)?;
        let env_db =
            env::var("DRIVE_DATABASE_URL").unwrap_or_else(|_| "sqlite://./data/session.db".into());
        let env_delay = parse_env("DRIVE_SYNC_DELAY_MS", 2000u64)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            sync_delay_ms: args.sync_delay_ms.unwrap_or(env_delay),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn sync_delay(&self) -> Duration {
        Duration::from_millis(self.sync_delay_ms)
    }
}
