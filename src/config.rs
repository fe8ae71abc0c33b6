//! Configuration management for the playlist tuner.
//!
//! Configuration values come from environment variables, optionally seeded
//! from `.env` files. The lookup order is:
//! 1. Process environment variables (highest priority)
//! 2. `.env` file in the local data directory
//! 3. `.env` file in the working directory
//! 4. Application defaults for the optional settings
//!
//! The four credentials in [`REQUIRED_VARS`] have no default. Startup fails
//! if any of them is missing, naming every missing variable at once.

use std::{env, path::PathBuf, time::Duration};

use crate::error::{AppError, Result};

pub const REQUIRED_VARS: [&str; 4] = [
    "SPOTIFY_CLIENT_ID",
    "SPOTIFY_CLIENT_SECRET",
    "SPOTIFY_REDIRECT_URI",
    "SESSION_SECRET",
];

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
pub const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const DEFAULT_SCOPE: &str = "playlist-modify-public playlist-modify-private \
    playlist-read-private playlist-read-collaborative user-read-recently-played \
    user-library-read user-top-read";

/// Upper bound of ids Spotify accepts on the audio-features endpoint.
pub const MAX_FEATURE_BATCH_SIZE: usize = 100;

/// Loads environment variables from `.env` files.
///
/// Looks for `<data_local_dir>/playlist-tuner/.env` first, creating the
/// directory when it does not exist yet, then for `.env` in the working
/// directory. Variables already present in the process environment are never
/// overwritten. A missing file is not an error; the required variables may
/// come straight from the environment.
///
/// # Directory Structure
///
/// - Linux: `~/.local/share/playlist-tuner/.env`
/// - macOS: `~/Library/Application Support/playlist-tuner/.env`
/// - Windows: `%LOCALAPPDATA%/playlist-tuner/.env`
///
/// # Errors
///
/// Returns an error if the data directory cannot be created or an existing
/// `.env` file cannot be parsed.
pub async fn load_env() -> Result<()> {
    let path = env_file_path();
    if let Some(parent) = path.parent() {
        async_fs::create_dir_all(parent).await?;
    }

    if path.is_file() {
        dotenv::from_path(&path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {}", path.display(), e)))?;
    }
    dotenv::dotenv().ok();

    Ok(())
}

/// Location of the `.env` file inside the local data directory.
pub fn env_file_path() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("playlist-tuner/.env");
    path
}

/// Runtime configuration, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub session_secret: String,
    pub server_address: String,
    pub api_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub scope: String,
    pub session_lifetime_hours: i64,
    pub rate_limit_per_minute: usize,
    pub feature_batch_size: usize,
    pub batch_delay: Duration,
    pub upstream_timeout: Duration,
    pub upstream_max_attempts: u32,
    pub upstream_backoff: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the raw value
    /// of a variable or `None` when it is unset.
    ///
    /// Blank values count as unset. Every missing required variable is
    /// reported in a single [`AppError::Config`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "missing required environment variables: {}",
                missing.join(", ")
            )));
        }

        let required = |key: &str| get(key).unwrap_or_default();
        let or_default = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let feature_batch_size: usize = parse_or(&get, "FEATURE_BATCH_SIZE", 50)?;
        if feature_batch_size == 0 || feature_batch_size > MAX_FEATURE_BATCH_SIZE {
            return Err(AppError::Config(format!(
                "FEATURE_BATCH_SIZE must be between 1 and {}, got {}",
                MAX_FEATURE_BATCH_SIZE, feature_batch_size
            )));
        }

        let upstream_max_attempts: u32 = parse_or(&get, "UPSTREAM_MAX_ATTEMPTS", 3)?;
        if upstream_max_attempts == 0 {
            return Err(AppError::Config(
                "UPSTREAM_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }

        Ok(Self {
            client_id: required("SPOTIFY_CLIENT_ID"),
            client_secret: required("SPOTIFY_CLIENT_SECRET"),
            redirect_uri: required("SPOTIFY_REDIRECT_URI"),
            session_secret: required("SESSION_SECRET"),
            server_address: or_default("SERVER_ADDRESS", DEFAULT_SERVER_ADDRESS),
            api_url: or_default("SPOTIFY_API_URL", DEFAULT_API_URL)
                .trim_end_matches('/')
                .to_string(),
            auth_url: or_default("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: or_default("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
            scope: or_default("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
            session_lifetime_hours: parse_or(&get, "SESSION_LIFETIME_HOURS", 24)?,
            rate_limit_per_minute: parse_or(&get, "RATE_LIMIT_PER_MINUTE", 100)?,
            feature_batch_size,
            batch_delay: Duration::from_millis(parse_or(&get, "BATCH_DELAY_MS", 1000)?),
            upstream_timeout: Duration::from_secs(parse_or(&get, "UPSTREAM_TIMEOUT_SECS", 30)?),
            upstream_max_attempts,
            upstream_backoff: Duration::from_millis(parse_or(&get, "UPSTREAM_BACKOFF_MS", 1000)?),
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("invalid value for {}: {}", key, e))),
        None => Ok(default),
    }
}
