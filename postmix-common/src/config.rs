//! Configuration loading and resolution
//!
//! Every key is resolved in the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Values are process-wide and read once at startup.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::{Error, Result};

pub const ENV_BUCKET_NAME: &str = "BUCKET_NAME";
pub const ENV_REGION_NAME: &str = "REGION_NAME";
pub const ENV_WEBHOOK_URL: &str = "WEBHOOK_URL";
pub const ENV_STORAGE_ENDPOINT: &str = "POSTMIX_STORAGE_ENDPOINT";
pub const ENV_STORAGE_DIR: &str = "POSTMIX_STORAGE_DIR";
pub const ENV_STAGING_DIR: &str = "POSTMIX_STAGING_DIR";
pub const ENV_POLL_TIMEOUT_SECS: &str = "POSTMIX_POLL_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_SECS: &str = "POSTMIX_POLL_INTERVAL_SECS";
pub const ENV_MASTERING_COMMAND: &str = "POSTMIX_MASTERING_COMMAND";
pub const ENV_LISTEN: &str = "POSTMIX_LISTEN";
pub const ENV_CONFIG: &str = "POSTMIX_CONFIG";

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_LISTEN: &str = "127.0.0.1:5790";

/// Contents of the optional TOML config file
///
/// All fields are optional; missing fields fall through to defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub bucket_name: Option<String>,
    pub region_name: Option<String>,
    pub webhook_url: Option<String>,
    pub storage_endpoint: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub poll_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub mastering_command: Option<String>,
    pub listen: Option<String>,
}

impl TomlConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }

    /// Load the config file named by `explicit`, `POSTMIX_CONFIG`, or the
    /// per-user default location.
    ///
    /// An explicitly named file must exist; the default location is optional.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>> {
        if let Some(path) = explicit {
            return Self::load(path).map(Some);
        }

        if let Ok(path) = std::env::var(ENV_CONFIG) {
            return Self::load(Path::new(&path)).map(Some);
        }

        match default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading config file {}", path.display());
                Self::load(&path).map(Some)
            }
            _ => {
                debug!("No config file found, using environment and defaults");
                Ok(None)
            }
        }
    }
}

/// `~/.config/postmix/config.toml` (platform equivalent elsewhere)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("postmix").join("config.toml"))
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub bucket_name: Option<String>,
    pub region_name: Option<String>,
    pub webhook_url: Option<String>,
    pub storage_endpoint: Option<String>,
    pub storage_dir: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub poll_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub mastering_command: Option<String>,
    pub listen: Option<String>,
}

/// Object store credentials for request signing
#[derive(Clone, PartialEq, Eq)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl StorageCredentials {
    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY` / `AWS_SESSION_TOKEN`
    pub fn from_env() -> Option<Self> {
        let access_key_id = non_empty_env(ENV_ACCESS_KEY_ID)?;
        let secret_access_key = non_empty_env(ENV_SECRET_ACCESS_KEY)?;
        Some(Self {
            access_key_id,
            secret_access_key,
            session_token: non_empty_env(ENV_SESSION_TOKEN),
        })
    }
}

/// Fully resolved worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub bucket_name: String,
    pub region_name: String,
    pub webhook_url: String,
    /// Base URL of the S3-compatible endpoint
    pub storage_endpoint: String,
    /// When set, objects are read from and written to this directory instead
    pub storage_dir: Option<PathBuf>,
    pub staging_dir: PathBuf,
    pub poll_timeout: Duration,
    pub poll_interval: Duration,
    /// External mastering program and its leading arguments
    pub mastering_command: Option<Vec<String>>,
    pub listen: String,
    pub credentials: Option<StorageCredentials>,
}

impl WorkerConfig {
    /// Resolve configuration: CLI → ENV → TOML → default
    ///
    /// `bucket_name` and `webhook_url` have no default and must be provided.
    pub fn resolve(cli: &ConfigOverrides, toml: Option<&TomlConfig>) -> Result<Self> {
        let file = toml.cloned().unwrap_or_default();

        let bucket_name = pick(cli.bucket_name.clone(), ENV_BUCKET_NAME, file.bucket_name)
            .ok_or_else(|| missing("bucket_name", ENV_BUCKET_NAME))?;
        let webhook_url = pick(cli.webhook_url.clone(), ENV_WEBHOOK_URL, file.webhook_url)
            .ok_or_else(|| missing("webhook_url", ENV_WEBHOOK_URL))?;
        let region_name = pick(cli.region_name.clone(), ENV_REGION_NAME, file.region_name)
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let storage_endpoint = pick(
            cli.storage_endpoint.clone(),
            ENV_STORAGE_ENDPOINT,
            file.storage_endpoint,
        )
        .unwrap_or_else(|| format!("https://s3.{}.amazonaws.com", region_name));

        let storage_dir = cli
            .storage_dir
            .clone()
            .or_else(|| non_empty_env(ENV_STORAGE_DIR).map(PathBuf::from))
            .or(file.storage_dir);

        let staging_dir = cli
            .staging_dir
            .clone()
            .or_else(|| non_empty_env(ENV_STAGING_DIR).map(PathBuf::from))
            .or(file.staging_dir)
            .unwrap_or_else(std::env::temp_dir);

        let poll_timeout_secs = pick_parsed(
            cli.poll_timeout_secs,
            ENV_POLL_TIMEOUT_SECS,
            file.poll_timeout_secs,
        )?
        .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);
        let poll_interval_secs = pick_parsed(
            cli.poll_interval_secs,
            ENV_POLL_INTERVAL_SECS,
            file.poll_interval_secs,
        )?
        .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        if poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be at least 1".to_string()));
        }

        let mastering_command = pick(
            cli.mastering_command.clone(),
            ENV_MASTERING_COMMAND,
            file.mastering_command,
        )
        .map(|cmd| parse_command(&cmd))
        .transpose()?;

        let listen = pick(cli.listen.clone(), ENV_LISTEN, file.listen)
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());

        Ok(Self {
            bucket_name,
            region_name,
            webhook_url,
            storage_endpoint: storage_endpoint.trim_end_matches('/').to_string(),
            storage_dir,
            staging_dir,
            poll_timeout: Duration::from_secs(poll_timeout_secs),
            poll_interval: Duration::from_secs(poll_interval_secs),
            mastering_command,
            listen,
            credentials: StorageCredentials::from_env(),
        })
    }
}

fn missing(key: &str, env: &str) -> Error {
    Error::Config(format!(
        "{} not configured. Set --{} on the command line, {} in the environment, \
         or {} in the config file",
        key,
        key.replace('_', "-"),
        env,
        key
    ))
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn pick(cli: Option<String>, env: &str, file: Option<String>) -> Option<String> {
    cli.or_else(|| non_empty_env(env)).or(file)
}

fn pick_parsed<T: FromStr>(cli: Option<T>, env: &str, file: Option<T>) -> Result<Option<T>> {
    if cli.is_some() {
        return Ok(cli);
    }
    if let Some(raw) = non_empty_env(env) {
        let value = raw
            .trim()
            .parse::<T>()
            .map_err(|_| Error::Config(format!("{} is not a valid number: {}", env, raw)))?;
        return Ok(Some(value));
    }
    Ok(file)
}

/// Split a command line on whitespace; the first word is the program
fn parse_command(raw: &str) -> Result<Vec<String>> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        return Err(Error::Config("mastering_command is empty".to_string()));
    }
    Ok(parts)
}
