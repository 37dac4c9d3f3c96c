use anyhow::Context;
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use snip_shortener::DEFAULT_QUEUE_CAPACITY;
use snip_storage::StorageConfig;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DATABASE_DSN_ENV: &str = "SNIP_DATABASE_DSN";
pub const FILE_STORAGE_PATH_ENV: &str = "SNIP_FILE_STORAGE_PATH";
pub const DELETE_QUEUE_CAPACITY_ENV: &str = "SNIP_DELETE_QUEUE_CAPACITY";
pub const BASE_URL_ENV: &str = "SNIP_BASE_URL";
pub const CONFIG_ENV: &str = "SNIP_CONFIG";
pub const LOG_FORMAT_ENV: &str = "SNIP_LOG_FORMAT";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "snip-server")]
pub struct CLI {
    /// Postgres connection string; selects the database backend.
    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Append-only log file; selects the file backend unless a DSN is set.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    /// Base URL prepended to short codes.
    #[arg(short = 'b', long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    #[arg(
        long,
        env = DELETE_QUEUE_CAPACITY_ENV,
        default_value_t = DEFAULT_QUEUE_CAPACITY
    )]
    pub delete_queue_capacity: usize,

    /// JSON file with `database_dsn`, `file_storage_path` and `base_url`.
    #[arg(short = 'c', long, env = CONFIG_ENV)]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = LOG_FORMAT_ENV,
        value_enum,
        default_value_t = LogFormat::Text
    )]
    pub log_format: LogFormat,
}

/// Values read from the `--config` file.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FileConfig {
    pub database_dsn: Option<String>,
    pub file_storage_path: Option<PathBuf>,
    pub base_url: Option<String>,
}

impl FileConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

/// Resolved process settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub storage: StorageConfig,
    pub base_url: String,
    pub delete_queue_capacity: usize,
}

impl CLI {
    /// Merges the command line with the optional config file.
    ///
    /// Command-line and environment values win over file values.
    pub fn into_settings(self) -> anyhow::Result<Settings> {
        let file = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Ok(self.merge(file))
    }

    fn merge(self, file: FileConfig) -> Settings {
        Settings {
            storage: StorageConfig {
                database_dsn: self.database_dsn.or(file.database_dsn),
                file_storage_path: self.file_storage_path.or(file.file_storage_path),
            },
            base_url: self
                .base_url
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            delete_queue_capacity: self.delete_queue_capacity,
        }
    }
}
