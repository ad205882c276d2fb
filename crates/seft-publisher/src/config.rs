//! Configuration management
//!
//! Everything is read from the environment (optionally seeded from `.env`),
//! then validated once at startup. Unparseable values fall back to the
//! defaults below; values that parse but make no sense are rejected by
//! [`Config::validate`].

use serde::{Deserialize, Serialize};
use seft_common::env::{list_or, string_or, var_or};
use seft_common::SeftError;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default operator API host binding.
pub const DEFAULT_SERVER_HOST: &str = "0.0.0.0";

/// Default operator API port.
pub const DEFAULT_SERVER_PORT: u16 = 8087;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default timeout for each health probe in seconds.
pub const DEFAULT_HEALTH_TIMEOUT_SECS: u64 = 10;

pub const DEFAULT_FTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_FTP_PORT: u16 = 2021;
pub const DEFAULT_FTP_USER: &str = "ons";
pub const DEFAULT_FTP_PASS: &str = "ons";
pub const DEFAULT_FTP_FOLDER: &str = "/";
pub const DEFAULT_FTP_TIMEOUT_SECS: u64 = 30;

/// Only spreadsheets are picked up unless configured otherwise.
pub const DEFAULT_FILE_SUFFIXES: &[&str] = &[".xlsx"];

pub const DEFAULT_INGEST_URL: &str = "http://localhost:8080";
pub const DEFAULT_INGEST_PRODUCT: &str = "bres";
pub const DEFAULT_INGEST_VERSION: &str = "1";
pub const DEFAULT_INGEST_HEALTH_PATH: &str = "/healthcheck";
pub const DEFAULT_INGEST_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_DOWNLOAD_WORKERS: usize = 4;
pub const DEFAULT_PUBLISH_WORKERS: usize = 4;
pub const DEFAULT_DELETE_WORKERS: usize = 2;
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Default cycle interval (10 minutes).
pub const DEFAULT_INTERVAL_MS: u64 = 10 * 60 * 1000;

/// Default delay before the first cycle so the API is up first.
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 6_000;

/// Full service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub ftp: FtpConfig,
    pub ingest: IngestConfig,
    pub pipeline: PipelineConfig,
    pub schedule: ScheduleConfig,
}

/// Operator API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    pub health_timeout_secs: u64,
}

/// Remote store (FTP) connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,

    /// Directory entered after login; listings and transfers are relative to it
    pub working_directory: String,

    pub connect_timeout_secs: u64,

    /// Accepted file name suffixes, compared case-insensitively; empty accepts all
    pub file_suffixes: Vec<String>,
}

/// Ingestion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub base_url: String,
    pub product: String,
    pub version: String,
    pub upload_mode: UploadMode,
    pub health_path: String,
    pub timeout_secs: u64,
}

/// How file bytes are encoded in the upload request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// File bytes as the request body
    #[default]
    Raw,
    /// `multipart/form-data` with a single `files[]` part
    Multipart,
}

impl std::str::FromStr for UploadMode {
    type Err = SeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "raw" | "body" => Ok(UploadMode::Raw),
            "multipart" | "form" => Ok(UploadMode::Multipart),
            other => Err(SeftError::invalid(
                "SEFT_INGEST_UPLOAD_MODE",
                other,
                "expected raw or multipart",
            )),
        }
    }
}

/// Worker pool sizes and queue bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub download_workers: usize,
    pub publish_workers: usize,
    pub delete_workers: usize,
    pub queue_capacity: usize,
}

/// When cycles run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub mode: ScheduleMode,
    pub interval_ms: u64,
    pub initial_delay_ms: u64,
}

/// Operating mode of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleMode {
    /// Wait `interval` after each cycle completes
    #[default]
    Interval,
    /// Start cycles on a fixed cadence, skipping ticks missed while running
    FixedRate,
    /// Run a single cycle and stop
    Once,
    /// Run a cycle whenever an external trigger arrives
    Trigger,
}

impl std::str::FromStr for ScheduleMode {
    type Err = SeftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "interval" => Ok(ScheduleMode::Interval),
            "fixed_rate" | "schedule" => Ok(ScheduleMode::FixedRate),
            "once" | "single" => Ok(ScheduleMode::Once),
            "trigger" | "manual" => Ok(ScheduleMode::Trigger),
            other => Err(SeftError::invalid(
                "SEFT_SCHEDULE_MODE",
                other,
                "expected interval, fixed_rate, once or trigger",
            )),
        }
    }
}

impl Config {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_env()?;
        config.validate()?;

        Ok(config)
    }

    /// Read configuration from environment variables without validating it
    pub fn from_env() -> Result<Self, SeftError> {
        let upload_mode = match std::env::var("SEFT_INGEST_UPLOAD_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => UploadMode::default(),
        };
        let mode = match std::env::var("SEFT_SCHEDULE_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => ScheduleMode::default(),
        };

        Ok(Config {
            server: ServerConfig {
                host: string_or("SEFT_HOST", DEFAULT_SERVER_HOST),
                port: var_or("SEFT_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: var_or(
                    "SEFT_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
                health_timeout_secs: var_or(
                    "SEFT_HEALTH_TIMEOUT_SECS",
                    DEFAULT_HEALTH_TIMEOUT_SECS,
                ),
            },
            ftp: FtpConfig {
                host: string_or("SEFT_FTP_HOST", DEFAULT_FTP_HOST),
                port: var_or("SEFT_FTP_PORT", DEFAULT_FTP_PORT),
                username: string_or("SEFT_FTP_USER", DEFAULT_FTP_USER),
                password: string_or("SEFT_FTP_PASS", DEFAULT_FTP_PASS),
                working_directory: string_or("SEFT_FTP_FOLDER", DEFAULT_FTP_FOLDER),
                connect_timeout_secs: var_or("SEFT_FTP_TIMEOUT_SECS", DEFAULT_FTP_TIMEOUT_SECS),
                file_suffixes: list_or("SEFT_FILE_SUFFIXES", DEFAULT_FILE_SUFFIXES),
            },
            ingest: IngestConfig {
                base_url: string_or("SEFT_INGEST_URL", DEFAULT_INGEST_URL),
                product: string_or("SEFT_INGEST_PRODUCT", DEFAULT_INGEST_PRODUCT),
                version: string_or("SEFT_INGEST_VERSION", DEFAULT_INGEST_VERSION),
                upload_mode,
                health_path: string_or("SEFT_INGEST_HEALTH_PATH", DEFAULT_INGEST_HEALTH_PATH),
                timeout_secs: var_or("SEFT_INGEST_TIMEOUT_SECS", DEFAULT_INGEST_TIMEOUT_SECS),
            },
            pipeline: PipelineConfig {
                download_workers: var_or("SEFT_DOWNLOAD_WORKERS", DEFAULT_DOWNLOAD_WORKERS),
                publish_workers: var_or("SEFT_PUBLISH_WORKERS", DEFAULT_PUBLISH_WORKERS),
                delete_workers: var_or("SEFT_DELETE_WORKERS", DEFAULT_DELETE_WORKERS),
                queue_capacity: var_or("SEFT_QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY),
            },
            schedule: ScheduleConfig {
                mode,
                interval_ms: var_or("SEFT_FTP_INTERVAL_MS", DEFAULT_INTERVAL_MS),
                initial_delay_ms: var_or("SEFT_INITIAL_DELAY_MS", DEFAULT_INITIAL_DELAY_MS),
            },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("SEFT_PORT must be greater than 0");
        }

        if self.ftp.host.trim().is_empty() {
            anyhow::bail!("SEFT_FTP_HOST cannot be empty");
        }

        if self.ftp.port == 0 {
            anyhow::bail!("SEFT_FTP_PORT must be greater than 0");
        }

        if !self.ingest.base_url.starts_with("http://")
            && !self.ingest.base_url.starts_with("https://")
        {
            anyhow::bail!(
                "SEFT_INGEST_URL must be an http(s) URL, got {:?}",
                self.ingest.base_url
            );
        }

        let pools = [
            ("SEFT_DOWNLOAD_WORKERS", self.pipeline.download_workers),
            ("SEFT_PUBLISH_WORKERS", self.pipeline.publish_workers),
            ("SEFT_DELETE_WORKERS", self.pipeline.delete_workers),
            ("SEFT_QUEUE_CAPACITY", self.pipeline.queue_capacity),
        ];
        for (key, value) in pools {
            if value == 0 {
                anyhow::bail!("{} must be greater than 0", key);
            }
        }

        let timeouts = [
            ("SEFT_HEALTH_TIMEOUT_SECS", self.server.health_timeout_secs),
            ("SEFT_FTP_TIMEOUT_SECS", self.ftp.connect_timeout_secs),
            ("SEFT_INGEST_TIMEOUT_SECS", self.ingest.timeout_secs),
        ];
        for (key, value) in timeouts {
            if value == 0 {
                anyhow::bail!("{} must be greater than 0", key);
            }
        }

        let periodic = matches!(
            self.schedule.mode,
            ScheduleMode::Interval | ScheduleMode::FixedRate
        );
        if periodic && self.schedule.interval_ms == 0 {
            anyhow::bail!("SEFT_FTP_INTERVAL_MS must be greater than 0");
        }

        if self.ftp.file_suffixes.is_empty() {
            tracing::warn!("No file suffix filter configured - every remote file will be published");
        }

        Ok(())
    }
}

impl ServerConfig {
    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }
}

impl FtpConfig {
    /// `host:port` of the remote store
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Whether `name` passes the suffix filter
    pub fn accepts(&self, name: &str) -> bool {
        if self.file_suffixes.is_empty() {
            return true;
        }
        let lower = name.to_lowercase();
        self.file_suffixes
            .iter()
            .any(|suffix| lower.ends_with(&suffix.to_lowercase()))
    }
}

impl IngestConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                health_timeout_secs: DEFAULT_HEALTH_TIMEOUT_SECS,
            },
            ftp: FtpConfig::default(),
            ingest: IngestConfig::default(),
            pipeline: PipelineConfig::default(),
            schedule: ScheduleConfig {
                mode: ScheduleMode::Interval,
                interval_ms: DEFAULT_INTERVAL_MS,
                initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            },
        }
    }
}

impl Default for FtpConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_FTP_HOST.to_string(),
            port: DEFAULT_FTP_PORT,
            username: DEFAULT_FTP_USER.to_string(),
            password: DEFAULT_FTP_PASS.to_string(),
            working_directory: DEFAULT_FTP_FOLDER.to_string(),
            connect_timeout_secs: DEFAULT_FTP_TIMEOUT_SECS,
            file_suffixes: DEFAULT_FILE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INGEST_URL.to_string(),
            product: DEFAULT_INGEST_PRODUCT.to_string(),
            version: DEFAULT_INGEST_VERSION.to_string(),
            upload_mode: UploadMode::Raw,
            health_path: DEFAULT_INGEST_HEALTH_PATH.to_string(),
            timeout_secs: DEFAULT_INGEST_TIMEOUT_SECS,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_workers: DEFAULT_DOWNLOAD_WORKERS,
            publish_workers: DEFAULT_PUBLISH_WORKERS,
            delete_workers: DEFAULT_DELETE_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}
