//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "yatube";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_PER_PAGE: u32 = 10;
const DEFAULT_PAGE_DELTA: u32 = 5;
const DEFAULT_UPLOAD_DIR: &str = "media";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_HOURS: u64 = 14 * 24;
const DEFAULT_SESSION_SWEEP_SECONDS: u64 = 3600;

/// Command-line arguments for the Yatube binary.
#[derive(Debug, Parser)]
#[command(name = "yatube", version, about = "Yatube blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "YATUBE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Yatube HTTP service.
    Serve(Box<ServeArgs>),
    /// Create a user account from the command line.
    #[command(name = "create-user")]
    CreateUser(CreateUserArgs),
    /// Create a topical group; groups have no public creation route.
    #[command(name = "create-group")]
    CreateGroup(CreateGroupArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the list page size.
    #[arg(long = "pagination-per-page", value_name = "COUNT")]
    pub pagination_per_page: Option<u32>,

    /// Override the navigation window radius.
    #[arg(long = "pagination-delta", value_name = "COUNT")]
    pub pagination_delta: Option<u32>,

    /// Toggle the home-page response cache.
    #[arg(
        long = "cache-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_enabled: Option<bool>,

    /// Override the cache TTL in seconds.
    #[arg(long = "cache-ttl-seconds", value_name = "SECONDS")]
    pub cache_ttl_seconds: Option<u64>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,

    /// Override the maximum request size for uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the session lifetime in hours.
    #[arg(long = "sessions-ttl-hours", value_name = "HOURS")]
    pub sessions_ttl_hours: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateUserArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Username for the new account.
    #[arg(value_name = "USERNAME")]
    pub username: String,

    /// Password for the new account.
    #[arg(long, value_name = "PASSWORD", env = "YATUBE_NEW_USER_PASSWORD")]
    pub password: String,

    /// Optional display name shown instead of the username.
    #[arg(long = "display-name", value_name = "NAME")]
    pub display_name: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct CreateGroupArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Title of the new group; the slug is derived from it.
    #[arg(value_name = "TITLE")]
    pub title: String,

    /// Optional description of the group's topic.
    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub pagination: PaginationSettings,
    pub cache: CacheSettings,
    pub uploads: UploadSettings,
    pub sessions: SessionSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct PaginationSettings {
    /// Posts per page (`MAX_PAGE_COUNT` in the template vocabulary).
    pub per_page: NonZeroU32,
    /// Neighbour links per side of the current page (`DELTA_PAGE_COUNT`).
    pub delta: u32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub response_limit: usize,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    pub sweep_interval: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Parse the CLI and load settings in one step.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("YATUBE").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::CreateUser(args)) => raw.apply_database_override(&args.database),
        Some(Command::CreateGroup(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    pagination: RawPaginationSettings,
    cache: RawCacheSettings,
    uploads: RawUploadSettings,
    sessions: RawSessionSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPaginationSettings {
    per_page: Option<u32>,
    delta: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    enabled: Option<bool>,
    ttl_seconds: Option<u64>,
    response_limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSessionSettings {
    ttl_hours: Option<u64>,
    sweep_interval_seconds: Option<u64>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(per_page) = overrides.pagination_per_page {
            self.pagination.per_page = Some(per_page);
        }
        if let Some(delta) = overrides.pagination_delta {
            self.pagination.delta = Some(delta);
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = Some(enabled);
        }
        if let Some(ttl) = overrides.cache_ttl_seconds {
            self.cache.ttl_seconds = Some(ttl);
        }
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(hours) = overrides.sessions_ttl_hours {
            self.sessions.ttl_hours = Some(hours);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            pagination,
            cache,
            uploads,
            sessions,
        } = raw;

        let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = server.port.unwrap_or(DEFAULT_PORT);
        let addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|err| LoadError::invalid("server.host", err.to_string()))?;

        let level = match logging.level {
            Some(level) => LevelFilter::from_str(&level)
                .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?,
            None => LevelFilter::INFO,
        };
        let format = if logging.json.unwrap_or(false) {
            LogFormat::Json
        } else {
            LogFormat::Compact
        };

        let max_connections = NonZeroU32::new(
            database.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        )
        .ok_or_else(|| {
            LoadError::invalid("database.max_connections", "must be greater than zero")
        })?;

        let per_page = NonZeroU32::new(pagination.per_page.unwrap_or(DEFAULT_PER_PAGE))
            .ok_or_else(|| LoadError::invalid("pagination.per_page", "must be greater than zero"))?;
        if per_page.get() > 100 {
            return Err(LoadError::invalid(
                "pagination.per_page",
                "must not exceed 100",
            ));
        }
        let delta = pagination.delta.unwrap_or(DEFAULT_PAGE_DELTA);

        let cache = CacheSettings {
            enabled: cache.enabled.unwrap_or(true),
            ttl_seconds: cache.ttl_seconds.unwrap_or(20),
            response_limit: cache.response_limit.unwrap_or(200),
        };

        let max_request_bytes = NonZeroU64::new(
            uploads
                .max_request_bytes
                .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES),
        )
        .ok_or_else(|| {
            LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
        })?;

        let ttl_hours = sessions.ttl_hours.unwrap_or(DEFAULT_SESSION_TTL_HOURS);
        if ttl_hours == 0 {
            return Err(LoadError::invalid(
                "sessions.ttl_hours",
                "must be greater than zero",
            ));
        }
        let sweep_interval_seconds = sessions
            .sweep_interval_seconds
            .unwrap_or(DEFAULT_SESSION_SWEEP_SECONDS)
            .max(1);

        Ok(Self {
            server: ServerSettings { addr },
            logging: LoggingSettings { level, format },
            database: DatabaseSettings {
                url: database.url,
                max_connections,
            },
            pagination: PaginationSettings { per_page, delta },
            cache,
            uploads: UploadSettings {
                directory: uploads
                    .directory
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR)),
                max_request_bytes,
            },
            sessions: SessionSettings {
                ttl: Duration::from_secs(ttl_hours * 3600),
                sweep_interval: Duration::from_secs(sweep_interval_seconds),
            },
        })
    }
}

impl From<&CacheSettings> for crate::cache::CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_seconds: settings.ttl_seconds,
            response_limit: settings.response_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let settings = Settings::from_raw(RawSettings::default()).expect("settings");
        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.pagination.per_page.get(), 10);
        assert_eq!(settings.pagination.delta, 5);
        assert!(settings.cache.enabled);
        assert_eq!(settings.cache.ttl_seconds, 20);
        assert_eq!(
            settings.sessions.ttl,
            Duration::from_secs(DEFAULT_SESSION_TTL_HOURS * 3600)
        );
    }

    #[test]
    fn serve_overrides_take_precedence() {
        let mut raw = RawSettings::default();
        raw.apply_serve_overrides(&ServeOverrides {
            server_port: Some(9000),
            pagination_per_page: Some(5),
            pagination_delta: Some(1),
            cache_enabled: Some(false),
            ..Default::default()
        });

        let settings = Settings::from_raw(raw).expect("settings");
        assert_eq!(settings.server.addr.port(), 9000);
        assert_eq!(settings.pagination.per_page.get(), 5);
        assert_eq!(settings.pagination.delta, 1);
        assert!(!settings.cache.enabled);
    }

    #[test]
    fn invalid_page_size_is_rejected() {
        let mut raw = RawSettings::default();
        raw.pagination.per_page = Some(0);
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key, .. }) if key == "pagination.per_page"
        ));

        let mut raw = RawSettings::default();
        raw.pagination.per_page = Some(500);
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut raw = RawSettings::default();
        raw.logging.level = Some("chatty".to_string());
        assert!(matches!(
            Settings::from_raw(raw),
            Err(LoadError::Invalid { key, .. }) if key == "logging.level"
        ));
    }
}
