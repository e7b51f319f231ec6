//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, RecacheArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "recache";
const ENV_PREFIX: &str = "RECACHE";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PUBLIC_PORT: u16 = 3000;
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_HTTP_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_DB_JOBS_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_JOB_RECACHE_IDIOM_CONCURRENCY: u32 = 2;
const DEFAULT_JOB_RECACHE_IMPL_CONCURRENCY: u32 = 4;
const DEFAULT_JOB_RECACHE_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_CACHE_FRESHNESS_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CACHE_REFRESH_SKEW_SECS: u64 = 10 * 60;
const MAX_CACHE_FRESHNESS_TTL_SECS: u64 = 30 * 24 * 60 * 60;
const MAX_CACHE_REFRESH_SKEW_SECS: u64 = 24 * 60 * 60;
const DEFAULT_CACHE_COMPRESSION_LEVEL: u32 = 6;
const DEFAULT_CACHE_MEMORY_CAPACITY: u64 = 10_000;
const DEFAULT_CACHE_ITEM_SIZE_LIMIT_BYTES: u64 = 1024 * 1024;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub jobs: JobsSettings,
    pub cache: CacheSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
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
    pub http_max_connections: NonZeroU32,
    pub jobs_max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub recache_idiom_concurrency: NonZeroU32,
    pub recache_impl_concurrency: NonZeroU32,
    pub recache_max_attempts: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Lifetime of a freshly written page.
    pub freshness_ttl: Duration,
    /// Added to the freshness window when scheduling the keep-warm job.
    pub refresh_skew: Duration,
    pub compress_pages: bool,
    pub compression_level: u32,
    pub memory_capacity: NonZeroUsize,
    pub item_size_limit_bytes: NonZeroUsize,
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

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Recache(args)) => raw.apply_database_override(&args.database),
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
    jobs: RawJobsSettings,
    cache: RawCacheSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.public_port {
            self.server.public_port = Some(port);
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
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
        if let Some(max) = overrides.database_http_max_connections {
            self.database.http_max_connections = Some(max);
        }
        if let Some(max) = overrides.database_jobs_max_connections {
            self.database.jobs_max_connections = Some(max);
        }
        if let Some(value) = overrides.jobs_recache_idiom_concurrency {
            self.jobs.recache_idiom_concurrency = Some(value);
        }
        if let Some(value) = overrides.jobs_recache_impl_concurrency {
            self.jobs.recache_impl_concurrency = Some(value);
        }
        if let Some(value) = overrides.cache_compress_pages {
            self.cache.compress_pages = Some(value);
        }
        if let Some(value) = overrides.cache_memory_capacity {
            self.cache.memory_capacity = Some(value);
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
            jobs,
            cache,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let jobs = build_jobs_settings(jobs)?;
        let cache = build_cache_settings(cache)?;

        Ok(Self {
            server,
            logging,
            database,
            jobs,
            cache,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let public_port = server.public_port.unwrap_or(DEFAULT_PUBLIC_PORT);
    if public_port == 0 {
        return Err(LoadError::invalid(
            "server.public_port",
            "port must be greater than zero",
        ));
    }
    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }
    if admin_port == public_port {
        return Err(LoadError::invalid(
            "server.admin_port",
            "must differ from server.public_port",
        ));
    }

    let public_addr = parse_socket_addr(&host, public_port)
        .map_err(|reason| LoadError::invalid("server.public_addr", reason))?;
    let admin_addr = parse_socket_addr(&host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let http_value = database
        .http_max_connections
        .unwrap_or(DEFAULT_DB_HTTP_MAX_CONNECTIONS);
    let jobs_value = database
        .jobs_max_connections
        .unwrap_or(DEFAULT_DB_JOBS_MAX_CONNECTIONS);

    Ok(DatabaseSettings {
        url,
        http_max_connections: non_zero_u32(http_value.into(), "database.http_max_connections")?,
        jobs_max_connections: non_zero_u32(jobs_value.into(), "database.jobs_max_connections")?,
    })
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let idiom = jobs
        .recache_idiom_concurrency
        .unwrap_or(DEFAULT_JOB_RECACHE_IDIOM_CONCURRENCY);
    let imp = jobs
        .recache_impl_concurrency
        .unwrap_or(DEFAULT_JOB_RECACHE_IMPL_CONCURRENCY);
    let attempts = jobs
        .recache_max_attempts
        .unwrap_or(DEFAULT_JOB_RECACHE_MAX_ATTEMPTS);
    if attempts > i32::MAX as u32 {
        return Err(LoadError::invalid(
            "jobs.recache_max_attempts",
            "value exceeds supported range for i32",
        ));
    }

    Ok(JobsSettings {
        recache_idiom_concurrency: non_zero_u32(idiom.into(), "jobs.recache_idiom_concurrency")?,
        recache_impl_concurrency: non_zero_u32(imp.into(), "jobs.recache_impl_concurrency")?,
        recache_max_attempts: non_zero_u32(attempts.into(), "jobs.recache_max_attempts")?,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let ttl_secs = cache
        .freshness_ttl_seconds
        .unwrap_or(DEFAULT_CACHE_FRESHNESS_TTL_SECS);
    if ttl_secs == 0 || ttl_secs > MAX_CACHE_FRESHNESS_TTL_SECS {
        return Err(LoadError::invalid(
            "cache.freshness_ttl_seconds",
            format!("must be between 1 and {MAX_CACHE_FRESHNESS_TTL_SECS}"),
        ));
    }
    let skew_secs = cache
        .refresh_skew_seconds
        .unwrap_or(DEFAULT_CACHE_REFRESH_SKEW_SECS);
    if skew_secs > MAX_CACHE_REFRESH_SKEW_SECS {
        return Err(LoadError::invalid(
            "cache.refresh_skew_seconds",
            format!("must be at most {MAX_CACHE_REFRESH_SKEW_SECS}"),
        ));
    }

    let compression_level = cache
        .compression_level
        .unwrap_or(DEFAULT_CACHE_COMPRESSION_LEVEL);
    if compression_level > 9 {
        return Err(LoadError::invalid(
            "cache.compression_level",
            "must be between 0 and 9",
        ));
    }

    let memory_capacity = non_zero_usize(
        cache
            .memory_capacity
            .unwrap_or(DEFAULT_CACHE_MEMORY_CAPACITY),
        "cache.memory_capacity",
    )?;
    let item_size_limit_bytes = non_zero_usize(
        cache
            .item_size_limit_bytes
            .unwrap_or(DEFAULT_CACHE_ITEM_SIZE_LIMIT_BYTES),
        "cache.item_size_limit_bytes",
    )?;

    Ok(CacheSettings {
        freshness_ttl: Duration::from_secs(ttl_secs),
        refresh_skew: Duration::from_secs(skew_secs),
        compress_pages: cache.compress_pages.unwrap_or(false),
        compression_level,
        memory_capacity,
        item_size_limit_bytes,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    public_port: Option<u16>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
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
    http_max_connections: Option<u32>,
    jobs_max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    recache_idiom_concurrency: Option<u32>,
    recache_impl_concurrency: Option<u32>,
    recache_max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    freshness_ttl_seconds: Option<u64>,
    refresh_skew_seconds: Option<u64>,
    compress_pages: Option<bool>,
    compression_level: Option<u32>,
    memory_capacity: Option<u64>,
    item_size_limit_bytes: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
