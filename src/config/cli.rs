use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the recache binary.
#[derive(Debug, Parser)]
#[command(
    name = "recache",
    version,
    about = "Rendered idiom page cache with background regeneration"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "RECACHE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the public and admin HTTP services together with the job workers.
    Serve(Box<ServeArgs>),
    /// Ask a running server to drop the cached pages of one idiom and schedule their regeneration.
    Recache(RecacheArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct RecacheArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Identifier of the idiom whose pages should be refreshed.
    #[arg(value_name = "IDIOM_ID")]
    pub idiom_id: i32,

    /// Base URL of the server's admin listener. Defaults to the configured admin address.
    #[arg(long = "admin-url", env = "RECACHE_ADMIN_URL", value_name = "URL")]
    pub admin_url: Option<String>,

    /// Submit the refresh jobs straight to the queue instead of calling the admin API.
    /// No server cache is evicted; stale pages are replaced once the jobs run.
    #[arg(long, action = clap::ArgAction::SetTrue, conflicts_with = "admin_url")]
    pub direct: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the public listener port.
    #[arg(long = "server-public-port", value_name = "PORT")]
    pub public_port: Option<u16>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

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

    /// Override the HTTP database pool size.
    #[arg(long = "database-http-max-connections", value_name = "COUNT")]
    pub database_http_max_connections: Option<u32>,

    /// Override the jobs database pool size.
    #[arg(long = "database-jobs-max-connections", value_name = "COUNT")]
    pub database_jobs_max_connections: Option<u32>,

    /// Override the idiom regeneration worker concurrency.
    #[arg(long = "jobs-recache-idiom-concurrency", value_name = "COUNT")]
    pub jobs_recache_idiom_concurrency: Option<u32>,

    /// Override the implementation regeneration worker concurrency.
    #[arg(long = "jobs-recache-impl-concurrency", value_name = "COUNT")]
    pub jobs_recache_impl_concurrency: Option<u32>,

    /// Toggle gzip compression of cached pages.
    #[arg(
        long = "cache-compress-pages",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub cache_compress_pages: Option<bool>,

    /// Override the in-memory cache capacity, in entries.
    #[arg(long = "cache-memory-capacity", value_name = "COUNT")]
    pub cache_memory_capacity: Option<u64>,
}
