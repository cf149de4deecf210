use clap::Parser;
use serde::{Deserialize, Serialize};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Default location of the database when nothing else is configured.
 */
pub const DEFAULT_CONNECTION_STRING: &str = "sqlite://data/database.sqlite";

/**
 * Command-line arguments for the application.
 */
#[derive(Parser, Debug, Default)]
#[command(version, about, long_about = None)]
pub struct ApplicationArguments {
    /**
     * Path to the configuration file. Defaults are used when omitted.
     */
    #[arg(short, long)]
    pub config_file: Option<String>,
    /**
     * Database location. Takes precedence over the configuration file.
     */
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,
    /**
     * Host to bind the server to.
     */
    #[arg(long)]
    pub host: Option<String>,
    /**
     * Port to bind the server to.
     */
    #[arg(short, long)]
    pub port: Option<u16>,
}

/**
 * Represents the configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /**
     * Logging configuration for the application.
     */
    pub logging: LoggingConfig,
    /**
     * Server configuration for the application.
     */
    pub server: Server,
    /**
     * Database configuration for the application.
     */
    pub database: Database,
}

impl Config {
    /**
     * Parses the configuration from a TOML string.
     *
     * #Arguments
     * `contents`: The TOML document.
     *
     * #Returns
     * The parsed configuration or an `ApplicationError` if parsing fails.
     */
    pub fn from_toml(contents: &str) -> Result<Self, ApplicationError> {
        toml::from_str(contents).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to parse config file: {err}")))
    }

    /**
     * Applies command line and environment overrides on top of the file configuration.
     *
     * #Arguments
     * `args`: The parsed application arguments.
     */
    pub fn apply_arguments(mut self, args: &ApplicationArguments) -> Self {
        if let Some(database_url) = &args.database_url {
            self.database.connection_string.clone_from(database_url);
        }
        if let Some(host) = &args.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = args.port {
            self.server.port = port;
        }
        self
    }
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    /**
     * Whether to log the target of the log message.
     */
    pub target: bool,
    /**
     * Whether to log thread IDs .
     */
    pub thread_ids: bool,
    /**
     * Whether to log thread names.
     */
    pub thread_names: bool,
    /**
     * Whether to log line numbers.
     */
    pub line_number: bool,
    /**
     * Whether to log the log level.
     */
    pub level: bool,
    /**
     * Whether to use ANSI colors in logs.
     */
    pub ansi: bool,
    /**
     * Whether to log the source file.
     */
    pub file: bool,
    /**
     * Additional directives for logging configuration, e.g. `tufe_api=debug`.
     */
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { target: true, thread_ids: false, thread_names: false, line_number: false, level: true, ansi: true, file: false, directives: vec![] }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Database {
    /**
     * SQLite connection string, e.g. `sqlite://data/database.sqlite`.
     */
    pub connection_string: String,
    /**
     * Maximum number of pooled connections.
     */
    pub max_connections: u32,
    /**
     * Minimum number of pooled connections.
     */
    pub min_connections: u32,
    /**
     * Milliseconds to wait for a connection before failing.
     */
    pub acquire_timeout: u64,
    /**
     * Milliseconds an idle connection is kept.
     */
    pub idle_timeout: u64,
}

impl Default for Database {
    fn default() -> Self {
        Database { connection_string: DEFAULT_CONNECTION_STRING.to_string(), max_connections: 5, min_connections: 1, acquire_timeout: 30_000, idle_timeout: 300_000 }
    }
}

/**
 * Represents the server configuration for the application.
 */
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Server {
    /**
     * Host the server binds to.
     */
    pub host: String,
    /**
     * HTTP port for the server.
     */
    pub port: u16,
    /**
     * Number of worker threads for the server.
     */
    pub workers: usize,
}

impl Default for Server {
    fn default() -> Self {
        Server { host: "127.0.0.1".to_string(), port: 8000, workers: 4 }
    }
}
