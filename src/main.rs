mod api;
mod dao;
mod model;
mod service;

use std::thread;
use std::time::Duration;

use crate::api::endpoints::configure;
use crate::api::middleware::timing_middleware;
use crate::api::state::AppState;
use crate::dao::database::{connect, migrate};
use crate::dao::records::RecordsDao;
use crate::model::apperror::{ApplicationError, ErrorType};
use crate::model::config::{ApplicationArguments, Config, LoggingConfig};
use crate::service::records::RecordsService;

use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer, web};
use actix_web_prom::{PrometheusMetrics, PrometheusMetricsBuilder};
use clap::Parser;
use prometheus::IntGauge;
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/**
 * Starts the API: configuration, logging, database migration, then the HTTP server.
 */
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let args = ApplicationArguments::parse();

    let config = get_config(args.config_file.as_deref())?.apply_arguments(&args);

    init_tracing(&config.logging).map_err(|err| std::io::Error::other(format!("Failed to initialize logging: {err}")))?;

    let connection_pool = connect(&config.database).await.map_err(|err| std::io::Error::other(err.to_string()))?;
    migrate(&connection_pool).await.map_err(|err| std::io::Error::other(err.to_string()))?;

    let prometheus = PrometheusMetricsBuilder::new("")
        .endpoint("/metrics")
        .mask_unmatched_patterns("UNKNOWN")
        .build()
        .map_err(|err| std::io::Error::other(format!("Failed to create Prometheus metrics: {err}")))?;

    // Initialize custom metrics
    let max_connections_gauge = IntGauge::new("max_connections", "Connection pool maximum").map_err(|err| std::io::Error::other(format!("Failed to create max_connections gauge: {err}")))?;
    let min_connections_gauge = IntGauge::new("min_connections", "Connection pool minimum").map_err(|err| std::io::Error::other(format!("Failed to create min_connections gauge: {err}")))?;
    let active_connections_gauge = IntGauge::new("active_connections", "Connection pool active").map_err(|err| std::io::Error::other(format!("Failed to create active_connections gauge: {err}")))?;
    let idle_connections_gauge = IntGauge::new("idle_connections", "Connection pool idle").map_err(|err| std::io::Error::other(format!("Failed to create idle_connections gauge: {err}")))?;
    register_prometheus_metrics(&prometheus, &max_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &min_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &active_connections_gauge)?;
    register_prometheus_metrics(&prometheus, &idle_connections_gauge)?;

    gather_db_metrics(max_connections_gauge, min_connections_gauge, active_connections_gauge, idle_connections_gauge, connection_pool.clone());

    let records_service = RecordsService::new(RecordsDao::new(), connection_pool);
    let state = web::Data::new(AppState::new(records_service));

    info!("Starting server on {}:{} with {} workers", config.server.host, config.server.port, config.server.workers);

    HttpServer::new(move || App::new().wrap(from_fn(timing_middleware)).wrap(prometheus.clone()).app_data(state.clone()).configure(configure))
        .bind((config.server.host.as_str(), config.server.port))?
        .workers(config.server.workers)
        .run()
        .await
}

/**
 * Initializes logging for the application.
 *
 * #Arguments
 * `logging`: The logging configuration. `RUST_LOG` is honoured, configured directives are added on top.
 *
 * #Returns
 * A `Result` indicating success or failure.
 */
fn init_tracing(logging: &LoggingConfig) -> Result<(), ApplicationError> {
    let mut env_filter = EnvFilter::builder().with_default_directive(LevelFilter::INFO.into()).from_env_lossy();
    for directive in &logging.directives {
        let directive: Directive = directive.parse().map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid log directive {directive}: {err}")))?;
        env_filter = env_filter.add_directive(directive);
    }
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(logging.target)
        .with_thread_ids(logging.thread_ids)
        .with_thread_names(logging.thread_names)
        .with_line_number(logging.line_number)
        .with_level(logging.level)
        .with_ansi(logging.ansi)
        .with_file(logging.file);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to set subscriber: {err}")))
}

/**
 * Registers custom Prometheus metrics.
 *
 * #Arguments
 * `prometheus_metrics`: The Prometheus metrics instance to register the gauge with.
 * `gauge`: The gauge to register.
 */
fn register_prometheus_metrics(prometheus_metrics: &PrometheusMetrics, gauge: &IntGauge) -> Result<(), std::io::Error> {
    prometheus_metrics.registry.register(Box::new(gauge.clone())).map_err(|err| std::io::Error::other(format!("Failed to register Prometheus gauge: {err}")))?;
    Ok(())
}

/**
 * Gathers database metrics in a separate thread.
 *
 * #Arguments
 * `max_connections_gauge`: Gauge for maximum connections.
 * `min_connections_gauge`: Gauge for minimum connections.
 * `active_connections_gauge`: Gauge for active connections.
 * `idle_connections_gauge`: Gauge for idle connections.
 * `connection_pool`: The connection pool to gather metrics from.
 */
fn gather_db_metrics(max_connections_gauge: IntGauge, min_connections_gauge: IntGauge, active_connections_gauge: IntGauge, idle_connections_gauge: IntGauge, connection_pool: SqlitePool) {
    thread::spawn(move || {
        loop {
            max_connections_gauge.set(i64::from(connection_pool.options().get_max_connections()));
            min_connections_gauge.set(i64::from(connection_pool.options().get_min_connections()));
            active_connections_gauge.set(i64::from(connection_pool.size()));
            #[allow(clippy::cast_possible_wrap)]
            idle_connections_gauge.set(connection_pool.num_idle() as i64);
            thread::sleep(Duration::from_secs(1));
        }
    });
}

/**
 * Reads the configuration from the specified file, or returns defaults when no file is given.
 *
 * #Arguments
 * `config_file`: Optional path to the configuration file.
 *
 * #Returns
 * A `Result` containing the parsed `Config` or an `std::io::Error` if reading or parsing fails.
*/
fn get_config(config_file: Option<&str>) -> Result<Config, std::io::Error> {
    let Some(config_file) = config_file else {
        return Ok(Config::default());
    };
    let config_str: String = std::fs::read_to_string(config_file).map_err(|err| std::io::Error::other(format!("Failed to read config file: {err}")))?;
    Config::from_toml(&config_str).map_err(|err| std::io::Error::other(err.to_string()))
}
