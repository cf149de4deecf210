use std::{path::Path, str::FromStr, time::Duration};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::{info, instrument};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    config::Database,
};

/**
 * Creates the connection pool for the configured SQLite database.
 *
 * The database file and its directory are created when missing.
 *
 * # Arguments
 * `database`: The database configuration.
 *
 * # Returns
 * The connection pool or an `ApplicationError` if the database cannot be opened.
 */
#[instrument(skip(database), fields(connection_string = %database.connection_string))]
pub async fn connect(database: &Database) -> Result<SqlitePool, ApplicationError> {
    let options = SqliteConnectOptions::from_str(&database.connection_string)
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid connection string: {err}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);
    create_parent_directory(options.get_filename())?;
    let pool = SqlitePoolOptions::new()
        .max_connections(database.max_connections)
        .min_connections(database.min_connections)
        .acquire_timeout(Duration::from_millis(database.acquire_timeout))
        .idle_timeout(Duration::from_millis(database.idle_timeout))
        .connect_with(options)
        .await
        .map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create database pool: {err}")))?;
    info!("Database pool created");
    Ok(pool)
}

/**
 * Creates the record tables if they do not exist. Safe to run on every start.
 *
 * # Arguments
 * `pool`: The connection pool to migrate.
 */
#[instrument(skip(pool))]
pub async fn migrate(pool: &SqlitePool) -> Result<(), ApplicationError> {
    sqlx::migrate!("./migrations").run(pool).await.map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to run database migrations: {err}")))?;
    info!("Database migrations applied");
    Ok(())
}

fn create_parent_directory(filename: &Path) -> Result<(), ApplicationError> {
    let Some(parent) = filename.parent().filter(|parent| !parent.as_os_str().is_empty()) else {
        return Ok(());
    };
    std::fs::create_dir_all(parent).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Failed to create database directory {}: {err}", parent.display())))
}

#[cfg(test)]
mod test {
    use super::*;

    fn memory_database() -> Database {
        Database { connection_string: "sqlite::memory:".to_string(), max_connections: 1, ..Database::default() }
    }

    #[tokio::test]
    async fn test_migrate_creates_tables() {
        let pool = connect(&memory_database()).await.unwrap();
        migrate(&pool).await.unwrap();
        let tables: Vec<(String,)> = sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite%' AND name <> '_sqlx_migrations' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
        let names: Vec<String> = tables.into_iter().map(|(name,)| name).collect();
        assert_eq!(names, vec!["heart_disease_mortalities", "income", "tufe_records"]);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let pool = connect(&memory_database()).await.unwrap();
        migrate(&pool).await.unwrap();
        assert!(migrate(&pool).await.is_ok());
    }

    #[tokio::test]
    async fn test_connect_creates_directory_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.sqlite");
        let database = Database { connection_string: format!("sqlite://{}", path.display()), ..Database::default() };
        let pool = connect(&database).await.unwrap();
        migrate(&pool).await.unwrap();
        assert!(path.parent().unwrap().is_dir());
        assert!(path.is_file());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_reconnect_keeps_tables() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database { connection_string: format!("sqlite://{}", dir.path().join("db.sqlite").display()), ..Database::default() };
        let pool = connect(&database).await.unwrap();
        migrate(&pool).await.unwrap();
        sqlx::query("INSERT INTO income (average_income, month) VALUES ('10.5', '2024-01-01')").execute(&pool).await.unwrap();
        pool.close().await;

        let pool = connect(&database).await.unwrap();
        migrate(&pool).await.unwrap();
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM income").fetch_one(&pool).await.unwrap();
        assert_eq!(count, 1);
        pool.close().await;
    }
}
