use chrono::NaiveDate;
use sqlx::{Row, SqliteConnection};
use tracing::{Instrument, instrument};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{MonthlyRecord, PaginationInput},
};

/**
 * DAO for monthly record operations. Every method works on any table described by `MonthlyRecord`.
 */
pub struct RecordsDao {}

impl RecordsDao {
    /**
     * Creates a new instance of `RecordsDao`.
     *
     * # Returns
     * A new instance of `RecordsDao`.
     */
    pub fn new() -> Self {
        RecordsDao {}
    }

    /**
     * Retrieves a page of records ordered by insertion.
     *
     * # Arguments
     * `connection`: The database connection.
     * `pagination_input`: `PaginationInput` containing skip and limit.
     *
     * # Returns
     * A Result containing at most `limit` records or an `ApplicationError`.
     */
    #[instrument(skip(self, connection), fields(record = R::NAME))]
    pub async fn get_list<R: MonthlyRecord>(&self, connection: &mut SqliteConnection, pagination_input: PaginationInput) -> Result<Vec<R>, ApplicationError> {
        let span = tracing::Span::current();
        let rows = sqlx::query(R::QUERY_LIST)
            .bind(pagination_input.limit)
            .bind(pagination_input.skip)
            .fetch_all(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get {} list: {err}", R::NAME)))?;
        rows.iter().map(R::from_row).collect()
    }

    /**
     * Retrieves the record for a month.
     *
     * # Arguments
     * `connection`: The database connection.
     * `month`: The month to look up.
     *
     * # Returns
     * The record, or a `NotFound` error if no record exists for the month.
     */
    #[instrument(skip(self, connection), fields(record = R::NAME))]
    pub async fn get_by_month<R: MonthlyRecord>(&self, connection: &mut SqliteConnection, month: NaiveDate) -> Result<R, ApplicationError> {
        let span = tracing::Span::current();
        let row = sqlx::query(R::QUERY_BY_MONTH)
            .bind(month)
            .fetch_optional(connection)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to get {}: {err}", R::NAME)))?;
        let Some(row) = row else {
            tracing::debug!("{} for month {} not found", R::NAME, month);
            return Err(ApplicationError::new(ErrorType::NotFound, format!("{} not found", R::NAME)));
        };
        R::from_row(&row)
    }

    /**
     * Adds a new record.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `input`: The values of the record to be added.
     *
     * # Returns
     * The stored record including its assigned id. A record for the same month yields a `ConstraintViolation`.
     */
    #[instrument(skip(self, transaction), fields(record = R::NAME))]
    pub async fn add<R: MonthlyRecord>(&self, transaction: &mut SqliteConnection, input: &R::Input) -> Result<R, ApplicationError> {
        let span = tracing::Span::current();
        let month = R::month(input);
        let row = R::bind_values(sqlx::query(R::INSERT), input)
            .bind(month)
            .fetch_one(&mut *transaction)
            .instrument(span.clone())
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        let id: i64 = row.try_get("id").map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to read id of new {}: {err}", R::NAME)))?;
        tracing::debug!("{} for month {} stored with id {}", R::NAME, month, id);
        self.get_by_month::<R>(transaction, month).instrument(span).await
    }

    /**
     * Replaces every value of the record for the month.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `input`: The new values, including the month that selects the record.
     *
     * # Returns
     * The updated record, or a `NotFound` error if no record exists for the month.
     */
    #[instrument(skip(self, transaction), fields(record = R::NAME))]
    pub async fn update<R: MonthlyRecord>(&self, transaction: &mut SqliteConnection, input: &R::Input) -> Result<R, ApplicationError> {
        let span = tracing::Span::current();
        let month = R::month(input);
        let result = R::bind_values(sqlx::query(R::UPDATE), input)
            .bind(month)
            .execute(&mut *transaction)
            .instrument(span.clone())
            .await
            .map_err(|err| Self::handle_database_error(err.as_database_error()))?;
        if result.rows_affected() == 0 {
            tracing::debug!("{} for month {} not found for update", R::NAME, month);
            return Err(ApplicationError::new(ErrorType::NotFound, format!("{} not found", R::NAME)));
        }
        self.get_by_month::<R>(transaction, month).instrument(span).await
    }

    /**
     * Deletes the record for the month.
     *
     * # Arguments
     * `transaction`: The database transaction to execute the query within.
     * `month`: The month of the record to delete.
     *
     * # Returns
     * A result indicating success, or a `NotFound` error if no record exists for the month.
     */
    #[instrument(skip(self, transaction), fields(record = R::NAME))]
    pub async fn delete<R: MonthlyRecord>(&self, transaction: &mut SqliteConnection, month: NaiveDate) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(R::DELETE)
            .bind(month)
            .execute(transaction)
            .instrument(span)
            .await
            .map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to execute query to delete {}: {err}", R::NAME)))?;
        if result.rows_affected() == 0 {
            tracing::debug!("{} for month {} not found for deletion", R::NAME, month);
            return Err(ApplicationError::new(ErrorType::NotFound, format!("{} not found", R::NAME)));
        }
        Ok(())
    }

    /**
     * Handles database errors and maps them to application errors.
     *
     * # Arguments
     * `error`: The database error to handle.
     *
     * # Returns
     * An `ApplicationError` corresponding to the database error.
     */
    fn handle_database_error(error: Option<&dyn sqlx::error::DatabaseError>) -> ApplicationError {
        if let Some(db_error) = error {
            tracing::debug!("Database error: {}", db_error);
            tracing::info!("Add/Update error: {:?}", db_error.code());
            if db_error.is_unique_violation() {
                return ApplicationError::new(ErrorType::ConstraintViolation, "Already exists".to_string());
            }
            tracing::error!("Unhandled database error: {}", db_error);
            return ApplicationError::new(ErrorType::DatabaseError, "Unhandled database error".to_string());
        }
        ApplicationError::new(ErrorType::DatabaseError, "Failed to execute database operation".to_string())
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use sqlx::SqlitePool;

    use super::*;
    use crate::{
        dao::database::{connect, migrate},
        model::{
            config::Database,
            models::{IncomeInputType, IncomeRecord, MortalityInputType, MortalityRecord, TufeInputType, TufeRecord},
        },
    };

    async fn init_db() -> SqlitePool {
        let pool = connect(&Database { connection_string: "sqlite::memory:".to_string(), max_connections: 1, ..Database::default() }).await.unwrap();
        migrate(&pool).await.unwrap();
        pool
    }

    fn month(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    fn tufe_input(month: NaiveDate) -> TufeInputType {
        TufeInputType {
            month,
            general_tufe: Decimal::new(12345, 2),
            general_tufe_change_rate: Decimal::new(312, 2),
            health: Some(Decimal::new(10150, 2)),
            energy: Some(Decimal::new(9870, 2)),
            food_and_non_alcoholic_beverages: None,
            communication: None,
            transportation: Some(Decimal::new(11000, 2)),
        }
    }

    #[tokio::test]
    async fn test_add_then_get_tufe() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let input = tufe_input(month(2024, 1));
        let added = dao.add::<TufeRecord>(&mut connection, &input).await.unwrap();
        assert!(added.id > 0);
        let fetched: TufeRecord = dao.get_by_month(&mut connection, input.month).await.unwrap();
        assert_eq!(added, fetched);
        assert_eq!(fetched.general_tufe, input.general_tufe);
        assert_eq!(fetched.health, input.health);
        assert_eq!(fetched.food_and_non_alcoholic_beverages, None);
    }

    #[tokio::test]
    async fn test_add_duplicate_month() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let input = tufe_input(month(2024, 1));
        let first = dao.add::<TufeRecord>(&mut connection, &input).await.unwrap();
        let second = dao.add::<TufeRecord>(&mut connection, &TufeInputType { general_tufe: Decimal::ONE, ..input.clone() }).await;
        assert_eq!(second.unwrap_err().error_type, ErrorType::ConstraintViolation);
        let stored: TufeRecord = dao.get_by_month(&mut connection, input.month).await.unwrap();
        assert_eq!(stored, first);
    }

    #[tokio::test]
    async fn test_get_missing_month() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let result = dao.get_by_month::<IncomeRecord>(&mut connection, month(2020, 5)).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_update_replaces_all_values() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let input = tufe_input(month(2024, 2));
        let added = dao.add::<TufeRecord>(&mut connection, &input).await.unwrap();
        let replacement = TufeInputType { general_tufe: Decimal::new(20000, 2), health: None, energy: None, transportation: None, ..input };
        let updated = dao.update::<TufeRecord>(&mut connection, &replacement).await.unwrap();
        assert_eq!(updated.id, added.id);
        assert_eq!(updated.general_tufe, Decimal::new(20000, 2));
        assert_eq!(updated.health, None);
        assert_eq!(updated.transportation, None);
    }

    #[tokio::test]
    async fn test_update_missing_month() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let result = dao.update::<MortalityRecord>(&mut connection, &MortalityInputType { month: month(2024, 3), mortality_count: 10 }).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let input = MortalityInputType { month: month(2024, 4), mortality_count: 321 };
        dao.add::<MortalityRecord>(&mut connection, &input).await.unwrap();
        assert!(dao.delete::<MortalityRecord>(&mut connection, input.month).await.is_ok());
        assert_eq!(dao.get_by_month::<MortalityRecord>(&mut connection, input.month).await.unwrap_err().error_type, ErrorType::NotFound);
        assert_eq!(dao.delete::<MortalityRecord>(&mut connection, input.month).await.unwrap_err().error_type, ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_list_empty() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let records = dao.get_list::<IncomeRecord>(&mut connection, PaginationInput::default()).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_list_skip_and_limit_in_insertion_order() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        for month_number in [5, 1, 3, 2, 4] {
            let input = IncomeInputType { month: month(2023, month_number), average_income: Decimal::new(i64::from(month_number) * 1000, 0) };
            dao.add::<IncomeRecord>(&mut connection, &input).await.unwrap();
        }
        let records = dao.get_list::<IncomeRecord>(&mut connection, PaginationInput { skip: 1, limit: 3 }).await.unwrap();
        let months: Vec<NaiveDate> = records.iter().map(|record| record.month).collect();
        assert_eq!(months, vec![month(2023, 1), month(2023, 3), month(2023, 2)]);
        let records = dao.get_list::<IncomeRecord>(&mut connection, PaginationInput { skip: 4, limit: 10 }).await.unwrap();
        assert_eq!(records.len(), 1);
        let records = dao.get_list::<IncomeRecord>(&mut connection, PaginationInput { skip: 10, limit: 10 }).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let pool = init_db().await;
        let dao = RecordsDao::new();
        let mut connection = pool.acquire().await.unwrap();
        let input = MortalityInputType { month: month(2022, 1), mortality_count: 1 };
        let first = dao.add::<MortalityRecord>(&mut connection, &input).await.unwrap();
        dao.delete::<MortalityRecord>(&mut connection, input.month).await.unwrap();
        let second = dao.add::<MortalityRecord>(&mut connection, &input).await.unwrap();
        assert!(second.id > first.id);
    }
}
