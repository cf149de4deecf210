use chrono::NaiveDate;
use sqlx::{Sqlite, SqlitePool, Transaction, pool::PoolConnection};

use crate::{
    dao::records::RecordsDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{MonthlyRecord, PaginationInput},
    },
};

/**
 * Represents the service for managing monthly records.
 */
pub struct RecordsService {
    /**
     * The DAO for record operations.
     */
    records_dao: RecordsDao,
    /**
     * Connection pool for database operations.
     */
    connection_pool: SqlitePool,
}

impl RecordsService {
    /**
     * Creates a new instance of `RecordsService`.
     *
     * # Arguments
     * `records_dao`: The DAO for record operations.
     * `connection_pool`: Connection pool for database operations.
     *
     * # Returns
     * A new instance of `RecordsService`.
     */
    pub fn new(records_dao: RecordsDao, connection_pool: SqlitePool) -> Self {
        RecordsService { records_dao, connection_pool }
    }

    /**
     * Retrieves a page of records.
     *
     * # Arguments
     * `pagination_input`: `PaginationInput` containing skip and limit.
     *
     * # Returns
     * A Result containing the records or an `ApplicationError`.
     */
    pub async fn get_list<R: MonthlyRecord>(&self, pagination_input: PaginationInput) -> Result<Vec<R>, ApplicationError> {
        let mut connection = self.acquire().await?;
        self.records_dao.get_list::<R>(&mut connection, pagination_input).await
    }

    /**
     * Retrieves the record for a month.
     *
     * # Arguments
     * `month`: The month to look up.
     *
     * # Returns
     * A Result containing the record or an `ApplicationError`.
     */
    pub async fn get<R: MonthlyRecord>(&self, month: NaiveDate) -> Result<R, ApplicationError> {
        let mut connection = self.acquire().await?;
        self.records_dao.get_by_month::<R>(&mut connection, month).await
    }

    /**
     * Adds a new record.
     *
     * # Arguments
     * `input`: The validated values of the record.
     *
     * # Returns
     * A Result containing the stored record or an `ApplicationError`.
     */
    pub async fn add<R: MonthlyRecord>(&self, input: R::Input) -> Result<R, ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.records_dao.add::<R>(&mut transaction, &input).await;
        Self::finish(transaction, result).await
    }

    /**
     * Replaces the values of the record for the month of the input.
     *
     * # Arguments
     * `input`: The validated values of the record.
     *
     * # Returns
     * A Result containing the updated record or an `ApplicationError`.
     */
    pub async fn update<R: MonthlyRecord>(&self, input: R::Input) -> Result<R, ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.records_dao.update::<R>(&mut transaction, &input).await;
        Self::finish(transaction, result).await
    }

    /**
     * Deletes the record for a month.
     *
     * # Arguments
     * `month`: The month of the record to delete.
     *
     * # Returns
     * A Result indicating success or an `ApplicationError`.
     */
    pub async fn delete<R: MonthlyRecord>(&self, month: NaiveDate) -> Result<(), ApplicationError> {
        let mut transaction = self.begin().await?;
        let result = self.records_dao.delete::<R>(&mut transaction, month).await;
        Self::finish(transaction, result).await
    }

    async fn acquire(&self) -> Result<PoolConnection<Sqlite>, ApplicationError> {
        self.connection_pool.acquire().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to acquire connection: {err}")))
    }

    async fn begin(&self) -> Result<Transaction<'static, Sqlite>, ApplicationError> {
        self.connection_pool.begin().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to begin transaction: {err}")))
    }

    /**
     * Commits the transaction when the operation succeeded, otherwise rolls it back.
     */
    async fn finish<T>(transaction: Transaction<'static, Sqlite>, result: Result<T, ApplicationError>) -> Result<T, ApplicationError> {
        match result {
            Ok(value) => {
                transaction.commit().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to commit transaction: {err}")))?;
                Ok(value)
            }
            Err(err) => {
                transaction.rollback().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to rollback transaction: {err}")))?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        dao::database::{connect, migrate},
        model::{
            config::Database,
            models::{IncomeInputType, IncomeRecord, MortalityInputType, MortalityRecord},
        },
    };

    async fn init_service() -> RecordsService {
        let pool = connect(&Database { connection_string: "sqlite::memory:".to_string(), max_connections: 1, ..Database::default() }).await.unwrap();
        migrate(&pool).await.unwrap();
        RecordsService::new(RecordsDao::new(), pool)
    }

    fn month(year: i32, month: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, 1).unwrap()
    }

    #[tokio::test]
    async fn test_add_commits() {
        let service = init_service().await;
        let input = IncomeInputType { month: month(2024, 1), average_income: Decimal::new(1750050, 2) };
        let added = service.add::<IncomeRecord>(input.clone()).await.unwrap();
        let fetched: IncomeRecord = service.get(input.month).await.unwrap();
        assert_eq!(added, fetched);
        assert_eq!(fetched.average_income, Decimal::new(1750050, 2));
    }

    #[tokio::test]
    async fn test_failed_add_rolls_back() {
        let service = init_service().await;
        let input = IncomeInputType { month: month(2024, 1), average_income: Decimal::new(100, 0) };
        service.add::<IncomeRecord>(input.clone()).await.unwrap();
        let result = service.add::<IncomeRecord>(IncomeInputType { average_income: Decimal::new(200, 0), ..input.clone() }).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::ConstraintViolation);
        let records = service.get_list::<IncomeRecord>(PaginationInput::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].average_income, Decimal::new(100, 0));
    }

    #[tokio::test]
    async fn test_update_then_get() {
        let service = init_service().await;
        let input = MortalityInputType { month: month(2024, 6), mortality_count: 1200 };
        service.add::<MortalityRecord>(input.clone()).await.unwrap();
        let updated = service.update::<MortalityRecord>(MortalityInputType { mortality_count: 1300, ..input.clone() }).await.unwrap();
        assert_eq!(updated.mortality_count, 1300);
        let fetched: MortalityRecord = service.get(input.month).await.unwrap();
        assert_eq!(fetched.mortality_count, 1300);
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let service = init_service().await;
        let result = service.delete::<MortalityRecord>(month(1999, 1)).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_for_same_month() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database { connection_string: format!("sqlite://{}", dir.path().join("db.sqlite").display()), max_connections: 8, ..Database::default() };
        let pool = connect(&database).await.unwrap();
        migrate(&pool).await.unwrap();
        let service = Arc::new(RecordsService::new(RecordsDao::new(), pool.clone()));

        let handles: Vec<_> = (0..16)
            .map(|index| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.add::<IncomeRecord>(IncomeInputType { month: month(2024, 1), average_income: Decimal::new(index, 0) }).await })
            })
            .collect();
        let mut added = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => added += 1,
                Err(err) => {
                    assert_eq!(err.error_type, ErrorType::ConstraintViolation);
                    conflicts += 1;
                }
            }
        }
        assert_eq!(added, 1);
        assert_eq!(conflicts, 15);
        let records = service.get_list::<IncomeRecord>(PaginationInput::default()).await.unwrap();
        assert_eq!(records.len(), 1);
        pool.close().await;
    }

    #[tokio::test]
    async fn test_tables_are_independent() {
        let service = init_service().await;
        service.add::<MortalityRecord>(MortalityInputType { month: month(2024, 1), mortality_count: 5 }).await.unwrap();
        let result = service.get::<IncomeRecord>(month(2024, 1)).await;
        assert_eq!(result.unwrap_err().error_type, ErrorType::NotFound);
    }
}
