use std::{fmt::Debug, str::FromStr};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{
    Row, Sqlite,
    query::Query,
    sqlite::{SqliteArguments, SqliteRow},
};

use crate::model::apperror::{ApplicationError, ErrorType};

/**
 * Date format used for months on the wire and in the database.
 */
pub const MONTH_FORMAT: &str = "%Y-%m-%d";

/**
 * Default number of rows skipped when listing.
 */
pub const DEFAULT_SKIP: i64 = 0;

/**
 * Default number of rows returned when listing.
 */
pub const DEFAULT_LIMIT: i64 = 10;

/**
 * Query type all record statements are built from.
 */
pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/**
 * Describes a table of records keyed by month.
 *
 * Statements bind the value columns first and the month last, so the same
 * binding works for both insert and update.
 */
pub trait MonthlyRecord: Sized + Send + Unpin + 'static {
    /**
     * Validated values of a record, without the surrogate id.
     */
    type Input: Debug + Send + Sync + 'static;

    /**
     * Human readable name used in messages, e.g. `TUFE record`.
     */
    const NAME: &'static str;
    /**
     * Lists rows ordered by id. Binds limit then offset.
     */
    const QUERY_LIST: &'static str;
    /**
     * Selects a single row by month.
     */
    const QUERY_BY_MONTH: &'static str;
    /**
     * Inserts a row and returns the assigned id.
     */
    const INSERT: &'static str;
    /**
     * Replaces every value column of the row with the given month.
     */
    const UPDATE: &'static str;
    /**
     * Deletes the row with the given month.
     */
    const DELETE: &'static str;

    /**
     * The month the input refers to.
     */
    fn month(input: &Self::Input) -> NaiveDate;

    /**
     * Binds the value columns of the input, in statement order.
     */
    fn bind_values<'q>(query: SqliteQuery<'q>, input: &'q Self::Input) -> SqliteQuery<'q>;

    /**
     * Maps a database row to the record.
     */
    fn from_row(row: &SqliteRow) -> Result<Self, ApplicationError>;
}

/***************** Price index *********************/

/**
 * A monthly consumer price index (TUFE) snapshot.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TufeRecord {
    pub id: i64,
    pub month: NaiveDate,
    pub general_tufe: Decimal,
    pub general_tufe_change_rate: Decimal,
    pub health: Option<Decimal>,
    pub energy: Option<Decimal>,
    pub food_and_non_alcoholic_beverages: Option<Decimal>,
    pub communication: Option<Decimal>,
    pub transportation: Option<Decimal>,
}

/**
 * Validated values for creating or replacing a price index record.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct TufeInputType {
    pub month: NaiveDate,
    pub general_tufe: Decimal,
    pub general_tufe_change_rate: Decimal,
    pub health: Option<Decimal>,
    pub energy: Option<Decimal>,
    pub food_and_non_alcoholic_beverages: Option<Decimal>,
    pub communication: Option<Decimal>,
    pub transportation: Option<Decimal>,
}

impl TufeInputType {
    /**
     * Validates the value ranges of the input.
     *
     * # Returns
     * The input itself or a validation error naming the offending field.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        validate_non_negative("general_tufe", self.general_tufe)?;
        validate_percentage("general_tufe_change_rate", self.general_tufe_change_rate)?;
        validate_optional_non_negative("health", self.health)?;
        validate_optional_non_negative("energy", self.energy)?;
        validate_optional_non_negative("food_and_non_alcoholic_beverages", self.food_and_non_alcoholic_beverages)?;
        validate_optional_non_negative("communication", self.communication)?;
        validate_optional_non_negative("transportation", self.transportation)?;
        Ok(self)
    }
}

impl MonthlyRecord for TufeRecord {
    type Input = TufeInputType;

    const NAME: &'static str = "TUFE record";
    const QUERY_LIST: &'static str = "SELECT id, month, general_tufe, general_tufe_change_rate, health, energy, food_and_non_alcoholic_beverages, communication, transportation FROM tufe_records ORDER BY id LIMIT ? OFFSET ?";
    const QUERY_BY_MONTH: &'static str = "SELECT id, month, general_tufe, general_tufe_change_rate, health, energy, food_and_non_alcoholic_beverages, communication, transportation FROM tufe_records WHERE month = ?";
    const INSERT: &'static str = "INSERT INTO tufe_records (general_tufe, general_tufe_change_rate, health, energy, food_and_non_alcoholic_beverages, communication, transportation, month) VALUES (?, ?, ?, ?, ?, ?, ?, ?) RETURNING id";
    const UPDATE: &'static str = "UPDATE tufe_records SET general_tufe = ?, general_tufe_change_rate = ?, health = ?, energy = ?, food_and_non_alcoholic_beverages = ?, communication = ?, transportation = ? WHERE month = ?";
    const DELETE: &'static str = "DELETE FROM tufe_records WHERE month = ?";

    fn month(input: &TufeInputType) -> NaiveDate {
        input.month
    }

    fn bind_values<'q>(query: SqliteQuery<'q>, input: &'q TufeInputType) -> SqliteQuery<'q> {
        query
            .bind(input.general_tufe.to_string())
            .bind(input.general_tufe_change_rate.to_string())
            .bind(input.health.map(|value| value.to_string()))
            .bind(input.energy.map(|value| value.to_string()))
            .bind(input.food_and_non_alcoholic_beverages.map(|value| value.to_string()))
            .bind(input.communication.map(|value| value.to_string()))
            .bind(input.transportation.map(|value| value.to_string()))
    }

    fn from_row(row: &SqliteRow) -> Result<Self, ApplicationError> {
        Ok(TufeRecord {
            id: integer_column(row, "id")?,
            month: month_column(row)?,
            general_tufe: decimal_column(row, "general_tufe")?,
            general_tufe_change_rate: decimal_column(row, "general_tufe_change_rate")?,
            health: optional_decimal_column(row, "health")?,
            energy: optional_decimal_column(row, "energy")?,
            food_and_non_alcoholic_beverages: optional_decimal_column(row, "food_and_non_alcoholic_beverages")?,
            communication: optional_decimal_column(row, "communication")?,
            transportation: optional_decimal_column(row, "transportation")?,
        })
    }
}

/***************** Income *********************/

/**
 * Average income for a month.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct IncomeRecord {
    pub id: i64,
    pub month: NaiveDate,
    pub average_income: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IncomeInputType {
    pub month: NaiveDate,
    pub average_income: Decimal,
}

impl IncomeInputType {
    pub fn validate(self) -> Result<Self, ApplicationError> {
        validate_non_negative("average_income", self.average_income)?;
        Ok(self)
    }
}

impl MonthlyRecord for IncomeRecord {
    type Input = IncomeInputType;

    const NAME: &'static str = "Income record";
    const QUERY_LIST: &'static str = "SELECT id, month, average_income FROM income ORDER BY id LIMIT ? OFFSET ?";
    const QUERY_BY_MONTH: &'static str = "SELECT id, month, average_income FROM income WHERE month = ?";
    const INSERT: &'static str = "INSERT INTO income (average_income, month) VALUES (?, ?) RETURNING id";
    const UPDATE: &'static str = "UPDATE income SET average_income = ? WHERE month = ?";
    const DELETE: &'static str = "DELETE FROM income WHERE month = ?";

    fn month(input: &IncomeInputType) -> NaiveDate {
        input.month
    }

    fn bind_values<'q>(query: SqliteQuery<'q>, input: &'q IncomeInputType) -> SqliteQuery<'q> {
        query.bind(input.average_income.to_string())
    }

    fn from_row(row: &SqliteRow) -> Result<Self, ApplicationError> {
        Ok(IncomeRecord { id: integer_column(row, "id")?, month: month_column(row)?, average_income: decimal_column(row, "average_income")? })
    }
}

/***************** Mortality *********************/

/**
 * Heart disease mortality count for a month.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct MortalityRecord {
    pub id: i64,
    pub month: NaiveDate,
    pub mortality_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MortalityInputType {
    pub month: NaiveDate,
    pub mortality_count: i64,
}

impl MortalityInputType {
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.mortality_count < 0 {
            return Err(ApplicationError::new(ErrorType::Validation, "mortality_count must be greater than or equal to 0".to_string()));
        }
        Ok(self)
    }
}

impl MonthlyRecord for MortalityRecord {
    type Input = MortalityInputType;

    const NAME: &'static str = "Mortality record";
    const QUERY_LIST: &'static str = "SELECT id, month, mortality_count FROM heart_disease_mortalities ORDER BY id LIMIT ? OFFSET ?";
    const QUERY_BY_MONTH: &'static str = "SELECT id, month, mortality_count FROM heart_disease_mortalities WHERE month = ?";
    const INSERT: &'static str = "INSERT INTO heart_disease_mortalities (mortality_count, month) VALUES (?, ?) RETURNING id";
    const UPDATE: &'static str = "UPDATE heart_disease_mortalities SET mortality_count = ? WHERE month = ?";
    const DELETE: &'static str = "DELETE FROM heart_disease_mortalities WHERE month = ?";

    fn month(input: &MortalityInputType) -> NaiveDate {
        input.month
    }

    fn bind_values<'q>(query: SqliteQuery<'q>, input: &'q MortalityInputType) -> SqliteQuery<'q> {
        query.bind(input.mortality_count)
    }

    fn from_row(row: &SqliteRow) -> Result<Self, ApplicationError> {
        Ok(MortalityRecord { id: integer_column(row, "id")?, month: month_column(row)?, mortality_count: integer_column(row, "mortality_count")? })
    }
}

/***************** Common models *********************/

/**
 * Validated pagination input.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationInput {
    /**
     * Number of rows to skip.
     */
    pub skip: i64,
    /**
     * Maximum number of rows to return.
     */
    pub limit: i64,
}

impl PaginationInput {
    /**
     * Validates that skip is non-negative and limit is positive.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.skip < 0 {
            return Err(ApplicationError::new(ErrorType::Validation, "skip must be greater than or equal to 0".to_string()));
        }
        if self.limit < 1 {
            return Err(ApplicationError::new(ErrorType::Validation, "limit must be greater than 0".to_string()));
        }
        Ok(self)
    }
}

impl Default for PaginationInput {
    fn default() -> Self {
        PaginationInput { skip: DEFAULT_SKIP, limit: DEFAULT_LIMIT }
    }
}

/**
 * Parses a month in `YYYY-MM-DD` format.
 */
pub fn parse_month(month: &str) -> Result<NaiveDate, ApplicationError> {
    NaiveDate::parse_from_str(month, MONTH_FORMAT).map_err(|_err| ApplicationError::new(ErrorType::Validation, "Invalid date format. Use YYYY-MM-DD".to_string()))
}

/**
 * Resolves the month of a request from the body and, for updates, the path.
 *
 * # Arguments
 * `body_month`: Month given in the request body, if any.
 * `path_month`: Month selected by the path, if any.
 *
 * # Returns
 * The path month when present, otherwise the body month. A body month that
 * disagrees with the path is rejected since the natural key cannot change.
 */
pub fn resolve_month(body_month: Option<&str>, path_month: Option<NaiveDate>) -> Result<NaiveDate, ApplicationError> {
    match (body_month.map(parse_month).transpose()?, path_month) {
        (Some(body), Some(path)) if body != path => Err(ApplicationError::new(ErrorType::Validation, format!("Month {body} in body does not match month {path} in path"))),
        (_, Some(path)) => Ok(path),
        (Some(body), None) => Ok(body),
        (None, None) => Err(ApplicationError::new(ErrorType::Validation, "month is required".to_string())),
    }
}

fn validate_non_negative(field: &str, value: Decimal) -> Result<(), ApplicationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ApplicationError::new(ErrorType::Validation, format!("{field} must be greater than or equal to 0")));
    }
    Ok(())
}

fn validate_optional_non_negative(field: &str, value: Option<Decimal>) -> Result<(), ApplicationError> {
    value.map_or(Ok(()), |value| validate_non_negative(field, value))
}

fn validate_percentage(field: &str, value: Decimal) -> Result<(), ApplicationError> {
    validate_non_negative(field, value)?;
    if value > Decimal::ONE_HUNDRED {
        return Err(ApplicationError::new(ErrorType::Validation, format!("{field} must be less than or equal to 100")));
    }
    Ok(())
}

fn integer_column(row: &SqliteRow, column: &str) -> Result<i64, ApplicationError> {
    row.try_get(column).map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to read column {column}: {err}")))
}

fn month_column(row: &SqliteRow) -> Result<NaiveDate, ApplicationError> {
    row.try_get("month").map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to read column month: {err}")))
}

fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, ApplicationError> {
    optional_decimal_column(row, column)?.ok_or_else(|| ApplicationError::new(ErrorType::DatabaseError, format!("Column {column} is null")))
}

fn optional_decimal_column(row: &SqliteRow, column: &str) -> Result<Option<Decimal>, ApplicationError> {
    let value: Option<String> = row.try_get(column).map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to read column {column}: {err}")))?;
    value
        .map(|value| Decimal::from_str(&value).map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to parse column {column}: {err}"))))
        .transpose()
}
