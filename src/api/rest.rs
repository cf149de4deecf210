use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, de, de::DeserializeOwned};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    models::{DEFAULT_LIMIT, DEFAULT_SKIP, IncomeInputType, IncomeRecord, MonthlyRecord, MortalityInputType, MortalityRecord, PaginationInput, TufeInputType, TufeRecord, resolve_month},
};

/**
 * Ties a record type to its request and response bodies.
 */
pub trait RecordResource: MonthlyRecord {
    /**
     * Body accepted by create and update.
     */
    type Request: DeserializeOwned + 'static;
    /**
     * Body returned for a stored record.
     */
    type Response: Serialize + From<Self>;

    /**
     * Converts and validates a request body.
     *
     * # Arguments
     * `request`: The deserialized body.
     * `path_month`: The month selected by the path, present for updates.
     */
    fn to_input(request: Self::Request, path_month: Option<NaiveDate>) -> Result<Self::Input, ApplicationError>;
}

/***************** Price index models *********************/

/**
 * Request structure for creating or replacing a price index record.
 */
#[derive(Debug, Deserialize)]
pub struct TufeRequest {
    pub month: Option<String>,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub general_tufe: Decimal,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub general_tufe_change_rate: Decimal,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub health: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub energy: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub food_and_non_alcoholic_beverages: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub communication: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_optional_decimal")]
    pub transportation: Option<Decimal>,
}

/**
 * Response structure for a price index record.
 */
#[derive(Debug, Serialize)]
pub struct TufeResponse {
    id: i64,
    month: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    general_tufe: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    general_tufe_change_rate: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    health: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    energy: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    food_and_non_alcoholic_beverages: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    communication: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float_option")]
    transportation: Option<Decimal>,
}

impl From<TufeRecord> for TufeResponse {
    fn from(record: TufeRecord) -> Self {
        TufeResponse {
            id: record.id,
            month: record.month,
            general_tufe: record.general_tufe,
            general_tufe_change_rate: record.general_tufe_change_rate,
            health: record.health,
            energy: record.energy,
            food_and_non_alcoholic_beverages: record.food_and_non_alcoholic_beverages,
            communication: record.communication,
            transportation: record.transportation,
        }
    }
}

impl RecordResource for TufeRecord {
    type Request = TufeRequest;
    type Response = TufeResponse;

    fn to_input(request: TufeRequest, path_month: Option<NaiveDate>) -> Result<TufeInputType, ApplicationError> {
        TufeInputType {
            month: resolve_month(request.month.as_deref(), path_month)?,
            general_tufe: request.general_tufe,
            general_tufe_change_rate: request.general_tufe_change_rate,
            health: request.health,
            energy: request.energy,
            food_and_non_alcoholic_beverages: request.food_and_non_alcoholic_beverages,
            communication: request.communication,
            transportation: request.transportation,
        }
        .validate()
    }
}

/***************** Income models *********************/

#[derive(Debug, Deserialize)]
pub struct IncomeRequest {
    pub month: Option<String>,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub average_income: Decimal,
}

#[derive(Debug, Serialize)]
pub struct IncomeResponse {
    id: i64,
    month: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    average_income: Decimal,
}

impl From<IncomeRecord> for IncomeResponse {
    fn from(record: IncomeRecord) -> Self {
        IncomeResponse { id: record.id, month: record.month, average_income: record.average_income }
    }
}

impl RecordResource for IncomeRecord {
    type Request = IncomeRequest;
    type Response = IncomeResponse;

    fn to_input(request: IncomeRequest, path_month: Option<NaiveDate>) -> Result<IncomeInputType, ApplicationError> {
        IncomeInputType { month: resolve_month(request.month.as_deref(), path_month)?, average_income: request.average_income }.validate()
    }
}

/***************** Mortality models *********************/

#[derive(Debug, Deserialize)]
pub struct MortalityRequest {
    pub month: Option<String>,
    pub mortality_count: i64,
}

#[derive(Debug, Serialize)]
pub struct MortalityResponse {
    id: i64,
    month: NaiveDate,
    mortality_count: i64,
}

impl From<MortalityRecord> for MortalityResponse {
    fn from(record: MortalityRecord) -> Self {
        MortalityResponse { id: record.id, month: record.month, mortality_count: record.mortality_count }
    }
}

impl RecordResource for MortalityRecord {
    type Request = MortalityRequest;
    type Response = MortalityResponse;

    fn to_input(request: MortalityRequest, path_month: Option<NaiveDate>) -> Result<MortalityInputType, ApplicationError> {
        MortalityInputType { month: resolve_month(request.month.as_deref(), path_month)?, mortality_count: request.mortality_count }.validate()
    }
}

/***************** Welcome models *********************/

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/***************** Error models *********************/

/**
 * Custom error response for the application.
 */
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error.
     */
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse { code: get_error_code(&self.error_type), message: self.message.clone() };
        HttpResponse::build(self.status_code()).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorType::ConstraintViolation => StatusCode::CONFLICT,
        ErrorType::NotFound => StatusCode::NOT_FOUND,
        ErrorType::Initialization | ErrorType::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::Initialization => 1001,
        ErrorType::Validation => 1002,
        ErrorType::DatabaseError => 1003,
        ErrorType::ConstraintViolation => 1004,
        ErrorType::NotFound => 1005,
    }
}

/***************** Common models *********************/

/**
 * Reads a JSON number as a decimal, rejecting values a `Decimal` would have to round.
 */
fn deserialize_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    decimal_from_f64(f64::deserialize(deserializer)?).map_err(de::Error::custom)
}

fn deserialize_optional_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Decimal>, D::Error> {
    Option::<f64>::deserialize(deserializer)?.map(decimal_from_f64).transpose().map_err(de::Error::custom)
}

fn decimal_from_f64(value: f64) -> Result<Decimal, String> {
    Decimal::from_str_exact(&value.to_string()).map_err(|err| format!("{value} cannot be stored as an exact decimal: {err}"))
}


/**
 * Pagination query parameters for list requests.
 */
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    /**
     * Number of records to skip.
     */
    pub skip: Option<i64>,
    /**
     * Maximum number of records to return.
     */
    pub limit: Option<i64>,
}

impl From<PaginationQuery> for PaginationInput {
    fn from(query: PaginationQuery) -> Self {
        PaginationInput { skip: query.skip.unwrap_or(DEFAULT_SKIP), limit: query.limit.unwrap_or(DEFAULT_LIMIT) }
    }
}
