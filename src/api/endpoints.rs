use actix_web::{
    HttpRequest, HttpResponse, Scope, get,
    web::{self, Path},
};
use tracing::{Instrument, instrument};

use crate::{
    api::{
        rest::{MessageResponse, PaginationQuery, RecordResource},
        state::AppState,
    },
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{IncomeRecord, MortalityRecord, PaginationInput, TufeRecord, parse_month},
    },
};

/**
 * Registers every route and the extractor configuration of the API.
 */
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _request| ApplicationError::new(ErrorType::Validation, err.to_string()).into()))
        .app_data(web::QueryConfig::default().error_handler(|err, _request| ApplicationError::new(ErrorType::Validation, err.to_string()).into()))
        .service(root)
        .service(record_scope::<TufeRecord>("/tufe"))
        .service(record_scope::<IncomeRecord>("/income"))
        .service(record_scope::<MortalityRecord>("/mortality"));
}

/**
 * Builds the list/create/get/update/delete routes of a record type under `path`.
 */
pub fn record_scope<R: RecordResource>(path: &str) -> Scope {
    web::scope(path)
        .route("", web::get().to(record_list::<R>))
        .route("", web::post().to(record_add::<R>))
        .route("/{month}", web::get().to(record_get::<R>))
        .route("/{month}", web::put().to(record_update::<R>))
        .route("/{month}", web::delete().to(record_delete::<R>))
}

/**
 * Welcome endpoint.
 */
#[instrument(skip(http_request), fields(service = "root", trace_id = get_trace_id(&http_request)))]
#[get("/")]
pub async fn root(http_request: HttpRequest) -> HttpResponse {
    HttpResponse::Ok().json(MessageResponse { message: "Welcome to the TUFE API".to_string() })
}

/**
 * Endpoint to retrieve a page of records.
 */
#[instrument(skip(http_request, pagination, app_state), fields(service = "listRecords", record = R::NAME, trace_id = get_trace_id(&http_request)))]
pub async fn record_list<R: RecordResource>(http_request: HttpRequest, pagination: web::Query<PaginationQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let pagination_input = PaginationInput::from(pagination.into_inner()).validate()?;
    let records: Vec<R> = app_state.records_service.get_list(pagination_input).instrument(span).await?;
    let response: Vec<R::Response> = records.into_iter().map(R::Response::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

/**
 * Endpoint to add a record.
 */
#[instrument(skip(http_request, request_body, app_state), fields(service = "addRecord", record = R::NAME, trace_id = get_trace_id(&http_request)))]
pub async fn record_add<R: RecordResource>(http_request: HttpRequest, request_body: web::Json<R::Request>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let input = R::to_input(request_body.into_inner(), None)?;
    let record: R = app_state.records_service.add::<R>(input).instrument(span).await?;
    Ok(HttpResponse::Created().json(R::Response::from(record)))
}

/**
 * Endpoint to retrieve the record of a month.
 */
#[instrument(skip(http_request, app_state), fields(service = "getRecord", record = R::NAME, trace_id = get_trace_id(&http_request)))]
pub async fn record_get<R: RecordResource>(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let month = parse_month(&path.into_inner())?;
    let record: R = app_state.records_service.get(month).instrument(span).await?;
    Ok(HttpResponse::Ok().json(R::Response::from(record)))
}

/**
 * Endpoint to replace the record of a month.
 */
#[instrument(skip(http_request, request_body, app_state), fields(service = "updateRecord", record = R::NAME, trace_id = get_trace_id(&http_request)))]
pub async fn record_update<R: RecordResource>(
    path: Path<String>,
    http_request: HttpRequest,
    request_body: web::Json<R::Request>,
    app_state: web::Data<AppState>,
) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let month = parse_month(&path.into_inner())?;
    let input = R::to_input(request_body.into_inner(), Some(month))?;
    let record: R = app_state.records_service.update::<R>(input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(R::Response::from(record)))
}

/**
 * Endpoint to delete the record of a month.
 */
#[instrument(skip(http_request, app_state), fields(service = "deleteRecord", record = R::NAME, trace_id = get_trace_id(&http_request)))]
pub async fn record_delete<R: RecordResource>(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    let month = parse_month(&path.into_inner())?;
    app_state.records_service.delete::<R>(month).instrument(span).await?;
    Ok(HttpResponse::NoContent().finish())
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID").and_then(|v| v.to_str().ok().map(std::string::ToString::to_string)).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
