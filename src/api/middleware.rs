use actix_web::{
    Error,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    middleware::Next,
};
use tracing::debug;

/**
 * Middleware for timing requests.
 */
pub async fn timing_middleware(request: ServiceRequest, next: Next<impl MessageBody>) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let start_time = std::time::Instant::now();
    let path = request.path().to_owned();
    let method = request.method().to_owned();
    let response = next.call(request).await;
    let response_code = match &response {
        Ok(service_response) => service_response.status().as_u16(),
        Err(_) => 500,
    };
    let duration = start_time.elapsed();
    debug!(target: "performance", "Request for {} {} with status {} processed in {}ms", method, path, response_code, duration.as_millis());
    response
}

#[cfg(test)]
mod test {
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, test, web};

    use super::*;

    #[actix_web::test]
    async fn test_timing_middleware_passes_response() {
        let app = test::init_service(App::new().wrap(from_fn(timing_middleware)).route("/", web::get().to(|| async { HttpResponse::Accepted().finish() }))).await;
        let response = test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
