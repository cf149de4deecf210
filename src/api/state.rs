use crate::service::records::RecordsService;

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * The records service for handling price index, income and mortality records.
     */
    pub records_service: RecordsService,
}

/**
 * Creates a new instance of `AppState`.
 *
 * # Arguments
 * `records_service`: The records service owning the connection pool.
 */
impl AppState {
    pub fn new(records_service: RecordsService) -> Self {
        AppState { records_service }
    }
}
