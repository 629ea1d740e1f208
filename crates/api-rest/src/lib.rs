//! # API REST
//!
//! REST API for the lab booking service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - request identity (`x-user-id`, `x-api-key`)
//! - REST-specific concerns (JSON bodies, status codes, CORS, timeouts)
//!
//! Uses `api-shared` for request/response types and `pathlab-core` for everything else.

#![warn(rust_2018_idioms)]

pub mod error;
pub mod handlers;
pub mod identity;
pub mod state;

use axum::error_handling::HandleErrorLayer;
use axum::routing::{delete, get, post, put};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use handlers::{bookings, catalog, prescriptions, users};
use pathlab_core::LabStore;

pub use error::{ApiError, ErrorBody, ErrorDetail};
pub use state::{AppState, RestConfig};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        catalog::list_tests,
        catalog::get_test,
        catalog::create_test,
        catalog::update_test,
        catalog::delete_test,
        users::get_profile,
        users::update_profile,
        users::list_users,
        users::get_user,
        users::set_user_role,
        users::user_bookings,
        prescriptions::upload_prescription,
        prescriptions::my_prescriptions,
        prescriptions::list_prescriptions,
        prescriptions::review_prescription,
        prescriptions::convert_prescription,
        prescriptions::delete_prescription,
        bookings::create_booking,
        bookings::my_bookings,
        bookings::list_bookings,
        bookings::get_booking,
        bookings::update_booking_status,
        bookings::attach_report,
        bookings::remove_report,
    ),
    components(schemas(
        ErrorBody,
        ErrorDetail,
        api_shared::HealthRes,
        api_shared::TestRes,
        api_shared::CreateTestReq,
        api_shared::UpdateTestReq,
        api_shared::UserRes,
        api_shared::UpdateProfileReq,
        api_shared::UpdateRoleReq,
        api_shared::PrescriptionRes,
        api_shared::UploadPrescriptionReq,
        api_shared::ReviewPrescriptionReq,
        api_shared::TestLineInput,
        api_shared::LineItemRes,
        api_shared::ReportRes,
        api_shared::BookingRes,
        api_shared::CreateBookingReq,
        api_shared::UpdateBookingStatusReq,
        api_shared::AttachReportReq,
        api_shared::ConvertPrescriptionReq,
        api_shared::ConvertPrescriptionRes,
    ))
)]
pub struct ApiDoc;

/// Build the application router with docs, CORS and a per-request timeout.
pub fn router(state: AppState, timeout: Duration) -> Router {
    let routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/tests", get(catalog::list_tests).post(catalog::create_test))
        .route(
            "/tests/:id",
            get(catalog::get_test)
                .put(catalog::update_test)
                .delete(catalog::delete_test),
        )
        .route(
            "/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user))
        .route("/users/:id/role", put(users::set_user_role))
        .route("/users/:id/bookings", get(users::user_bookings))
        .route("/prescriptions", post(prescriptions::upload_prescription))
        .route("/prescriptions/me", get(prescriptions::my_prescriptions))
        .route("/prescriptions/admin", get(prescriptions::list_prescriptions))
        .route("/prescriptions/:id", delete(prescriptions::delete_prescription))
        .route(
            "/prescriptions/:id/status",
            put(prescriptions::review_prescription),
        )
        .route(
            "/prescriptions/:id/create-booking",
            post(prescriptions::convert_prescription),
        )
        .route(
            "/bookings",
            get(bookings::list_bookings).post(bookings::create_booking),
        )
        .route("/bookings/me", get(bookings::my_bookings))
        .route("/bookings/:id", get(bookings::get_booking))
        .route("/bookings/:id/status", put(bookings::update_booking_status))
        .route("/bookings/:id/reports", post(bookings::attach_report))
        .route(
            "/bookings/:id/reports/:report_id",
            delete(bookings::remove_report),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    with_request_timeout(routes, timeout)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Abandon requests that run longer than `timeout`, answering with a JSON `Timeout` error.
fn with_request_timeout<S>(routes: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    routes.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(error::middleware_error))
            .timeout(timeout),
    )
}

/// Open the store and serve until the listener fails.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, the address cannot be bound, or the server
/// fails while running.
pub async fn serve(cfg: RestConfig) -> anyhow::Result<()> {
    let store = Arc::new(LabStore::open(Arc::new(cfg.core.clone()))?);
    let state = AppState::new(store, &cfg.admin_key);
    let app = router(state, cfg.request_timeout);

    tracing::info!("-- Starting pathlab REST API on {}", cfg.addr);
    let listener = tokio::net::TcpListener::bind(&cfg.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
