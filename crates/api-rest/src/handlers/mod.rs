//! HTTP handlers, one module per resource.

pub mod bookings;
pub mod catalog;
pub mod prescriptions;
pub mod users;

use crate::error::ApiError;
use api_shared::{HealthRes, HealthService};
use axum::extract::FromRequest;
use axum::response::Json;

/// `Json` extractor whose rejections use the API error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
#[axum::debug_handler(state = crate::state::AppState)]
pub async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}
