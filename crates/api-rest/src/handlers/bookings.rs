use crate::error::{ApiError, ErrorBody};
use crate::handlers::ApiJson;
use crate::identity::{AdminActor, CurrentUser};
use crate::state::{blocking, AppState};
use api_shared::{
    parse_id, AttachReportReq, BookingListQuery, BookingRes, CreateBookingReq,
    UpdateBookingStatusReq,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

#[utoipa::path(
    post,
    path = "/bookings",
    request_body = CreateBookingReq,
    params(("x-user-id" = String, Header, description = "Acting account")),
    responses(
        (status = 201, description = "Booking created (pending)", body = BookingRes),
        (status = 400, description = "Invalid input or inactive test", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<CreateBookingReq>,
) -> Result<(StatusCode, Json<BookingRes>), ApiError> {
    let input = req.into_new_booking()?;
    let bookings = state.bookings.clone();
    let booking = blocking(move || bookings.create(&user.id, input)).await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

#[utoipa::path(
    get,
    path = "/bookings/me",
    params(
        BookingListQuery,
        ("x-user-id" = String, Header, description = "Acting account")
    ),
    responses(
        (status = 200, description = "The caller's bookings, latest appointment first", body = [BookingRes])
    )
)]
#[axum::debug_handler]
pub async fn my_bookings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Vec<BookingRes>>, ApiError> {
    let filter = query.into_filter()?;
    let bookings = state.bookings.clone();
    let list = blocking(move || bookings.list_for_user(&user.id, &filter)).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/bookings",
    params(
        BookingListQuery,
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "All bookings, latest appointment first", body = [BookingRes])
    )
)]
#[axum::debug_handler]
pub async fn list_bookings(
    State(state): State<AppState>,
    AdminActor(_admin): AdminActor,
    Query(query): Query<BookingListQuery>,
) -> Result<Json<Vec<BookingRes>>, ApiError> {
    let filter = query.into_filter()?;
    let bookings = state.bookings.clone();
    let list = blocking(move || bookings.list_all(&filter)).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}",
    params(
        ("id" = String, Path, description = "Booking id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "Booking", body = BookingRes),
        (status = 404, description = "Unknown booking", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_booking(
    State(state): State<AppState>,
    AdminActor(_admin): AdminActor,
    Path(id): Path<String>,
) -> Result<Json<BookingRes>, ApiError> {
    let id = parse_id(&id, "booking id")?;
    let bookings = state.bookings.clone();
    let booking = blocking(move || bookings.get(&id)).await?;
    Ok(Json(booking.into()))
}

#[utoipa::path(
    put,
    path = "/bookings/{id}/status",
    request_body = UpdateBookingStatusReq,
    params(
        ("id" = String, Path, description = "Booking id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "Status set", body = BookingRes),
        (status = 409, description = "Transition not allowed", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn update_booking_status(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateBookingStatusReq>,
) -> Result<Json<BookingRes>, ApiError> {
    let id = parse_id(&id, "booking id")?;
    let next = req.status()?;
    let bookings = state.bookings.clone();
    let booking = blocking(move || bookings.advance_status(&actor, &id, next)).await?;
    Ok(Json(booking.into()))
}

#[utoipa::path(
    post,
    path = "/bookings/{id}/reports",
    request_body = AttachReportReq,
    params(
        ("id" = String, Path, description = "Booking id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 201, description = "Report attached", body = BookingRes),
        (status = 409, description = "Booking not completed", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn attach_report(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AttachReportReq>,
) -> Result<(StatusCode, Json<BookingRes>), ApiError> {
    let id = parse_id(&id, "booking id")?;
    let bookings = state.bookings.clone();
    let booking = blocking(move || bookings.attach_report(&actor, &id, req.into())).await?;
    Ok((StatusCode::CREATED, Json(booking.into())))
}

#[utoipa::path(
    delete,
    path = "/bookings/{id}/reports/{report_id}",
    params(
        ("id" = String, Path, description = "Booking id"),
        ("report_id" = String, Path, description = "Report id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "Report removed", body = BookingRes),
        (status = 404, description = "Unknown booking or report", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn remove_report(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path((id, report_id)): Path<(String, String)>,
) -> Result<Json<BookingRes>, ApiError> {
    let id = parse_id(&id, "booking id")?;
    let report_id = parse_id(&report_id, "report id")?;
    let bookings = state.bookings.clone();
    let booking = blocking(move || bookings.remove_report(&actor, &id, &report_id)).await?;
    Ok(Json(booking.into()))
}
