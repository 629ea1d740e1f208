use crate::error::{ApiError, ErrorBody};
use crate::handlers::ApiJson;
use crate::identity::{AdminActor, CurrentUser};
use crate::state::{blocking, AppState};
use api_shared::{
    parse_id, ConvertPrescriptionReq, ConvertPrescriptionRes, PrescriptionListQuery,
    PrescriptionRes, ReviewPrescriptionReq, UploadPrescriptionReq,
};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;

#[utoipa::path(
    post,
    path = "/prescriptions",
    request_body = UploadPrescriptionReq,
    params(("x-user-id" = String, Header, description = "Acting account")),
    responses(
        (status = 201, description = "Prescription uploaded (pending)", body = PrescriptionRes),
        (status = 400, description = "Missing image reference", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn upload_prescription(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<UploadPrescriptionReq>,
) -> Result<(StatusCode, Json<PrescriptionRes>), ApiError> {
    let prescriptions = state.prescriptions.clone();
    let prescription =
        blocking(move || prescriptions.upload(&user.id, &req.image_url, req.notes)).await?;
    Ok((StatusCode::CREATED, Json(prescription.into())))
}

#[utoipa::path(
    get,
    path = "/prescriptions/me",
    params(("x-user-id" = String, Header, description = "Acting account")),
    responses(
        (status = 200, description = "The caller's prescriptions, newest first", body = [PrescriptionRes])
    )
)]
#[axum::debug_handler]
pub async fn my_prescriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<PrescriptionRes>>, ApiError> {
    let prescriptions = state.prescriptions.clone();
    let list = blocking(move || prescriptions.list_for_user(&user.id)).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/prescriptions/admin",
    params(
        PrescriptionListQuery,
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "All prescriptions, newest first", body = [PrescriptionRes])
    )
)]
#[axum::debug_handler]
pub async fn list_prescriptions(
    State(state): State<AppState>,
    AdminActor(_admin): AdminActor,
    Query(query): Query<PrescriptionListQuery>,
) -> Result<Json<Vec<PrescriptionRes>>, ApiError> {
    let status = query.status()?;
    let prescriptions = state.prescriptions.clone();
    let list = blocking(move || prescriptions.list_all(status)).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    put,
    path = "/prescriptions/{id}/status",
    request_body = ReviewPrescriptionReq,
    params(
        ("id" = String, Path, description = "Prescription id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "Prescription reviewed", body = PrescriptionRes),
        (status = 400, description = "Unknown status or `booked`", body = ErrorBody),
        (status = 404, description = "Unknown prescription", body = ErrorBody),
        (status = 409, description = "Already converted", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn review_prescription(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReviewPrescriptionReq>,
) -> Result<Json<PrescriptionRes>, ApiError> {
    let id = parse_id(&id, "prescription id")?;
    let decision = req.decision()?;
    let prescriptions = state.prescriptions.clone();
    let reviewed =
        blocking(move || prescriptions.review(&actor, &id, decision, req.admin_notes)).await?;
    Ok(Json(reviewed.into()))
}

#[utoipa::path(
    post,
    path = "/prescriptions/{id}/create-booking",
    request_body = ConvertPrescriptionReq,
    params(
        ("id" = String, Path, description = "Prescription id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 201, description = "Booking created and prescription marked booked", body = ConvertPrescriptionRes),
        (status = 400, description = "Invalid input, or a test is missing or inactive", body = ErrorBody),
        (status = 404, description = "Unknown prescription", body = ErrorBody),
        (status = 409, description = "Already converted", body = ErrorBody),
        (status = 500, description = "Change rolled back", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn convert_prescription(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ConvertPrescriptionReq>,
) -> Result<(StatusCode, Json<ConvertPrescriptionRes>), ApiError> {
    let id = parse_id(&id, "prescription id")?;
    let request = req.into_request(id)?;
    let conversion = state.conversion.clone();
    let outcome = blocking(move || conversion.convert(&actor, request)).await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

#[utoipa::path(
    delete,
    path = "/prescriptions/{id}",
    params(
        ("id" = String, Path, description = "Prescription id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 204, description = "Prescription deleted"),
        (status = 404, description = "Unknown prescription", body = ErrorBody),
        (status = 409, description = "Linked to a booking", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn delete_prescription(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "prescription id")?;
    let prescriptions = state.prescriptions.clone();
    blocking(move || prescriptions.delete(&actor, &id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
