use crate::error::{ApiError, ErrorBody};
use crate::handlers::ApiJson;
use crate::identity::{AdminActor, CurrentUser};
use crate::state::{blocking, AppState};
use api_shared::{parse_id, BookingRes, UpdateProfileReq, UpdateRoleReq, UserListQuery, UserRes};
use axum::extract::{Path, Query, State};
use axum::response::Json;

#[utoipa::path(
    get,
    path = "/profile",
    params(("x-user-id" = String, Header, description = "Acting account")),
    responses(
        (status = 200, description = "The caller's profile", body = UserRes),
        (status = 401, description = "Missing or unknown user", body = ErrorBody)
    )
)]
#[axum::debug_handler(state = AppState)]
pub async fn get_profile(CurrentUser(user): CurrentUser) -> Json<UserRes> {
    Json(user.into())
}

#[utoipa::path(
    put,
    path = "/profile",
    request_body = UpdateProfileReq,
    params(("x-user-id" = String, Header, description = "Acting account")),
    responses(
        (status = 200, description = "Profile updated", body = UserRes),
        (status = 400, description = "Invalid field", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ApiJson(req): ApiJson<UpdateProfileReq>,
) -> Result<Json<UserRes>, ApiError> {
    let users = state.users.clone();
    let updated = blocking(move || users.update_profile(&user.id, req.into())).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/users",
    params(
        UserListQuery,
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "Users, newest first", body = [UserRes])
    )
)]
#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    AdminActor(_admin): AdminActor,
    Query(query): Query<UserListQuery>,
) -> Result<Json<Vec<UserRes>>, ApiError> {
    let filter = query.into_filter()?;
    let users = state.users.clone();
    let list = blocking(move || users.list(&filter)).await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(
        ("id" = String, Path, description = "User id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "User", body = UserRes),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_user(
    State(state): State<AppState>,
    AdminActor(_admin): AdminActor,
    Path(id): Path<String>,
) -> Result<Json<UserRes>, ApiError> {
    let id = parse_id(&id, "user id")?;
    let users = state.users.clone();
    let user = blocking(move || users.get(&id)).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/users/{id}/role",
    request_body = UpdateRoleReq,
    params(
        ("id" = String, Path, description = "User id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "Role updated", body = UserRes),
        (status = 400, description = "Unknown role or the caller's own account", body = ErrorBody),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn set_user_role(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateRoleReq>,
) -> Result<Json<UserRes>, ApiError> {
    let id = parse_id(&id, "user id")?;
    let role = req.into_role()?;
    let users = state.users.clone();
    let user = blocking(move || users.set_role(&actor, &id, role)).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    get,
    path = "/users/{id}/bookings",
    params(
        ("id" = String, Path, description = "User id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "The user's bookings", body = [BookingRes]),
        (status = 404, description = "Unknown user", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn user_bookings(
    State(state): State<AppState>,
    AdminActor(_admin): AdminActor,
    Path(id): Path<String>,
) -> Result<Json<Vec<BookingRes>>, ApiError> {
    let id = parse_id(&id, "user id")?;
    let users = state.users.clone();
    let bookings = state.bookings.clone();
    let list = blocking(move || {
        users.get(&id)?;
        bookings.list_for_owner(&id)
    })
    .await?;
    Ok(Json(list.into_iter().map(Into::into).collect()))
}
