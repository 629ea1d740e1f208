use crate::error::{ApiError, ErrorBody};
use crate::handlers::ApiJson;
use crate::identity::AdminActor;
use crate::state::{blocking, AppState};
use api_shared::{parse_id, CreateTestReq, TestListQuery, TestRes, UpdateTestReq};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use pathlab_core::LabTestFilter;

#[utoipa::path(
    get,
    path = "/tests",
    params(TestListQuery),
    responses(
        (status = 200, description = "Catalog tests, newest first", body = [TestRes])
    )
)]
#[axum::debug_handler]
pub async fn list_tests(
    State(state): State<AppState>,
    Query(query): Query<TestListQuery>,
) -> Result<Json<Vec<TestRes>>, ApiError> {
    let filter = LabTestFilter::from(query);
    let catalog = state.catalog.clone();
    let tests = blocking(move || catalog.list(&filter)).await?;
    Ok(Json(tests.into_iter().map(Into::into).collect()))
}

#[utoipa::path(
    get,
    path = "/tests/{id}",
    params(("id" = String, Path, description = "Test id")),
    responses(
        (status = 200, description = "Catalog test", body = TestRes),
        (status = 404, description = "Unknown test", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TestRes>, ApiError> {
    let id = parse_id(&id, "test id")?;
    let catalog = state.catalog.clone();
    let test = blocking(move || catalog.get(&id)).await?;
    Ok(Json(test.into()))
}

#[utoipa::path(
    post,
    path = "/tests",
    request_body = CreateTestReq,
    params(
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 201, description = "Test created", body = TestRes),
        (status = 400, description = "Invalid test", body = ErrorBody),
        (status = 403, description = "Wrong API key", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn create_test(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    ApiJson(req): ApiJson<CreateTestReq>,
) -> Result<(StatusCode, Json<TestRes>), ApiError> {
    let catalog = state.catalog.clone();
    let test = blocking(move || catalog.create(&actor, req.into())).await?;
    Ok((StatusCode::CREATED, Json(test.into())))
}

#[utoipa::path(
    put,
    path = "/tests/{id}",
    request_body = UpdateTestReq,
    params(
        ("id" = String, Path, description = "Test id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 200, description = "Test updated", body = TestRes),
        (status = 404, description = "Unknown test", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn update_test(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateTestReq>,
) -> Result<Json<TestRes>, ApiError> {
    let id = parse_id(&id, "test id")?;
    let catalog = state.catalog.clone();
    let test = blocking(move || catalog.update(&actor, &id, req.into())).await?;
    Ok(Json(test.into()))
}

#[utoipa::path(
    delete,
    path = "/tests/{id}",
    params(
        ("id" = String, Path, description = "Test id"),
        ("x-api-key" = String, Header, description = "Admin API key"),
        ("x-user-id" = String, Header, description = "Acting admin account")
    ),
    responses(
        (status = 204, description = "Test deleted"),
        (status = 404, description = "Unknown test", body = ErrorBody)
    )
)]
#[axum::debug_handler]
pub async fn delete_test(
    State(state): State<AppState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id, "test id")?;
    let catalog = state.catalog.clone();
    blocking(move || catalog.delete(&actor, &id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
