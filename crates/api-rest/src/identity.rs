//! Request identity extractors.
//!
//! [`CurrentUser`] resolves `x-user-id` to a stored account. [`AdminActor`] additionally checks
//! `x-api-key` against the configured admin key and yields the commit actor for admin changes.

use crate::error::ApiError;
use crate::state::{blocking, AppState};
use api_shared::{parse_user_id, validate_api_key, AuthError};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use pathlab_core::{Actor, ErrorKind, User};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const API_KEY_HEADER: &str = "x-api-key";

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts.headers.get(name).and_then(|v| v.to_str().ok())
}

/// The account named by `x-user-id`.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// An admin request: valid `x-api-key` plus the acting account from `x-user-id`.
#[derive(Clone, Debug)]
pub struct AdminActor(pub Actor);

async fn load_user(parts: &Parts, state: &AppState) -> Result<User, ApiError> {
    let id = parse_user_id(header(parts, USER_ID_HEADER))?;
    let users = state.users.clone();
    blocking(move || users.get(&id)).await.map_err(|err| match err {
        ApiError::Lab(e) if e.kind() == ErrorKind::NotFound => AuthError::UnknownUser.into(),
        other => other,
    })
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(load_user(parts, state).await?))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        validate_api_key(header(parts, API_KEY_HEADER), &state.admin_key)?;
        let user = load_user(parts, state).await?;
        Ok(AdminActor(Actor::for_user(&user).as_admin()))
    }
}
