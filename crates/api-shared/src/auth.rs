//! Request identity checks.
//!
//! Authentication happens upstream. The API trusts an `x-user-id` header naming the acting
//! account and, on admin routes, an `x-api-key` header that must match the configured admin key.

use pathlab_core::RecordId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    MissingApiKey,
    #[error("invalid API key")]
    InvalidApiKey,
    #[error("missing user id")]
    MissingUserId,
    #[error("invalid user id")]
    InvalidUserId,
    #[error("unknown user")]
    UnknownUser,
}

/// Compare the provided key against the expected one.
pub fn validate_api_key(provided: Option<&str>, expected: &str) -> Result<(), AuthError> {
    let provided = provided
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or(AuthError::MissingApiKey)?;

    if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        Err(AuthError::InvalidApiKey)
    }
}

/// Parse the acting user's canonical id.
pub fn parse_user_id(header: Option<&str>) -> Result<RecordId, AuthError> {
    let raw = header
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(AuthError::MissingUserId)?;
    RecordId::parse(raw).map_err(|_| AuthError::InvalidUserId)
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
