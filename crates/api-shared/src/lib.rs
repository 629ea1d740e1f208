//! # API Shared
//!
//! Wire types and helpers shared by the pathlab API surfaces.
//!
//! Contains:
//! - JSON request/response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - Request identity checks (`auth` module)
//!
//! Used by `api-rest`; the CLI talks to `pathlab-core` directly.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{parse_user_id, validate_api_key, AuthError};
pub use dto::*;
pub use health::HealthService;
