//! Record services.
//!
//! Each service wraps the shared [`LabStore`](crate::store::LabStore) and owns the rules of one
//! kind of record. Services contain only data operations; identity checks and transport concerns
//! belong in `api-rest`.

pub mod bookings;
pub mod catalog;
pub mod conversion;
pub mod prescriptions;
pub mod users;

/// Trim an optional input; blank counts as absent.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trim an optional input, mapping absent or blank to an empty string.
pub(crate) fn text_or_empty(value: Option<String>) -> String {
    non_blank(value).unwrap_or_default()
}
