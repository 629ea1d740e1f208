//! Record identifiers and sharded-path utilities.
//!
//! Every pathlab record (test, user, prescription, booking) is stored under a sharded directory
//! derived from its identifier. To keep path derivation deterministic, identifiers have one
//! *canonical* text form: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! ## Sharded directory layout
//! For a canonical id `u`, a record lives under:
//! `collection_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `lab_data/bookings/55/0e/550e8400e29b41d4a716446655440000/booking.yaml`

mod service;

pub use service::{RecordId, Uuid};

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type UuidResult<T> = Result<T, UuidError>;
