//! # Pathlab Core
//!
//! Core business logic for the pathlab booking service.
//!
//! This crate contains pure data operations on the git-versioned record store:
//! - the test catalog, users, prescriptions and bookings ([`repositories`])
//! - test pricing ([`pricing`]) and appointment scheduling ([`schedule`])
//! - the prescription to booking conversion ([`repositories::conversion`])
//!
//! **No API concerns**: request identity, HTTP servers and wire formats belong in `api-rest` or
//! `api-shared`.

pub mod actor;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod paths;
pub mod pricing;
pub mod repositories;
pub mod schedule;
pub mod store;
pub mod versioned_files;

pub use actor::{Actor, ActorRole};
pub use config::CoreConfig;
pub use error::{ErrorKind, LabError, LabResult, LineItemProblem};
pub use models::booking::{Booking, BookingFilter, BookingStatus, LineItem, TestReport};
pub use models::catalog::{LabTest, LabTestFilter, LabTestPatch, NewLabTest};
pub use models::prescription::{Prescription, PrescriptionStatus, ReviewDecision};
pub use models::user::{NewUser, ProfilePatch, User, UserFilter, UserRole};
pub use pricing::{price_lines, PricedOrder, TestLine};
pub use repositories::bookings::{BookingService, NewBooking, NewReport};
pub use repositories::catalog::{CatalogService, SeedOutcome};
pub use repositories::conversion::{ConversionOutcome, ConversionRequest, ConversionService};
pub use repositories::prescriptions::PrescriptionService;
pub use repositories::users::UserService;
pub use store::LabStore;

pub use pathlab_types::{NonEmptyText, Quantity, TextError};
pub use pathlab_uuid::RecordId;
