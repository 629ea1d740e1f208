//! Constants used throughout the pathlab core crate.

/// Default directory for the record store when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "lab_data";

/// Default lab/site label recorded in commit trailers.
pub const DEFAULT_LAB_NAME: &str = "pathlab";

/// Git branch every store commit lands on.
pub const MAIN_REF: &str = "refs/heads/main";

/// Email on every git signature. Account emails never reach history.
pub const COMMIT_EMAIL: &str = "noreply@pathlab.invalid";

/// Format accepted for appointment dates.
pub const APPOINTMENT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Format accepted for appointment times (24-hour clock).
pub const APPOINTMENT_TIME_FORMAT: &str = "%H:%M";
