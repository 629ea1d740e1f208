//! Stored record types.
//!
//! Each record is one YAML file in the store. Parsing goes through `serde_path_to_error` so a
//! corrupt file reports *where* it stopped matching the schema, and every record re-checks its own
//! invariants on both read and write.

pub mod booking;
pub mod catalog;
pub mod prescription;
pub mod user;

use crate::error::{LabError, LabResult};
use crate::paths::Collection;
use pathlab_uuid::RecordId;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record type persisted in its own collection.
pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: Collection;

    fn id(&self) -> &RecordId;

    /// Check invariants that the type system does not already guarantee.
    fn validate(&self) -> LabResult<()> {
        Ok(())
    }
}

/// Parse a record from YAML text and check its invariants.
pub fn parse_record<R: Record>(yaml_text: &str) -> LabResult<R> {
    let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

    let record = match serde_path_to_error::deserialize::<_, R>(deserializer) {
        Ok(parsed) => parsed,
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            return Err(LabError::YamlDeserialization {
                collection: R::COLLECTION,
                path,
                message: source.to_string(),
            });
        }
    };

    record.validate()?;
    Ok(record)
}

/// Render a record as YAML text. Records that violate their invariants are never written.
pub fn render_record<R: Record>(record: &R) -> LabResult<String> {
    record.validate()?;
    serde_yaml::to_string(record).map_err(LabError::YamlSerialization)
}

pub(crate) fn invariant(collection: Collection, message: impl Into<String>) -> LabError {
    LabError::InvariantViolation {
        collection,
        message: message.into(),
    }
}

/// Case-insensitive substring match used by the list filters.
pub(crate) fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}
