//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and passed into core services as
//! `Arc<CoreConfig>`. Services never read environment variables while handling a request.

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_LAB_NAME};
use crate::error::{LabError, LabResult};
use crate::paths::Collection;
use pathlab_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    lab_name: NonEmptyText,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The lab name ends up in the `Lab-Site` trailer of every commit, so it must be a single
    /// non-empty line.
    pub fn new(data_dir: PathBuf, lab_name: &str) -> LabResult<Self> {
        let lab_name = NonEmptyText::new(lab_name)
            .map_err(|_| LabError::InvalidInput("lab_name cannot be empty".into()))?;
        if lab_name.as_str().contains(['\n', '\r']) {
            return Err(LabError::InvalidInput(
                "lab_name must be a single line".into(),
            ));
        }

        Ok(Self { data_dir, lab_name })
    }

    /// Build a config from optional raw values (typically environment variables), applying
    /// defaults for anything missing or blank.
    pub fn from_values(data_dir: Option<String>, lab_name: Option<String>) -> LabResult<Self> {
        let data_dir = data_dir
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.into());
        let lab_name = lab_name
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_LAB_NAME.into());

        Self::new(PathBuf::from(data_dir), &lab_name)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.dir_name())
    }

    pub fn lab_name(&self) -> &str {
        self.lab_name.as_str()
    }
}
