use crate::error::LabResult;
use crate::models::{contains_ci, invariant, Record};
use crate::paths::Collection;
use chrono::{DateTime, Utc};
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// A catalog entry. Bookings snapshot the price at creation, so editing a test never changes an
/// existing booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabTest {
    pub id: RecordId,
    pub name: NonEmptyText,
    pub category: NonEmptyText,
    pub price: Decimal,
    #[serde(default)]
    pub sample_type: Option<String>,
    #[serde(default)]
    pub preparation: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for LabTest {
    const COLLECTION: Collection = Collection::Tests;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn validate(&self) -> LabResult<()> {
        if self.price < Decimal::ZERO {
            return Err(invariant(Collection::Tests, "price must not be negative"));
        }
        Ok(())
    }
}

/// Input for a new catalog test (also the shape of entries in a seed file).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct NewLabTest {
    pub name: String,
    pub category: String,
    pub price: Decimal,
    #[serde(default)]
    pub sample_type: Option<String>,
    #[serde(default)]
    pub preparation: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabTestPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub price: Option<Decimal>,
    pub sample_type: Option<String>,
    pub preparation: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LabTestFilter {
    pub category: Option<String>,
    pub search: Option<String>,
    pub active_only: bool,
}

impl LabTestFilter {
    pub fn matches(&self, test: &LabTest) -> bool {
        if self.active_only && !test.is_active {
            return false;
        }
        if let Some(category) = self.category.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            if !test.category.as_str().eq_ignore_ascii_case(category) {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(needle) => {
                contains_ci(test.name.as_str(), needle)
                    || test
                        .description
                        .as_deref()
                        .is_some_and(|d| contains_ci(d, needle))
            }
        }
    }
}
