use crate::error::{LabError, LabResult};
use crate::models::{invariant, Record};
use crate::paths::Collection;
use chrono::{DateTime, Utc};
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Review lifecycle of an uploaded prescription.
///
/// `Booked` is terminal and is only ever reached through conversion.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrescriptionStatus {
    #[default]
    Pending,
    Reviewed,
    Booked,
    Rejected,
}

impl PrescriptionStatus {
    pub const ALL: [PrescriptionStatus; 4] = [
        Self::Pending,
        Self::Reviewed,
        Self::Booked,
        Self::Rejected,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Booked => "booked",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrescriptionStatus {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                LabError::InvalidInput(format!(
                    "unknown prescription status '{s}' (expected pending, reviewed, booked or rejected)"
                ))
            })
    }
}

/// Statuses an admin may set by reviewing. `Booked` is deliberately absent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReviewDecision {
    Pending,
    Reviewed,
    Rejected,
}

impl From<ReviewDecision> for PrescriptionStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Pending => Self::Pending,
            ReviewDecision::Reviewed => Self::Reviewed,
            ReviewDecision::Rejected => Self::Rejected,
        }
    }
}

impl TryFrom<PrescriptionStatus> for ReviewDecision {
    type Error = LabError;

    fn try_from(status: PrescriptionStatus) -> Result<Self, Self::Error> {
        match status {
            PrescriptionStatus::Pending => Ok(Self::Pending),
            PrescriptionStatus::Reviewed => Ok(Self::Reviewed),
            PrescriptionStatus::Rejected => Ok(Self::Rejected),
            PrescriptionStatus::Booked => Err(LabError::InvalidInput(
                "status 'booked' is set by converting the prescription into a booking".into(),
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prescription {
    pub id: RecordId,
    pub user_id: RecordId,
    pub image_url: NonEmptyText,
    #[serde(default)]
    pub status: PrescriptionStatus,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub admin_notes: String,
    #[serde(default)]
    pub booking: Option<RecordId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prescription {
    pub fn is_booked(&self) -> bool {
        self.status == PrescriptionStatus::Booked
    }
}

impl Record for Prescription {
    const COLLECTION: Collection = Collection::Prescriptions;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn validate(&self) -> LabResult<()> {
        match (self.is_booked(), self.booking.is_some()) {
            (true, false) => Err(invariant(
                Collection::Prescriptions,
                "booked prescription has no linked booking",
            )),
            (false, true) => Err(invariant(
                Collection::Prescriptions,
                format!("{} prescription is linked to a booking", self.status),
            )),
            _ => Ok(()),
        }
    }
}
