use crate::error::{LabError, LabResult};
use crate::models::{contains_ci, invariant, Record};
use crate::paths::Collection;
use chrono::{DateTime, NaiveDateTime, Utc};
use pathlab_types::{NonEmptyText, Quantity};
use pathlab_uuid::RecordId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fulfilment status of a booking.
///
/// Allowed moves: `pending -> confirmed -> completed`, and any non-cancelled state to
/// `cancelled`. `cancelled` is terminal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        Self::Pending,
        Self::Confirmed,
        Self::Completed,
        Self::Cancelled,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Completed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Completed, Cancelled)
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = LabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                LabError::InvalidInput(format!(
                    "unknown booking status '{s}' (expected pending, confirmed, completed or cancelled)"
                ))
            })
    }
}

/// One priced line of a booking. Name and unit price are copied from the catalog when the booking
/// is created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub test: RecordId,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: Quantity,
}

impl LineItem {
    pub fn subtotal(&self) -> Option<Decimal> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity.get()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestReport {
    pub id: RecordId,
    pub test_name: NonEmptyText,
    pub report_url: NonEmptyText,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: RecordId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: RecordId,
    pub user_id: RecordId,
    pub items: Vec<LineItem>,
    pub appointment_at: NaiveDateTime,
    pub patient_name: NonEmptyText,
    #[serde(default)]
    pub patient_phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub status: BookingStatus,
    pub total_price: Decimal,
    /// The prescription this booking was converted from, if any.
    #[serde(default)]
    pub prescription: Option<RecordId>,
    #[serde(default)]
    pub reports: Vec<TestReport>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sum of the line subtotals, or `None` on overflow.
pub fn items_total(items: &[LineItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.subtotal()?))
}

impl Record for Booking {
    const COLLECTION: Collection = Collection::Bookings;

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn validate(&self) -> LabResult<()> {
        if self.items.is_empty() {
            return Err(invariant(Collection::Bookings, "booking has no line items"));
        }
        if items_total(&self.items) != Some(self.total_price) {
            return Err(invariant(
                Collection::Bookings,
                "total price does not match the line items",
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub search: Option<String>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(status) = self.status {
            if booking.status != status {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(needle) => {
                contains_ci(booking.patient_name.as_str(), needle)
                    || contains_ci(&booking.patient_phone, needle)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn item(price: i64, quantity: u32) -> LineItem {
        LineItem {
            test: RecordId::new(),
            name: "CBC".into(),
            unit_price: Decimal::from(price),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    fn booking(items: Vec<LineItem>, total: Decimal) -> Booking {
        let now = Utc::now();
        Booking {
            id: RecordId::new(),
            user_id: RecordId::new(),
            items,
            appointment_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            patient_name: NonEmptyText::new("Asha").unwrap(),
            patient_phone: "9000000000".into(),
            address: String::new(),
            notes: String::new(),
            status: BookingStatus::Pending,
            total_price: total,
            prescription: None,
            reports: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn transitions_follow_the_lattice() {
        use BookingStatus::*;
        assert!(Pending.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Completed.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Confirmed));
        for next in BookingStatus::ALL {
            assert!(!Cancelled.can_transition_to(next), "cancelled -> {next}");
        }
    }

    #[test]
    fn total_must_equal_line_items() {
        let ok = booking(vec![item(300, 1), item(150, 2)], Decimal::from(600));
        assert!(ok.validate().is_ok());

        let wrong = booking(vec![item(300, 1)], Decimal::from(299));
        assert!(matches!(
            wrong.validate(),
            Err(LabError::InvariantViolation { .. })
        ));
    }

    #[test]
    fn booking_needs_line_items() {
        let empty = booking(vec![], Decimal::ZERO);
        assert!(empty.validate().is_err());
    }

    #[test]
    fn filter_searches_name_and_phone() {
        let b = booking(vec![item(100, 1)], Decimal::from(100));
        let by_name = BookingFilter {
            search: Some("ASH".into()),
            ..Default::default()
        };
        let by_phone = BookingFilter {
            search: Some("90000".into()),
            ..Default::default()
        };
        let by_status = BookingFilter {
            status: Some(BookingStatus::Confirmed),
            ..Default::default()
        };
        assert!(by_name.matches(&b));
        assert!(by_phone.matches(&b));
        assert!(!by_status.matches(&b));
    }
}
