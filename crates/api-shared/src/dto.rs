//! JSON wire types.
//!
//! Field names are camelCase. Ids are canonical 32-character hex strings and decimal amounts are
//! strings, so clients never round prices through floats. Request types convert into core inputs
//! with `into_*` methods that report malformed values as `LabError::InvalidInput`. A malformed
//! test id inside a test list is a line-item error instead, naming the raw reference.

use chrono::{DateTime, NaiveDateTime, Utc};
use pathlab_core::{
    Booking, BookingFilter, BookingStatus, ConversionOutcome, ConversionRequest, LabError,
    LabResult, LabTest, LabTestFilter, LabTestPatch, LineItem, NewBooking, NewLabTest, NewReport,
    Prescription, PrescriptionStatus, ProfilePatch, Quantity, RecordId, ReviewDecision, TestLine,
    TestReport, User, UserFilter, UserRole,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Parse a canonical id, naming what it identifies in the error.
pub fn parse_id(raw: &str, what: &str) -> LabResult<RecordId> {
    RecordId::parse(raw.trim())
        .map_err(|e| LabError::InvalidInput(format!("{what}: {e}")))
}

fn parse_optional<T>(raw: Option<&str>) -> LabResult<Option<T>>
where
    T: std::str::FromStr<Err = LabError>,
{
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .transpose()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestRes {
    pub id: String,
    pub name: String,
    pub category: String,
    #[schema(value_type = String, example = "300.00")]
    pub price: Decimal,
    pub sample_type: Option<String>,
    pub preparation: Option<String>,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LabTest> for TestRes {
    fn from(t: LabTest) -> Self {
        Self {
            id: t.id.to_string(),
            name: t.name.into_inner(),
            category: t.category.into_inner(),
            price: t.price,
            sample_type: t.sample_type,
            preparation: t.preparation,
            description: t.description,
            is_active: t.is_active,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestReq {
    pub name: String,
    pub category: String,
    #[schema(value_type = String, example = "300.00")]
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

impl From<CreateTestReq> for NewLabTest {
    fn from(req: CreateTestReq) -> Self {
        NewLabTest {
            name: req.name,
            category: req.category,
            price: req.price,
            sample_type: req.sample_type,
            preparation: req.preparation,
            description: req.description,
            is_active: req.is_active,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTestReq {
    pub name: Option<String>,
    pub category: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub sample_type: Option<String>,
    pub preparation: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateTestReq> for LabTestPatch {
    fn from(req: UpdateTestReq) -> Self {
        LabTestPatch {
            name: req.name,
            category: req.category,
            price: req.price,
            sample_type: req.sample_type,
            preparation: req.preparation,
            description: req.description,
            is_active: req.is_active,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TestListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
    pub active_only: Option<bool>,
}

impl From<TestListQuery> for LabTestFilter {
    fn from(q: TestListQuery) -> Self {
        LabTestFilter {
            category: q.category,
            search: q.search,
            active_only: q.active_only.unwrap_or(false),
        }
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserRes {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserRes {
    fn from(u: User) -> Self {
        Self {
            id: u.id.to_string(),
            name: u.name.into_inner(),
            email: u.email,
            phone: u.phone,
            address: u.address,
            role: u.role.to_string(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Profile edit. Omitted fields are untouched; an empty string clears an optional field.
#[derive(Clone, Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileReq {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl From<UpdateProfileReq> for ProfilePatch {
    fn from(req: UpdateProfileReq) -> Self {
        ProfilePatch {
            name: req.name,
            email: req.email,
            phone: req.phone,
            address: req.address,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub search: Option<String>,
    /// `user` or `admin`
    pub role: Option<String>,
}

impl UserListQuery {
    pub fn into_filter(self) -> LabResult<UserFilter> {
        let role = match self.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
            None => None,
            Some(raw) => Some(raw.parse::<UserRole>().map_err(LabError::InvalidInput)?),
        };
        Ok(UserFilter {
            search: self.search,
            role,
        })
    }
}

/// Admin role change.
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct UpdateRoleReq {
    /// `user` or `admin`
    pub role: String,
}

impl UpdateRoleReq {
    pub fn into_role(self) -> LabResult<UserRole> {
        self.role.trim().parse().map_err(LabError::InvalidInput)
    }
}

// ---------------------------------------------------------------------------
// Prescriptions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRes {
    pub id: String,
    pub user_id: String,
    pub image_url: String,
    /// `pending`, `reviewed`, `booked` or `rejected`
    pub status: String,
    pub notes: String,
    pub admin_notes: String,
    /// Id of the booking created from this prescription.
    pub booking: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Prescription> for PrescriptionRes {
    fn from(p: Prescription) -> Self {
        Self {
            id: p.id.to_string(),
            user_id: p.user_id.to_string(),
            image_url: p.image_url.into_inner(),
            status: p.status.to_string(),
            notes: p.notes,
            admin_notes: p.admin_notes,
            booking: p.booking.map(|id| id.to_string()),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadPrescriptionReq {
    pub image_url: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPrescriptionReq {
    /// `pending`, `reviewed` or `rejected`
    pub status: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

impl ReviewPrescriptionReq {
    pub fn decision(&self) -> LabResult<ReviewDecision> {
        let status: PrescriptionStatus = self.status.trim().parse()?;
        ReviewDecision::try_from(status)
    }
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PrescriptionListQuery {
    pub status: Option<String>,
}

impl PrescriptionListQuery {
    pub fn status(&self) -> LabResult<Option<PrescriptionStatus>> {
        parse_optional(self.status.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Test lines
// ---------------------------------------------------------------------------

/// A requested test: either a bare id or `{ "test": id, "quantity": n }`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum TestLineInput {
    Id(String),
    Line {
        test: String,
        #[serde(default)]
        quantity: Option<u32>,
    },
}

impl TestLineInput {
    pub fn into_line(self) -> LabResult<TestLine> {
        let (raw, quantity) = match self {
            Self::Id(raw) => (raw, None),
            Self::Line { test, quantity } => (test, quantity),
        };
        let raw = raw.trim();
        let test =
            RecordId::parse(raw).map_err(|_| LabError::UnknownTestRef(raw.to_string()))?;
        let quantity = match quantity {
            None => Quantity::ONE,
            Some(n) => Quantity::new(n)?,
        };
        Ok(TestLine::new(test, quantity))
    }
}

fn into_lines(inputs: Vec<TestLineInput>) -> LabResult<Vec<TestLine>> {
    inputs.into_iter().map(TestLineInput::into_line).collect()
}

// ---------------------------------------------------------------------------
// Bookings
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRes {
    pub test: String,
    pub name: String,
    #[schema(value_type = String)]
    pub unit_price: Decimal,
    pub quantity: u32,
    #[schema(value_type = String)]
    pub subtotal: Decimal,
}

impl From<LineItem> for LineItemRes {
    fn from(item: LineItem) -> Self {
        // Stored totals were checked when the booking was written.
        let subtotal = item.subtotal().unwrap_or_default();
        Self {
            test: item.test.to_string(),
            name: item.name,
            unit_price: item.unit_price,
            quantity: item.quantity.get(),
            subtotal,
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportRes {
    pub id: String,
    pub test_name: String,
    pub report_url: String,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

impl From<TestReport> for ReportRes {
    fn from(r: TestReport) -> Self {
        Self {
            id: r.id.to_string(),
            test_name: r.test_name.into_inner(),
            report_url: r.report_url.into_inner(),
            uploaded_at: r.uploaded_at,
            uploaded_by: r.uploaded_by.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingRes {
    pub id: String,
    pub user_id: String,
    pub items: Vec<LineItemRes>,
    /// Lab-local wall-clock time, without offset.
    #[schema(value_type = String, example = "2024-05-01T10:00:00")]
    pub appointment_at: NaiveDateTime,
    pub patient_name: String,
    pub patient_phone: String,
    pub address: String,
    pub notes: String,
    /// `pending`, `confirmed`, `completed` or `cancelled`
    pub status: String,
    #[schema(value_type = String, example = "450.00")]
    pub total_price: Decimal,
    pub prescription: Option<String>,
    pub reports: Vec<ReportRes>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Booking> for BookingRes {
    fn from(b: Booking) -> Self {
        Self {
            id: b.id.to_string(),
            user_id: b.user_id.to_string(),
            items: b.items.into_iter().map(Into::into).collect(),
            appointment_at: b.appointment_at,
            patient_name: b.patient_name.into_inner(),
            patient_phone: b.patient_phone,
            address: b.address,
            notes: b.notes,
            status: b.status.to_string(),
            total_price: b.total_price,
            prescription: b.prescription.map(|id| id.to_string()),
            reports: b.reports.into_iter().map(Into::into).collect(),
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingReq {
    pub tests: Vec<TestLineInput>,
    /// `YYYY-MM-DD`
    pub appointment_date: String,
    /// `HH:mm`
    pub appointment_time: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub address: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateBookingReq {
    pub fn into_new_booking(self) -> LabResult<NewBooking> {
        Ok(NewBooking {
            tests: into_lines(self.tests)?,
            appointment_date: self.appointment_date,
            appointment_time: self.appointment_time,
            patient_name: self.patient_name,
            patient_phone: self.patient_phone,
            address: self.address,
            notes: self.notes,
        })
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct UpdateBookingStatusReq {
    /// `pending`, `confirmed`, `completed` or `cancelled`
    pub status: String,
}

impl UpdateBookingStatusReq {
    pub fn status(&self) -> LabResult<BookingStatus> {
        self.status.trim().parse()
    }
}

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachReportReq {
    pub test_name: String,
    pub report_url: String,
}

impl From<AttachReportReq> for NewReport {
    fn from(req: AttachReportReq) -> Self {
        NewReport {
            test_name: req.test_name,
            report_url: req.report_url,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookingListQuery {
    pub status: Option<String>,
    /// Case-insensitive match on patient name or phone.
    pub search: Option<String>,
}

impl BookingListQuery {
    pub fn into_filter(self) -> LabResult<BookingFilter> {
        Ok(BookingFilter {
            status: parse_optional(self.status.as_deref())?,
            search: self.search,
        })
    }
}

// ---------------------------------------------------------------------------
// Conversion
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConvertPrescriptionReq {
    pub tests: Vec<TestLineInput>,
    /// `YYYY-MM-DD`
    pub appointment_date: String,
    /// `HH:mm`
    pub appointment_time: String,
    /// Defaults to the prescription owner's name.
    #[serde(default)]
    pub patient_name: Option<String>,
    /// Defaults to the prescription owner's address.
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ConvertPrescriptionReq {
    pub fn into_request(self, prescription: RecordId) -> LabResult<ConversionRequest> {
        Ok(ConversionRequest {
            prescription,
            tests: into_lines(self.tests)?,
            appointment_date: self.appointment_date,
            appointment_time: self.appointment_time,
            patient_name: self.patient_name,
            address: self.address,
            notes: self.notes,
        })
    }
}

#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ConvertPrescriptionRes {
    pub booking: BookingRes,
    pub prescription: PrescriptionRes,
}

impl From<ConversionOutcome> for ConvertPrescriptionRes {
    fn from(out: ConversionOutcome) -> Self {
        Self {
            booking: out.booking.into(),
            prescription: out.prescription.into(),
        }
    }
}
