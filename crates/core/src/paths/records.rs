//! Record file names.

/// Catalog test YAML filename.
pub struct LabTestFile;

impl LabTestFile {
    pub const NAME: &'static str = "test.yaml";
}

/// User profile YAML filename.
pub struct UserFile;

impl UserFile {
    pub const NAME: &'static str = "user.yaml";
}

/// Prescription YAML filename.
pub struct PrescriptionFile;

impl PrescriptionFile {
    pub const NAME: &'static str = "prescription.yaml";
}

/// Booking YAML filename.
pub struct BookingFile;

impl BookingFile {
    pub const NAME: &'static str = "booking.yaml";
}
