//! On-disk path definitions for pathlab records.
//!
//! This module defines relative filesystem paths inside the store. It contains **no I/O logic**,
//! only typed path construction.

pub mod records;

use pathlab_uuid::RecordId;
use records::{BookingFile, LabTestFile, PrescriptionFile, UserFile};
use std::fmt;
use std::path::PathBuf;

/// The top-level record collections of the store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Tests,
    Users,
    Prescriptions,
    Bookings,
}

impl Collection {
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Tests => "tests",
            Self::Users => "users",
            Self::Prescriptions => "prescriptions",
            Self::Bookings => "bookings",
        }
    }

    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Tests => LabTestFile::NAME,
            Self::Users => UserFile::NAME,
            Self::Prescriptions => PrescriptionFile::NAME,
            Self::Bookings => BookingFile::NAME,
        }
    }

    /// Store-relative directory of a single record.
    pub fn record_dir(self, id: &RecordId) -> PathBuf {
        id.sharded_dir(std::path::Path::new(self.dir_name()))
    }

    /// Store-relative path of a record's YAML file.
    pub fn record_path(self, id: &RecordId) -> PathBuf {
        self.record_dir(id).join(self.file_name())
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Tests => "test",
            Self::Users => "user",
            Self::Prescriptions => "prescription",
            Self::Bookings => "booking",
        };
        f.write_str(label)
    }
}
