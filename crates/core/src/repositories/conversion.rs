//! Prescription to booking conversion.
//!
//! An admin reads a prescription, picks the tests it asks for and schedules them. The whole
//! sequence runs inside one store transaction:
//!
//! 1. resolve the prescription (`NotFound`) and refuse it if already `booked`;
//! 2. resolve its owner for the default patient details;
//! 3. price the requested tests (`InvalidLineItem`, nothing written);
//! 4. stage a `confirmed` booking and the prescription flipped to `booked` with the link;
//! 5. commit both files as a single commit.
//!
//! The status check and the writes share the store's exclusive lock, so concurrent conversions
//! of one prescription serialise and every call after the first sees `booked`.

use crate::actor::Actor;
use crate::error::{LabError, LabResult};
use crate::models::booking::{Booking, BookingStatus};
use crate::models::catalog::LabTest;
use crate::models::prescription::{Prescription, PrescriptionStatus};
use crate::models::user::User;
use crate::pricing::{price_lines, TestLine};
use crate::repositories::{non_blank, text_or_empty};
use crate::schedule::combine;
use crate::store::LabStore;
use crate::versioned_files::{CommitAction, CommitDomain, CommitMessage};
use chrono::Utc;
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;
use std::sync::Arc;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversionRequest {
    pub prescription: RecordId,
    pub tests: Vec<TestLine>,
    pub appointment_date: String,
    pub appointment_time: String,
    /// Defaults to the owner's name.
    pub patient_name: Option<String>,
    /// Defaults to the owner's address.
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Both records as committed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversionOutcome {
    pub booking: Booking,
    pub prescription: Prescription,
}

#[derive(Clone, Debug)]
pub struct ConversionService {
    store: Arc<LabStore>,
}

impl ConversionService {
    pub fn new(store: Arc<LabStore>) -> Self {
        Self { store }
    }

    /// Convert a prescription into a confirmed booking.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for an empty test list or a malformed date/time (checked before any
    ///   store access).
    /// - `NotFound` if the prescription or its owner does not exist.
    /// - `AlreadyConverted` if the prescription is already `booked`.
    /// - `InvalidLineItem` naming the first missing or inactive test.
    /// - `CommitRolledBack` / `RollbackFailed` if the paired write could not be committed.
    ///
    /// On any error neither record changes.
    pub fn convert(&self, actor: &Actor, request: ConversionRequest) -> LabResult<ConversionOutcome> {
        if request.tests.is_empty() {
            return Err(LabError::InvalidInput("at least one test is required".into()));
        }
        let appointment_at = combine(&request.appointment_date, &request.appointment_time)?;
        let name_override = NonEmptyText::optional(request.patient_name.as_deref());
        let address_override = non_blank(request.address);
        let notes = text_or_empty(request.notes);

        let outcome = self.store.transact(actor, |tx| {
            let mut prescription: Prescription = tx.require(&request.prescription)?;
            if prescription.is_booked() {
                return Err(LabError::AlreadyConverted(prescription.id));
            }
            let owner: User = tx.require(&prescription.user_id)?;

            let order = price_lines(&request.tests, |id| tx.get::<LabTest>(id))?;

            let now = Utc::now();
            let booking = Booking {
                id: RecordId::new(),
                user_id: owner.id,
                items: order.items,
                appointment_at,
                patient_name: name_override.unwrap_or_else(|| owner.name.clone()),
                patient_phone: owner.phone.clone().unwrap_or_default(),
                address: address_override
                    .or_else(|| owner.address.clone())
                    .unwrap_or_default(),
                notes,
                status: BookingStatus::Confirmed,
                total_price: order.total,
                prescription: Some(prescription.id),
                reports: Vec::new(),
                created_at: now,
                updated_at: now,
            };

            prescription.status = PrescriptionStatus::Booked;
            prescription.booking = Some(booking.id);
            prescription.updated_at = now;

            tx.put(&booking)?;
            tx.put(&prescription)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::Prescription,
                    CommitAction::Convert,
                    "Prescription converted to booking",
                )?
                .with_trailer("Prescription-Id", prescription.id.to_string())?
                .with_trailer("Booking-Id", booking.id.to_string())?,
            );

            Ok(ConversionOutcome {
                booking,
                prescription,
            })
        })?;

        tracing::info!(
            prescription_id = %outcome.prescription.id,
            booking_id = %outcome.booking.id,
            total = %outcome.booking.total_price,
            "prescription converted"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, LineItemProblem};
    use crate::models::booking::BookingFilter;
    use crate::models::prescription::ReviewDecision;
    use crate::paths::Collection;
    use crate::repositories::bookings::tests::{add_test, add_user};
    use crate::repositories::bookings::BookingService;
    use crate::repositories::prescriptions::PrescriptionService;
    use crate::store::tests::test_store;
    use pathlab_types::Quantity;
    use rust_decimal::Decimal;
    use std::fs;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        store: Arc<LabStore>,
        admin: Actor,
        owner: User,
        prescription: Prescription,
        t1: LabTest,
        t2: LabTest,
    }

    fn fixture(t2_active: bool) -> Fixture {
        let (dir, store) = test_store();
        let t1 = add_test(&store, "CBC", 300, true);
        let t2 = add_test(&store, "Hemoglobin", 150, t2_active);
        let owner = add_user(&store, "Asha", Some("9000000000"));
        let admin = Actor::for_user(&add_user(&store, "Lab Admin", None)).as_admin();
        let prescription = PrescriptionService::new(store.clone())
            .upload(&owner.id, "https://img.example/rx.jpg", None)
            .expect("upload");
        Fixture {
            _dir: dir,
            store,
            admin,
            owner,
            prescription,
            t1,
            t2,
        }
    }

    fn request(f: &Fixture) -> ConversionRequest {
        ConversionRequest {
            prescription: f.prescription.id,
            tests: vec![TestLine::single(f.t1.id), TestLine::single(f.t2.id)],
            appointment_date: "2024-05-01".into(),
            appointment_time: "10:00".into(),
            ..Default::default()
        }
    }

    fn booking_count(store: &Arc<LabStore>) -> usize {
        BookingService::new(store.clone())
            .list_all(&BookingFilter::default())
            .unwrap()
            .len()
    }

    #[test]
    fn converts_with_owner_defaults() {
        let f = fixture(true);
        let service = ConversionService::new(f.store.clone());

        let out = service.convert(&f.admin, request(&f)).expect("convert");

        assert_eq!(out.booking.total_price, Decimal::from(450));
        assert_eq!(out.booking.status, BookingStatus::Confirmed);
        assert_eq!(out.booking.patient_name.as_str(), "Asha");
        assert_eq!(out.booking.patient_phone, "9000000000");
        assert_eq!(out.booking.user_id, f.owner.id);
        assert_eq!(out.booking.prescription, Some(f.prescription.id));
        assert_eq!(out.booking.appointment_at.to_string(), "2024-05-01 10:00:00");
        assert_eq!(out.prescription.status, PrescriptionStatus::Booked);
        assert_eq!(out.prescription.booking, Some(out.booking.id));

        let stored: Prescription = f.store.require(&f.prescription.id).unwrap();
        assert_eq!(stored, out.prescription);
        let stored: Booking = f.store.require(&out.booking.id).unwrap();
        assert_eq!(stored, out.booking);
    }

    #[test]
    fn overrides_replace_owner_defaults() {
        let f = fixture(true);
        let service = ConversionService::new(f.store.clone());

        let out = service
            .convert(
                &f.admin,
                ConversionRequest {
                    tests: vec![TestLine::new(f.t1.id, Quantity::new(2).unwrap())],
                    patient_name: Some("Ravi".into()),
                    address: Some("  4 Park Street ".into()),
                    notes: Some("home collection".into()),
                    ..request(&f)
                },
            )
            .expect("convert");

        assert_eq!(out.booking.patient_name.as_str(), "Ravi");
        assert_eq!(out.booking.address, "4 Park Street");
        assert_eq!(out.booking.notes, "home collection");
        assert_eq!(out.booking.total_price, Decimal::from(600));
    }

    #[test]
    fn blank_overrides_count_as_absent() {
        let f = fixture(true);
        let out = ConversionService::new(f.store.clone())
            .convert(
                &f.admin,
                ConversionRequest {
                    patient_name: Some("   ".into()),
                    address: Some(String::new()),
                    ..request(&f)
                },
            )
            .expect("convert");
        assert_eq!(out.booking.patient_name.as_str(), "Asha");
        assert_eq!(out.booking.address, "");
    }

    #[test]
    fn inactive_test_leaves_prescription_untouched() {
        let f = fixture(false);
        let service = ConversionService::new(f.store.clone());

        let err = service.convert(&f.admin, request(&f)).expect_err("inactive");
        match err {
            LabError::InvalidLineItem { test_id, problem } => {
                assert_eq!(test_id, f.t2.id);
                assert_eq!(problem, LineItemProblem::Inactive);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let stored: Prescription = f.store.require(&f.prescription.id).unwrap();
        assert_eq!(stored.status, PrescriptionStatus::Pending);
        assert!(stored.booking.is_none());
        assert_eq!(booking_count(&f.store), 0);
    }

    #[test]
    fn second_conversion_is_already_converted() {
        let f = fixture(true);
        let service = ConversionService::new(f.store.clone());

        let first = service.convert(&f.admin, request(&f)).expect("first");
        let err = service.convert(&f.admin, request(&f)).expect_err("second");

        assert!(matches!(err, LabError::AlreadyConverted(id) if id == f.prescription.id));
        assert_eq!(booking_count(&f.store), 1);
        let stored: Prescription = f.store.require(&f.prescription.id).unwrap();
        assert_eq!(stored.booking, Some(first.booking.id));
    }

    #[test]
    fn concurrent_conversions_yield_exactly_one_booking() {
        let f = fixture(true);
        let service = ConversionService::new(f.store.clone());
        const ATTEMPTS: usize = 8;

        let results: Vec<LabResult<ConversionOutcome>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..ATTEMPTS)
                .map(|_| {
                    let service = service.clone();
                    let actor = f.admin.clone();
                    let req = request(&f);
                    scope.spawn(move || service.convert(&actor, req))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("thread panicked"))
                .collect()
        });

        let winners: Vec<&ConversionOutcome> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.kind() == ErrorKind::AlreadyConverted));

        let stored: Prescription = f.store.require(&f.prescription.id).unwrap();
        assert_eq!(stored.status, PrescriptionStatus::Booked);
        assert_eq!(stored.booking, Some(winners[0].booking.id));
        assert_eq!(booking_count(&f.store), 1);
    }

    #[test]
    fn validation_runs_before_lookup() {
        let f = fixture(true);
        let service = ConversionService::new(f.store.clone());

        let err = service
            .convert(
                &f.admin,
                ConversionRequest {
                    prescription: RecordId::new(),
                    appointment_time: "9:30".into(),
                    ..request(&f)
                },
            )
            .expect_err("bad time");
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = service
            .convert(
                &f.admin,
                ConversionRequest {
                    tests: vec![],
                    ..request(&f)
                },
            )
            .expect_err("no tests");
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        let err = service
            .convert(
                &f.admin,
                ConversionRequest {
                    prescription: RecordId::new(),
                    ..request(&f)
                },
            )
            .expect_err("unknown prescription");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn rejected_prescription_can_still_be_converted() {
        let f = fixture(true);
        PrescriptionService::new(f.store.clone())
            .review(&f.admin, &f.prescription.id, ReviewDecision::Rejected, None)
            .unwrap();

        let out = ConversionService::new(f.store.clone())
            .convert(&f.admin, request(&f))
            .expect("convert");
        assert_eq!(out.prescription.status, PrescriptionStatus::Booked);
    }

    #[test]
    fn converted_prescription_cannot_be_reviewed_or_deleted() {
        let f = fixture(true);
        ConversionService::new(f.store.clone())
            .convert(&f.admin, request(&f))
            .unwrap();
        let prescriptions = PrescriptionService::new(f.store.clone());

        let err = prescriptions
            .review(&f.admin, &f.prescription.id, ReviewDecision::Pending, None)
            .expect_err("booked");
        assert_eq!(err.kind(), ErrorKind::AlreadyConverted);

        let err = prescriptions
            .delete(&f.admin, &f.prescription.id)
            .expect_err("linked");
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[test]
    fn failed_pair_write_changes_neither_record() {
        let f = fixture(true);
        // A plain file where the bookings directory belongs makes the booking write fail.
        let bookings_dir = f.store.config().data_dir().join(Collection::Bookings.dir_name());
        fs::write(&bookings_dir, "not a directory").unwrap();

        let err = ConversionService::new(f.store.clone())
            .convert(&f.admin, request(&f))
            .expect_err("blocked");
        assert_eq!(err.kind(), ErrorKind::AtomicityFailure);

        let stored: Prescription = f.store.require(&f.prescription.id).unwrap();
        assert_eq!(stored, f.prescription);
    }
}
