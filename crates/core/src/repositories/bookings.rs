//! Bookings.
//!
//! Users book tests themselves (`pending`); conversion creates `confirmed` bookings. Admins then
//! move a booking along its status lattice and attach result reports once it is `completed`.

use crate::actor::Actor;
use crate::error::{LabError, LabResult};
use crate::models::booking::{Booking, BookingFilter, BookingStatus, TestReport};
use crate::models::catalog::LabTest;
use crate::models::user::User;
use crate::pricing::{price_lines, TestLine};
use crate::repositories::text_or_empty;
use crate::schedule::combine;
use crate::store::LabStore;
use crate::versioned_files::{CommitAction, CommitDomain, CommitMessage};
use chrono::Utc;
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;
use std::sync::Arc;

/// A self-service booking request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NewBooking {
    pub tests: Vec<TestLine>,
    /// `YYYY-MM-DD`
    pub appointment_date: String,
    /// `HH:mm`
    pub appointment_time: String,
    pub patient_name: String,
    pub patient_phone: String,
    pub address: String,
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewReport {
    pub test_name: String,
    pub report_url: String,
}

#[derive(Clone, Debug)]
pub struct BookingService {
    store: Arc<LabStore>,
}

impl BookingService {
    pub fn new(store: Arc<LabStore>) -> Self {
        Self { store }
    }

    /// Price and store a `pending` booking owned by `user_id`.
    pub fn create(&self, user_id: &RecordId, input: NewBooking) -> LabResult<Booking> {
        let appointment_at = combine(&input.appointment_date, &input.appointment_time)?;
        let patient_name = NonEmptyText::new(&input.patient_name)
            .map_err(|_| LabError::InvalidInput("patient name is required".into()))?;
        let patient_phone = NonEmptyText::new(&input.patient_phone)
            .map_err(|_| LabError::InvalidInput("patient phone is required".into()))?;
        let address = NonEmptyText::new(&input.address)
            .map_err(|_| LabError::InvalidInput("address is required".into()))?;
        if input.tests.is_empty() {
            return Err(LabError::InvalidInput("at least one test is required".into()));
        }

        let owner: User = self.store.require(user_id)?;

        let booking = self.store.transact(&Actor::for_user(&owner), |tx| {
            let order = price_lines(&input.tests, |id| tx.get::<LabTest>(id))?;
            let now = Utc::now();
            let booking = Booking {
                id: RecordId::new(),
                user_id: owner.id,
                items: order.items,
                appointment_at,
                patient_name,
                patient_phone: patient_phone.into_inner(),
                address: address.into_inner(),
                notes: text_or_empty(input.notes),
                status: BookingStatus::Pending,
                total_price: order.total,
                prescription: None,
                reports: Vec::new(),
                created_at: now,
                updated_at: now,
            };

            tx.put(&booking)?;
            tx.commit_as(
                CommitMessage::new(CommitDomain::Booking, CommitAction::Create, "Book tests")?
                    .with_trailer("Booking-Id", booking.id.to_string())?,
            );
            Ok(booking)
        })?;

        tracing::info!(booking_id = %booking.id, total = %booking.total_price, "booking created");
        Ok(booking)
    }

    pub fn get(&self, id: &RecordId) -> LabResult<Booking> {
        self.store.require(id)
    }

    /// The user's bookings matching `filter`, latest appointment first.
    pub fn list_for_user(&self, user_id: &RecordId, filter: &BookingFilter) -> LabResult<Vec<Booking>> {
        self.list_where(|b| b.user_id == *user_id && filter.matches(b))
    }

    pub fn list_all(&self, filter: &BookingFilter) -> LabResult<Vec<Booking>> {
        self.list_where(|b| filter.matches(b))
    }

    /// Every booking of one user, for the admin's user view.
    pub fn list_for_owner(&self, user_id: &RecordId) -> LabResult<Vec<Booking>> {
        self.list_for_user(user_id, &BookingFilter::default())
    }

    fn list_where(&self, keep: impl Fn(&Booking) -> bool) -> LabResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .store
            .list::<Booking>()?
            .into_iter()
            .filter(|b| keep(b))
            .collect();
        bookings.sort_by(|a, b| {
            b.appointment_at
                .cmp(&a.appointment_at)
                .then_with(|| b.created_at.cmp(&a.created_at))
        });
        Ok(bookings)
    }

    /// Move a booking to `next`.
    ///
    /// Re-applying the current status returns the booking unchanged without a commit.
    pub fn advance_status(
        &self,
        actor: &Actor,
        id: &RecordId,
        next: BookingStatus,
    ) -> LabResult<Booking> {
        let booking = self.store.transact(actor, |tx| {
            let mut booking: Booking = tx.require(id)?;
            if booking.status == next {
                return Ok(booking);
            }
            if !booking.status.can_transition_to(next) {
                return Err(LabError::InvalidTransition {
                    record: "booking",
                    from: booking.status.as_str(),
                    to: next.as_str(),
                });
            }

            booking.status = next;
            booking.updated_at = Utc::now();
            tx.put(&booking)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::Booking,
                    CommitAction::Update,
                    format!("Booking status: {next}"),
                )?
                .with_trailer("Booking-Id", booking.id.to_string())?,
            );
            Ok(booking)
        })?;

        tracing::info!(booking_id = %booking.id, status = %booking.status, "booking status set");
        Ok(booking)
    }

    /// Append a result report. Only `completed` bookings accept reports, and the uploader must be
    /// a registered account.
    pub fn attach_report(
        &self,
        actor: &Actor,
        id: &RecordId,
        report: NewReport,
    ) -> LabResult<Booking> {
        let uploaded_by = actor.id.ok_or_else(|| {
            LabError::InvalidInput("reports must be uploaded by a registered user".into())
        })?;
        let test_name = NonEmptyText::new(&report.test_name)
            .map_err(|_| LabError::InvalidInput("report test name is required".into()))?;
        let report_url = NonEmptyText::new(&report.report_url)
            .map_err(|_| LabError::InvalidInput("report file is required".into()))?;

        let booking = self.store.transact(actor, |tx| {
            let mut booking: Booking = tx.require(id)?;
            if booking.status != BookingStatus::Completed {
                return Err(LabError::InvalidTransition {
                    record: "booking",
                    from: booking.status.as_str(),
                    to: "report attached",
                });
            }

            let now = Utc::now();
            let report = TestReport {
                id: RecordId::new(),
                test_name,
                report_url,
                uploaded_at: now,
                uploaded_by,
            };
            let report_id = report.id;
            booking.reports.push(report);
            booking.updated_at = now;

            tx.put(&booking)?;
            tx.commit_as(
                CommitMessage::new(CommitDomain::Booking, CommitAction::Update, "Attach report")?
                    .with_trailer("Booking-Id", booking.id.to_string())?
                    .with_trailer("Report-Id", report_id.to_string())?,
            );
            Ok(booking)
        })?;

        tracing::info!(booking_id = %booking.id, reports = booking.reports.len(), "report attached");
        Ok(booking)
    }

    pub fn remove_report(
        &self,
        actor: &Actor,
        id: &RecordId,
        report_id: &RecordId,
    ) -> LabResult<Booking> {
        let booking = self.store.transact(actor, |tx| {
            let mut booking: Booking = tx.require(id)?;
            let before = booking.reports.len();
            booking.reports.retain(|r| r.id != *report_id);
            if booking.reports.len() == before {
                return Err(LabError::ReportNotFound {
                    booking: booking.id,
                    report: *report_id,
                });
            }
            booking.updated_at = Utc::now();

            tx.put(&booking)?;
            tx.commit_as(
                CommitMessage::new(CommitDomain::Booking, CommitAction::Update, "Remove report")?
                    .with_trailer("Booking-Id", booking.id.to_string())?
                    .with_trailer("Report-Id", report_id.to_string())?,
            );
            Ok(booking)
        })?;

        tracing::info!(booking_id = %booking.id, report_id = %report_id, "report removed");
        Ok(booking)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::catalog::NewLabTest;
    use crate::models::user::NewUser;
    use crate::repositories::catalog::CatalogService;
    use crate::repositories::users::UserService;
    use crate::store::tests::{system, test_store};
    use crate::error::ErrorKind;
    use pathlab_types::Quantity;
    use rust_decimal::Decimal;

    pub(crate) fn add_test(store: &Arc<LabStore>, name: &str, price: i64, active: bool) -> LabTest {
        CatalogService::new(store.clone())
            .create(
                &system(),
                NewLabTest {
                    name: name.into(),
                    category: "General".into(),
                    price: Decimal::from(price),
                    sample_type: None,
                    preparation: None,
                    description: None,
                    is_active: Some(active),
                },
            )
            .expect("catalog test")
    }

    pub(crate) fn add_user(store: &Arc<LabStore>, name: &str, phone: Option<&str>) -> User {
        UserService::new(store.clone())
            .create(
                &system(),
                NewUser {
                    name: name.into(),
                    phone: phone.map(str::to_string),
                    ..Default::default()
                },
            )
            .expect("user")
    }

    fn request(tests: Vec<TestLine>, date: &str) -> NewBooking {
        NewBooking {
            tests,
            appointment_date: date.into(),
            appointment_time: "10:00".into(),
            patient_name: "Asha".into(),
            patient_phone: "9000000000".into(),
            address: "12 MG Road".into(),
            notes: None,
        }
    }

    fn admin(store: &Arc<LabStore>) -> Actor {
        Actor::for_user(&add_user(store, "Lab Admin", None)).as_admin()
    }

    #[test]
    fn deleted_test_stays_on_existing_bookings() {
        let (_dir, store) = test_store();
        let cbc = add_test(&store, "CBC", 300, true);
        let asha = add_user(&store, "Asha", Some("9000000000"));
        let bookings = BookingService::new(store.clone());
        let booking = bookings
            .create(&asha.id, request(vec![TestLine::single(cbc.id)], "2024-05-01"))
            .unwrap();

        CatalogService::new(store.clone())
            .delete(&system(), &cbc.id)
            .expect("delete");

        let kept = bookings.get(&booking.id).unwrap();
        assert_eq!(kept.items[0].name, "CBC");
        assert_eq!(kept.items[0].unit_price, Decimal::from(300));
        assert_eq!(kept.total_price, Decimal::from(300));

        let err = bookings
            .create(&asha.id, request(vec![TestLine::single(cbc.id)], "2024-05-02"))
            .expect_err("deleted test");
        assert_eq!(err.kind(), ErrorKind::InvalidLineItem);
    }

    #[test]
    fn self_service_booking_is_priced_and_pending() {
        let (_dir, store) = test_store();
        let cbc = add_test(&store, "CBC", 300, true);
        let hb = add_test(&store, "Hemoglobin", 150, true);
        let asha = add_user(&store, "Asha", Some("9000000000"));
        let bookings = BookingService::new(store);

        let booking = bookings
            .create(
                &asha.id,
                request(
                    vec![
                        TestLine::single(cbc.id),
                        TestLine::new(hb.id, Quantity::new(2).unwrap()),
                    ],
                    "2024-05-01",
                ),
            )
            .expect("create");

        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.total_price, Decimal::from(600));
        assert_eq!(booking.appointment_at.to_string(), "2024-05-01 10:00:00");
        assert_eq!(bookings.get(&booking.id).unwrap(), booking);
    }

    #[test]
    fn missing_fields_fail_before_store_access() {
        let (_dir, store) = test_store();
        let bookings = BookingService::new(store);

        let mut req = request(vec![TestLine::single(RecordId::new())], "2024-05-01");
        req.address = "  ".into();
        // The owner does not exist either; validation must win.
        let err = bookings.create(&RecordId::new(), req).expect_err("no address");
        assert!(matches!(err, LabError::InvalidInput(_)));

        let err = bookings
            .create(&RecordId::new(), request(vec![], "2024-05-01"))
            .expect_err("no tests");
        assert!(matches!(err, LabError::InvalidInput(_)));
    }

    #[test]
    fn inactive_test_creates_no_booking() {
        let (_dir, store) = test_store();
        let retired = add_test(&store, "Retired", 100, false);
        let asha = add_user(&store, "Asha", None);
        let bookings = BookingService::new(store);

        let err = bookings
            .create(&asha.id, request(vec![TestLine::single(retired.id)], "2024-05-01"))
            .expect_err("inactive");
        assert_eq!(err.kind(), ErrorKind::InvalidLineItem);
        assert!(bookings.list_all(&BookingFilter::default()).unwrap().is_empty());
    }

    #[test]
    fn lists_sort_by_appointment_descending() {
        let (_dir, store) = test_store();
        let cbc = add_test(&store, "CBC", 300, true);
        let asha = add_user(&store, "Asha", None);
        let ravi = add_user(&store, "Ravi", None);
        let bookings = BookingService::new(store);

        let early = bookings
            .create(&asha.id, request(vec![TestLine::single(cbc.id)], "2024-05-01"))
            .unwrap();
        let late = bookings
            .create(&asha.id, request(vec![TestLine::single(cbc.id)], "2024-06-01"))
            .unwrap();
        let mut other = request(vec![TestLine::single(cbc.id)], "2024-05-15");
        other.patient_name = "Ravi".into();
        other.patient_phone = "8000000000".into();
        bookings.create(&ravi.id, other).unwrap();

        let mine = bookings.list_for_owner(&asha.id).unwrap();
        assert_eq!(
            mine.iter().map(|b| b.id).collect::<Vec<_>>(),
            [late.id, early.id]
        );

        let searched = bookings
            .list_all(&BookingFilter {
                search: Some("8000".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].patient_name.as_str(), "Ravi");
        assert_eq!(bookings.list_all(&BookingFilter::default()).unwrap().len(), 3);
    }

    #[test]
    fn status_moves_along_the_lattice_only() {
        let (_dir, store) = test_store();
        let cbc = add_test(&store, "CBC", 300, true);
        let asha = add_user(&store, "Asha", None);
        let admin = admin(&store);
        let bookings = BookingService::new(store);
        let booking = bookings
            .create(&asha.id, request(vec![TestLine::single(cbc.id)], "2024-05-01"))
            .unwrap();

        let err = bookings
            .advance_status(&admin, &booking.id, BookingStatus::Completed)
            .expect_err("skip confirmed");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        let confirmed = bookings
            .advance_status(&admin, &booking.id, BookingStatus::Confirmed)
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);

        let again = bookings
            .advance_status(&admin, &booking.id, BookingStatus::Confirmed)
            .expect("same status is a no-op");
        assert_eq!(again, confirmed);

        bookings
            .advance_status(&admin, &booking.id, BookingStatus::Cancelled)
            .unwrap();
        let err = bookings
            .advance_status(&admin, &booking.id, BookingStatus::Pending)
            .expect_err("cancelled is terminal");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[test]
    fn reports_attach_only_to_completed_bookings() {
        let (_dir, store) = test_store();
        let cbc = add_test(&store, "CBC", 300, true);
        let asha = add_user(&store, "Asha", None);
        let admin = admin(&store);
        let bookings = BookingService::new(store);
        let booking = bookings
            .create(&asha.id, request(vec![TestLine::single(cbc.id)], "2024-05-01"))
            .unwrap();
        let report = NewReport {
            test_name: "CBC".into(),
            report_url: "https://files.example/cbc.pdf".into(),
        };

        let err = bookings
            .attach_report(&admin, &booking.id, report.clone())
            .expect_err("pending booking");
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);

        bookings
            .advance_status(&admin, &booking.id, BookingStatus::Confirmed)
            .unwrap();
        bookings
            .advance_status(&admin, &booking.id, BookingStatus::Completed)
            .unwrap();
        let with_report = bookings
            .attach_report(&admin, &booking.id, report)
            .expect("attach");
        assert_eq!(with_report.reports.len(), 1);
        assert_eq!(Some(with_report.reports[0].uploaded_by), admin.id);

        let report_id = with_report.reports[0].id;
        let err = bookings
            .remove_report(&admin, &booking.id, &RecordId::new())
            .expect_err("unknown report");
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let without = bookings
            .remove_report(&admin, &booking.id, &report_id)
            .expect("remove");
        assert!(without.reports.is_empty());
    }

    #[test]
    fn report_uploader_must_be_registered() {
        let (_dir, store) = test_store();
        let bookings = BookingService::new(store);
        let err = bookings
            .attach_report(
                &system(),
                &RecordId::new(),
                NewReport {
                    test_name: "CBC".into(),
                    report_url: "cbc.pdf".into(),
                },
            )
            .expect_err("system actor");
        assert!(matches!(err, LabError::InvalidInput(_)));
    }
}
