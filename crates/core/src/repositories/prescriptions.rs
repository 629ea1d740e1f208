//! Prescription intake and review.
//!
//! A prescription starts `pending` when its owner uploads it. Admins review it (`pending`,
//! `reviewed` or `rejected`) and may delete it while it is unlinked. The move to `booked` belongs
//! to [`ConversionService`](crate::repositories::conversion::ConversionService) alone.

use crate::actor::Actor;
use crate::error::{LabError, LabResult};
use crate::models::prescription::{Prescription, PrescriptionStatus, ReviewDecision};
use crate::models::user::User;
use crate::repositories::text_or_empty;
use crate::store::LabStore;
use crate::versioned_files::{CommitAction, CommitDomain, CommitMessage};
use chrono::Utc;
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct PrescriptionService {
    store: Arc<LabStore>,
}

impl PrescriptionService {
    pub fn new(store: Arc<LabStore>) -> Self {
        Self { store }
    }

    /// Record a new upload for `user_id`.
    ///
    /// The image reference is stored as given; nothing checks that it resolves.
    pub fn upload(
        &self,
        user_id: &RecordId,
        image_url: &str,
        notes: Option<String>,
    ) -> LabResult<Prescription> {
        let image_url = NonEmptyText::new(image_url)
            .map_err(|_| LabError::InvalidInput("prescription image is required".into()))?;
        let owner: User = self.store.require(user_id)?;

        let now = Utc::now();
        let prescription = Prescription {
            id: RecordId::new(),
            user_id: owner.id,
            image_url,
            status: PrescriptionStatus::Pending,
            notes: text_or_empty(notes),
            admin_notes: String::new(),
            booking: None,
            created_at: now,
            updated_at: now,
        };

        self.store.transact(&Actor::for_user(&owner), |tx| {
            tx.put(&prescription)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::Prescription,
                    CommitAction::Create,
                    "Upload prescription",
                )?
                .with_trailer("Prescription-Id", prescription.id.to_string())?,
            );
            Ok(())
        })?;

        tracing::info!(prescription_id = %prescription.id, user_id = %owner.id, "prescription uploaded");
        Ok(prescription)
    }

    pub fn get(&self, id: &RecordId) -> LabResult<Prescription> {
        self.store.require(id)
    }

    /// The user's prescriptions, newest first.
    pub fn list_for_user(&self, user_id: &RecordId) -> LabResult<Vec<Prescription>> {
        self.list_where(|p| p.user_id == *user_id)
    }

    /// All prescriptions, optionally with one status, newest first.
    pub fn list_all(&self, status: Option<PrescriptionStatus>) -> LabResult<Vec<Prescription>> {
        self.list_where(|p| status.map_or(true, |s| p.status == s))
    }

    fn list_where(&self, keep: impl Fn(&Prescription) -> bool) -> LabResult<Vec<Prescription>> {
        let mut prescriptions: Vec<Prescription> = self
            .store
            .list::<Prescription>()?
            .into_iter()
            .filter(|p| keep(p))
            .collect();
        prescriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(prescriptions)
    }

    /// Set the review status and overwrite the admin notes (absent notes clear them).
    ///
    /// # Errors
    ///
    /// - `NotFound` for an unknown prescription.
    /// - `AlreadyConverted` once the prescription is `booked`.
    pub fn review(
        &self,
        actor: &Actor,
        id: &RecordId,
        decision: ReviewDecision,
        admin_notes: Option<String>,
    ) -> LabResult<Prescription> {
        let reviewed = self.store.transact(actor, |tx| {
            let mut prescription: Prescription = tx.require(id)?;
            if prescription.is_booked() {
                return Err(LabError::AlreadyConverted(prescription.id));
            }

            prescription.status = decision.into();
            prescription.admin_notes = text_or_empty(admin_notes);
            prescription.updated_at = Utc::now();

            tx.put(&prescription)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::Prescription,
                    CommitAction::Update,
                    format!("Review prescription: {}", prescription.status),
                )?
                .with_trailer("Prescription-Id", prescription.id.to_string())?,
            );
            Ok(prescription)
        })?;

        tracing::info!(prescription_id = %reviewed.id, status = %reviewed.status, "prescription reviewed");
        Ok(reviewed)
    }

    /// Delete an unlinked prescription. A prescription linked to a booking is a `Conflict`.
    pub fn delete(&self, actor: &Actor, id: &RecordId) -> LabResult<()> {
        self.store.transact(actor, |tx| {
            let prescription: Prescription = tx.require(id)?;
            if let Some(booking) = prescription.booking {
                return Err(LabError::Conflict(format!(
                    "prescription {id} is linked to booking {booking} and cannot be deleted"
                )));
            }

            tx.remove::<Prescription>(id)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::Prescription,
                    CommitAction::Delete,
                    "Delete prescription",
                )?
                .with_trailer("Prescription-Id", id.to_string())?,
            );
            Ok(())
        })?;

        tracing::info!(prescription_id = %id, "prescription deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::repositories::users::UserService;
    use crate::store::tests::{system, test_store};

    fn setup() -> (tempfile::TempDir, PrescriptionService, User) {
        let (dir, store) = test_store();
        let owner = UserService::new(store.clone())
            .create(
                &system(),
                NewUser {
                    name: "Asha".into(),
                    ..Default::default()
                },
            )
            .expect("owner");
        (dir, PrescriptionService::new(store), owner)
    }

    #[test]
    fn upload_starts_pending_and_unlinked() {
        let (_dir, service, owner) = setup();
        let p = service
            .upload(&owner.id, "https://img.example/rx.jpg", Some("  fasting  ".into()))
            .expect("upload");

        assert_eq!(p.status, PrescriptionStatus::Pending);
        assert_eq!(p.notes, "fasting");
        assert!(p.admin_notes.is_empty());
        assert!(p.booking.is_none());
        assert_eq!(service.get(&p.id).unwrap(), p);
    }

    #[test]
    fn any_profile_text_can_upload_and_stays_out_of_history() {
        let (_dir, store) = test_store();
        let owner = UserService::new(store.clone())
            .create(
                &system(),
                NewUser {
                    name: "Asha <Kumar>".into(),
                    email: Some("ravi<x>@example.com".into()),
                    phone: Some("9000000000".into()),
                    ..Default::default()
                },
            )
            .expect("owner");
        let service = PrescriptionService::new(store.clone());

        let p = service
            .upload(&owner.id, "https://img.example/rx.jpg", None)
            .expect("upload");

        let repo = git2::Repository::open(store.config().data_dir()).expect("repo");
        let head = repo.head().expect("head").peel_to_commit().expect("commit");
        let message = head.message().expect("utf-8 message");
        assert!(message.contains(&format!("Actor-Id: {}", owner.id)));
        assert!(message.contains(&format!("Prescription-Id: {}", p.id)));
        for private in ["Asha", "Kumar", "ravi", "9000000000"] {
            assert!(!message.contains(private), "{private} leaked into {message}");
        }
        let author = head.author();
        assert_eq!(author.name(), Some(format!("user {}", owner.id).as_str()));
        assert_eq!(author.email(), Some(crate::constants::COMMIT_EMAIL));
    }

    #[test]
    fn upload_requires_image_and_known_owner() {
        let (_dir, service, owner) = setup();
        let err = service.upload(&owner.id, "   ", None).expect_err("no image");
        assert!(matches!(err, LabError::InvalidInput(_)));

        let err = service
            .upload(&RecordId::new(), "https://img.example/rx.jpg", None)
            .expect_err("unknown owner");
        assert!(matches!(err, LabError::NotFound { .. }));
    }

    #[test]
    fn review_overwrites_status_and_notes() {
        let (_dir, service, owner) = setup();
        let p = service.upload(&owner.id, "rx.jpg", None).unwrap();

        let reviewed = service
            .review(
                &system(),
                &p.id,
                ReviewDecision::Reviewed,
                Some("needs CBC".into()),
            )
            .expect("review");
        assert_eq!(reviewed.status, PrescriptionStatus::Reviewed);
        assert_eq!(reviewed.admin_notes, "needs CBC");

        let rejected = service
            .review(&system(), &p.id, ReviewDecision::Rejected, None)
            .unwrap();
        assert_eq!(rejected.status, PrescriptionStatus::Rejected);
        assert_eq!(rejected.admin_notes, "");
        assert!(rejected.booking.is_none());
    }

    #[test]
    fn review_of_unknown_prescription_is_not_found() {
        let (_dir, service, _owner) = setup();
        let err = service
            .review(&system(), &RecordId::new(), ReviewDecision::Reviewed, None)
            .expect_err("unknown");
        assert!(matches!(err, LabError::NotFound { .. }));
    }

    #[test]
    fn lists_are_newest_first_and_filtered() {
        let (_dir, service, owner) = setup();
        let first = service.upload(&owner.id, "a.jpg", None).unwrap();
        let second = service.upload(&owner.id, "b.jpg", None).unwrap();
        service
            .review(&system(), &first.id, ReviewDecision::Rejected, None)
            .unwrap();

        let mine = service.list_for_user(&owner.id).unwrap();
        assert_eq!(
            mine.iter().map(|p| p.id).collect::<Vec<_>>(),
            [second.id, first.id]
        );
        assert!(service.list_for_user(&RecordId::new()).unwrap().is_empty());

        let rejected = service
            .list_all(Some(PrescriptionStatus::Rejected))
            .unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].id, first.id);
        assert_eq!(service.list_all(None).unwrap().len(), 2);
    }

    #[test]
    fn delete_removes_unlinked_prescription() {
        let (_dir, service, owner) = setup();
        let p = service.upload(&owner.id, "rx.jpg", None).unwrap();
        service.delete(&system(), &p.id).expect("delete");
        assert!(matches!(
            service.get(&p.id),
            Err(LabError::NotFound { .. })
        ));
    }
}
