use crate::actor::Actor;
use crate::error::{LabError, LabResult};
use crate::models::user::{NewUser, ProfilePatch, User, UserFilter, UserRole};
use crate::repositories::non_blank;
use crate::store::LabStore;
use crate::versioned_files::{CommitAction, CommitDomain, CommitMessage};
use chrono::Utc;
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct UserService {
    store: Arc<LabStore>,
}

impl UserService {
    pub fn new(store: Arc<LabStore>) -> Self {
        Self { store }
    }

    pub fn create(&self, actor: &Actor, input: NewUser) -> LabResult<User> {
        let now = Utc::now();
        let user = User {
            id: RecordId::new(),
            name: NonEmptyText::new(&input.name)
                .map_err(|_| LabError::InvalidInput("name is required".into()))?,
            email: checked_email(input.email)?,
            phone: non_blank(input.phone),
            address: non_blank(input.address),
            role: input.role,
            created_at: now,
            updated_at: now,
        };

        self.store.transact(actor, |tx| {
            tx.put(&user)?;
            tx.commit_as(
                CommitMessage::new(CommitDomain::User, CommitAction::Create, "Register user")?
                    .with_trailer("User-Id", user.id.to_string())?,
            );
            Ok(())
        })?;

        tracing::info!(user_id = %user.id, role = %user.role, "user created");
        Ok(user)
    }

    pub fn get(&self, id: &RecordId) -> LabResult<User> {
        self.store.require(id)
    }

    /// Matching users, newest first.
    pub fn list(&self, filter: &UserFilter) -> LabResult<Vec<User>> {
        let mut users: Vec<User> = self
            .store
            .list::<User>()?
            .into_iter()
            .filter(|u| filter.matches(u))
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    /// Apply a user's own profile edit. The user is the commit actor.
    pub fn update_profile(&self, id: &RecordId, patch: ProfilePatch) -> LabResult<User> {
        let current: User = self.store.require(id)?;
        let actor = Actor::for_user(&current);

        let updated = self.store.transact(&actor, |tx| {
            let mut user: User = tx.require(id)?;
            if let Some(name) = patch.name {
                user.name = NonEmptyText::new(name)
                    .map_err(|_| LabError::InvalidInput("name cannot be empty".into()))?;
            }
            if patch.email.is_some() {
                user.email = checked_email(patch.email)?;
            }
            if patch.phone.is_some() {
                user.phone = non_blank(patch.phone);
            }
            if patch.address.is_some() {
                user.address = non_blank(patch.address);
            }
            user.updated_at = Utc::now();

            tx.put(&user)?;
            tx.commit_as(
                CommitMessage::new(CommitDomain::User, CommitAction::Update, "Update profile")?
                    .with_trailer("User-Id", user.id.to_string())?,
            );
            Ok(user)
        })?;

        tracing::info!(user_id = %updated.id, "profile updated");
        Ok(updated)
    }

    /// Change another account's role. An admin cannot change their own.
    pub fn set_role(&self, actor: &Actor, id: &RecordId, role: UserRole) -> LabResult<User> {
        if actor.id.as_ref() == Some(id) {
            return Err(LabError::InvalidInput("cannot change your own role".into()));
        }

        let updated = self.store.transact(actor, |tx| {
            let mut user: User = tx.require(id)?;
            if user.role == role {
                return Ok(user);
            }
            user.role = role;
            user.updated_at = Utc::now();

            tx.put(&user)?;
            tx.commit_as(
                CommitMessage::new(
                    CommitDomain::User,
                    CommitAction::Update,
                    format!("Set role to {role}"),
                )?
                .with_trailer("User-Id", user.id.to_string())?,
            );
            Ok(user)
        })?;

        tracing::info!(user_id = %updated.id, role = %updated.role, "user role set");
        Ok(updated)
    }
}

fn checked_email(email: Option<String>) -> LabResult<Option<String>> {
    match non_blank(email) {
        Some(email) if !email.contains('@') || email.contains(char::is_whitespace) => Err(
            LabError::InvalidInput(format!("'{email}' is not an email address")),
        ),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{system, test_store};

    fn asha() -> NewUser {
        NewUser {
            name: "Asha".into(),
            email: Some("asha@example.com".into()),
            phone: Some("9000000000".into()),
            address: Some("12 MG Road".into()),
            role: UserRole::User,
        }
    }

    #[test]
    fn create_and_get() {
        let (_dir, store) = test_store();
        let users = UserService::new(store);
        let created = users.create(&system(), asha()).expect("create");
        assert_eq!(users.get(&created.id).unwrap(), created);
        assert_eq!(created.phone.as_deref(), Some("9000000000"));
    }

    #[test]
    fn invalid_email_is_rejected() {
        let (_dir, store) = test_store();
        let users = UserService::new(store);
        let err = users
            .create(
                &system(),
                NewUser {
                    email: Some("not-an-email".into()),
                    ..asha()
                },
            )
            .expect_err("bad email");
        assert!(matches!(err, LabError::InvalidInput(_)));
    }

    #[test]
    fn profile_patch_clears_with_empty_string() {
        let (_dir, store) = test_store();
        let users = UserService::new(store);
        let created = users.create(&system(), asha()).unwrap();

        let updated = users
            .update_profile(
                &created.id,
                ProfilePatch {
                    name: Some("Asha Kumar".into()),
                    address: Some(String::new()),
                    ..Default::default()
                },
            )
            .expect("update");

        assert_eq!(updated.name.as_str(), "Asha Kumar");
        assert_eq!(updated.address, None);
        assert_eq!(updated.phone.as_deref(), Some("9000000000"));
    }

    #[test]
    fn admin_promotes_another_user() {
        let (_dir, store) = test_store();
        let users = UserService::new(store);
        let admin = users
            .create(
                &system(),
                NewUser {
                    name: "Lab Admin".into(),
                    role: UserRole::Admin,
                    ..Default::default()
                },
            )
            .unwrap();
        let asha = users.create(&system(), asha()).unwrap();
        let actor = Actor::for_user(&admin).as_admin();

        let promoted = users.set_role(&actor, &asha.id, UserRole::Admin).expect("promote");
        assert_eq!(promoted.role, UserRole::Admin);
        assert_eq!(users.get(&asha.id).unwrap().role, UserRole::Admin);

        let demoted = users.set_role(&actor, &asha.id, UserRole::User).expect("demote");
        assert_eq!(demoted.role, UserRole::User);
    }

    #[test]
    fn own_role_cannot_be_changed() {
        let (_dir, store) = test_store();
        let users = UserService::new(store);
        let admin = users
            .create(
                &system(),
                NewUser {
                    name: "Lab Admin".into(),
                    role: UserRole::Admin,
                    ..Default::default()
                },
            )
            .unwrap();
        let actor = Actor::for_user(&admin).as_admin();

        let err = users
            .set_role(&actor, &admin.id, UserRole::User)
            .expect_err("own role");
        assert!(matches!(err, LabError::InvalidInput(_)));
        assert_eq!(users.get(&admin.id).unwrap().role, UserRole::Admin);
    }

    #[test]
    fn set_role_on_unknown_user_is_not_found() {
        let (_dir, store) = test_store();
        let users = UserService::new(store);
        let err = users
            .set_role(&system(), &RecordId::new(), UserRole::Admin)
            .expect_err("unknown");
        assert!(matches!(err, LabError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn list_filters_by_role_and_search() {
        let (_dir, store) = test_store();
        let users = UserService::new(store);
        users.create(&system(), asha()).unwrap();
        users
            .create(
                &system(),
                NewUser {
                    name: "Lab Admin".into(),
                    role: UserRole::Admin,
                    ..Default::default()
                },
            )
            .unwrap();

        let admins = users
            .list(&UserFilter {
                role: Some(UserRole::Admin),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(admins.len(), 1);

        let found = users
            .list(&UserFilter {
                search: Some("9000".into()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name.as_str(), "Asha");
    }
}
