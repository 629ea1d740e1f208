//! Who is making a change.
//!
//! Every store commit is attributed to an [`Actor`]. The actor's name and role are rendered as
//! commit trailers and used for the git signature. Registered users appear only as role plus
//! record id; their names and contact details stay in the record files, never in history.

use crate::constants::COMMIT_EMAIL;
use crate::error::{LabError, LabResult};
use crate::models::user::{User, UserRole};
use pathlab_types::NonEmptyText;
use pathlab_uuid::RecordId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorRole {
    User,
    Admin,
    /// Maintenance tooling (CLI seeding, store initialisation).
    System,
}

impl ActorRole {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::System => "system",
        }
    }
}

impl From<UserRole> for ActorRole {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => Self::User,
            UserRole::Admin => Self::Admin,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Actor {
    pub id: Option<RecordId>,
    pub name: String,
    pub role: ActorRole,
}

impl Actor {
    /// The actor used by maintenance tooling.
    pub fn system(name: &str) -> LabResult<Self> {
        Ok(Self {
            id: None,
            name: NonEmptyText::new(name)?.into_inner(),
            role: ActorRole::System,
        })
    }

    /// An actor acting as the given user account, named `<role> <id>`.
    pub fn for_user(user: &User) -> Self {
        let role = ActorRole::from(user.role);
        Self {
            id: Some(user.id),
            name: pseudonym(role, &user.id),
            role,
        }
    }

    /// Same account, but acting with admin privileges granted by the caller.
    pub fn as_admin(mut self) -> Self {
        self.role = ActorRole::Admin;
        if let Some(id) = self.id {
            self.name = pseudonym(self.role, &id);
        }
        self
    }

    pub fn commit_email(&self) -> &'static str {
        COMMIT_EMAIL
    }

    /// Rejects names that cannot be rendered into a single-line trailer or git signature.
    pub fn validate_commit_actor(&self) -> LabResult<()> {
        let name = self.name.trim();
        if name.is_empty() || name.contains(['\n', '\r', '<', '>']) {
            return Err(LabError::InvalidInput(
                "actor name must be a non-empty single line without angle brackets".into(),
            ));
        }
        Ok(())
    }
}

fn pseudonym(role: ActorRole, id: &RecordId) -> String {
    format!("{} {id}", role.as_str())
}
