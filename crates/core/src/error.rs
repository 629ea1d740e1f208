use crate::paths::Collection;
use pathlab_uuid::RecordId;

/// Machine-readable failure category.
///
/// Every [`LabError`] maps onto exactly one kind; API layers expose `as_str()` to clients and
/// choose status codes from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationError,
    NotFound,
    InvalidLineItem,
    AlreadyConverted,
    InvalidTransition,
    Conflict,
    AtomicityFailure,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "ValidationError",
            Self::NotFound => "NotFound",
            Self::InvalidLineItem => "InvalidLineItem",
            Self::AlreadyConverted => "AlreadyConverted",
            Self::InvalidTransition => "InvalidTransition",
            Self::Conflict => "Conflict",
            Self::AtomicityFailure => "AtomicityFailure",
            Self::Internal => "Internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a requested test could not be priced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineItemProblem {
    Missing,
    Inactive,
}

#[derive(Debug, thiserror::Error)]
pub enum LabError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid id: {0}")]
    Uuid(#[from] pathlab_uuid::UuidError),
    #[error("{collection} record {id} not found")]
    NotFound { collection: Collection, id: RecordId },
    #[error("report {report} not found on booking {booking}")]
    ReportNotFound { booking: RecordId, report: RecordId },
    #[error("Test {test_id} not found or inactive")]
    InvalidLineItem {
        test_id: RecordId,
        problem: LineItemProblem,
    },
    /// A requested test reference that is not even a well-formed id.
    #[error("Test {0} not found or inactive")]
    UnknownTestRef(String),
    #[error("prescription {0} has already been converted to a booking")]
    AlreadyConverted(RecordId),
    #[error("cannot move {record} from {from} to {to}")]
    InvalidTransition {
        record: &'static str,
        from: &'static str,
        to: &'static str,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("stored {collection} record violates invariant: {message}")]
    InvariantViolation {
        collection: Collection,
        message: String,
    },

    #[error("change could not be committed and was rolled back: {0}")]
    CommitRolledBack(#[source] Box<LabError>),
    #[error(
        "commit failed and rollback also failed (path: {path}): commit={commit_error}; rollback={rollback_error}",
        path = path.display()
    )]
    RollbackFailed {
        path: std::path::PathBuf,
        #[source]
        commit_error: Box<LabError>,
        rollback_error: std::io::Error,
    },

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to remove record file: {0}")]
    FileRemove(std::io::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("{collection} schema mismatch at {path}: {message}")]
    YamlDeserialization {
        collection: Collection,
        path: String,
        message: String,
    },
    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("failed to initialise git repository: {0}")]
    GitInit(git2::Error),
    #[error("failed to open git repository: {0}")]
    GitOpen(git2::Error),
    #[error("failed to access git index: {0}")]
    GitIndex(git2::Error),
    #[error("failed to stage path in git index: {0}")]
    GitAdd(git2::Error),
    #[error("failed to write git tree: {0}")]
    GitWriteTree(git2::Error),
    #[error("failed to find git tree: {0}")]
    GitFindTree(git2::Error),
    #[error("failed to create git signature: {0}")]
    GitSignature(git2::Error),
    #[error("failed to create git commit: {0}")]
    GitCommit(git2::Error),
    #[error("failed to get git head: {0}")]
    GitHead(git2::Error),
    #[error("failed to set git head: {0}")]
    GitSetHead(git2::Error),
    #[error("failed to peel git commit: {0}")]
    GitPeel(git2::Error),
    #[error("failed to check out git head: {0}")]
    GitCheckout(git2::Error),

    #[error("commit trailer keys Actor-* and Lab-Site are reserved")]
    ReservedTrailerKey,
}

impl LabError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::Uuid(_) => ErrorKind::ValidationError,
            Self::NotFound { .. } | Self::ReportNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidLineItem { .. } | Self::UnknownTestRef(_) => ErrorKind::InvalidLineItem,
            Self::AlreadyConverted(_) => ErrorKind::AlreadyConverted,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::CommitRolledBack(_) | Self::RollbackFailed { .. } => ErrorKind::AtomicityFailure,
            _ => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(collection: Collection, id: RecordId) -> Self {
        Self::NotFound { collection, id }
    }
}

pub type LabResult<T> = std::result::Result<T, LabError>;

impl From<pathlab_types::TextError> for LabError {
    fn from(err: pathlab_types::TextError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_their_kind() {
        let id = RecordId::new();
        assert_eq!(
            LabError::not_found(Collection::Prescriptions, id).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            LabError::AlreadyConverted(id).kind(),
            ErrorKind::AlreadyConverted
        );
        assert_eq!(
            LabError::InvalidLineItem {
                test_id: id,
                problem: LineItemProblem::Inactive
            }
            .kind(),
            ErrorKind::InvalidLineItem
        );
        assert_eq!(
            LabError::InvalidInput("bad".into()).kind(),
            ErrorKind::ValidationError
        );
    }

    #[test]
    fn rolled_back_commit_is_an_atomicity_failure() {
        let inner = LabError::FileWrite(std::io::Error::other("disk full"));
        let err = LabError::CommitRolledBack(Box::new(inner));
        assert_eq!(err.kind(), ErrorKind::AtomicityFailure);
        assert_eq!(err.kind().as_str(), "AtomicityFailure");
    }

    #[test]
    fn invalid_line_item_message_names_the_test() {
        let id = RecordId::parse("0123456789abcdef0123456789abcdef").expect("valid id");
        let err = LabError::InvalidLineItem {
            test_id: id,
            problem: LineItemProblem::Missing,
        };
        assert_eq!(
            err.to_string(),
            "Test 0123456789abcdef0123456789abcdef not found or inactive"
        );
    }

    #[test]
    fn malformed_test_reference_is_a_line_item_error() {
        let err = LabError::UnknownTestRef("T2".into());
        assert_eq!(err.kind(), ErrorKind::InvalidLineItem);
        assert_eq!(err.to_string(), "Test T2 not found or inactive");
    }

    #[test]
    fn storage_failures_are_internal() {
        let err = LabError::FileRead(std::io::Error::other("boom"));
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
