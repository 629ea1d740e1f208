//! Git-versioned file operations for the record store.
//!
//! The store directory is a single git repository (`git2`/libgit2). Every mutation of the store
//! goes through [`VersionedFileService::write_and_commit`], which:
//!
//! - writes (or removes) every file of the change,
//! - stages exactly those paths on top of `HEAD`'s tree,
//! - records them in **one** commit with a structured message.
//!
//! If any step fails, the working tree is restored to its previous contents (rewritten files get
//! their old bytes back, new files are deleted, newly created directories are removed), so a
//! change is either fully committed or not visible at all. Multi-record changes such as a
//! prescription conversion rely on this: both record files land in the same commit.
//!
//! ## Commit messages
//!
//! Subject: `<domain>:<action>: <summary>`, followed by a blank line and git trailers:
//!
//! ```text
//! prescription:convert: Prescription converted to booking
//!
//! Actor-Name: admin 0b6e...
//! Actor-Role: admin
//! Actor-Id: 0b6e...
//! Lab-Site: pathlab
//! Booking-Id: 4c1f...
//! ```
//!
//! Commit messages are labels and indexes. Do not put patient names, phone numbers or addresses
//! in them; use record ids.
//!
//! ## Recovery
//!
//! A crash between writing files and committing leaves uncommitted changes in the working tree.
//! [`VersionedFileService::discard_uncommitted`] resets the tree to `HEAD`; the store calls it on
//! open, so committed history is the only source of truth.

use crate::actor::Actor;
use crate::constants::MAIN_REF;
use crate::error::{LabError, LabResult};
use pathlab_types::NonEmptyText;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Record domain of a commit.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CommitDomain {
    Catalog,
    User,
    Prescription,
    Booking,
}

impl CommitDomain {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Catalog => "catalog",
            Self::User => "user",
            Self::Prescription => "prescription",
            Self::Booking => "booking",
        }
    }
}

impl fmt::Display for CommitDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CommitAction {
    Create,
    Update,
    Convert,
    Delete,
}

impl CommitAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Convert => "convert",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `Key: Value` git trailer.
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct CommitTrailer {
    key: String,
    value: String,
}

impl CommitTrailer {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> LabResult<Self> {
        let key = key.into().trim().to_string();
        let value = value.into().trim().to_string();

        if key.is_empty()
            || key.contains(['\n', '\r', ':'])
            || value.is_empty()
            || value.contains(['\n', '\r'])
        {
            return Err(LabError::InvalidInput(
                "commit trailer key/value must be non-empty and single-line (key cannot contain ':')".into(),
            ));
        }

        Ok(Self { key, value })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

fn is_reserved_trailer_key(key: &str) -> bool {
    let key = key.trim();
    key.starts_with("Actor-") || key == "Lab-Site"
}

/// A structured, predictable commit message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommitMessage {
    domain: CommitDomain,
    action: CommitAction,
    summary: NonEmptyText,
    trailers: Vec<CommitTrailer>,
}

impl CommitMessage {
    pub fn new(
        domain: CommitDomain,
        action: CommitAction,
        summary: impl AsRef<str>,
    ) -> LabResult<Self> {
        let summary = summary.as_ref().trim();
        if summary.contains(['\n', '\r']) {
            return Err(LabError::InvalidInput(
                "commit summary must be single-line".into(),
            ));
        }
        let summary = NonEmptyText::new(summary)
            .map_err(|_| LabError::InvalidInput("commit summary must be non-empty".into()))?;

        Ok(Self {
            domain,
            action,
            summary,
            trailers: Vec::new(),
        })
    }

    /// Add a trailer. `Actor-*` and `Lab-Site` are emitted from structured data only.
    pub fn with_trailer(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> LabResult<Self> {
        let key = key.into();
        if is_reserved_trailer_key(&key) {
            return Err(LabError::ReservedTrailerKey);
        }
        self.trailers.push(CommitTrailer::new(key, value)?);
        Ok(self)
    }

    pub fn domain(&self) -> CommitDomain {
        self.domain
    }

    pub fn action(&self) -> CommitAction {
        self.action
    }

    /// Render the full message with actor and site trailers.
    ///
    /// Trailer order is deterministic: `Actor-Name`, `Actor-Role`, `Actor-Id` (if any),
    /// `Lab-Site`, then the remaining trailers sorted by key and value.
    pub fn render_with_actor(&self, actor: &Actor, lab_site: &str) -> LabResult<String> {
        actor.validate_commit_actor()?;

        let lab_site = lab_site.trim();
        if lab_site.is_empty() || lab_site.contains(['\n', '\r']) {
            return Err(LabError::InvalidInput(
                "Lab-Site must be a non-empty single line".into(),
            ));
        }
        if self.trailers.iter().any(|t| is_reserved_trailer_key(t.key())) {
            return Err(LabError::ReservedTrailerKey);
        }

        let mut rendered = format!("{}:{}: {}", self.domain, self.action, self.summary);

        rendered.push_str("\n\nActor-Name: ");
        rendered.push_str(actor.name.trim());
        rendered.push_str("\nActor-Role: ");
        rendered.push_str(actor.role.as_str());
        if let Some(id) = &actor.id {
            rendered.push_str("\nActor-Id: ");
            rendered.push_str(&id.to_string());
        }
        rendered.push_str("\nLab-Site: ");
        rendered.push_str(lab_site);

        let mut other = self.trailers.clone();
        other.sort();
        for trailer in other {
            rendered.push('\n');
            rendered.push_str(trailer.key());
            rendered.push_str(": ");
            rendered.push_str(trailer.value());
        }

        Ok(rendered)
    }
}

/// One file-level change within a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Path relative to the repository working directory.
    pub relative_path: PathBuf,
    /// New file content; `None` removes the file.
    pub content: Option<String>,
}

impl FileChange {
    pub fn write(relative_path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: Some(content.into()),
        }
    }

    pub fn remove(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
            content: None,
        }
    }
}

/// Git operations on the repository rooted at `workdir`.
pub struct VersionedFileService {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl VersionedFileService {
    /// Initialise a new repository whose `HEAD` points at `refs/heads/main`.
    pub fn init(workdir: &Path) -> LabResult<Self> {
        let mut opts = git2::RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = git2::Repository::init_opts(workdir, &opts).map_err(LabError::GitInit)?;
        Self::from_repo(repo, LabError::GitInit)
    }

    /// Open an existing repository without searching parent directories.
    pub fn open(workdir: &Path) -> LabResult<Self> {
        let repo = git2::Repository::open_ext(
            workdir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(LabError::GitOpen)?;
        Self::from_repo(repo, LabError::GitOpen)
    }

    /// Open the repository at `workdir`, initialising it (and the directory) on first use.
    pub fn open_or_init(workdir: &Path) -> LabResult<Self> {
        if workdir.join(".git").is_dir() {
            return Self::open(workdir);
        }
        fs::create_dir_all(workdir).map_err(LabError::StorageDirCreation)?;
        tracing::info!("initialising record store at {}", workdir.display());
        Self::init(workdir)
    }

    fn from_repo(
        repo: git2::Repository,
        wrap: fn(git2::Error) -> LabError,
    ) -> LabResult<Self> {
        // git2 may canonicalise the path; index paths must be relative to its view of the workdir.
        let workdir = repo
            .workdir()
            .ok_or_else(|| wrap(git2::Error::from_str("repository has no working directory")))?
            .to_path_buf();
        Ok(Self { repo, workdir })
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Id of the commit `HEAD` points at, or `None` before the first commit.
    pub fn head_commit_id(&self) -> LabResult<Option<git2::Oid>> {
        Ok(self.resolve_head_parents()?.first().map(|c| c.id()))
    }

    /// Reset the working tree to `HEAD`, dropping modified and untracked files.
    pub fn discard_uncommitted(&self) -> LabResult<()> {
        if self.resolve_head_parents()?.is_empty() {
            return Ok(());
        }
        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo
            .checkout_head(Some(&mut checkout))
            .map_err(LabError::GitCheckout)
    }

    /// Apply `changes` to the working tree and record them in a single commit.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if a path is absolute or escapes the repository (nothing is touched).
    /// - [`LabError::CommitRolledBack`] if writing or committing failed and the working tree
    ///   was restored.
    /// - [`LabError::RollbackFailed`] if the restore itself failed.
    pub fn write_and_commit(
        &self,
        actor: &Actor,
        lab_site: &str,
        message: &CommitMessage,
        changes: &[FileChange],
    ) -> LabResult<git2::Oid> {
        let rendered = message.render_with_actor(actor, lab_site)?;
        if changes.is_empty() {
            return Err(LabError::InvalidInput("a commit needs at least one change".into()));
        }
        for change in changes {
            validate_relative_path(&change.relative_path)?;
        }

        let mut created_dirs: Vec<PathBuf> = Vec::new();
        let mut touched: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::new();

        let result: LabResult<git2::Oid> = (|| {
            let mut dirs_needed = std::collections::HashSet::new();
            for change in changes.iter().filter(|c| c.content.is_some()) {
                let full_path = self.workdir.join(&change.relative_path);
                let mut current = full_path.parent();
                while let Some(dir) = current {
                    if dir == self.workdir || dir.exists() {
                        break;
                    }
                    dirs_needed.insert(dir.to_path_buf());
                    current = dir.parent();
                }
            }

            let mut dirs_to_create: Vec<PathBuf> = dirs_needed.into_iter().collect();
            dirs_to_create.sort_by_key(|p| p.components().count());
            for dir in &dirs_to_create {
                fs::create_dir(dir).map_err(LabError::FileWrite)?;
                created_dirs.push(dir.clone());
            }

            for change in changes {
                let full_path = self.workdir.join(&change.relative_path);
                let previous = match fs::read(&full_path) {
                    Ok(bytes) => Some(bytes),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                    Err(e) => return Err(LabError::FileRead(e)),
                };

                match &change.content {
                    Some(content) => {
                        fs::write(&full_path, content).map_err(LabError::FileWrite)?;
                    }
                    None => {
                        if previous.is_none() {
                            return Err(LabError::InvalidInput(format!(
                                "cannot remove missing file {}",
                                change.relative_path.display()
                            )));
                        }
                        fs::remove_file(&full_path).map_err(LabError::FileRemove)?;
                    }
                }
                touched.push((full_path, previous));
            }

            self.commit_changes(actor, &rendered, changes)
        })();

        match result {
            Ok(oid) => {
                self.prune_empty_dirs(changes);
                Ok(oid)
            }
            Err(commit_error) => {
                let mut rollback_error: Option<io::Error> = None;

                for (full_path, previous) in touched.iter().rev() {
                    let outcome = match previous {
                        Some(bytes) => fs::write(full_path, bytes),
                        None => match fs::remove_file(full_path) {
                            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                            other => other,
                        },
                    };
                    if let Err(e) = outcome {
                        rollback_error.get_or_insert(e);
                    }
                }

                for dir in created_dirs.iter().rev() {
                    let _ = fs::remove_dir(dir);
                }

                tracing::warn!(
                    "{}:{} rolled back: {}",
                    message.domain(),
                    message.action(),
                    commit_error
                );

                match rollback_error {
                    Some(rollback_error) => Err(LabError::RollbackFailed {
                        path: self.workdir.clone(),
                        commit_error: Box::new(commit_error),
                        rollback_error,
                    }),
                    None => Err(LabError::CommitRolledBack(Box::new(commit_error))),
                }
            }
        }
    }

    fn commit_changes(
        &self,
        actor: &Actor,
        message: &str,
        changes: &[FileChange],
    ) -> LabResult<git2::Oid> {
        self.ensure_main_head()?;
        let parents = self.resolve_head_parents()?;

        // Rebuild the index from HEAD so the new tree is exactly HEAD plus these changes.
        let mut index = self.repo.index().map_err(LabError::GitIndex)?;
        match parents.first() {
            Some(head) => {
                let head_tree = head.tree().map_err(LabError::GitFindTree)?;
                index.read_tree(&head_tree).map_err(LabError::GitIndex)?;
            }
            None => index.clear().map_err(LabError::GitIndex)?,
        }

        for change in changes {
            match change.content {
                Some(_) => index
                    .add_path(&change.relative_path)
                    .map_err(LabError::GitAdd)?,
                None => index
                    .remove_path(&change.relative_path)
                    .map_err(LabError::GitAdd)?,
            }
        }

        let tree_id = index.write_tree().map_err(LabError::GitWriteTree)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(LabError::GitFindTree)?;

        let sig = git2::Signature::now(actor.name.trim(), actor.commit_email())
            .map_err(LabError::GitSignature)?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
            .map_err(LabError::GitCommit)?;

        // The commit is durable at this point; a stale on-disk index is rebuilt next time.
        if let Err(e) = index.write() {
            tracing::warn!("failed to persist git index after commit {}: {}", oid, e);
        }

        Ok(oid)
    }

    fn ensure_main_head(&self) -> LabResult<()> {
        self.repo.set_head(MAIN_REF).map_err(LabError::GitSetHead)
    }

    fn resolve_head_parents(&self) -> LabResult<Vec<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(LabError::GitPeel)?;
                Ok(vec![commit])
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(vec![]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(vec![]),
            Err(e) => Err(LabError::GitHead(e)),
        }
    }

    /// Remove directories left empty by file removals. Non-empty directories stay.
    fn prune_empty_dirs(&self, changes: &[FileChange]) {
        for change in changes.iter().filter(|c| c.content.is_none()) {
            let mut current = self.workdir.join(&change.relative_path);
            while let Some(parent) = current.parent() {
                if parent == self.workdir || fs::remove_dir(parent).is_err() {
                    break;
                }
                current = parent.to_path_buf();
            }
        }
    }
}

fn validate_relative_path(path: &Path) -> LabResult<()> {
    if path.as_os_str().is_empty() || path.is_absolute() {
        return Err(LabError::InvalidInput(
            "path must be relative to the repository working directory".into(),
        ));
    }
    if path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(LabError::InvalidInput(
            "path must not contain parent, root or current directory references".into(),
        ));
    }
    if path.starts_with(".git") {
        return Err(LabError::InvalidInput(
            "path must not point inside the .git directory".into(),
        ));
    }
    Ok(())
}
