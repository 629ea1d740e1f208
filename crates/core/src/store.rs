//! The record store.
//!
//! All records live in one git repository rooted at the configured data directory. Reads go
//! straight to the working tree under a shared lock. Every mutation runs inside
//! [`LabStore::transact`], which holds the exclusive lock for the whole read-check-write sequence
//! and lands every staged change in a single commit.
//!
//! ```text
//! lab_data/
//!   .git/
//!   tests/<s1>/<s2>/<id>/test.yaml
//!   users/<s1>/<s2>/<id>/user.yaml
//!   prescriptions/<s1>/<s2>/<id>/prescription.yaml
//!   bookings/<s1>/<s2>/<id>/booking.yaml
//! ```

use crate::actor::Actor;
use crate::config::CoreConfig;
use crate::error::{LabError, LabResult};
use crate::models::{parse_record, render_record, Record};
use crate::versioned_files::{CommitMessage, FileChange, VersionedFileService};
use pathlab_uuid::RecordId;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

pub struct LabStore {
    cfg: Arc<CoreConfig>,
    // git2::Repository is not Sync, so the lock guards the data directory and each transaction
    // opens its own handle.
    gate: RwLock<()>,
}

impl std::fmt::Debug for LabStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabStore")
            .field("data_dir", &self.cfg.data_dir())
            .finish_non_exhaustive()
    }
}

impl LabStore {
    /// Open (or create) the store and reset the working tree to the last commit.
    pub fn open(cfg: Arc<CoreConfig>) -> LabResult<Self> {
        let files = VersionedFileService::open_or_init(cfg.data_dir())?;
        files.discard_uncommitted()?;
        tracing::debug!("record store ready at {}", files.workdir().display());
        Ok(Self {
            cfg,
            gate: RwLock::new(()),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn get<R: Record>(&self, id: &RecordId) -> LabResult<Option<R>> {
        let _guard = self.gate.read().map_err(|_| LabError::LockPoisoned)?;
        read_record(self.cfg.data_dir(), id)
    }

    /// Like [`get`](Self::get), but a missing record is `NotFound`.
    pub fn require<R: Record>(&self, id: &RecordId) -> LabResult<R> {
        self.get(id)?
            .ok_or_else(|| LabError::not_found(R::COLLECTION, *id))
    }

    /// Every readable record of a collection, in no particular order.
    pub fn list<R: Record>(&self) -> LabResult<Vec<R>> {
        let _guard = self.gate.read().map_err(|_| LabError::LockPoisoned)?;
        list_records(self.cfg.data_dir())
    }

    /// Run `f` under the exclusive lock and commit whatever it staged as one commit.
    ///
    /// If `f` fails nothing is written. If `f` stages nothing no commit is made.
    pub fn transact<T, F>(&self, actor: &Actor, f: F) -> LabResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> LabResult<T>,
    {
        let _guard = self.gate.write().map_err(|_| LabError::LockPoisoned)?;

        let mut tx = Transaction {
            data_dir: self.cfg.data_dir(),
            staged: BTreeMap::new(),
            message: None,
        };
        let value = f(&mut tx)?;

        if tx.staged.is_empty() {
            return Ok(value);
        }
        let message = tx.message.ok_or_else(|| {
            LabError::InvalidInput("staged changes need a commit message".into())
        })?;
        let changes: Vec<FileChange> = tx
            .staged
            .into_iter()
            .map(|(relative_path, content)| FileChange {
                relative_path,
                content,
            })
            .collect();

        let files = VersionedFileService::open(self.cfg.data_dir())?;
        let oid = files.write_and_commit(actor, self.cfg.lab_name(), &message, &changes)?;
        tracing::debug!(commit = %oid, "{}:{} committed", message.domain(), message.action());
        Ok(value)
    }
}

/// Staged changes of one [`LabStore::transact`] call.
///
/// Reads see the transaction's own staged writes.
pub struct Transaction<'a> {
    data_dir: &'a Path,
    staged: BTreeMap<PathBuf, Option<String>>,
    message: Option<CommitMessage>,
}

impl Transaction<'_> {
    pub fn get<R: Record>(&self, id: &RecordId) -> LabResult<Option<R>> {
        let relative = R::COLLECTION.record_path(id);
        match self.staged.get(&relative) {
            Some(Some(yaml)) => parse_record(yaml).map(Some),
            Some(None) => Ok(None),
            None => read_record(self.data_dir, id),
        }
    }

    pub fn require<R: Record>(&self, id: &RecordId) -> LabResult<R> {
        self.get(id)?
            .ok_or_else(|| LabError::not_found(R::COLLECTION, *id))
    }

    pub fn list<R: Record>(&self) -> LabResult<Vec<R>> {
        let mut records: Vec<R> = list_records::<R>(self.data_dir)?
            .into_iter()
            .filter(|r| !self.staged.contains_key(&R::COLLECTION.record_path(r.id())))
            .collect();

        let prefix = Path::new(R::COLLECTION.dir_name());
        for (path, content) in &self.staged {
            if let (true, Some(yaml)) = (path.starts_with(prefix), content) {
                records.push(parse_record(yaml)?);
            }
        }
        Ok(records)
    }

    /// Stage a record write. The record is validated now, not at commit time.
    pub fn put<R: Record>(&mut self, record: &R) -> LabResult<()> {
        let yaml = render_record(record)?;
        self.staged
            .insert(R::COLLECTION.record_path(record.id()), Some(yaml));
        Ok(())
    }

    pub fn remove<R: Record>(&mut self, id: &RecordId) -> LabResult<()> {
        if self.get::<R>(id)?.is_none() {
            return Err(LabError::not_found(R::COLLECTION, *id));
        }
        let relative = R::COLLECTION.record_path(id);
        if self.data_dir.join(&relative).exists() {
            self.staged.insert(relative, None);
        } else {
            // Only ever staged in this transaction.
            self.staged.remove(&relative);
        }
        Ok(())
    }

    /// Set the message for the commit. Calling this again replaces it.
    pub fn commit_as(&mut self, message: CommitMessage) {
        self.message = Some(message);
    }
}

fn read_record<R: Record>(data_dir: &Path, id: &RecordId) -> LabResult<Option<R>> {
    let path = data_dir.join(R::COLLECTION.record_path(id));
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LabError::FileRead(e)),
    };
    let record: R = parse_record(&text)?;
    if record.id() != id {
        return Err(crate::models::invariant(
            R::COLLECTION,
            format!("file for {id} contains record {}", record.id()),
        ));
    }
    Ok(Some(record))
}

/// Walk `<collection>/<s1>/<s2>/<id>/` and parse every record file found.
///
/// Unreadable or malformed files are logged and skipped so that one bad record cannot hide the
/// rest of a listing.
fn list_records<R: Record>(data_dir: &Path) -> LabResult<Vec<R>> {
    let root = data_dir.join(R::COLLECTION.dir_name());
    let mut records = Vec::new();

    for s1 in subdirs(&root)? {
        for s2 in subdirs(&s1)? {
            for record_dir in subdirs(&s2)? {
                let Some(id) = record_dir
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| RecordId::parse(n).ok())
                else {
                    tracing::warn!("skipping unexpected directory {}", record_dir.display());
                    continue;
                };
                match read_record::<R>(data_dir, &id) {
                    Ok(Some(record)) => records.push(record),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("skipping {} record {id}: {e}", R::COLLECTION),
                }
            }
        }
    }
    Ok(records)
}

fn subdirs(dir: &Path) -> LabResult<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LabError::FileRead(e)),
    };
    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(LabError::FileRead)?;
        if entry.file_type().map_err(LabError::FileRead)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    Ok(dirs)
}
