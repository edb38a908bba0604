//! Editing sessions over package files.
//!
//! An [`EditSession`] queues changes against an open package and applies them all at once on
//! [`EditSession::save`]. A [`SessionRegistry`] hands out one session per file, however the path is
//! spelled.

use indexmap::map::Entry;
use indexmap::IndexMap;
use std::env;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, instrument};

use crate::error::Result;
use crate::package::{Change, DbpfPackage};
use crate::resource::DbpfResource;
use crate::types::Tgi;
use crate::write::ResourceData;

/// Queued edits of a single package file
#[derive(Debug)]
pub struct EditSession {
    path: PathBuf,
    package: DbpfPackage,
    changes: Vec<Change>,
}

impl EditSession {
    /// Opens a session on the package at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<EditSession> {
        let path = resolve(path.as_ref())?;
        let package = DbpfPackage::open(&path)?;

        Ok(EditSession {
            path,
            package,
            changes: Vec::new(),
        })
    }

    /// Resolved path of the package
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The package being edited
    pub fn package(&self) -> &DbpfPackage {
        &self.package
    }

    /// Committed resources of the package
    pub fn resources(&self) -> impl Iterator<Item = DbpfResource<'_>> {
        self.package.resources()
    }

    /// Queues a new compressed resource
    pub fn add_resource(&mut self, tgi: Tgi, data: impl Into<Vec<u8>>) {
        self.changes
            .push(Change::Insert(ResourceData::new(tgi, data, true)));
    }

    /// Queues the replacement of every resource with this TGI
    pub fn update_resource(&mut self, tgi: Tgi, data: impl Into<Vec<u8>>) {
        self.changes.push(Change::Delete(tgi));
        self.add_resource(tgi, data);
    }

    /// Queues the removal of every resource with this TGI
    pub fn delete_resource(&mut self, tgi: Tgi) {
        self.changes.push(Change::Delete(tgi));
    }

    /// Changes queued since the last save
    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    /// True if there are queued changes that have not been written
    pub fn has_unsaved_changes(&self) -> bool {
        !self.changes.is_empty() || self.package.has_pending_changes()
    }

    /// Applies the queued changes to the package and saves it in place.
    #[instrument(skip(self), fields(path = %self.path.display(), changes = self.changes.len()), err)]
    pub fn save(&mut self) -> Result<()> {
        for change in self.changes.drain(..) {
            self.package.apply(change);
        }
        self.package.save()
    }

    /// Drops the queued changes
    pub fn discard_changes(&mut self) {
        debug!(changes = self.changes.len(), "discarding changes");
        self.changes.clear();
        self.package.discard_changes();
    }

    /// Closes the session and its package
    pub fn close(self) {
        self.package.close();
    }
}

/// Open editing sessions, keyed by resolved path
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: IndexMap<PathBuf, EditSession>,
}

impl SessionRegistry {
    /// Creates an empty registry
    pub fn new() -> SessionRegistry {
        SessionRegistry::default()
    }

    /// Returns the session for `path`, opening the package if no session exists yet.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn acquire(&mut self, path: impl AsRef<Path>) -> Result<&mut EditSession> {
        let key = resolve(path.as_ref())?;

        match self.sessions.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let session = EditSession::open(entry.key())
                    .inspect_err(|e| error!("unable to open session: {e}"))?;
                info!("opened session for {}", entry.key().display());
                Ok(entry.insert(session))
            }
        }
    }

    /// The open session for `path`, if any
    pub fn get(&self, path: impl AsRef<Path>) -> Option<&EditSession> {
        let key = resolve(path.as_ref()).ok()?;
        self.sessions.get(&key)
    }

    /// The open session for `path`, if any
    pub fn get_mut(&mut self, path: impl AsRef<Path>) -> Option<&mut EditSession> {
        let key = resolve(path.as_ref()).ok()?;
        self.sessions.get_mut(&key)
    }

    /// Closes and forgets the session for `path`. Returns false if there was none.
    pub fn release(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let key = resolve(path.as_ref())?;

        Ok(match self.sessions.shift_remove(&key) {
            Some(session) => {
                session.close();
                info!("closed session for {}", key.display());
                true
            }
            None => false,
        })
    }

    /// Paths of the open sessions, in the order they were opened
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.sessions.keys().map(PathBuf::as_path)
    }

    /// Number of open sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is open
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Canonical form of `path`, or the absolute form when it does not exist yet
fn resolve(path: &Path) -> io::Result<PathBuf> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(_) => Ok(env::current_dir()?.join(path)),
    }
}
