//! store::traits
//!
//! Record store trait definition.
//!
//! # Design
//!
//! `RecordStore` is the capability set the federation layer needs from a
//! rig: single-record CRUD keyed by issue id, plus a few store-global
//! operations. Every method is a blocking call against one rig. Nothing here
//! knows about routing.
//!
//! Single-record writes must be atomic (a reader never sees a torn record).
//! Nothing spanning two records is atomic.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::{ConfigError, IdMode};
use crate::core::ids::IdError;
use crate::core::ops::lock::LockError;
use crate::core::types::{Issue, Status, TypeError};

/// Errors from record store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No issue with this id in the store.
    #[error("issue not found: {0}")]
    NotFound(String),

    /// An issue with this id already exists.
    #[error("issue already exists: {0}")]
    AlreadyExists(String),

    /// Caller supplied an unusable value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No free identifier was found at any length.
    #[error("could not allocate a free id with prefix '{prefix}'")]
    IdExhausted { prefix: String },

    /// The storage directory does not exist.
    #[error("store not initialized at '{0}'")]
    NotInitialized(PathBuf),

    /// An issue file could not be parsed.
    #[error("failed to parse issue file '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    /// An issue could not be serialized.
    #[error("failed to serialize issue '{id}': {message}")]
    Serialize { id: String, message: String },

    /// Filesystem failure.
    #[error("store i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("id error: {0}")]
    Id(#[from] IdError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("lock error: {0}")]
    Lock(#[from] LockError),
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        StoreError::InvalidInput(err.to_string())
    }
}

impl StoreError {
    /// True for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Options for [`RecordStore::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// Create as the next hierarchical child of this issue.
    pub parent: Option<String>,
    /// Override the configured id generation mode.
    pub id_mode: Option<IdMode>,
}

impl CreateOptions {
    /// Options for creating a child of `parent`.
    pub fn child_of(parent: impl Into<String>) -> Self {
        Self {
            parent: Some(parent.into()),
            ..Default::default()
        }
    }
}

/// Filter for [`RecordStore::list`]. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<Status>,
    pub parent: Option<String>,
    pub id_prefix: Option<String>,
}

impl ListFilter {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restrict to a status.
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to children of `parent`.
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Restrict to ids starting with `prefix`.
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = Some(prefix.into());
        self
    }

    /// Check an issue against the filter.
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(status) = self.status {
            if issue.status != status {
                return false;
            }
        }
        if let Some(parent) = &self.parent {
            if issue.parent.as_deref() != Some(parent.as_str()) {
                return false;
            }
        }
        if let Some(prefix) = &self.id_prefix {
            if !issue.id.starts_with(prefix.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Mutation callback passed to [`RecordStore::modify`].
///
/// Returning an error aborts the write.
pub type Mutator<'a> = &'a mut dyn FnMut(&mut Issue) -> Result<(), StoreError>;

/// Storage backend for one rig.
///
/// # Example
///
/// ```ignore
/// use rigwork::store::{RecordStore, StoreError};
///
/// fn close(store: &dyn RecordStore, id: &str) -> Result<(), StoreError> {
///     store.modify(id, &mut |issue| {
///         issue.status = Status::Closed;
///         Ok(())
///     })?;
///     Ok(())
/// }
/// ```
pub trait RecordStore {
    /// The storage directory this store reads and writes.
    fn root(&self) -> &Path;

    /// Fetch one issue.
    ///
    /// Returns [`StoreError::NotFound`] if it does not exist.
    fn get(&self, id: &str) -> Result<Issue, StoreError>;

    /// Read, mutate and write back one issue. Returns the written issue.
    ///
    /// The mutator must not change the issue id.
    fn modify(&self, id: &str, mutator: Mutator<'_>) -> Result<Issue, StoreError>;

    /// Remove one issue.
    ///
    /// Returns [`StoreError::NotFound`] if it does not exist. Edges held by
    /// other issues are left alone.
    fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Persist a new issue and return its id.
    ///
    /// An empty `issue.id` asks the store to generate one.
    fn create(&self, issue: Issue, opts: &CreateOptions) -> Result<String, StoreError>;

    /// Enumerate issues matching `filter`, sorted by id.
    fn list(&self, filter: &ListFilter) -> Result<Vec<Issue>, StoreError>;

    /// The id the next child of `parent_id` would get.
    fn next_child_id(&self, parent_id: &str) -> Result<String, StoreError>;

    /// Create the storage layout. Idempotent.
    fn init(&self) -> Result<(), StoreError>;

    /// Check store integrity, repairing what it can when `fix` is set.
    ///
    /// Returns one human-readable line per finding.
    fn doctor(&self, fix: bool) -> Result<Vec<String>, StoreError>;
}
