//! store::file_store
//!
//! Flat-file record store.
//!
//! # Layout
//!
//! - One pretty-printed JSON file per issue at `.store/issues/<id>.json`
//! - All writes are atomic (write to temp file, then rename)
//! - No index: `list` and id allocation scan the directory
//!
//! # Example
//!
//! ```ignore
//! use rigwork::core::types::Issue;
//! use rigwork::store::{CreateOptions, FileStore, RecordStore};
//!
//! let store = FileStore::open("/town/frontend/.store")?;
//! let id = store.create(Issue::new("Fix login"), &CreateOptions::default())?;
//! let child = store.create(Issue::new("Write test"), &CreateOptions::child_of(&id))?;
//! assert_eq!(child, format!("{id}.1"));
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::debug;

use super::traits::{CreateOptions, ListFilter, Mutator, RecordStore, StoreError};
use crate::core::config::{Config, IdMode, RigConfig};
use crate::core::hierarchy::{check_hierarchy_depth, child_id, parse_hierarchical_id};
use crate::core::ids::{adaptive_length_with, hash_id, random_id, MAX_ID_LENGTH};
use crate::core::ops::lock::RigLock;
use crate::core::paths::{write_atomic, StorePaths};
use crate::core::types::{validate_issue_id, DependencyType, Issue};
use crate::doctor;

/// Candidates tried at each id length before growing the length.
const ATTEMPTS_PER_LENGTH: u32 = 10;

/// Record store backed by one JSON file per issue.
#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StorePaths,
    config: Config,
}

impl FileStore {
    /// Create a store over `paths` with an explicit configuration.
    ///
    /// Does not touch disk; call [`RecordStore::init`] to create the layout.
    pub fn new(paths: StorePaths, config: Config) -> Self {
        Self { paths, config }
    }

    /// Open an existing storage directory, loading its configuration.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotInitialized`] if `root` is not a directory
    /// - [`StoreError::Config`] if a config file exists but is invalid
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let paths = StorePaths::new(root);
        if !paths.root().is_dir() {
            return Err(StoreError::NotInitialized(paths.root().to_path_buf()));
        }
        let config = Config::load(Some(&paths))?;
        Ok(Self::new(paths, config))
    }

    /// Create (if needed) and open the storage directory inside `rig_dir`.
    pub fn init_rig(rig_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let paths = StorePaths::for_rig(rig_dir);
        let config = Config::load(Some(&paths))?;
        let store = Self::new(paths, config);
        store.init()?;
        Ok(store)
    }

    /// Storage paths for this rig.
    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn io_error(path: &Path, source: io::Error) -> StoreError {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn read(&self, id: &str) -> Result<Issue, StoreError> {
        validate_issue_id(id)?;
        let path = self.paths.issue_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.to_string()))
            }
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        serde_json::from_str(&contents).map_err(|e| StoreError::Parse {
            path,
            message: e.to_string(),
        })
    }

    fn write(&self, issue: &Issue) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(issue).map_err(|e| StoreError::Serialize {
            id: issue.id.clone(),
            message: e.to_string(),
        })?;
        let path = self.paths.issue_path(&issue.id);
        write_atomic(&path, &json).map_err(|e| Self::io_error(&path, e))
    }

    fn exists(&self, id: &str) -> bool {
        self.paths.issue_path(id).exists()
    }

    /// Ids of every stored issue, unsorted.
    fn ids(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.paths.issues_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&dir, e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::io_error(&dir, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // Skip in-flight temp files (".<name>.<uuid>.tmp").
            if name.starts_with('.') {
                continue;
            }
            if let Some(id) = name.strip_suffix(".json") {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }

    fn generate_id(&self, issue: &Issue, opts: &CreateOptions) -> Result<String, StoreError> {
        let prefix = self.config.prefix();
        let mode = opts.id_mode.unwrap_or_else(|| self.config.id_mode());
        let start = adaptive_length_with(
            self.ids()?.len(),
            self.config.max_collision_probability(),
            self.config.min_id_length(),
        );

        for length in start..=MAX_ID_LENGTH {
            for attempt in 0..ATTEMPTS_PER_LENGTH {
                let candidate = match mode {
                    IdMode::Random => random_id(&prefix, length)?,
                    IdMode::Hash => hash_id(
                        &prefix,
                        &issue.title,
                        &issue.description,
                        &issue.created_by,
                        issue.created_at,
                        attempt,
                        length,
                    )?,
                };
                if !self.exists(&candidate) {
                    return Ok(candidate);
                }
                debug!(id = %candidate, length, attempt, "id collision, retrying");
            }
        }

        Err(StoreError::IdExhausted { prefix })
    }
}

impl RecordStore for FileStore {
    fn root(&self) -> &Path {
        self.paths.root()
    }

    fn get(&self, id: &str) -> Result<Issue, StoreError> {
        self.read(id)
    }

    fn modify(&self, id: &str, mutator: Mutator<'_>) -> Result<Issue, StoreError> {
        let mut issue = self.read(id)?;
        mutator(&mut issue)?;
        if issue.id != id {
            return Err(StoreError::InvalidInput(format!(
                "modify cannot change id '{}' to '{}'",
                id, issue.id
            )));
        }
        issue.updated_at = Utc::now();
        self.write(&issue)?;
        Ok(issue)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        validate_issue_id(id)?;
        let path = self.paths.issue_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(id, "deleted issue");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound(id.to_string())),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn create(&self, mut issue: Issue, opts: &CreateOptions) -> Result<String, StoreError> {
        if issue.created_by.is_empty() {
            issue.created_by = self.config.actor().to_string();
        }

        if let Some(parent) = &opts.parent {
            issue.id = self.next_child_id(parent)?;
            issue.parent = Some(parent.clone());
            issue.add_dependency(parent, DependencyType::ParentChild);
        } else if issue.id.is_empty() {
            issue.id = self.generate_id(&issue, opts)?;
        } else {
            validate_issue_id(&issue.id)?;
            let prefix = self.config.prefix();
            if !issue.id.starts_with(&prefix) {
                return Err(StoreError::InvalidInput(format!(
                    "id '{}' does not use this rig's prefix '{}'",
                    issue.id, prefix
                )));
            }
        }

        if self.exists(&issue.id) {
            return Err(StoreError::AlreadyExists(issue.id));
        }

        self.write(&issue)?;
        debug!(id = %issue.id, root = %self.paths.root().display(), "created issue");

        if let Some(parent) = &opts.parent {
            let id = issue.id.clone();
            self.modify(parent, &mut |p| {
                p.add_dependent(&id, DependencyType::ParentChild);
                Ok(())
            })?;
        }

        Ok(issue.id)
    }

    fn list(&self, filter: &ListFilter) -> Result<Vec<Issue>, StoreError> {
        let mut ids = self.ids()?;
        ids.sort();

        let mut issues = Vec::with_capacity(ids.len());
        for id in ids {
            match self.read(&id) {
                Ok(issue) if filter.matches(&issue) => issues.push(issue),
                Ok(_) => {}
                // Deleted between the scan and the read.
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(issues)
    }

    fn next_child_id(&self, parent_id: &str) -> Result<String, StoreError> {
        self.read(parent_id)?;
        check_hierarchy_depth(parent_id, self.config.max_hierarchy_depth())?;

        let highest = self
            .ids()?
            .iter()
            .filter_map(|id| parse_hierarchical_id(id))
            .filter(|(parent, _)| *parent == parent_id)
            .map(|(_, n)| n)
            .max()
            .unwrap_or(0);
        let next = highest.checked_add(1).ok_or_else(|| StoreError::IdExhausted {
            prefix: format!("{parent_id}."),
        })?;

        Ok(child_id(parent_id, next))
    }

    fn init(&self) -> Result<(), StoreError> {
        self.paths
            .ensure_dirs()
            .map_err(|e| Self::io_error(self.paths.root(), e))?;

        if !self.paths.config_path().exists() {
            let rig = self.config.rig.clone().unwrap_or_else(|| RigConfig {
                prefix: Some(self.config.prefix()),
                ..Default::default()
            });
            Config::write_rig(&self.paths, &rig)?;
        }
        Ok(())
    }

    fn doctor(&self, fix: bool) -> Result<Vec<String>, StoreError> {
        let _lock = if fix {
            Some(RigLock::acquire(&self.paths)?)
        } else {
            None
        };

        let report = doctor::run(self, fix)?;
        Ok(report.lines())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::GlobalConfig;
    use crate::core::ids::IdError;
    use crate::core::types::Status;
    use tempfile::TempDir;

    fn store_with(temp: &TempDir, rig: RigConfig) -> FileStore {
        let store = FileStore::new(
            StorePaths::for_rig(temp.path()),
            Config::from_parts(GlobalConfig::default(), Some(rig)),
        );
        store.init().unwrap();
        store
    }

    fn store(temp: &TempDir) -> FileStore {
        store_with(
            temp,
            RigConfig {
                prefix: Some("bd".into()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn init_creates_layout_and_config() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(store.paths().issues_dir().is_dir());
        assert!(store.paths().config_path().is_file());

        let reopened = FileStore::open(store.paths().root()).unwrap();
        assert_eq!(reopened.config().prefix(), "bd-");
    }

    #[test]
    fn open_missing_dir_fails() {
        let temp = TempDir::new().unwrap();
        let result = FileStore::open(temp.path().join("nope"));
        assert!(matches!(result, Err(StoreError::NotInitialized(_))));
    }

    #[test]
    fn create_generates_prefixed_id() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let id = store
            .create(Issue::new("Fix login"), &CreateOptions::default())
            .unwrap();
        assert!(id.starts_with("bd-"));
        assert_eq!(id.len(), 3 + 3);

        let issue = store.get(&id).unwrap();
        assert_eq!(issue.title, "Fix login");
        assert_eq!(issue.status, Status::Open);
    }

    #[test]
    fn hash_mode_is_reproducible_across_rigs() {
        let temp_a = TempDir::new().unwrap();
        let temp_b = TempDir::new().unwrap();
        let rig = RigConfig {
            prefix: Some("bd".into()),
            id_mode: Some(IdMode::Hash),
            ..Default::default()
        };
        let a = store_with(&temp_a, rig.clone());
        let b = store_with(&temp_b, rig);

        let issue = Issue::new("Fix login")
            .with_description("Details")
            .with_creator("jira-import");
        let id_a = a.create(issue.clone(), &CreateOptions::default()).unwrap();
        let id_b = b.create(issue.clone(), &CreateOptions::default()).unwrap();
        assert_eq!(id_a, id_b);

        // A second identical import in the same rig steps the nonce.
        let id_a2 = a.create(issue, &CreateOptions::default()).unwrap();
        assert_ne!(id_a, id_a2);
    }

    #[test]
    fn explicit_id_must_be_unique_and_prefixed() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);

        let mut issue = Issue::new("t");
        issue.id = "bd-abc".into();
        store.create(issue.clone(), &CreateOptions::default()).unwrap();

        assert!(matches!(
            store.create(issue, &CreateOptions::default()),
            Err(StoreError::AlreadyExists(id)) if id == "bd-abc"
        ));

        let mut foreign = Issue::new("t");
        foreign.id = "fe-abc".into();
        assert!(matches!(
            store.create(foreign, &CreateOptions::default()),
            Err(StoreError::InvalidInput(_))
        ));
    }

    #[test]
    fn child_creation_wires_parent_edges() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let parent = store
            .create(Issue::new("epic"), &CreateOptions::default())
            .unwrap();

        let first = store
            .create(Issue::new("a"), &CreateOptions::child_of(&parent))
            .unwrap();
        let second = store
            .create(Issue::new("b"), &CreateOptions::child_of(&parent))
            .unwrap();

        assert_eq!(first, format!("{parent}.1"));
        assert_eq!(second, format!("{parent}.2"));

        let child = store.get(&first).unwrap();
        assert_eq!(child.parent.as_deref(), Some(parent.as_str()));
        assert!(child.has_dependency(&parent, DependencyType::ParentChild));

        let parent_issue = store.get(&parent).unwrap();
        assert!(parent_issue.has_dependent(&first, DependencyType::ParentChild));
        assert!(parent_issue.has_dependent(&second, DependencyType::ParentChild));
    }

    #[test]
    fn next_child_id_skips_past_highest() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut parent = Issue::new("p");
        parent.id = "bd-p".into();
        store.create(parent, &CreateOptions::default()).unwrap();

        let mut stray = Issue::new("c");
        stray.id = "bd-p.7".into();
        store.create(stray, &CreateOptions::default()).unwrap();

        assert_eq!(store.next_child_id("bd-p").unwrap(), "bd-p.8");
    }

    #[test]
    fn next_child_id_stops_at_u64_max() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let mut parent = Issue::new("p");
        parent.id = "bd-p".into();
        store.create(parent, &CreateOptions::default()).unwrap();

        let mut last = Issue::new("c");
        last.id = child_id("bd-p", u64::MAX);
        store.create(last, &CreateOptions::default()).unwrap();

        assert!(matches!(
            store.next_child_id("bd-p").unwrap_err(),
            StoreError::IdExhausted { .. }
        ));
    }

    #[test]
    fn next_child_id_requires_parent() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(store.next_child_id("bd-missing").unwrap_err().is_not_found());
    }

    #[test]
    fn next_child_id_enforces_depth() {
        let temp = TempDir::new().unwrap();
        let store = store_with(
            &temp,
            RigConfig {
                prefix: Some("bd".into()),
                max_hierarchy_depth: Some(1),
                ..Default::default()
            },
        );
        let root = store
            .create(Issue::new("root"), &CreateOptions::default())
            .unwrap();
        let child = store
            .create(Issue::new("child"), &CreateOptions::child_of(&root))
            .unwrap();

        let err = store
            .create(Issue::new("grandchild"), &CreateOptions::child_of(&child))
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Id(IdError::MaxDepthExceeded { .. })
        ));
    }

    #[test]
    fn modify_updates_and_rejects_id_change() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let id = store
            .create(Issue::new("t"), &CreateOptions::default())
            .unwrap();

        let updated = store
            .modify(&id, &mut |issue| {
                issue.status = Status::Closed;
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.status, Status::Closed);
        assert_eq!(store.get(&id).unwrap().status, Status::Closed);

        let err = store
            .modify(&id, &mut |issue| {
                issue.id = "bd-other".into();
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput(_)));
    }

    #[test]
    fn modify_mutator_error_aborts_write() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let id = store
            .create(Issue::new("t"), &CreateOptions::default())
            .unwrap();

        let result = store.modify(&id, &mut |issue| {
            issue.title = "changed".into();
            Err(StoreError::InvalidInput("nope".into()))
        });
        assert!(result.is_err());
        assert_eq!(store.get(&id).unwrap().title, "t");
    }

    #[test]
    fn delete_and_missing_records() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        let id = store
            .create(Issue::new("t"), &CreateOptions::default())
            .unwrap();

        store.delete(&id).unwrap();
        assert!(store.get(&id).unwrap_err().is_not_found());
        assert!(store.delete(&id).unwrap_err().is_not_found());
        assert!(store
            .modify(&id, &mut |_| Ok(()))
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn list_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        for id in ["bd-c", "bd-a", "bd-b"] {
            let mut issue = Issue::new(id);
            issue.id = id.into();
            if id == "bd-b" {
                issue.status = Status::Closed;
            }
            store.create(issue, &CreateOptions::default()).unwrap();
        }

        let all: Vec<String> = store
            .list(&ListFilter::all())
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(all, vec!["bd-a", "bd-b", "bd-c"]);

        let closed = store
            .list(&ListFilter::all().with_status(Status::Closed))
            .unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, "bd-b");
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        fs::write(store.paths().issue_path("bd-bad"), "{ not json").unwrap();

        assert!(matches!(
            store.get("bd-bad"),
            Err(StoreError::Parse { .. })
        ));
    }

    #[test]
    fn path_traversal_rejected() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        assert!(matches!(
            store.get("../config"),
            Err(StoreError::InvalidInput(_))
        ));
    }
}
