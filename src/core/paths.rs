//! core::paths
//!
//! Centralized path routing for rig storage locations.
//!
//! # Storage Layout
//!
//! Each rig keeps its data under `<rig>/.store/`:
//! - `config.toml` - Rig configuration
//! - `routes.jsonl` - Prefix routing manifest (usually only at the town root)
//! - `redirect` - Optional pointer to the rig's real storage directory
//! - `lock` - Exclusive lock file
//! - `merge-slot.json` - Merge coordination slot
//! - `issues/<id>.json` - One file per issue
//!
//! **Hard rule:** no code outside this module joins these names onto a
//! path by hand. All paths go through [`StorePaths`].
//!
//! # Example
//!
//! ```
//! use rigwork::core::paths::StorePaths;
//! use std::path::PathBuf;
//!
//! let paths = StorePaths::for_rig("/town/frontend");
//! assert_eq!(paths.root(), PathBuf::from("/town/frontend/.store"));
//! assert_eq!(
//!     paths.issue_path("fe-a3f8"),
//!     PathBuf::from("/town/frontend/.store/issues/fe-a3f8.json")
//! );
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Name of the storage directory inside every rig.
pub const STORE_DIR_NAME: &str = ".store";

/// File name of the routing manifest.
pub const ROUTES_FILE_NAME: &str = "routes.jsonl";

/// File name of the redirect pointer.
pub const REDIRECT_FILE_NAME: &str = "redirect";

/// Path routing for one rig's storage directory.
///
/// # Invariants
///
/// - `root` is the storage directory itself (`<rig>/.store`), not the rig
/// - All rig-scoped files live directly under `root`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    /// Create paths for an existing storage directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create paths for the storage directory inside `rig_dir`.
    pub fn for_rig(rig_dir: impl AsRef<Path>) -> Self {
        Self::new(rig_dir.as_ref().join(STORE_DIR_NAME))
    }

    /// The storage directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The rig directory containing the storage directory.
    pub fn rig_dir(&self) -> Option<&Path> {
        self.root.parent()
    }

    // =========================================================================
    // Rig-scoped files
    // =========================================================================

    /// `<root>/config.toml`
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// `<root>/routes.jsonl`
    pub fn routes_path(&self) -> PathBuf {
        self.root.join(ROUTES_FILE_NAME)
    }

    /// `<root>/redirect`
    pub fn redirect_path(&self) -> PathBuf {
        self.root.join(REDIRECT_FILE_NAME)
    }

    /// `<root>/lock`
    pub fn lock_path(&self) -> PathBuf {
        self.root.join("lock")
    }

    /// `<root>/merge-slot.json`
    pub fn merge_slot_path(&self) -> PathBuf {
        self.root.join("merge-slot.json")
    }

    /// `<root>/issues/`
    pub fn issues_dir(&self) -> PathBuf {
        self.root.join("issues")
    }

    /// `<root>/issues/<id>.json`
    pub fn issue_path(&self, id: &str) -> PathBuf {
        self.issues_dir().join(format!("{id}.json"))
    }

    /// Ensure the storage directory structure exists.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(self.issues_dir())
    }
}

/// Write `contents` to `path` atomically.
///
/// Writes a temporary sibling file, syncs it, then renames it over `path`.
/// Readers see either the old or the new contents, never a partial write.
/// Parent directories are created if needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no parent"))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let temp_path = parent.join(format!(
        ".{}.{}.tmp",
        file_name.to_string_lossy(),
        Uuid::new_v4().simple()
    ));

    let result = (|| {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}
