//! store
//!
//! Record storage for a single rig.
//!
//! # Architecture
//!
//! - [`RecordStore`] is the seam. The federation layer depends only on it.
//! - [`FileStore`] is the bundled backend (one JSON file per issue).
//! - [`StoreOpener`] is the factory used to open stores for other rigs on
//!   demand.
//!
//! # Example
//!
//! ```ignore
//! use rigwork::store::{FileStoreOpener, StoreOpener};
//!
//! let store = FileStoreOpener.open(Path::new("/town/backend/.store"))?;
//! let issue = store.get("be-k2m")?;
//! ```

pub mod file_store;
pub mod traits;

use std::path::Path;

pub use file_store::FileStore;
pub use traits::{CreateOptions, ListFilter, Mutator, RecordStore, StoreError};

/// Opens the record store living at a storage directory.
pub trait StoreOpener {
    /// Open the store rooted at `root` (a `.store` directory).
    fn open(&self, root: &Path) -> Result<Box<dyn RecordStore>, StoreError>;
}

/// Opener for [`FileStore`] backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStoreOpener;

impl StoreOpener for FileStoreOpener {
    fn open(&self, root: &Path) -> Result<Box<dyn RecordStore>, StoreError> {
        Ok(Box::new(FileStore::open(root)?))
    }
}
