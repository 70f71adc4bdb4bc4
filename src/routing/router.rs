//! routing::router
//!
//! Maps issue ids to the storage directory that owns them.
//!
//! # Discovery
//!
//! Starting from a rig's storage directory (`<rig>/.store`):
//! 1. `<rig>/.store/routes.jsonl` (town root is `<rig>`)
//! 2. each ancestor `<dir>` of `<rig>`: `<dir>/.store/routes.jsonl`
//!    (town root is `<dir>`)
//!
//! The first manifest found wins. No manifest, or an empty one, gives an
//! absent router.
//!
//! # Absent Router
//!
//! [`Router::absent`] is a null object: every id resolves as local and
//! every pair of ids is in the same store. Callers never check for it.
//!
//! # Invariants
//!
//! - The route table is loaded once and never reloaded
//! - Resolving the same prefix twice yields the same root, even if a
//!   redirect file changes in between

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{extract_prefix, follow_redirect, load_routes, RouteError, RouteTable};
use crate::core::paths::{ROUTES_FILE_NAME, STORE_DIR_NAME};

/// Outcome of resolving one id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Resolution {
    /// Storage directory owning the id, `None` when no route matched
    pub root: Option<PathBuf>,
    /// The matched prefix, `""` when no route matched
    pub prefix: String,
    /// True when `root` is not the router's own local store
    pub remote: bool,
}

impl Resolution {
    /// The "no route, use the local store" outcome.
    pub fn local() -> Self {
        Self::default()
    }
}

/// Prefix router for one rig.
#[derive(Debug)]
pub struct Router {
    routes: RouteTable,
    town_root: Option<PathBuf>,
    local_root: Option<PathBuf>,
    resolved: RefCell<HashMap<String, PathBuf>>,
}

impl Router {
    /// A router with no routes. Everything is local.
    pub fn absent() -> Self {
        Self {
            routes: RouteTable::default(),
            town_root: None,
            local_root: None,
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// Build a router from an already-loaded table.
    ///
    /// An empty table gives an absent router.
    pub fn new(routes: RouteTable, town_root: impl Into<PathBuf>, local_root: impl Into<PathBuf>) -> Self {
        if routes.is_empty() {
            return Self::absent();
        }
        Self {
            routes,
            town_root: Some(town_root.into()),
            local_root: Some(local_root.into()),
            resolved: RefCell::new(HashMap::new()),
        }
    }

    /// Discover the routing manifest for the store at `local_root`.
    ///
    /// # Errors
    ///
    /// Only a manifest that exists but cannot be read or parsed is an
    /// error. Finding none gives [`Router::absent`]. A relative
    /// `local_root` is taken against the current directory.
    pub fn discover(local_root: &Path) -> Result<Self, RouteError> {
        let local_root = std::path::absolute(local_root).map_err(|source| RouteError::Io {
            path: local_root.to_path_buf(),
            source,
        })?;
        let Some((manifest, town_root)) = find_manifest(&local_root) else {
            debug!(local_root = %local_root.display(), "no routing manifest found");
            return Ok(Self::absent());
        };

        let routes = load_routes(&manifest)?;
        debug!(
            manifest = %manifest.display(),
            town_root = %town_root.display(),
            routes = routes.len(),
            "router discovered"
        );
        Ok(Self::new(routes, town_root, local_root))
    }

    /// Replace the root that counts as local.
    ///
    /// Used when the local rig itself is redirected: discovery walks from
    /// the nominal location, but locality is judged against the real one.
    pub fn with_local_root(mut self, local_root: impl Into<PathBuf>) -> Self {
        if !self.is_absent() {
            self.local_root = Some(local_root.into());
        }
        self
    }

    /// True if this is the null router.
    pub fn is_absent(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn town_root(&self) -> Option<&Path> {
        self.town_root.as_deref()
    }

    pub fn local_root(&self) -> Option<&Path> {
        self.local_root.as_deref()
    }

    /// Resolve the store owning `id`.
    ///
    /// An unmatched prefix is not an error: it returns
    /// [`Resolution::local`].
    ///
    /// # Errors
    ///
    /// [`RouteError::RedirectInvalid`] if the matched rig redirects to a
    /// missing directory.
    pub fn resolve(&self, id: &str) -> Result<Resolution, RouteError> {
        let prefix = extract_prefix(id);
        let (Some(route), Some(town_root)) = (self.routes.get(prefix), &self.town_root) else {
            return Ok(Resolution::local());
        };

        let cached = self.resolved.borrow().get(prefix).cloned();
        let root = match cached {
            Some(root) => root,
            None => {
                let nominal = town_root.join(&route.path).join(STORE_DIR_NAME);
                let root = follow_redirect(&nominal)?.unwrap_or(nominal);
                self.resolved
                    .borrow_mut()
                    .insert(prefix.to_string(), root.clone());
                root
            }
        };

        let remote = match &self.local_root {
            Some(local) => !same_path(&root, local),
            None => false,
        };

        Ok(Resolution {
            root: Some(root),
            prefix: prefix.to_string(),
            remote,
        })
    }

    /// True if both ids live in the same physical store.
    ///
    /// False when either id fails to resolve.
    pub fn same_store(&self, a: &str, b: &str) -> bool {
        let (Ok(ra), Ok(rb)) = (self.resolve(a), self.resolve(b)) else {
            return false;
        };
        if !ra.remote && !rb.remote {
            return true;
        }
        match (&ra.root, &rb.root) {
            (Some(x), Some(y)) => same_path(x, y),
            _ => false,
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::absent()
    }
}

/// Locate the routing manifest and its town root.
fn find_manifest(local_root: &Path) -> Option<(PathBuf, PathBuf)> {
    let own = local_root.join(ROUTES_FILE_NAME);
    let rig_dir = local_root.parent()?;
    if own.is_file() {
        return Some((own, rig_dir.to_path_buf()));
    }

    rig_dir.ancestors().skip(1).find_map(|dir| {
        let manifest = dir.join(STORE_DIR_NAME).join(ROUTES_FILE_NAME);
        manifest.is_file().then(|| (manifest, dir.to_path_buf()))
    })
}

/// Compare two paths after resolving symlinks and `..` where possible.
fn same_path(a: &Path, b: &Path) -> bool {
    let a = fs::canonicalize(a).unwrap_or_else(|_| a.to_path_buf());
    let b = fs::canonicalize(b).unwrap_or_else(|_| b.to_path_buf());
    a == b
}
