//! federation
//!
//! Routing-aware record store and dependency-graph engine.
//!
//! # Architecture
//!
//! [`FederatedStore`] composes:
//! - a [`Router`] (possibly absent) mapping ids to storage directories
//! - the local rig's [`RecordStore`]
//! - a lazily filled cache of remote stores keyed by prefix
//! - a [`StoreOpener`] used to fill that cache
//!
//! Single-record operations (`get`, `modify`, `delete`, `next_child_id`)
//! go to whichever store owns the id. Store-global operations (`create`,
//! `list`, `init`, `doctor`) always target the local rig.
//!
//! # Graph Rules
//!
//! - The dependency graph, parent-child edges included, stays acyclic.
//!   Cycle detection walks edges with routed fetches, so it crosses rigs.
//! - A parent-child edge only joins two ids in the same physical store.
//! - Every edge `A -> B` is mirrored as a dependent `A` on `B`.
//!
//! # Consistency
//!
//! Multi-record mutations are sequences of single-record writes with no
//! rollback. A failure or cancellation partway through leaves a one-sided
//! edge. [`RecordStore::doctor`] with `fix` re-mirrors such edges.
//!
//! # Example
//!
//! ```ignore
//! use rigwork::core::types::DependencyType;
//! use rigwork::federation::FederatedStore;
//!
//! let mut store = FederatedStore::open("/town/frontend")?;
//! store.add_dependency("fe-a3f", "be-k2m", DependencyType::Generic)?;
//! ```

pub mod cancel;

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::paths::StorePaths;
use crate::core::types::{DependencyType, Issue};
use crate::routing::{follow_redirect, RouteError, Router};
use crate::store::{
    CreateOptions, FileStore, FileStoreOpener, ListFilter, Mutator, RecordStore, StoreError,
    StoreOpener,
};

pub use cancel::CancelToken;

/// Errors from federated operations.
#[derive(Debug, Error)]
pub enum GraphError {
    /// The edge would close a cycle.
    #[error("dependency {from} -> {to} would create a cycle")]
    Cycle { from: String, to: String },

    /// Parent and child live in different stores.
    #[error("cannot make {parent} the parent of {child}: they are in different rigs")]
    CrossStore { child: String, parent: String },

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Route(#[from] RouteError),
}

impl GraphError {
    /// True for a store `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GraphError::Store(e) if e.is_not_found())
    }
}

/// Record store spanning every rig reachable through a router.
pub struct FederatedStore {
    router: Router,
    local: Box<dyn RecordStore>,
    remotes: HashMap<String, Box<dyn RecordStore>>,
    opener: Box<dyn StoreOpener>,
    cancel: CancelToken,
}

impl std::fmt::Debug for FederatedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FederatedStore")
            .field("router", &self.router)
            .field("local", &self.local.root())
            .field("remotes", &self.remotes.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FederatedStore {
    pub fn new(router: Router, local: Box<dyn RecordStore>, opener: Box<dyn StoreOpener>) -> Self {
        Self {
            router,
            local,
            remotes: HashMap::new(),
            opener,
            cancel: CancelToken::new(),
        }
    }

    /// Open the rig at `rig_dir` with file-backed stores.
    ///
    /// Follows the rig's own redirect, then discovers routing from the
    /// rig's nominal location. A relative `rig_dir` is taken against the
    /// current directory.
    pub fn open(rig_dir: impl AsRef<Path>) -> Result<Self, GraphError> {
        let rig_dir = rig_dir.as_ref();
        let rig_dir = std::path::absolute(rig_dir).map_err(|source| StoreError::Io {
            path: rig_dir.to_path_buf(),
            source,
        })?;
        let paths = StorePaths::for_rig(rig_dir);
        let nominal = paths.root();
        let root = follow_redirect(nominal)?.unwrap_or_else(|| nominal.to_path_buf());

        let local = FileStore::open(&root)?;
        let router = Router::discover(nominal)?.with_local_root(&root);
        Ok(Self::new(router, Box::new(local), Box::new(FileStoreOpener)))
    }

    /// Use `cancel` for all subsequent operations.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn local(&self) -> &dyn RecordStore {
        self.local.as_ref()
    }

    /// Prefixes of the remote stores opened so far.
    pub fn cached_prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.remotes.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes
    }

    fn check_cancelled(&self) -> Result<(), GraphError> {
        if self.cancel.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        Ok(())
    }

    /// The store owning `id`, opening and caching it on first use.
    pub fn store_for(&mut self, id: &str) -> Result<&dyn RecordStore, GraphError> {
        self.check_cancelled()?;
        let resolution = self.router.resolve(id)?;
        let root = match resolution.root {
            Some(root) if resolution.remote => root,
            _ => return Ok(self.local.as_ref()),
        };

        let store = match self.remotes.entry(resolution.prefix) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!(prefix = %entry.key(), root = %root.display(), "opening remote store");
                let store = self.opener.open(&root)?;
                entry.insert(store)
            }
        };
        Ok(&**store)
    }

    // =========================================================================
    // Routed single-record operations
    // =========================================================================

    pub fn get(&mut self, id: &str) -> Result<Issue, GraphError> {
        Ok(self.store_for(id)?.get(id)?)
    }

    pub fn modify(&mut self, id: &str, mutator: Mutator<'_>) -> Result<Issue, GraphError> {
        Ok(self.store_for(id)?.modify(id, mutator)?)
    }

    /// Delete one issue. Edges held by other issues are left in place.
    pub fn delete(&mut self, id: &str) -> Result<(), GraphError> {
        Ok(self.store_for(id)?.delete(id)?)
    }

    pub fn next_child_id(&mut self, parent_id: &str) -> Result<String, GraphError> {
        Ok(self.store_for(parent_id)?.next_child_id(parent_id)?)
    }

    // =========================================================================
    // Local store-global operations
    // =========================================================================

    pub fn create(&mut self, issue: Issue, opts: &CreateOptions) -> Result<String, GraphError> {
        self.check_cancelled()?;
        Ok(self.local.create(issue, opts)?)
    }

    pub fn list(&mut self, filter: &ListFilter) -> Result<Vec<Issue>, GraphError> {
        self.check_cancelled()?;
        Ok(self.local.list(filter)?)
    }

    pub fn init(&mut self) -> Result<(), GraphError> {
        self.check_cancelled()?;
        Ok(self.local.init()?)
    }

    pub fn doctor(&mut self, fix: bool) -> Result<Vec<String>, GraphError> {
        self.check_cancelled()?;
        Ok(self.local.doctor(fix)?)
    }

    // =========================================================================
    // Graph mutation
    // =========================================================================

    /// Add the edge `issue_id -> depends_on`.
    ///
    /// Generic edges are cycle-checked and mirrored. Adding an existing
    /// edge again is a no-op. Parent-child edges go through
    /// [`FederatedStore::reparent`].
    ///
    /// # Errors
    ///
    /// - [`GraphError::Cycle`] if `depends_on` already reaches `issue_id`
    /// - [`GraphError::CrossStore`] for a parent-child edge across rigs
    pub fn add_dependency(
        &mut self,
        issue_id: &str,
        depends_on: &str,
        kind: DependencyType,
    ) -> Result<(), GraphError> {
        if kind == DependencyType::ParentChild {
            return self.reparent(issue_id, depends_on);
        }

        self.check_cycle(issue_id, depends_on)?;

        self.modify(issue_id, &mut |issue| {
            issue.add_dependency(depends_on, DependencyType::Generic);
            Ok(())
        })?;
        self.modify(depends_on, &mut |issue| {
            issue.add_dependent(issue_id, DependencyType::Generic);
            Ok(())
        })?;

        debug!(from = issue_id, to = depends_on, "added dependency");
        Ok(())
    }

    /// Reject `issue_id -> depends_on` if `depends_on` already reaches
    /// `issue_id` through any chain of dependencies.
    ///
    /// Breadth-first over routed fetches. Ids that no longer exist are
    /// skipped.
    fn check_cycle(&mut self, issue_id: &str, depends_on: &str) -> Result<(), GraphError> {
        let cycle = || GraphError::Cycle {
            from: issue_id.to_string(),
            to: depends_on.to_string(),
        };
        if issue_id == depends_on {
            return Err(cycle());
        }

        let mut visited: HashSet<String> = HashSet::from([depends_on.to_string()]);
        let mut queue: VecDeque<String> = VecDeque::from([depends_on.to_string()]);

        while let Some(current) = queue.pop_front() {
            let issue = match self.get(&current) {
                Ok(issue) => issue,
                Err(e) if e.is_not_found() => {
                    debug!(id = %current, "skipping missing issue during cycle check");
                    continue;
                }
                Err(e) => return Err(e),
            };

            for dep in issue.dependencies {
                if dep.id == issue_id {
                    debug!(from = issue_id, to = depends_on, via = %current, "rejecting cycle");
                    return Err(cycle());
                }
                if visited.insert(dep.id.clone()) {
                    queue.push_back(dep.id);
                }
            }
        }
        Ok(())
    }

    /// Make `new_parent` the parent of `child`.
    ///
    /// Any previous parent loses `child` from its dependents. That cleanup
    /// is best-effort: its failure is logged and not returned.
    ///
    /// # Errors
    ///
    /// - [`GraphError::CrossStore`] unless both ids live in the same store
    /// - [`GraphError::Cycle`] if `child` is an ancestor of `new_parent`, or
    ///   `new_parent` otherwise depends on `child`
    pub fn reparent(&mut self, child: &str, new_parent: &str) -> Result<(), GraphError> {
        self.check_cancelled()?;
        if !self.router.same_store(child, new_parent) {
            return Err(GraphError::CrossStore {
                child: child.to_string(),
                parent: new_parent.to_string(),
            });
        }

        self.check_ancestry(child, new_parent)?;
        self.check_cycle(child, new_parent)?;

        let mut old_parents: Vec<String> = Vec::new();
        self.modify(child, &mut |issue| {
            if let Some(current) = issue.parent.take() {
                if current != new_parent {
                    old_parents.push(current);
                }
            }
            for stale in issue.parent_edges().filter(|d| d.id != new_parent) {
                if !old_parents.contains(&stale.id) {
                    old_parents.push(stale.id.clone());
                }
            }
            for old in &old_parents {
                issue.remove_dependencies(old, Some(DependencyType::ParentChild));
            }

            issue.parent = Some(new_parent.to_string());
            issue.add_dependency(new_parent, DependencyType::ParentChild);
            Ok(())
        })?;

        for old in &old_parents {
            let result = self.modify(old, &mut |issue| {
                issue.remove_dependents(child, Some(DependencyType::ParentChild));
                Ok(())
            });
            if let Err(err) = result {
                warn!(child, old_parent = %old, error = %err, "failed to detach child from previous parent");
            }
        }

        self.modify(new_parent, &mut |issue| {
            issue.add_dependent(child, DependencyType::ParentChild);
            Ok(())
        })?;

        debug!(child, parent = new_parent, "reparented");
        Ok(())
    }

    /// Walk `parent` links up from `new_parent`; `child` must not appear.
    fn check_ancestry(&mut self, child: &str, new_parent: &str) -> Result<(), GraphError> {
        if child == new_parent {
            return Err(GraphError::Cycle {
                from: child.to_string(),
                to: new_parent.to_string(),
            });
        }

        let mut visited = HashSet::new();
        let mut current = self.get(new_parent)?.parent;
        visited.insert(new_parent.to_string());

        while let Some(id) = current {
            if id == child {
                debug!(child, parent = new_parent, "rejecting ancestor cycle");
                return Err(GraphError::Cycle {
                    from: child.to_string(),
                    to: new_parent.to_string(),
                });
            }
            if !visited.insert(id.clone()) {
                warn!(id = %id, "parent chain loops back on itself");
                break;
            }
            current = match self.get(&id) {
                Ok(issue) => issue.parent,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };
        }
        Ok(())
    }

    /// Remove every edge `issue_id -> depends_on` and its mirror.
    ///
    /// Removing a parent-child edge also clears `issue_id`'s parent.
    pub fn remove_dependency(&mut self, issue_id: &str, depends_on: &str) -> Result<(), GraphError> {
        self.modify(issue_id, &mut |issue| {
            let removed = issue.remove_dependencies(depends_on, None);
            let was_parent = removed.iter().any(|d| d.kind == DependencyType::ParentChild);
            if was_parent && issue.parent.as_deref() == Some(depends_on) {
                issue.parent = None;
            }
            Ok(())
        })?;

        self.modify(depends_on, &mut |issue| {
            issue.remove_dependents(issue_id, None);
            Ok(())
        })?;

        debug!(from = issue_id, to = depends_on, "removed dependency");
        Ok(())
    }
}
