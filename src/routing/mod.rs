//! routing
//!
//! Prefix routing across rigs.
//!
//! # Architecture
//!
//! A town is a directory tree holding several rigs. One of them carries a
//! line-delimited manifest (`.store/routes.jsonl`) mapping id prefixes to rig
//! directories relative to the town root:
//!
//! ```text
//! {"prefix": "fe-", "path": "frontend"}
//! {"prefix": "be-", "path": "services/backend"}
//! ```
//!
//! - [`load_routes`] parses the manifest into an immutable [`RouteTable`]
//! - [`follow_redirect`] resolves a storage directory's `redirect` file
//! - [`router::Router`] combines both to map an id to its owning store
//!
//! Absence is not an error anywhere in this module: a missing manifest is an
//! empty table, and a missing redirect file means "no redirect".

pub mod router;

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::core::paths::REDIRECT_FILE_NAME;

pub use router::{Resolution, Router};

/// Errors from loading routes or following redirects.
#[derive(Debug, Error)]
pub enum RouteError {
    /// A manifest line is not a valid route record.
    #[error("malformed route at line {line}: {source}")]
    Malformed {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A redirect points somewhere unusable.
    #[error("invalid redirect in '{path}': {reason}")]
    RedirectInvalid { path: PathBuf, reason: String },

    /// Filesystem failure.
    #[error("routing i/o error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Id prefix including the trailing hyphen, e.g. `fe-`
    pub prefix: String,
    /// Rig directory relative to the town root
    pub path: String,
}

/// Immutable prefix → route mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: BTreeMap<String, Route>,
}

impl RouteTable {
    /// Build a table from routes. Later duplicates override earlier ones.
    pub fn from_routes(routes: impl IntoIterator<Item = Route>) -> Self {
        let mut table = BTreeMap::new();
        for route in routes {
            if route.prefix.is_empty() {
                continue;
            }
            table.insert(route.prefix.clone(), route);
        }
        Self { routes: table }
    }

    /// Look up the route for a prefix.
    pub fn get(&self, prefix: &str) -> Option<&Route> {
        self.routes.get(prefix)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Routes ordered by prefix.
    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }
}

/// Load a routing manifest.
///
/// # Errors
///
/// - [`RouteError::Malformed`] naming the 1-based line number
/// - [`RouteError::Io`] if the file exists but cannot be read
///
/// A missing file yields an empty table.
///
/// # Example
///
/// ```ignore
/// let table = load_routes(Path::new("/town/.store/routes.jsonl"))?;
/// assert_eq!(table.get("fe-").unwrap().path, "frontend");
/// ```
pub fn load_routes(path: &Path) -> Result<RouteTable, RouteError> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(RouteTable::default()),
        Err(e) => {
            return Err(RouteError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };

    let mut routes = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let route: Route = serde_json::from_str(trimmed).map_err(|source| RouteError::Malformed {
            line: index + 1,
            source,
        })?;
        routes.push(route);
    }

    let table = RouteTable::from_routes(routes);
    debug!(path = %path.display(), routes = table.len(), "loaded routes");
    Ok(table)
}

/// The id's prefix: everything through the first hyphen, or `""`.
///
/// ```
/// use rigwork::routing::extract_prefix;
///
/// assert_eq!(extract_prefix("fe-a3f8.1"), "fe-");
/// assert_eq!(extract_prefix("gt-mol-x9"), "gt-");
/// assert_eq!(extract_prefix("abc"), "");
/// ```
pub fn extract_prefix(id: &str) -> &str {
    match id.find('-') {
        Some(pos) => &id[..=pos],
        None => "",
    }
}

/// Follow the redirect file inside `store_root`, if any. One level only.
///
/// The first non-blank line that is not a `#` comment is the target: an
/// absolute path or one relative to `store_root`. Returns `None` when there
/// is no redirect file or it names no target.
///
/// # Errors
///
/// [`RouteError::RedirectInvalid`] if the target is missing or not a
/// directory.
pub fn follow_redirect(store_root: &Path) -> Result<Option<PathBuf>, RouteError> {
    let redirect_path = store_root.join(REDIRECT_FILE_NAME);
    let contents = match fs::read_to_string(&redirect_path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(RouteError::Io {
                path: redirect_path,
                source: e,
            })
        }
    };

    let target = contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'));
    let Some(target) = target else {
        return Ok(None);
    };

    let resolved = if Path::new(target).is_absolute() {
        PathBuf::from(target)
    } else {
        store_root.join(target)
    };

    match fs::metadata(&resolved) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(RouteError::RedirectInvalid {
                path: redirect_path,
                reason: format!("target '{}' is not a directory", resolved.display()),
            })
        }
        Err(e) => {
            return Err(RouteError::RedirectInvalid {
                path: redirect_path,
                reason: format!("target '{}' is unreachable: {}", resolved.display(), e),
            })
        }
    }

    debug!(from = %store_root.display(), to = %resolved.display(), "following redirect");
    Ok(Some(resolved))
}
