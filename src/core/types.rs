//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`Issue`] - A tracked record with its dependency edges
//! - [`Dependency`] - One typed edge, stored on both endpoints
//! - [`DependencyType`] - Generic ordering edge or parent-child containment
//! - [`Status`] - Lifecycle state of an issue
//!
//! # Mirrored Edges
//!
//! An edge A → B is stored twice: in `A.dependencies` and in
//! `B.dependents`, with the same type. The helpers on [`Issue`] keep the
//! list manipulation idempotent; the federation layer decides which records
//! to touch.
//!
//! # Example
//!
//! ```
//! use rigwork::core::types::{DependencyType, Issue};
//!
//! let mut issue = Issue::new("Fix login");
//! issue.id = "bd-a3f8".to_string();
//!
//! assert!(issue.add_dependency("bd-b2c1", DependencyType::Generic));
//! assert!(!issue.add_dependency("bd-b2c1", DependencyType::Generic));
//! assert_eq!(issue.dependencies.len(), 1);
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid issue id: {0}")]
    InvalidIssueId(String),
}

/// Validate an issue identifier.
///
/// Identifiers double as file names in the flat-file store, so they must be
/// non-empty, must not start with `.`, and must not contain path separators,
/// whitespace or control characters.
///
/// # Example
///
/// ```
/// use rigwork::core::types::validate_issue_id;
///
/// assert!(validate_issue_id("bd-a3f8.1").is_ok());
/// assert!(validate_issue_id("").is_err());
/// assert!(validate_issue_id("../escape").is_err());
/// ```
pub fn validate_issue_id(id: &str) -> Result<(), TypeError> {
    if id.is_empty() {
        return Err(TypeError::InvalidIssueId("issue id cannot be empty".into()));
    }
    if id.starts_with('.') {
        return Err(TypeError::InvalidIssueId(format!(
            "issue id cannot start with '.': {id}"
        )));
    }
    if id
        .chars()
        .any(|c| c == '/' || c == '\\' || c.is_whitespace() || c.is_control())
    {
        return Err(TypeError::InvalidIssueId(format!(
            "issue id contains an invalid character: {id:?}"
        )));
    }
    Ok(())
}

/// Kind of dependency edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyType {
    /// Ordering edge: the issue waits on the target.
    Generic,
    /// Containment edge: the target is the issue's parent.
    ParentChild,
}

impl DependencyType {
    /// Stable string form used in serialized records.
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::Generic => "generic",
            DependencyType::ParentChild => "parent-child",
        }
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed edge endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Dependency {
    /// The issue on the other end of the edge.
    pub id: String,
    /// Edge type.
    #[serde(rename = "type")]
    pub kind: DependencyType,
}

impl Dependency {
    /// Create a new edge endpoint.
    pub fn new(id: impl Into<String>, kind: DependencyType) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }
}

/// Lifecycle state of an issue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Closed,
}

/// A tracked record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Issue {
    /// Identifier, `<prefix><suffix>` optionally followed by `.N` segments.
    ///
    /// Empty until the store assigns one on create.
    pub id: String,

    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default)]
    pub status: Status,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Parent back-reference, mirrored by a parent-child dependency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Outgoing edges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<Dependency>,

    /// Incoming edges (mirror of other issues' `dependencies`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependents: Vec<Dependency>,
}

impl Issue {
    /// Create an unsaved issue with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: title.into(),
            description: String::new(),
            status: Status::Open,
            created_by: String::new(),
            created_at: now,
            updated_at: now,
            parent: None,
            dependencies: Vec::new(),
            dependents: Vec::new(),
        }
    }

    /// Set the description (builder style).
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the creator (builder style).
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.created_by = creator.into();
        self
    }

    /// Check for an outgoing edge.
    pub fn has_dependency(&self, id: &str, kind: DependencyType) -> bool {
        self.dependencies
            .iter()
            .any(|d| d.id == id && d.kind == kind)
    }

    /// Add an outgoing edge. Returns `false` if it was already present.
    pub fn add_dependency(&mut self, id: &str, kind: DependencyType) -> bool {
        if self.has_dependency(id, kind) {
            return false;
        }
        self.dependencies.push(Dependency::new(id, kind));
        true
    }

    /// Remove outgoing edges to `id` matching `kind`, or of any kind when
    /// `kind` is `None`. Returns the removed edges.
    pub fn remove_dependencies(&mut self, id: &str, kind: Option<DependencyType>) -> Vec<Dependency> {
        let (removed, kept) = std::mem::take(&mut self.dependencies)
            .into_iter()
            .partition(|d| d.id == id && kind.map_or(true, |k| d.kind == k));
        self.dependencies = kept;
        removed
    }

    /// Check for an incoming edge.
    pub fn has_dependent(&self, id: &str, kind: DependencyType) -> bool {
        self.dependents.iter().any(|d| d.id == id && d.kind == kind)
    }

    /// Add an incoming edge. Returns `false` if it was already present.
    pub fn add_dependent(&mut self, id: &str, kind: DependencyType) -> bool {
        if self.has_dependent(id, kind) {
            return false;
        }
        self.dependents.push(Dependency::new(id, kind));
        true
    }

    /// Remove incoming edges from `id` matching `kind`, or of any kind when
    /// `kind` is `None`. Returns the removed edges.
    pub fn remove_dependents(&mut self, id: &str, kind: Option<DependencyType>) -> Vec<Dependency> {
        let (removed, kept) = std::mem::take(&mut self.dependents)
            .into_iter()
            .partition(|d| d.id == id && kind.map_or(true, |k| d.kind == k));
        self.dependents = kept;
        removed
    }

    /// Parent-child edges in the dependency list.
    pub fn parent_edges(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies
            .iter()
            .filter(|d| d.kind == DependencyType::ParentChild)
    }
}
