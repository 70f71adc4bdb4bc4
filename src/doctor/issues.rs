//! doctor::issues
//!
//! Known integrity problems in a rig.
//!
//! # Architecture
//!
//! Each [`Finding`] names one problem on one record (or one cycle) and
//! carries a stable [`Finding::code`] so the same problem reported on two
//! runs compares equal.

use thiserror::Error;

use crate::core::types::DependencyType;

/// Integrity problems Doctor can detect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Finding {
    /// `issue` depends on `target` but `target` does not list `issue` as a
    /// dependent.
    #[error("{issue} depends on {target} ({kind}) but {target} does not list it as a dependent")]
    UnmirroredDependency {
        issue: String,
        target: String,
        kind: DependencyType,
    },

    /// `issue` lists `dependent` as a dependent but `dependent` has no such
    /// edge.
    #[error("{issue} lists {dependent} as a dependent ({kind}) but {dependent} has no such dependency")]
    OrphanDependent {
        issue: String,
        dependent: String,
        kind: DependencyType,
    },

    /// The `parent` field disagrees with the parent-child edges.
    #[error("{issue} has parent {} but parent-child edges to [{}]", display_parent(.parent), .edges.join(", "))]
    ParentMismatch {
        issue: String,
        parent: Option<String>,
        edges: Vec<String>,
    },

    /// `parent` names an issue that is not in this rig.
    #[error("{issue} has parent {parent} which does not exist")]
    DanglingParent { issue: String, parent: String },

    /// The dependency graph contains a cycle.
    #[error("dependency cycle: {}", .trace.join(" -> "))]
    Cycle { trace: Vec<String> },
}

fn display_parent(parent: &Option<String>) -> &str {
    parent.as_deref().unwrap_or("<none>")
}

impl Finding {
    /// Stable identifier for this finding.
    pub fn code(&self) -> String {
        match self {
            Finding::UnmirroredDependency { issue, target, .. } => {
                format!("unmirrored-dependency:{issue}->{target}")
            }
            Finding::OrphanDependent { issue, dependent, .. } => {
                format!("orphan-dependent:{dependent}->{issue}")
            }
            Finding::ParentMismatch { issue, .. } => format!("parent-mismatch:{issue}"),
            Finding::DanglingParent { issue, .. } => format!("dangling-parent:{issue}"),
            Finding::Cycle { trace } => format!("dependency-cycle:{}", trace.join(",")),
        }
    }

    /// Whether the repair pass knows how to fix this.
    ///
    /// Cycles need a human to decide which edge to drop.
    pub fn is_repairable(&self) -> bool {
        !matches!(self, Finding::Cycle { .. })
    }
}
