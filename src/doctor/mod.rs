//! doctor
//!
//! Integrity check and repair for one rig.
//!
//! # Architecture
//!
//! Graph mutations write one record at a time, so a crash or failed write
//! can leave an edge recorded on only one side. Doctor scans a rig for such
//! damage and, in fix mode, repairs what has an unambiguous repair:
//!
//! 1. Parent findings first. The `parent` field wins over parent-child
//!    edges. With no `parent`, the first parent-child edge is promoted. A
//!    parent that no longer exists is dropped.
//! 2. Mirror findings second, scanned again after the parent repairs so
//!    dropped edges are not re-mirrored. Edges are mirrored onto their
//!    target. Dependents with no matching edge are removed.
//! 3. Cycles are reported only.
//!
//! Only this rig's records are inspected. An edge whose other end is not in
//! this rig (another rig, or deleted) is not judged.
//!
//! Callers that repair hold the rig lock for the duration
//! (see [`crate::store::FileStore`]).
//!
//! # Example
//!
//! ```ignore
//! use rigwork::doctor;
//!
//! let report = doctor::run(&store, false)?;
//! for line in report.lines() {
//!     println!("{line}");
//! }
//! ```

mod issues;

pub use issues::Finding;

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::core::graph::DependencyGraph;
use crate::core::types::{DependencyType, Issue};
use crate::store::{ListFilter, RecordStore, StoreError};

/// One finding and whether it was repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub finding: Finding,
    pub repaired: bool,
}

/// Result of a Doctor run.
#[derive(Debug, Clone, Default)]
pub struct DoctorReport {
    pub diagnoses: Vec<Diagnosis>,
}

impl DoctorReport {
    /// True if nothing was found.
    pub fn is_clean(&self) -> bool {
        self.diagnoses.is_empty()
    }

    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.diagnoses.iter().map(|d| &d.finding)
    }

    pub fn repaired_count(&self) -> usize {
        self.diagnoses.iter().filter(|d| d.repaired).count()
    }

    /// One line per finding: `[code] message`, with a `(repaired)` suffix
    /// where applicable.
    pub fn lines(&self) -> Vec<String> {
        self.diagnoses
            .iter()
            .map(|d| {
                let suffix = if d.repaired { " (repaired)" } else { "" };
                format!("[{}] {}{}", d.finding.code(), d.finding, suffix)
            })
            .collect()
    }

    fn push(&mut self, finding: Finding, repaired: bool) {
        self.diagnoses.push(Diagnosis { finding, repaired });
    }
}

/// Scan `store` and optionally repair it.
///
/// # Errors
///
/// Any store failure aborts the run. Repairs already written stay written.
pub fn run(store: &dyn RecordStore, fix: bool) -> Result<DoctorReport, StoreError> {
    let mut report = DoctorReport::default();

    let issues = store.list(&ListFilter::all())?;
    let parent_findings = scan_parents(&issues);
    let parents_touched = fix && !parent_findings.is_empty();
    for finding in parent_findings {
        let repaired = fix && repair(store, &finding)?;
        report.push(finding, repaired);
    }

    let issues = if parents_touched {
        store.list(&ListFilter::all())?
    } else {
        issues
    };
    for finding in scan_mirrors(&issues) {
        let repaired = fix && repair(store, &finding)?;
        report.push(finding, repaired);
    }

    if let Some(trace) = DependencyGraph::from_issues(&issues).find_cycle() {
        warn!(cycle = %trace.join(" -> "), "dependency cycle found");
        report.push(Finding::Cycle { trace }, false);
    }

    debug!(
        root = %store.root().display(),
        findings = report.diagnoses.len(),
        repaired = report.repaired_count(),
        "doctor finished"
    );
    Ok(report)
}

fn scan_parents(issues: &[Issue]) -> Vec<Finding> {
    let by_id: HashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();
    let mut findings = Vec::new();

    for issue in issues {
        let edges: Vec<String> = issue.parent_edges().map(|d| d.id.clone()).collect();
        let consistent = match &issue.parent {
            Some(parent) => edges.len() == 1 && &edges[0] == parent,
            None => edges.is_empty(),
        };
        if !consistent {
            findings.push(Finding::ParentMismatch {
                issue: issue.id.clone(),
                parent: issue.parent.clone(),
                edges,
            });
            continue;
        }

        if let Some(parent) = &issue.parent {
            if !by_id.contains_key(parent.as_str()) {
                findings.push(Finding::DanglingParent {
                    issue: issue.id.clone(),
                    parent: parent.clone(),
                });
            }
        }
    }
    findings
}

fn scan_mirrors(issues: &[Issue]) -> Vec<Finding> {
    let by_id: HashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();
    let mut findings = Vec::new();

    for issue in issues {
        for dep in &issue.dependencies {
            if let Some(target) = by_id.get(dep.id.as_str()) {
                if !target.has_dependent(&issue.id, dep.kind) {
                    findings.push(Finding::UnmirroredDependency {
                        issue: issue.id.clone(),
                        target: dep.id.clone(),
                        kind: dep.kind,
                    });
                }
            }
        }
        for dependent in &issue.dependents {
            if let Some(source) = by_id.get(dependent.id.as_str()) {
                if !source.has_dependency(&issue.id, dependent.kind) {
                    findings.push(Finding::OrphanDependent {
                        issue: issue.id.clone(),
                        dependent: dependent.id.clone(),
                        kind: dependent.kind,
                    });
                }
            }
        }
    }
    findings
}

/// Apply the repair for one finding. Returns whether anything was written.
fn repair(store: &dyn RecordStore, finding: &Finding) -> Result<bool, StoreError> {
    match finding {
        Finding::UnmirroredDependency {
            issue,
            target,
            kind,
        } => {
            store.modify(target, &mut |t| {
                t.add_dependent(issue, *kind);
                Ok(())
            })?;
        }
        Finding::OrphanDependent {
            issue,
            dependent,
            kind,
        } => {
            store.modify(issue, &mut |i| {
                i.remove_dependents(dependent, Some(*kind));
                Ok(())
            })?;
        }
        Finding::ParentMismatch { issue, parent, edges } => {
            let Some(keep) = parent.clone().or_else(|| edges.first().cloned()) else {
                return Ok(false);
            };
            store.modify(issue, &mut |i| {
                let stale: Vec<String> = i
                    .parent_edges()
                    .filter(|d| d.id != keep)
                    .map(|d| d.id.clone())
                    .collect();
                for id in &stale {
                    i.remove_dependencies(id, Some(DependencyType::ParentChild));
                }
                i.parent = Some(keep.clone());
                i.add_dependency(&keep, DependencyType::ParentChild);
                Ok(())
            })?;
        }
        Finding::DanglingParent { issue, parent } => {
            store.modify(issue, &mut |i| {
                i.remove_dependencies(parent, Some(DependencyType::ParentChild));
                i.parent = None;
                Ok(())
            })?;
        }
        Finding::Cycle { .. } => return Ok(false),
    }

    debug!(code = %finding.code(), "repaired");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Config, GlobalConfig, RigConfig};
    use crate::core::paths::StorePaths;
    use crate::store::{CreateOptions, FileStore};
    use tempfile::TempDir;

    fn store(temp: &TempDir) -> FileStore {
        let store = FileStore::new(
            StorePaths::for_rig(temp.path()),
            Config::from_parts(
                GlobalConfig::default(),
                Some(RigConfig {
                    prefix: Some("bd".into()),
                    ..Default::default()
                }),
            ),
        );
        store.init().unwrap();
        store
    }

    fn put(store: &FileStore, id: &str, edit: impl FnOnce(&mut Issue)) {
        let mut issue = Issue::new(id);
        issue.id = id.to_string();
        edit(&mut issue);
        store.create(issue, &CreateOptions::default()).unwrap();
    }

    #[test]
    fn clean_store_reports_nothing() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-p", |_| {});
        store
            .create(Issue::new("child"), &CreateOptions::child_of("bd-p"))
            .unwrap();

        let report = run(&store, false).unwrap();
        assert!(report.is_clean(), "{:?}", report.lines());
    }

    #[test]
    fn unmirrored_edge_found_and_repaired() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-b", |_| {});
        put(&store, "bd-a", |i| {
            i.add_dependency("bd-b", DependencyType::Generic);
        });

        let report = run(&store, false).unwrap();
        assert_eq!(report.diagnoses.len(), 1);
        assert!(matches!(
            report.diagnoses[0].finding,
            Finding::UnmirroredDependency { .. }
        ));
        assert_eq!(report.repaired_count(), 0);
        assert!(store.get("bd-b").unwrap().dependents.is_empty());

        let report = run(&store, true).unwrap();
        assert_eq!(report.repaired_count(), 1);
        assert!(report.lines()[0].ends_with("(repaired)"));
        assert!(store
            .get("bd-b")
            .unwrap()
            .has_dependent("bd-a", DependencyType::Generic));

        assert!(run(&store, false).unwrap().is_clean());
    }

    #[test]
    fn orphan_dependent_removed() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-a", |_| {});
        put(&store, "bd-b", |i| {
            i.add_dependent("bd-a", DependencyType::Generic);
        });

        let report = run(&store, true).unwrap();
        assert_eq!(
            report.findings().next().map(Finding::code),
            Some("orphan-dependent:bd-a->bd-b".to_string())
        );
        assert!(store.get("bd-b").unwrap().dependents.is_empty());
    }

    #[test]
    fn parent_field_wins_over_stale_edge() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-p1", |i| {
            i.add_dependent("bd-c", DependencyType::ParentChild);
        });
        put(&store, "bd-p2", |_| {});
        put(&store, "bd-c", |i| {
            i.parent = Some("bd-p2".into());
            i.add_dependency("bd-p1", DependencyType::ParentChild);
        });

        run(&store, true).unwrap();

        let child = store.get("bd-c").unwrap();
        assert_eq!(child.parent.as_deref(), Some("bd-p2"));
        let edges: Vec<_> = child.parent_edges().map(|d| d.id.clone()).collect();
        assert_eq!(edges, vec!["bd-p2".to_string()]);
        assert!(store
            .get("bd-p2")
            .unwrap()
            .has_dependent("bd-c", DependencyType::ParentChild));
        assert!(store.get("bd-p1").unwrap().dependents.is_empty());
        assert!(run(&store, false).unwrap().is_clean());
    }

    #[test]
    fn missing_parent_field_restored_from_edge() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-p", |i| {
            i.add_dependent("bd-c", DependencyType::ParentChild);
        });
        put(&store, "bd-c", |i| {
            i.add_dependency("bd-p", DependencyType::ParentChild);
        });

        run(&store, true).unwrap();
        assert_eq!(store.get("bd-c").unwrap().parent.as_deref(), Some("bd-p"));
    }

    #[test]
    fn dangling_parent_dropped() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-c", |i| {
            i.parent = Some("bd-gone".into());
            i.add_dependency("bd-gone", DependencyType::ParentChild);
        });

        let report = run(&store, true).unwrap();
        assert!(matches!(
            report.diagnoses[0].finding,
            Finding::DanglingParent { .. }
        ));
        let child = store.get("bd-c").unwrap();
        assert!(child.parent.is_none());
        assert!(child.dependencies.is_empty());
    }

    #[test]
    fn cycle_reported_not_repaired() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-a", |i| {
            i.add_dependency("bd-b", DependencyType::Generic);
            i.add_dependent("bd-b", DependencyType::Generic);
        });
        put(&store, "bd-b", |i| {
            i.add_dependency("bd-a", DependencyType::Generic);
            i.add_dependent("bd-a", DependencyType::Generic);
        });

        let report = run(&store, true).unwrap();
        assert_eq!(report.diagnoses.len(), 1);
        assert!(matches!(report.diagnoses[0].finding, Finding::Cycle { .. }));
        assert_eq!(report.repaired_count(), 0);
    }

    #[test]
    fn edges_into_other_rigs_are_not_judged() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-a", |i| {
            i.add_dependency("fe-remote", DependencyType::Generic);
            i.add_dependent("be-remote", DependencyType::Generic);
        });

        assert!(run(&store, false).unwrap().is_clean());
    }

    #[test]
    fn report_lines_format() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-b", |_| {});
        put(&store, "bd-a", |i| {
            i.add_dependency("bd-b", DependencyType::Generic);
        });

        let report = run(&store, true).unwrap();
        insta::assert_snapshot!(
            report.lines().join("\n"),
            @"[unmirrored-dependency:bd-a->bd-b] bd-a depends on bd-b (generic) but bd-b does not list it as a dependent (repaired)"
        );
    }

    #[test]
    fn store_doctor_returns_lines() {
        let temp = TempDir::new().unwrap();
        let store = store(&temp);
        put(&store, "bd-b", |_| {});
        put(&store, "bd-a", |i| {
            i.add_dependency("bd-b", DependencyType::Generic);
        });

        let lines = store.doctor(true).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("[unmirrored-dependency:bd-a->bd-b]"));
    }
}
