//! core::ops::slot
//!
//! Merge coordination slot.
//!
//! # Architecture
//!
//! A single JSON record at `<rig>/.store/merge-slot.json` acting as a
//! cooperative mutex for merge work:
//!
//! ```json
//! { "status": "held", "holder": "agent-a", "waiters": ["agent-b"] }
//! ```
//!
//! Each acquire or release is one read-modify-write of that file with an
//! atomic rename. Two callers racing on the same slot can both read `open`;
//! callers are expected to be serialized by an outer orchestration layer.
//!
//! # Example
//!
//! ```ignore
//! use rigwork::core::ops::slot::{MergeSlot, SlotError};
//!
//! let slot = MergeSlot::new(&paths);
//! match slot.acquire("agent-a", true) {
//!     Ok(()) => { /* merge */ }
//!     Err(SlotError::SlotHeld { holder }) => println!("queued behind {holder}"),
//!     Err(e) => return Err(e.into()),
//! }
//!
//! if let Some(next) = slot.release("agent-a")? {
//!     println!("notify {next}");
//! }
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::{write_atomic, StorePaths};

/// Errors from merge slot operations.
#[derive(Debug, Error)]
pub enum SlotError {
    /// The slot is held by someone else.
    #[error("merge slot is held by '{holder}'")]
    SlotHeld { holder: String },

    /// Release was attempted by someone other than the holder.
    #[error("merge slot is held by '{actual}', not '{expected}'")]
    HolderMismatch { expected: String, actual: String },

    /// Empty requester name.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("merge slot i/o error at '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("failed to parse merge slot '{path}': {message}")]
    Parse { path: PathBuf, message: String },

    #[error("failed to serialize merge slot '{path}': {message}")]
    Serialize { path: PathBuf, message: String },
}

/// Slot state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    #[default]
    Open,
    Held,
}

/// Persisted slot record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SlotState {
    pub status: SlotStatus,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub holder: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waiters: Vec<String>,
}

/// Merge slot for one rig.
#[derive(Debug, Clone)]
pub struct MergeSlot {
    path: PathBuf,
}

impl MergeSlot {
    /// Create a handle on the rig's slot. Does not touch disk.
    pub fn new(paths: &StorePaths) -> Self {
        Self {
            path: paths.merge_slot_path(),
        }
    }

    /// Read the current state. A missing file is an open slot.
    pub fn status(&self) -> Result<SlotState, SlotError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SlotState::default()),
            Err(e) => {
                return Err(SlotError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&contents).map_err(|e| SlotError::Parse {
            path: self.path.clone(),
            message: e.to_string(),
        })
    }

    fn write(&self, state: &SlotState) -> Result<(), SlotError> {
        let json = serde_json::to_vec_pretty(state).map_err(|e| SlotError::Serialize {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        write_atomic(&self.path, &json).map_err(|e| SlotError::Io {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Try to take the slot for `requester`.
    ///
    /// - Open: becomes held by `requester`.
    /// - Held and `wait`: `requester` is queued (once) and `SlotHeld` returned.
    /// - Held and not `wait`: `SlotHeld` returned, nothing written.
    pub fn acquire(&self, requester: &str, wait: bool) -> Result<(), SlotError> {
        if requester.is_empty() {
            return Err(SlotError::InvalidInput("requester cannot be empty".into()));
        }

        let mut state = self.status()?;
        if state.status == SlotStatus::Held {
            if wait && !state.waiters.iter().any(|w| w == requester) {
                state.waiters.push(requester.to_string());
                self.write(&state)?;
            }
            return Err(SlotError::SlotHeld {
                holder: state.holder,
            });
        }

        state.status = SlotStatus::Held;
        state.holder = requester.to_string();
        state.waiters.retain(|w| w != requester);
        self.write(&state)?;
        tracing::debug!(holder = requester, "merge slot acquired");
        Ok(())
    }

    /// Release the slot.
    ///
    /// A non-empty `holder_check` must match the current holder. Returns the
    /// first waiter, which stays queued until it acquires.
    pub fn release(&self, holder_check: &str) -> Result<Option<String>, SlotError> {
        let mut state = self.status()?;
        if !holder_check.is_empty() && state.holder != holder_check {
            return Err(SlotError::HolderMismatch {
                expected: holder_check.to_string(),
                actual: state.holder,
            });
        }

        state.status = SlotStatus::Open;
        state.holder.clear();
        self.write(&state)?;
        tracing::debug!(next = ?state.waiters.first(), "merge slot released");
        Ok(state.waiters.first().cloned())
    }
}
