//! core::ops
//!
//! Cross-process coordination primitives.
//!
//! # Modules
//!
//! - [`lock`] - Exclusive rig lock (OS file lock)
//! - [`slot`] - Cooperative merge slot (JSON record)
//!
//! # Architecture
//!
//! Graph mutations are sequences of single-file atomic writes with no
//! cross-record transaction. These primitives are what an outer
//! orchestration layer uses to serialize work on a rig:
//!
//! - The rig lock guards bulk rewrites such as the Doctor repair pass.
//! - The merge slot queues agents waiting to merge into a rig.

pub mod lock;
pub mod slot;

pub use lock::{LockError, RigLock};
pub use slot::{MergeSlot, SlotError, SlotState, SlotStatus};
