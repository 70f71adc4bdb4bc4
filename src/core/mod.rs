//! core
//!
//! Core domain types, identifier rules, and on-disk layout.
//!
//! # Modules
//!
//! - [`types`] - Issue records and dependency edges
//! - [`ids`] - Random and content-hashed identifier generation
//! - [`hierarchy`] - Hierarchical child identifiers
//! - [`graph`] - In-memory dependency graph snapshot
//! - [`paths`] - Centralized path routing for rig storage
//! - [`config`] - Configuration schema and loading
//! - [`ops`] - Rig lock and merge slot
//!
//! # Design Principles
//!
//! - Identifier rules are pure functions with fixed test vectors
//! - Schemas are strict: unknown fields are rejected
//! - All writes go through one atomic-rename helper

pub mod config;
pub mod graph;
pub mod hierarchy;
pub mod ids;
pub mod ops;
pub mod paths;
pub mod types;
