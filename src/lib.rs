//! Rigwork - federated, file-backed issue tracking
//!
//! Issues live in "rigs": independent storage directories, each owning the
//! ids that start with its prefix. A routing manifest at the town root maps
//! prefixes to rigs, so a dependency graph can span several of them.
//!
//! # Architecture
//!
//! - [`core`] - Domain types, identifier rules, paths, config, coordination
//! - [`store`] - Record store trait and the flat-file backend
//! - [`routing`] - Route table loading, redirects, and the prefix router
//! - [`federation`] - Routing-aware store and dependency-graph engine
//! - [`doctor`] - Integrity check and repair
//!
//! # Correctness Invariants
//!
//! 1. The dependency graph, parent-child edges included, is acyclic
//! 2. A parent-child edge joins two ids in the same physical rig
//! 3. Every edge is mirrored on its target, except after a partial failure,
//!    which Doctor repairs
//! 4. An id resolves to the same rig for the lifetime of a router
//!
//! The library emits `tracing` events and installs no subscriber.

pub mod core;
pub mod doctor;
pub mod federation;
pub mod routing;
pub mod store;
