//! # TCE Core Library
//!
//! Two-body and three-body correlation features for lattice cluster expansions,
//! with an incremental path that updates a feature vector after a local change in
//! site occupation without recomputing it from scratch.
//!
//! ## Architectural Philosophy
//!
//! The library is split into layers with a strict dependency direction:
//!
//! - **[`core`]: The Foundation.** Stateless data models: lattice structures and their
//!   static tables, geometries and supercells, the per-site [`StateMatrix`](core::state::StateMatrix),
//!   sparse relations and dense tensors (including symmetrization).
//!
//! - **[`topology`]: The Expensive Artifact.** Builds the neighbor-shell adjacency stack and
//!   the triangle stack for a fixed geometry. A [`Topology`](topology::Topology) is immutable
//!   and can be shared read-only across any number of evaluators.
//!
//! - **[`engine`]: The Contraction Layer.** Contracts a topology against occupation states to
//!   produce feature vectors and feature-vector differences.
//!
//! - **[`workflows`]: The Public API.** One-shot entry points that validate inputs, build the
//!   topology and evaluate features.

pub mod core;
pub mod engine;
pub mod topology;
pub mod workflows;
