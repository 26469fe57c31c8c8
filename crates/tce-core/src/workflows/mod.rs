//! # Workflows Module
//!
//! One-shot entry points that go from a geometry, a cluster basis and occupation states to
//! feature vectors.
//!
//! - **Feature workflow** ([`features`]) - Validates the inputs against each other, builds the
//!   topology and evaluates full feature vectors or incremental feature differences.
//!
//! Callers that evaluate many states on one geometry should build the topology once with
//! [`features::build_topology`] and reuse it through an
//! [`FeatureEvaluator`](crate::engine::FeatureEvaluator).

pub mod features;
