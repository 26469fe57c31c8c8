//! # Engine Module
//!
//! Per-state feature evaluation over a prebuilt [`Topology`].
//!
//! - [`config`] - Cluster-basis description, TOML loading and builder
//! - [`features`] - Full feature vectors from sparse shell and triangle contractions
//! - [`diff`] - Feature differences computed from the edited sites only
//!
//! [`FeatureEvaluator`] borrows an immutable topology, so any number of evaluators can share
//! one topology across threads while each owns its own state matrices.

pub mod config;
pub mod diff;
pub mod error;
pub mod features;

use crate::core::state::StateMatrix;
use crate::topology::Topology;
use error::EngineError;
use features::{FeatureLayout, FeatureVector};

#[derive(Debug, Clone, Copy)]
pub struct FeatureEvaluator<'a> {
    topology: &'a Topology,
}

impl<'a> FeatureEvaluator<'a> {
    pub fn new(topology: &'a Topology) -> Self {
        Self { topology }
    }

    pub fn topology(&self) -> &'a Topology {
        self.topology
    }

    pub fn layout(&self, num_types: usize) -> FeatureLayout {
        FeatureLayout::for_topology(self.topology, num_types)
    }

    pub fn feature_vector(&self, state: &StateMatrix) -> Result<FeatureVector, EngineError> {
        features::feature_vector(self.topology, state)
    }

    pub fn feature_difference(
        &self,
        initial: &StateMatrix,
        final_state: &StateMatrix,
    ) -> Result<FeatureVector, EngineError> {
        diff::feature_difference(self.topology, initial, final_state)
    }
}
