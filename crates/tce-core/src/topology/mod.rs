//! # Topology Module
//!
//! Builds the geometry-dependent structures that every feature evaluation reuses:
//!
//! - [`distance`] - Periodic-aware spatial index producing a truncated sparse distance matrix
//! - [`shells`] - Classification of distances into an ordered stack of neighbor shells
//! - [`triplets`] - Triangle relations composed from shells via lattice closure labels
//!
//! A [`Topology`] is derived once per geometry and basis and never mutated afterwards, so a
//! single instance can back any number of concurrent evaluators.

pub mod distance;
pub mod error;
pub mod shells;
pub mod triplets;

use crate::core::geometry::Geometry;
use crate::core::sparse::{PairRelation, TripletRelation};
use distance::DistanceIndex;
use error::TopologyError;
use shells::{AdjacencyStack, ShellClassifier, ToleranceOverlap};
use tracing::{info, instrument};
use triplets::{ThreeBodyComposer, TriangleStack};

/// Adjacency and triangle stacks for a fixed geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    adjacency: AdjacencyStack,
    num_adjacency_orders: usize,
    triangles: TriangleStack,
}

impl Topology {
    /// Builds the topology for `geometry`.
    ///
    /// Shells referenced by the closure labels but beyond `max_adjacency_order` are built for
    /// triangle composition only and contribute no two-body features.
    #[instrument(skip_all, fields(num_sites = geometry.num_sites()))]
    pub fn build(
        geometry: &Geometry,
        classifier: &ShellClassifier,
        composer: &ThreeBodyComposer,
        max_adjacency_order: usize,
        max_triplet_order: usize,
    ) -> Result<Self, TopologyError> {
        if max_adjacency_order == 0 {
            return Err(TopologyError::Configuration(
                "at least one adjacency order is required".to_string(),
            ));
        }

        let closure_orders = composer.required_adjacency_orders(max_triplet_order);
        let num_shells = max_adjacency_order.max(closure_orders);
        if classifier.available_orders(num_shells) < closure_orders {
            return Err(TopologyError::Configuration(format!(
                "closure labels need {closure_orders} adjacency orders, but only {} are available",
                classifier.available_orders(num_shells)
            )));
        }

        let index = DistanceIndex::new(geometry)?;
        let distances = index.distance_matrix(classifier.required_distance(num_shells)?)?;
        let adjacency = classifier.classify(&distances, num_shells)?;
        let triangles = composer.compose(&adjacency, max_triplet_order)?;
        let num_adjacency_orders = max_adjacency_order.min(adjacency.len());

        info!(
            adjacency_orders = num_adjacency_orders,
            closure_shells = adjacency.len(),
            triplet_orders = triangles.len(),
            pairs = distances.nnz(),
            "Topology built."
        );

        Self::from_parts(adjacency, num_adjacency_orders, triangles)
    }

    /// Assembles a topology from prebuilt stacks, checking that they describe the same sites.
    pub fn from_parts(
        adjacency: AdjacencyStack,
        num_adjacency_orders: usize,
        triangles: TriangleStack,
    ) -> Result<Self, TopologyError> {
        if triangles.num_sites() != adjacency.num_sites() {
            return Err(TopologyError::DimensionMismatch {
                what: "triangle stack sites",
                expected: adjacency.num_sites(),
                found: triangles.num_sites(),
            });
        }
        if num_adjacency_orders > adjacency.len() {
            return Err(TopologyError::DimensionMismatch {
                what: "adjacency orders",
                expected: adjacency.len(),
                found: num_adjacency_orders,
            });
        }
        Ok(Self {
            adjacency,
            num_adjacency_orders,
            triangles,
        })
    }

    pub fn num_sites(&self) -> usize {
        self.adjacency.num_sites()
    }

    pub fn num_adjacency_orders(&self) -> usize {
        self.num_adjacency_orders
    }

    pub fn num_triplet_orders(&self) -> usize {
        self.triangles.len()
    }

    /// Shells that contribute two-body features, nearest first.
    pub fn adjacency(&self) -> &[PairRelation] {
        &self.adjacency.shells()[..self.num_adjacency_orders]
    }

    /// Every shell that was built, including those only used for triangle closure.
    pub fn adjacency_stack(&self) -> &AdjacencyStack {
        &self.adjacency
    }

    pub fn triangles(&self) -> &[TripletRelation] {
        self.triangles.triangles()
    }

    pub fn triangle_stack(&self) -> &TriangleStack {
        &self.triangles
    }

    pub fn tolerance_overlaps(&self) -> &[ToleranceOverlap] {
        self.adjacency.tolerance_overlaps()
    }
}
