use super::error::TopologyError;
use super::shells::AdjacencyStack;
use crate::core::lattice::LatticeStructure;
use crate::core::sparse::{PairRelation, TripletRelation};
use itertools::Itertools;
use tracing::{debug, instrument, trace};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Ordered stack of triangle relations, one per triplet order.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleStack {
    num_sites: usize,
    triangles: Vec<TripletRelation>,
    labels: Vec<[usize; 3]>,
}

impl TriangleStack {
    pub fn empty(num_sites: usize) -> Self {
        Self {
            num_sites,
            triangles: Vec::new(),
            labels: Vec::new(),
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangles(&self) -> &[TripletRelation] {
        &self.triangles
    }

    pub fn triangle(&self, order: usize) -> Option<&TripletRelation> {
        self.triangles.get(order)
    }

    pub fn labels(&self) -> &[[usize; 3]] {
        &self.labels
    }
}

/// The distinct orderings of a closure label; `(2, 2, 2)` has one, `(0, 0, 1)` has three.
pub fn distinct_permutations(label: [usize; 3]) -> Vec<[usize; 3]> {
    label
        .into_iter()
        .permutations(3)
        .unique()
        .map(|p| [p[0], p[1], p[2]])
        .collect()
}

/// Triangle relation `T[i, j, k] = Σ_(p, q, r) A_p[i, j] · A_q[j, k] · A_r[k, i]`, summed over
/// the distinct permutations `(p, q, r)` of `label`.
///
/// Weights are counts: a triple matched by several permutations accumulates each match.
pub fn closure_relation(
    adjacency: &AdjacencyStack,
    label: [usize; 3],
) -> Result<TripletRelation, TopologyError> {
    let shell = |order: usize| {
        adjacency.shell(order).ok_or_else(|| {
            TopologyError::Configuration(format!(
                "closure label {label:?} needs adjacency order {order}, but only {} orders were built",
                adjacency.len()
            ))
        })
    };

    let mut entries = Vec::new();
    for [p, q, r] in distinct_permutations(label) {
        collect_triangles(shell(p)?, shell(q)?, shell(r)?, &mut entries);
    }
    Ok(TripletRelation::from_entries(adjacency.num_sites(), entries))
}

fn collect_triangles(
    first: &PairRelation,
    second: &PairRelation,
    third: &PairRelation,
    entries: &mut Vec<([usize; 3], u32)>,
) {
    for i in 0..first.num_sites() {
        for &j in first.neighbors(i) {
            for &k in second.neighbors(j) {
                if third.contains(k, i) {
                    entries.push(([i, j, k], 1));
                }
            }
        }
    }
}

/// Builds triangle relations from an adjacency stack using a closure-label table.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeBodyComposer {
    labels: Vec<[usize; 3]>,
}

impl ThreeBodyComposer {
    pub fn new(labels: Vec<[usize; 3]>) -> Self {
        Self { labels }
    }

    pub fn for_structure(structure: LatticeStructure) -> Self {
        Self::new(structure.closure_labels().to_vec())
    }

    pub fn labels(&self) -> &[[usize; 3]] {
        &self.labels
    }

    /// Number of triplet orders a request for `max_triplet_order` yields; the label table
    /// truncates longer requests.
    pub fn available_orders(&self, max_triplet_order: usize) -> usize {
        max_triplet_order.min(self.labels.len())
    }

    /// Number of adjacency orders that the first `max_triplet_order` labels reference.
    pub fn required_adjacency_orders(&self, max_triplet_order: usize) -> usize {
        self.labels[..self.available_orders(max_triplet_order)]
            .iter()
            .flatten()
            .map(|&order| order + 1)
            .max()
            .unwrap_or(0)
    }

    #[instrument(skip(self, adjacency), fields(num_sites = adjacency.num_sites()))]
    pub fn compose(
        &self,
        adjacency: &AdjacencyStack,
        max_triplet_order: usize,
    ) -> Result<TriangleStack, TopologyError> {
        let available = self.available_orders(max_triplet_order);
        if available < max_triplet_order {
            debug!(
                requested = max_triplet_order,
                available, "Closure table truncated to the tabulated orders."
            );
        }
        let labels = self.labels[..available].to_vec();

        #[cfg(not(feature = "parallel"))]
        let triangles: Result<Vec<_>, _> = labels
            .iter()
            .map(|&label| closure_relation(adjacency, label))
            .collect();

        #[cfg(feature = "parallel")]
        let triangles: Result<Vec<_>, _> = labels
            .par_iter()
            .map(|&label| closure_relation(adjacency, label))
            .collect();

        let triangles = triangles?;
        for (order, triangle) in triangles.iter().enumerate() {
            trace!(order, entries = triangle.nnz(), "Composed triangle relation.");
        }

        Ok(TriangleStack {
            num_sites: adjacency.num_sites(),
            triangles,
            labels,
        })
    }
}
