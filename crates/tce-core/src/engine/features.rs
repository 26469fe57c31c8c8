use super::error::EngineError;
use crate::core::sparse::{PairRelation, TripletRelation};
use crate::core::state::StateMatrix;
use crate::topology::Topology;
use std::ops::Range;
use tracing::trace;

/// Block offsets of a feature vector: two-body blocks (`T x T` each, by adjacency order)
/// followed by three-body blocks (`T x T x T` each, by triplet order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureLayout {
    pub num_adjacency_orders: usize,
    pub num_triplet_orders: usize,
    pub num_types: usize,
}

impl FeatureLayout {
    pub fn new(num_adjacency_orders: usize, num_triplet_orders: usize, num_types: usize) -> Self {
        Self {
            num_adjacency_orders,
            num_triplet_orders,
            num_types,
        }
    }

    pub fn for_topology(topology: &Topology, num_types: usize) -> Self {
        Self::new(
            topology.num_adjacency_orders(),
            topology.num_triplet_orders(),
            num_types,
        )
    }

    pub fn two_body_block_len(&self) -> usize {
        self.num_types.pow(2)
    }

    pub fn three_body_block_len(&self) -> usize {
        self.num_types.pow(3)
    }

    pub fn two_body_len(&self) -> usize {
        self.num_adjacency_orders * self.two_body_block_len()
    }

    pub fn three_body_len(&self) -> usize {
        self.num_triplet_orders * self.three_body_block_len()
    }

    pub fn len(&self) -> usize {
        self.two_body_len() + self.three_body_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn two_body_range(&self, order: usize) -> Option<Range<usize>> {
        (order < self.num_adjacency_orders).then(|| {
            let start = order * self.two_body_block_len();
            start..start + self.two_body_block_len()
        })
    }

    pub fn three_body_range(&self, order: usize) -> Option<Range<usize>> {
        (order < self.num_triplet_orders).then(|| {
            let start = self.two_body_len() + order * self.three_body_block_len();
            start..start + self.three_body_block_len()
        })
    }
}

/// Flattened correlation features of one occupation state, or a difference of two.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
    layout: FeatureLayout,
}

impl FeatureVector {
    pub fn zeros(layout: FeatureLayout) -> Self {
        Self {
            values: vec![0.0; layout.len()],
            layout,
        }
    }

    pub(crate) fn from_parts(layout: FeatureLayout, values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), layout.len());
        Self { values, layout }
    }

    pub fn layout(&self) -> &FeatureLayout {
        &self.layout
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn two_body_block(&self, order: usize) -> Option<&[f64]> {
        self.layout
            .two_body_range(order)
            .map(|range| &self.values[range])
    }

    pub fn three_body_block(&self, order: usize) -> Option<&[f64]> {
        self.layout
            .three_body_range(order)
            .map(|range| &self.values[range])
    }
}

/// `block[α, β] = Σ_(i, j) A[i, j] · S[i, α] · S[j, β]`, row-major.
pub fn two_body_block(relation: &PairRelation, state: &StateMatrix) -> Vec<f64> {
    let t = state.num_types();
    let mut block = vec![0.0; t * t];
    let mut neighbor_sum = vec![0.0; t];
    for i in 0..relation.num_sites() {
        let neighbors = relation.neighbors(i);
        if neighbors.is_empty() {
            continue;
        }
        neighbor_sum.fill(0.0);
        for &j in neighbors {
            add_scaled(&mut neighbor_sum, 1.0, state.row(j));
        }
        add_outer2(&mut block, 1.0, state.row(i), &neighbor_sum);
    }
    block
}

/// `block[α, β, γ] = Σ_(i, j, k) B[i, j, k] · S[i, α] · S[j, β] · S[k, γ]`, row-major.
pub fn three_body_block(relation: &TripletRelation, state: &StateMatrix) -> Vec<f64> {
    let t = state.num_types();
    let mut block = vec![0.0; t * t * t];
    for ([i, j, k], weight) in relation.iter() {
        add_outer3(
            &mut block,
            f64::from(weight),
            state.row(i),
            state.row(j),
            state.row(k),
        );
    }
    block
}

/// Full feature vector of `state` over every shell and triangle order of `topology`.
pub fn feature_vector(topology: &Topology, state: &StateMatrix) -> Result<FeatureVector, EngineError> {
    check_state(topology, state)?;
    let layout = FeatureLayout::for_topology(topology, state.num_types());

    let mut values = Vec::with_capacity(layout.len());
    for relation in topology.adjacency() {
        values.extend(two_body_block(relation, state));
    }
    for relation in topology.triangles() {
        values.extend(three_body_block(relation, state));
    }
    trace!(len = values.len(), "Computed feature vector.");

    Ok(FeatureVector::from_parts(layout, values))
}

pub(crate) fn check_state(topology: &Topology, state: &StateMatrix) -> Result<(), EngineError> {
    if state.num_sites() != topology.num_sites() {
        return Err(EngineError::DimensionMismatch {
            what: "state matrix rows",
            expected: topology.num_sites(),
            found: state.num_sites(),
        });
    }
    Ok(())
}

#[inline]
pub(crate) fn add_scaled(target: &mut [f64], factor: f64, x: &[f64]) {
    for (t, &v) in target.iter_mut().zip(x) {
        *t += factor * v;
    }
}

#[inline]
pub(crate) fn add_outer2(block: &mut [f64], weight: f64, x: &[f64], y: &[f64]) {
    let t = y.len();
    for (a, &xa) in x.iter().enumerate() {
        if xa == 0.0 {
            continue;
        }
        add_scaled(&mut block[a * t..(a + 1) * t], weight * xa, y);
    }
}

#[inline]
pub(crate) fn add_outer3(block: &mut [f64], weight: f64, x: &[f64], y: &[f64], z: &[f64]) {
    let t = z.len();
    for (a, &xa) in x.iter().enumerate() {
        if xa == 0.0 {
            continue;
        }
        for (b, &yb) in y.iter().enumerate() {
            if yb == 0.0 {
                continue;
            }
            let start = (a * t + b) * t;
            add_scaled(&mut block[start..start + t], weight * xa * yb, z);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::geometry::Geometry;
    use crate::core::lattice::LatticeStructure;
    use crate::topology::shells::{DEFAULT_TOLERANCE, ShellClassifier};
    use crate::topology::triplets::ThreeBodyComposer;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn topology(
        structure: LatticeStructure,
        size: [usize; 3],
        max_adjacency_order: usize,
        max_triplet_order: usize,
    ) -> Topology {
        let geometry = Geometry::supercell(structure, 1.0, size);
        let classifier = ShellClassifier::table(structure, 1.0, DEFAULT_TOLERANCE).unwrap();
        let composer = ThreeBodyComposer::for_structure(structure);
        Topology::build(
            &geometry,
            &classifier,
            &composer,
            max_adjacency_order,
            max_triplet_order,
        )
        .unwrap()
    }

    fn fractional_state(num_sites: usize, num_types: usize, seed: u64) -> StateMatrix {
        let mut rng = StdRng::seed_from_u64(seed);
        let occupations = (0..num_sites * num_types)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        StateMatrix::new(num_sites, num_types, occupations).unwrap()
    }

    fn dense_two_body(relation: &PairRelation, state: &StateMatrix) -> Vec<f64> {
        let n = relation.num_sites();
        let t = state.num_types();
        let mut dense = vec![0.0; n * n];
        for (i, j) in relation.iter() {
            dense[i * n + j] = 1.0;
        }
        let mut block = vec![0.0; t * t];
        for i in 0..n {
            for j in 0..n {
                for a in 0..t {
                    for b in 0..t {
                        block[a * t + b] += dense[i * n + j] * state.get(i, a) * state.get(j, b);
                    }
                }
            }
        }
        block
    }

    fn dense_three_body(relation: &TripletRelation, state: &StateMatrix) -> Vec<f64> {
        let n = relation.num_sites();
        let t = state.num_types();
        let mut dense = vec![0.0; n * n * n];
        for ([i, j, k], weight) in relation.iter() {
            dense[(i * n + j) * n + k] = f64::from(weight);
        }
        let mut block = vec![0.0; t * t * t];
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let w = dense[(i * n + j) * n + k];
                    if w == 0.0 {
                        continue;
                    }
                    for a in 0..t {
                        for b in 0..t {
                            for c in 0..t {
                                block[(a * t + b) * t + c] +=
                                    w * state.get(i, a) * state.get(j, b) * state.get(k, c);
                            }
                        }
                    }
                }
            }
        }
        block
    }

    #[test]
    fn layout_places_three_body_blocks_after_two_body_blocks() {
        let layout = FeatureLayout::new(2, 1, 3);
        assert_eq!(layout.len(), 2 * 9 + 27);
        assert_eq!(layout.two_body_range(1), Some(9..18));
        assert_eq!(layout.three_body_range(0), Some(18..45));
        assert_eq!(layout.two_body_range(2), None);
        assert_eq!(layout.three_body_range(1), None);
    }

    #[test]
    fn sparse_blocks_match_dense_reference() {
        let topology = topology(LatticeStructure::SimpleCubic, [3, 3, 3], 2, 1);
        let state = fractional_state(topology.num_sites(), 3, 7);

        for relation in topology.adjacency() {
            let sparse = two_body_block(relation, &state);
            let dense = dense_two_body(relation, &state);
            assert!(sparse.iter().zip(&dense).all(|(&a, &b)| f64_approx_equal(a, b)));
        }
        for relation in topology.triangles() {
            let sparse = three_body_block(relation, &state);
            let dense = dense_three_body(relation, &state);
            assert!(sparse.iter().zip(&dense).all(|(&a, &b)| f64_approx_equal(a, b)));
        }
    }

    #[test]
    fn feature_vector_concatenates_blocks_in_order() {
        let topology = topology(LatticeStructure::FaceCenteredCubic, [3, 3, 3], 2, 2);
        let state = fractional_state(topology.num_sites(), 2, 11);
        let features = feature_vector(&topology, &state).unwrap();

        assert_eq!(features.len(), 2 * 4 + 2 * 8);
        for (order, relation) in topology.adjacency().iter().enumerate() {
            assert_eq!(
                features.two_body_block(order).unwrap(),
                two_body_block(relation, &state).as_slice()
            );
        }
        for (order, relation) in topology.triangles().iter().enumerate() {
            assert_eq!(
                features.three_body_block(order).unwrap(),
                three_body_block(relation, &state).as_slice()
            );
        }
    }

    #[test]
    fn single_species_two_body_block_counts_ordered_pairs() {
        let topology = topology(LatticeStructure::BodyCenteredCubic, [3, 3, 3], 1, 0);
        let state = StateMatrix::from_types(&vec![0; topology.num_sites()], 1).unwrap();
        let features = feature_vector(&topology, &state).unwrap();
        assert_eq!(features.values(), &[(topology.num_sites() * 8) as f64]);
    }

    #[test]
    fn state_with_wrong_site_count_is_a_dimension_mismatch() {
        let topology = topology(LatticeStructure::SimpleCubic, [3, 3, 3], 1, 0);
        let state = StateMatrix::zeros(26, 2);
        assert_eq!(
            feature_vector(&topology, &state),
            Err(EngineError::DimensionMismatch {
                what: "state matrix rows",
                expected: 27,
                found: 26
            })
        );
    }
}
