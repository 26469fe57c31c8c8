use super::error::EngineError;
use super::features::{FeatureLayout, FeatureVector, add_outer2, add_outer3, check_state};
use crate::core::state::StateMatrix;
use crate::core::tensor::DenseTensor;
use crate::topology::Topology;
use tracing::trace;

/// Sorted indices of the sites whose occupation rows differ between the two states.
pub fn edit_set(initial: &StateMatrix, final_state: &StateMatrix) -> Vec<usize> {
    initial.differing_sites(final_state)
}

/// Feature difference `features(final) - features(initial)`, touching only relations incident
/// to the edited sites.
///
/// Each relation is truncated to rows in the edit set. A pair or triple with `m` vertices in
/// the edit set shows up in `m` truncated rows, so it is weighted by `1 / m`; after the
/// `k · symmetrize` step every pair or triple is then counted exactly once, whatever the
/// shape of the edit.
pub fn feature_difference(
    topology: &Topology,
    initial: &StateMatrix,
    final_state: &StateMatrix,
) -> Result<FeatureVector, EngineError> {
    check_state(topology, initial)?;
    check_state(topology, final_state)?;
    if final_state.num_types() != initial.num_types() {
        return Err(EngineError::DimensionMismatch {
            what: "state matrix types",
            expected: initial.num_types(),
            found: final_state.num_types(),
        });
    }

    let layout = FeatureLayout::for_topology(topology, initial.num_types());
    let edits = edit_set(initial, final_state);
    if edits.is_empty() {
        return Ok(FeatureVector::zeros(layout));
    }
    trace!(edited_sites = edits.len(), "Computing incremental feature difference.");

    let two_body_delta = subtract(
        two_body_contribution(topology, final_state, &edits)?,
        two_body_contribution(topology, initial, &edits)?,
    );
    let three_body_delta = subtract(
        three_body_contribution(topology, final_state, &edits)?,
        three_body_contribution(topology, initial, &edits)?,
    );

    let mut values = two_body_delta;
    values.extend(three_body_delta);
    Ok(FeatureVector::from_parts(layout, values))
}

/// `2 · sym(Σ_(i ∈ edits, j) A[i, j] / m_ij · S[i] ⊗ S[j])` for every adjacency order, stacked
/// along the first axis.
fn two_body_contribution(
    topology: &Topology,
    state: &StateMatrix,
    edits: &[usize],
) -> Result<Vec<f64>, EngineError> {
    let t = state.num_types();
    let adjacency = topology.adjacency();
    let mut truncated = DenseTensor::zeros(&[adjacency.len(), t, t]);
    let block_len = t * t;

    for (order, relation) in adjacency.iter().enumerate() {
        let block = &mut truncated.data_mut()[order * block_len..(order + 1) * block_len];
        for &i in edits {
            for &j in relation.neighbors(i) {
                let weight = 1.0 / vertices_in(edits, &[i, j]);
                add_outer2(block, weight, state.row(i), state.row(j));
            }
        }
    }

    let mut symmetrized = truncated.symmetrize(Some(&[1, 2]))?;
    symmetrized.scale(2.0);
    Ok(symmetrized.into_vec())
}

/// `3 · sym(Σ_(i ∈ edits, j, k) B[i, j, k] / m_ijk · S[i] ⊗ S[j] ⊗ S[k])` for every triplet
/// order, stacked along the first axis.
fn three_body_contribution(
    topology: &Topology,
    state: &StateMatrix,
    edits: &[usize],
) -> Result<Vec<f64>, EngineError> {
    let t = state.num_types();
    let triangles = topology.triangles();
    let mut truncated = DenseTensor::zeros(&[triangles.len(), t, t, t]);
    let block_len = t * t * t;

    for (order, relation) in triangles.iter().enumerate() {
        let block = &mut truncated.data_mut()[order * block_len..(order + 1) * block_len];
        for &i in edits {
            for (j, k, count) in relation.row(i) {
                let weight = f64::from(count) / vertices_in(edits, &[i, j, k]);
                add_outer3(block, weight, state.row(i), state.row(j), state.row(k));
            }
        }
    }

    let mut symmetrized = truncated.symmetrize(Some(&[1, 2, 3]))?;
    symmetrized.scale(3.0);
    Ok(symmetrized.into_vec())
}

fn vertices_in(edits: &[usize], vertices: &[usize]) -> f64 {
    vertices
        .iter()
        .filter(|&&site| edits.binary_search(&site).is_ok())
        .count() as f64
}

fn subtract(mut lhs: Vec<f64>, rhs: Vec<f64>) -> Vec<f64> {
    for (l, r) in lhs.iter_mut().zip(rhs) {
        *l -= r;
    }
    lhs
}
