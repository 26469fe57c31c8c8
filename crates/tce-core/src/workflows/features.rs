use crate::core::geometry::Geometry;
use crate::core::state::StateMatrix;
use crate::engine::FeatureEvaluator;
use crate::engine::config::ClusterBasis;
use crate::engine::error::EngineError;
use crate::engine::features::FeatureVector;
use crate::topology::Topology;
use tracing::{info, instrument, warn};

/// Validates `basis` and builds the topology it describes for `geometry`.
#[instrument(skip_all, name = "topology_workflow", fields(structure = %basis.lattice_structure))]
pub fn build_topology(geometry: &Geometry, basis: &ClusterBasis) -> Result<Topology, EngineError> {
    basis.validate()?;
    let classifier = basis.shell_classifier()?;
    let composer = basis.composer();

    info!(
        num_sites = geometry.num_sites(),
        max_adjacency_order = basis.max_adjacency_order,
        max_triplet_order = basis.max_triplet_order,
        "Building topology."
    );
    let topology = Topology::build(
        geometry,
        &classifier,
        &composer,
        basis.max_adjacency_order,
        basis.max_triplet_order,
    )?;

    if topology.num_adjacency_orders() < basis.max_adjacency_order
        || topology.num_triplet_orders() < basis.max_triplet_order
    {
        warn!(
            adjacency_orders = topology.num_adjacency_orders(),
            triplet_orders = topology.num_triplet_orders(),
            "Requested orders were truncated to the lattice tables."
        );
    }
    Ok(topology)
}

#[instrument(skip_all, name = "feature_vector_workflow")]
pub fn compute_feature_vector(
    geometry: &Geometry,
    basis: &ClusterBasis,
    state: &StateMatrix,
) -> Result<FeatureVector, EngineError> {
    check_sites(geometry, state)?;
    let topology = build_topology(geometry, basis)?;
    let features = FeatureEvaluator::new(&topology).feature_vector(state)?;
    info!(len = features.len(), "Feature vector computed.");
    Ok(features)
}

#[instrument(skip_all, name = "feature_difference_workflow")]
pub fn compute_feature_difference(
    geometry: &Geometry,
    basis: &ClusterBasis,
    initial: &StateMatrix,
    final_state: &StateMatrix,
) -> Result<FeatureVector, EngineError> {
    check_sites(geometry, initial)?;
    check_sites(geometry, final_state)?;
    let topology = build_topology(geometry, basis)?;
    let difference = FeatureEvaluator::new(&topology).feature_difference(initial, final_state)?;
    info!(len = difference.len(), "Feature difference computed.");
    Ok(difference)
}

fn check_sites(geometry: &Geometry, state: &StateMatrix) -> Result<(), EngineError> {
    if geometry.num_sites() != state.num_sites() {
        return Err(EngineError::Configuration(format!(
            "geometry has {} sites but the state matrix has {} rows",
            geometry.num_sites(),
            state.num_sites()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lattice::LatticeStructure;
    use crate::engine::config::{ClusterBasisBuilder, ConfigError};
    use crate::topology::error::TopologyError;

    fn bcc_basis() -> ClusterBasis {
        ClusterBasisBuilder::new()
            .lattice_structure(LatticeStructure::BodyCenteredCubic)
            .lattice_parameter(2.7)
            .max_adjacency_order(2)
            .max_triplet_order(1)
            .build()
            .unwrap()
    }

    #[test]
    fn compute_feature_vector_uses_basis_orders() {
        let geometry = Geometry::supercell(LatticeStructure::BodyCenteredCubic, 2.7, [3, 3, 3]);
        let state = StateMatrix::from_types(
            &(0..geometry.num_sites()).map(|site| site % 2).collect::<Vec<_>>(),
            2,
        )
        .unwrap();
        let features = compute_feature_vector(&geometry, &bcc_basis(), &state).unwrap();
        assert_eq!(features.layout().num_adjacency_orders, 2);
        assert_eq!(features.layout().num_triplet_orders, 1);
        assert_eq!(features.len(), 2 * 4 + 8);
        // BCC nearest neighbors sit on the other sublattice.
        assert_eq!(features.two_body_block(0).unwrap(), &[0.0, 216.0, 216.0, 0.0]);
    }

    #[test]
    fn state_rows_must_match_positions() {
        let geometry = Geometry::supercell(LatticeStructure::BodyCenteredCubic, 2.7, [3, 3, 3]);
        let state = StateMatrix::zeros(10, 2);
        assert!(matches!(
            compute_feature_vector(&geometry, &bcc_basis(), &state),
            Err(EngineError::Configuration(_))
        ));
        assert!(matches!(
            compute_feature_difference(&geometry, &bcc_basis(), &StateMatrix::zeros(54, 2), &state),
            Err(EngineError::Configuration(_))
        ));
    }

    #[test]
    fn invalid_basis_is_reported_before_topology_construction() {
        let geometry = Geometry::supercell(LatticeStructure::SimpleCubic, 1.0, [3, 3, 3]);
        let mut basis = bcc_basis();
        basis.lattice_parameter = 0.0;
        assert!(matches!(
            build_topology(&geometry, &basis),
            Err(EngineError::Basis {
                source: ConfigError::InvalidParameter {
                    name: "lattice_parameter",
                    ..
                }
            })
        ));
    }

    #[test]
    fn non_finite_positions_surface_as_topology_errors() {
        let geometry = Geometry::open(vec![nalgebra::Point3::new(f64::NAN, 0.0, 0.0)]);
        assert!(matches!(
            build_topology(&geometry, &bcc_basis()),
            Err(EngineError::Topology {
                source: TopologyError::Configuration(_)
            })
        ));
    }
}
