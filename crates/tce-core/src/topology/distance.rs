use super::error::TopologyError;
use crate::core::geometry::Geometry;
use crate::core::sparse::DistanceMatrix;
use kiddo::SquaredEuclidean;
use kiddo::immutable::float::kdtree::ImmutableKdTree;
use tracing::{debug, instrument, trace, warn};

type SiteTree = ImmutableKdTree<f64, u64, 3, 32>;

const QUERY_SLACK: f64 = 1e-9;

/// Spatial index over site positions, aware of an optional orthogonal periodic box.
pub struct DistanceIndex {
    sites: Vec<[f64; 3]>,
    periodic_box: Option<[f64; 3]>,
    tree: Option<SiteTree>,
}

impl DistanceIndex {
    #[instrument(skip_all, fields(num_sites = geometry.num_sites()))]
    pub fn new(geometry: &Geometry) -> Result<Self, TopologyError> {
        let periodic_box = match geometry.periodic_box() {
            Some(extents) => {
                if extents.iter().any(|&l| !(l.is_finite() && l > 0.0)) {
                    return Err(TopologyError::Configuration(format!(
                        "periodic box extents must be positive and finite, got [{}, {}, {}]",
                        extents.x, extents.y, extents.z
                    )));
                }
                Some([extents.x, extents.y, extents.z])
            }
            None => None,
        };

        let mut sites = Vec::with_capacity(geometry.num_sites());
        for (site, position) in geometry.positions().iter().enumerate() {
            if position.iter().any(|x| !x.is_finite()) {
                return Err(TopologyError::Configuration(format!(
                    "position of site {site} is not finite"
                )));
            }
            let mut coords = [position.x, position.y, position.z];
            if let Some(extents) = periodic_box {
                for (x, l) in coords.iter_mut().zip(extents) {
                    *x = x.rem_euclid(l);
                }
            }
            sites.push(coords);
        }

        let tree = if sites.is_empty() {
            None
        } else {
            Some(SiteTree::new_from_slice(&sites))
        };

        debug!(periodic = periodic_box.is_some(), "Built site index.");

        Ok(Self {
            sites,
            periodic_box,
            tree,
        })
    }

    pub fn num_sites(&self) -> usize {
        self.sites.len()
    }

    /// Whether `max_distance` reaches past half the shortest box edge. Pairs then have more
    /// than one image inside the cutoff, and the distance matrix keeps only the nearest.
    pub fn cutoff_exceeds_half_box(&self, max_distance: f64) -> bool {
        self.periodic_box.is_some_and(|extents| {
            let half_min_extent = 0.5 * extents.iter().copied().fold(f64::INFINITY, f64::min);
            max_distance > half_min_extent
        })
    }

    /// Sparse symmetric distances `0 < d <= max_distance`, diagonal excluded.
    ///
    /// Periodic distances follow the minimum-image convention: each site pair is stored once,
    /// with its shortest image distance.
    #[instrument(skip(self), fields(num_sites = self.sites.len()))]
    pub fn distance_matrix(&self, max_distance: f64) -> Result<DistanceMatrix, TopologyError> {
        if !(max_distance.is_finite() && max_distance > 0.0) {
            return Err(TopologyError::Configuration(format!(
                "maximum distance must be positive and finite, got {max_distance}"
            )));
        }
        let Some(tree) = &self.tree else {
            return Ok(DistanceMatrix::empty(self.sites.len()));
        };

        let shifts = self.image_shifts(max_distance);
        if self.cutoff_exceeds_half_box(max_distance) {
            warn!(
                max_distance,
                "Cutoff exceeds half the box; only the nearest image of each pair is kept."
            );
        }

        let query_radius = max_distance * max_distance * (1.0 + QUERY_SLACK);
        let mut entries = Vec::new();
        let mut row: Vec<(usize, f64)> = Vec::new();

        for (i, site) in self.sites.iter().enumerate() {
            row.clear();
            for shift in &shifts {
                let query = [site[0] + shift[0], site[1] + shift[1], site[2] + shift[2]];
                for neighbour in tree.within_unsorted::<SquaredEuclidean>(&query, query_radius) {
                    let j = neighbour.item as usize;
                    if j <= i {
                        continue;
                    }
                    let distance = euclidean(&query, &self.sites[j]);
                    if distance > 0.0 && distance <= max_distance {
                        row.push((j, distance));
                    }
                }
            }
            row.sort_unstable_by(|a, b| a.0.cmp(&b.0).then(a.1.total_cmp(&b.1)));
            row.dedup_by_key(|entry| entry.0);
            entries.extend(row.iter().map(|&(j, distance)| (i, j, distance)));
        }

        trace!(pairs = entries.len(), "Collected distance pairs.");
        Ok(DistanceMatrix::from_upper_entries(self.sites.len(), entries))
    }

    fn image_shifts(&self, max_distance: f64) -> Vec<[f64; 3]> {
        let Some(extents) = self.periodic_box else {
            return vec![[0.0; 3]];
        };
        let ranges = extents.map(|l| (max_distance / l).ceil() as i64);

        let mut shifts = Vec::new();
        for nx in -ranges[0]..=ranges[0] {
            for ny in -ranges[1]..=ranges[1] {
                for nz in -ranges[2]..=ranges[2] {
                    shifts.push([
                        nx as f64 * extents[0],
                        ny as f64 * extents[1],
                        nz as f64 * extents[2],
                    ]);
                }
            }
        }
        shifts
    }
}

#[inline]
fn euclidean(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lattice::LatticeStructure;
    use nalgebra::{Point3, Vector3};

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn brute_force_min_image(geometry: &Geometry, i: usize, j: usize) -> f64 {
        let extents = geometry.periodic_box().unwrap();
        let delta = geometry.positions()[i] - geometry.positions()[j];
        let wrapped = Vector3::new(
            delta.x - extents.x * (delta.x / extents.x).round(),
            delta.y - extents.y * (delta.y / extents.y).round(),
            delta.z - extents.z * (delta.z / extents.z).round(),
        );
        wrapped.norm()
    }

    #[test]
    fn empty_geometry_yields_empty_matrix() {
        let index = DistanceIndex::new(&Geometry::open(Vec::new())).unwrap();
        let matrix = index.distance_matrix(3.0).unwrap();
        assert_eq!(matrix.num_sites(), 0);
        assert_eq!(matrix.nnz(), 0);
    }

    #[test]
    fn non_positive_max_distance_is_a_configuration_error() {
        let index = DistanceIndex::new(&Geometry::open(vec![Point3::origin()])).unwrap();
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                index.distance_matrix(bad),
                Err(TopologyError::Configuration(_))
            ));
        }
    }

    #[test]
    fn non_positive_box_extent_is_a_configuration_error() {
        let geometry = Geometry::periodic(vec![Point3::origin()], Vector3::new(1.0, 0.0, 1.0));
        assert!(matches!(
            DistanceIndex::new(&geometry),
            Err(TopologyError::Configuration(_))
        ));
    }

    #[test]
    fn open_geometry_truncates_at_max_distance() {
        let geometry = Geometry::open(vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ]);
        let matrix = DistanceIndex::new(&geometry)
            .unwrap()
            .distance_matrix(2.0)
            .unwrap();
        assert_eq!(matrix.nnz(), 4);
        assert_eq!(matrix.get(0, 1), Some(1.0));
        assert_eq!(matrix.get(1, 2), Some(2.0));
        assert_eq!(matrix.get(0, 2), None);
        assert_eq!(matrix.get(0, 0), None);
    }

    #[test]
    fn coincident_sites_are_not_recorded() {
        let geometry = Geometry::open(vec![Point3::origin(), Point3::origin()]);
        let matrix = DistanceIndex::new(&geometry)
            .unwrap()
            .distance_matrix(1.0)
            .unwrap();
        assert_eq!(matrix.nnz(), 0);
    }

    #[test]
    fn periodic_distances_use_minimum_image() {
        let geometry = Geometry::periodic(
            vec![Point3::new(0.1, 0.0, 0.0), Point3::new(9.9, 0.0, 0.0)],
            Vector3::new(10.0, 10.0, 10.0),
        );
        let matrix = DistanceIndex::new(&geometry)
            .unwrap()
            .distance_matrix(1.0)
            .unwrap();
        assert!(f64_approx_equal(matrix.get(0, 1).unwrap(), 0.2));
        assert!(f64_approx_equal(matrix.get(1, 0).unwrap(), 0.2));
    }

    #[test]
    fn periodic_matrix_matches_brute_force_on_supercell() {
        let geometry = Geometry::supercell(LatticeStructure::FaceCenteredCubic, 1.0, [3, 3, 3]);
        let max_distance = 1.05;
        let matrix = DistanceIndex::new(&geometry)
            .unwrap()
            .distance_matrix(max_distance)
            .unwrap();

        for i in 0..geometry.num_sites() {
            for j in 0..geometry.num_sites() {
                let expected = brute_force_min_image(&geometry, i, j);
                match matrix.get(i, j) {
                    Some(d) => assert!(f64_approx_equal(d, expected)),
                    None => assert!(i == j || expected > max_distance),
                }
            }
        }
    }

    #[test]
    fn distance_matrix_is_symmetric() {
        let geometry = Geometry::supercell(LatticeStructure::IdealHcp, 2.0, [3, 2, 2]);
        let matrix = DistanceIndex::new(&geometry)
            .unwrap()
            .distance_matrix(4.0)
            .unwrap();
        for (i, j, d) in matrix.iter() {
            assert_eq!(matrix.get(j, i), Some(d));
        }
    }

    #[test]
    fn planes_with_many_sites_are_fully_indexed() {
        // Each z plane holds 34 x 34 = 1156 sites sharing one coordinate.
        let geometry = Geometry::supercell(LatticeStructure::SimpleCubic, 1.0, [34, 34, 3]);
        let index = DistanceIndex::new(&geometry).unwrap();
        let matrix = index.distance_matrix(1.01).unwrap();
        assert_eq!(matrix.nnz(), 6 * geometry.num_sites());
        assert!((0..geometry.num_sites()).all(|site| matrix.row(site).count() == 6));
    }

    #[test]
    fn cutoff_beyond_half_box_keeps_only_nearest_image() {
        let small = Geometry::supercell(LatticeStructure::SimpleCubic, 1.0, [2, 2, 2]);
        let index = DistanceIndex::new(&small).unwrap();
        assert!(index.cutoff_exceeds_half_box(1.01));
        let matrix = index.distance_matrix(1.01).unwrap();
        // The +x and -x neighbours are the same site, recorded once.
        assert!((0..small.num_sites()).all(|site| matrix.row(site).count() == 3));

        let large = Geometry::supercell(LatticeStructure::SimpleCubic, 1.0, [3, 3, 3]);
        assert!(!DistanceIndex::new(&large).unwrap().cutoff_exceeds_half_box(1.01));

        let open = Geometry::open(vec![Point3::origin(), Point3::new(100.0, 0.0, 0.0)]);
        assert!(!DistanceIndex::new(&open).unwrap().cutoff_exceeds_half_box(1.0e6));
    }
}
