use super::lattice::LatticeStructure;
use nalgebra::{Point3, Vector3};

/// Site positions plus optional orthogonal periodic box extents.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    positions: Vec<Point3<f64>>,
    periodic_box: Option<Vector3<f64>>,
}

impl Geometry {
    pub fn new(positions: Vec<Point3<f64>>, periodic_box: Option<Vector3<f64>>) -> Self {
        Self {
            positions,
            periodic_box,
        }
    }

    pub fn open(positions: Vec<Point3<f64>>) -> Self {
        Self::new(positions, None)
    }

    pub fn periodic(positions: Vec<Point3<f64>>, extents: Vector3<f64>) -> Self {
        Self::new(positions, Some(extents))
    }

    /// Replicates the conventional cell of `structure` `size[0] x size[1] x size[2]` times
    /// into a periodic box.
    ///
    /// Sites are ordered cell by cell (x slowest, z fastest), basis site fastest within a cell.
    pub fn supercell(structure: LatticeStructure, lattice_parameter: f64, size: [usize; 3]) -> Self {
        let extents = structure.cell_extents();
        let cell = Vector3::new(
            extents[0] * lattice_parameter,
            extents[1] * lattice_parameter,
            extents[2] * lattice_parameter,
        );
        let basis = structure.conventional_basis();

        let mut positions = Vec::with_capacity(size.iter().product::<usize>() * basis.len());
        for ix in 0..size[0] {
            for iy in 0..size[1] {
                for iz in 0..size[2] {
                    for site in basis {
                        positions.push(Point3::new(
                            (ix as f64 + site[0]) * cell.x,
                            (iy as f64 + site[1]) * cell.y,
                            (iz as f64 + site[2]) * cell.z,
                        ));
                    }
                }
            }
        }

        let box_extents = Vector3::new(
            size[0] as f64 * cell.x,
            size[1] as f64 * cell.y,
            size[2] as f64 * cell.z,
        );
        Self::periodic(positions, box_extents)
    }

    pub fn num_sites(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn periodic_box(&self) -> Option<&Vector3<f64>> {
        self.periodic_box.as_ref()
    }
}
