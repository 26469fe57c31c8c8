use phf::{Map, phf_map};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_1_SQRT_2, SQRT_2};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SQRT_3: f64 = 1.732_050_807_568_877_2;
const HALF_SQRT_3: f64 = 0.866_025_403_784_438_6;
const HALF_SQRT_11: f64 = 1.658_312_395_177_699_9;
const SQRT_3_OVER_2: f64 = 1.224_744_871_391_589;
const SQRT_8_OVER_3: f64 = 1.632_993_161_855_452;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LatticeError {
    #[error("Unrecognized lattice structure tag: '{0}'")]
    UnknownStructure(String),
}

/// Crystal structures with built-in shell and triplet-closure tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LatticeStructure {
    SimpleCubic,
    BodyCenteredCubic,
    FaceCenteredCubic,
    IdealHcp,
}

static STRUCTURE_TAGS: Map<&'static str, LatticeStructure> = phf_map! {
    "sc" => LatticeStructure::SimpleCubic,
    "simple-cubic" => LatticeStructure::SimpleCubic,
    "bcc" => LatticeStructure::BodyCenteredCubic,
    "body-centered-cubic" => LatticeStructure::BodyCenteredCubic,
    "fcc" => LatticeStructure::FaceCenteredCubic,
    "face-centered-cubic" => LatticeStructure::FaceCenteredCubic,
    "hcp" => LatticeStructure::IdealHcp,
    "ideal-hcp" => LatticeStructure::IdealHcp,
    "ideal-hexagonal-close-packed" => LatticeStructure::IdealHcp,
};

const SC_SHELLS: [f64; 4] = [1.0, SQRT_2, SQRT_3, 2.0];
const BCC_SHELLS: [f64; 4] = [HALF_SQRT_3, 1.0, SQRT_2, HALF_SQRT_11];
const FCC_SHELLS: [f64; 4] = [FRAC_1_SQRT_2, 1.0, SQRT_3_OVER_2, SQRT_2];
const HCP_SHELLS: [f64; 4] = [1.0, SQRT_2, SQRT_8_OVER_3, SQRT_3];

const SC_CLOSURES: [[usize; 3]; 2] = [[0, 0, 1], [1, 1, 1]];
const BCC_CLOSURES: [[usize; 3]; 4] = [[0, 0, 1], [0, 0, 2], [1, 1, 2], [2, 2, 2]];
const FCC_CLOSURES: [[usize; 3]; 2] = [[0, 0, 0], [0, 0, 1]];
const HCP_CLOSURES: [[usize; 3]; 5] = [[0, 0, 0], [0, 0, 1], [0, 0, 2], [1, 1, 2], [2, 2, 2]];

const SC_BASIS: [[f64; 3]; 1] = [[0.0, 0.0, 0.0]];
const BCC_BASIS: [[f64; 3]; 2] = [[0.0, 0.0, 0.0], [0.5, 0.5, 0.5]];
const FCC_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.0, 0.5, 0.5],
    [0.5, 0.0, 0.5],
    [0.5, 0.5, 0.0],
];
// Orthohexagonal setting of the two-site hexagonal cell.
const HCP_BASIS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [0.5, 0.5, 0.0],
    [0.0, 1.0 / 3.0, 0.5],
    [0.5, 5.0 / 6.0, 0.5],
];

impl LatticeStructure {
    pub const ALL: [LatticeStructure; 4] = [
        LatticeStructure::SimpleCubic,
        LatticeStructure::BodyCenteredCubic,
        LatticeStructure::FaceCenteredCubic,
        LatticeStructure::IdealHcp,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            LatticeStructure::SimpleCubic => "sc",
            LatticeStructure::BodyCenteredCubic => "bcc",
            LatticeStructure::FaceCenteredCubic => "fcc",
            LatticeStructure::IdealHcp => "ideal-hcp",
        }
    }

    /// Neighbor-shell distances in units of the lattice parameter, nearest shell first.
    pub fn shell_multipliers(self) -> &'static [f64] {
        match self {
            LatticeStructure::SimpleCubic => &SC_SHELLS,
            LatticeStructure::BodyCenteredCubic => &BCC_SHELLS,
            LatticeStructure::FaceCenteredCubic => &FCC_SHELLS,
            LatticeStructure::IdealHcp => &HCP_SHELLS,
        }
    }

    /// Triplet-closure labels: for each triplet order, the adjacency orders (0-based) of the
    /// three triangle sides.
    pub fn closure_labels(self) -> &'static [[usize; 3]] {
        match self {
            LatticeStructure::SimpleCubic => &SC_CLOSURES,
            LatticeStructure::BodyCenteredCubic => &BCC_CLOSURES,
            LatticeStructure::FaceCenteredCubic => &FCC_CLOSURES,
            LatticeStructure::IdealHcp => &HCP_CLOSURES,
        }
    }

    /// Site positions of the conventional orthogonal cell, in fractional coordinates.
    pub fn conventional_basis(self) -> &'static [[f64; 3]] {
        match self {
            LatticeStructure::SimpleCubic => &SC_BASIS,
            LatticeStructure::BodyCenteredCubic => &BCC_BASIS,
            LatticeStructure::FaceCenteredCubic => &FCC_BASIS,
            LatticeStructure::IdealHcp => &HCP_BASIS,
        }
    }

    /// Edge lengths of the conventional orthogonal cell in units of the lattice parameter.
    pub fn cell_extents(self) -> [f64; 3] {
        match self {
            LatticeStructure::IdealHcp => [1.0, SQRT_3, SQRT_8_OVER_3],
            _ => [1.0, 1.0, 1.0],
        }
    }

    pub fn coordination_number(self) -> usize {
        match self {
            LatticeStructure::SimpleCubic => 6,
            LatticeStructure::BodyCenteredCubic => 8,
            LatticeStructure::FaceCenteredCubic | LatticeStructure::IdealHcp => 12,
        }
    }
}

impl fmt::Display for LatticeStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for LatticeStructure {
    type Err = LatticeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        STRUCTURE_TAGS
            .get(key.as_str())
            .copied()
            .ok_or_else(|| LatticeError::UnknownStructure(s.to_string()))
    }
}

impl TryFrom<String> for LatticeStructure {
    type Error = LatticeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LatticeStructure> for String {
    fn from(value: LatticeStructure) -> Self {
        value.tag().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_str_accepts_short_and_long_tags() {
        assert_eq!("bcc".parse(), Ok(LatticeStructure::BodyCenteredCubic));
        assert_eq!(
            "Face-Centered-Cubic".parse(),
            Ok(LatticeStructure::FaceCenteredCubic)
        );
        assert_eq!(" ideal_hcp ".parse(), Ok(LatticeStructure::IdealHcp));
        assert_eq!("simple-cubic".parse(), Ok(LatticeStructure::SimpleCubic));
    }

    #[test]
    fn from_str_rejects_unknown_tags() {
        let result = "diamond".parse::<LatticeStructure>();
        assert_eq!(
            result,
            Err(LatticeError::UnknownStructure("diamond".to_string()))
        );
    }

    #[test]
    fn tag_round_trips_through_from_str() {
        for structure in LatticeStructure::ALL {
            assert_eq!(structure.tag().parse(), Ok(structure));
        }
    }

    #[test]
    fn shell_multipliers_are_strictly_increasing() {
        for structure in LatticeStructure::ALL {
            let shells = structure.shell_multipliers();
            assert!(shells.windows(2).all(|w| w[0] < w[1]), "{structure}");
        }
    }

    #[test]
    fn shell_constants_match_their_closed_forms() {
        assert!((SQRT_3 - 3.0f64.sqrt()).abs() < 1e-15);
        assert!((HALF_SQRT_3 - 0.5 * 3.0f64.sqrt()).abs() < 1e-15);
        assert!((HALF_SQRT_11 - 0.5 * 11.0f64.sqrt()).abs() < 1e-15);
        assert!((SQRT_3_OVER_2 - 1.5f64.sqrt()).abs() < 1e-15);
        assert!((SQRT_8_OVER_3 - (8.0f64 / 3.0).sqrt()).abs() < 1e-15);
    }

    #[test]
    fn closure_labels_only_reference_tabulated_shells() {
        for structure in LatticeStructure::ALL {
            let num_shells = structure.shell_multipliers().len();
            for label in structure.closure_labels() {
                assert!(label.iter().all(|&order| order < num_shells));
            }
        }
    }

    #[test]
    fn conventional_basis_is_fractional() {
        for structure in LatticeStructure::ALL {
            for site in structure.conventional_basis() {
                assert!(site.iter().all(|&x| (0.0..1.0).contains(&x)));
            }
        }
    }
}
