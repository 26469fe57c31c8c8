use crate::core::lattice::LatticeStructure;
use crate::topology::error::TopologyError;
use crate::topology::shells::{DEFAULT_TOLERANCE, ShellClassifier};
use crate::topology::triplets::ThreeBodyComposer;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum BasisLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Invalid cluster basis: {source}")]
    Invalid {
        #[from]
        source: ConfigError,
    },
}

/// How pair distances are sorted into shells.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ShellMode {
    /// Shell distances from the lattice table, scaled by the lattice parameter.
    #[default]
    Table,
    /// Equal-width bins over the observed distances up to `max_distance`.
    Adaptive { num_bins: usize, max_distance: f64 },
}

fn default_tolerance() -> f64 {
    DEFAULT_TOLERANCE
}

/// Description of a cluster-expansion feature basis.
///
/// ```toml
/// lattice_structure = "bcc"
/// lattice_parameter = 2.7
/// max_adjacency_order = 2
/// max_triplet_order = 1
/// tolerance = 0.01
///
/// [shell_scheme]
/// mode = "table"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterBasis {
    pub lattice_structure: LatticeStructure,
    pub lattice_parameter: f64,
    pub max_adjacency_order: usize,
    pub max_triplet_order: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default)]
    pub shell_scheme: ShellMode,
}

impl ClusterBasis {
    pub fn load(path: &Path) -> Result<Self, BasisLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| BasisLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let basis: Self = toml::from_str(&content).map_err(|e| BasisLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        basis.validate()?;
        Ok(basis)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, BasisLoadError> {
        let basis: Self = toml::from_str(content).map_err(|e| BasisLoadError::Toml {
            path: "<string>".to_string(),
            source: e,
        })?;
        basis.validate()?;
        Ok(basis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.lattice_parameter.is_finite() && self.lattice_parameter > 0.0) {
            return Err(ConfigError::InvalidParameter {
                name: "lattice_parameter",
                reason: format!("must be positive and finite, got {}", self.lattice_parameter),
            });
        }
        if self.max_adjacency_order == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "max_adjacency_order",
                reason: "at least one adjacency order is required".to_string(),
            });
        }
        if !(self.tolerance > 0.0 && self.tolerance < 0.5) {
            return Err(ConfigError::InvalidParameter {
                name: "tolerance",
                reason: format!("must lie in (0, 0.5), got {}", self.tolerance),
            });
        }
        if let ShellMode::Adaptive {
            num_bins,
            max_distance,
        } = self.shell_scheme
        {
            if num_bins == 0 {
                return Err(ConfigError::InvalidParameter {
                    name: "num_bins",
                    reason: "adaptive shell binning needs at least one bin".to_string(),
                });
            }
            if !(max_distance.is_finite() && max_distance > 0.0) {
                return Err(ConfigError::InvalidParameter {
                    name: "max_distance",
                    reason: format!("must be positive and finite, got {max_distance}"),
                });
            }
        }
        Ok(())
    }

    pub fn shell_classifier(&self) -> Result<ShellClassifier, TopologyError> {
        match self.shell_scheme {
            ShellMode::Table => ShellClassifier::table(
                self.lattice_structure,
                self.lattice_parameter,
                self.tolerance,
            ),
            ShellMode::Adaptive {
                num_bins,
                max_distance,
            } => ShellClassifier::adaptive(num_bins, max_distance),
        }
    }

    pub fn composer(&self) -> ThreeBodyComposer {
        ThreeBodyComposer::for_structure(self.lattice_structure)
    }
}

#[derive(Default)]
pub struct ClusterBasisBuilder {
    lattice_structure: Option<LatticeStructure>,
    lattice_parameter: Option<f64>,
    max_adjacency_order: Option<usize>,
    max_triplet_order: Option<usize>,
    tolerance: Option<f64>,
    shell_scheme: Option<ShellMode>,
}

impl ClusterBasisBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lattice_structure(mut self, structure: LatticeStructure) -> Self {
        self.lattice_structure = Some(structure);
        self
    }
    pub fn lattice_parameter(mut self, a: f64) -> Self {
        self.lattice_parameter = Some(a);
        self
    }
    pub fn max_adjacency_order(mut self, order: usize) -> Self {
        self.max_adjacency_order = Some(order);
        self
    }
    pub fn max_triplet_order(mut self, order: usize) -> Self {
        self.max_triplet_order = Some(order);
        self
    }
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }
    pub fn shell_scheme(mut self, scheme: ShellMode) -> Self {
        self.shell_scheme = Some(scheme);
        self
    }

    pub fn build(self) -> Result<ClusterBasis, ConfigError> {
        let basis = ClusterBasis {
            lattice_structure: self
                .lattice_structure
                .ok_or(ConfigError::MissingParameter("lattice_structure"))?,
            lattice_parameter: self
                .lattice_parameter
                .ok_or(ConfigError::MissingParameter("lattice_parameter"))?,
            max_adjacency_order: self
                .max_adjacency_order
                .ok_or(ConfigError::MissingParameter("max_adjacency_order"))?,
            max_triplet_order: self
                .max_triplet_order
                .ok_or(ConfigError::MissingParameter("max_triplet_order"))?,
            tolerance: self.tolerance.unwrap_or(DEFAULT_TOLERANCE),
            shell_scheme: self.shell_scheme.unwrap_or_default(),
        };
        basis.validate()?;
        Ok(basis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn bcc_builder() -> ClusterBasisBuilder {
        ClusterBasisBuilder::new()
            .lattice_structure(LatticeStructure::BodyCenteredCubic)
            .lattice_parameter(2.7)
            .max_adjacency_order(2)
            .max_triplet_order(1)
    }

    #[test]
    fn builder_fills_defaults_for_optional_parameters() {
        let basis = bcc_builder().build().unwrap();
        assert_eq!(basis.tolerance, DEFAULT_TOLERANCE);
        assert_eq!(basis.shell_scheme, ShellMode::Table);
    }

    #[test]
    fn builder_reports_missing_parameters() {
        let result = ClusterBasisBuilder::new()
            .lattice_structure(LatticeStructure::SimpleCubic)
            .build();
        assert_eq!(result, Err(ConfigError::MissingParameter("lattice_parameter")));
    }

    #[test]
    fn builder_rejects_invalid_values() {
        let cases = [
            bcc_builder().lattice_parameter(0.0),
            bcc_builder().lattice_parameter(f64::NAN),
            bcc_builder().max_adjacency_order(0),
            bcc_builder().tolerance(0.5),
            bcc_builder().tolerance(0.0),
            bcc_builder().shell_scheme(ShellMode::Adaptive {
                num_bins: 0,
                max_distance: 4.0,
            }),
            bcc_builder().shell_scheme(ShellMode::Adaptive {
                num_bins: 3,
                max_distance: -1.0,
            }),
        ];
        for builder in cases {
            assert!(matches!(
                builder.build(),
                Err(ConfigError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn from_toml_str_parses_aliases_and_defaults() {
        let basis = ClusterBasis::from_toml_str(
            r#"
            lattice_structure = "Body-Centered-Cubic"
            lattice_parameter = 2.7
            max_adjacency_order = 2
            max_triplet_order = 1
            "#,
        )
        .unwrap();
        assert_eq!(basis, bcc_builder().build().unwrap());
    }

    #[test]
    fn from_toml_str_parses_adaptive_scheme() {
        let basis = ClusterBasis::from_toml_str(
            r#"
            lattice_structure = "sc"
            lattice_parameter = 1.0
            max_adjacency_order = 3
            max_triplet_order = 0

            [shell_scheme]
            mode = "adaptive"
            num_bins = 3
            max_distance = 1.8
            "#,
        )
        .unwrap();
        assert_eq!(
            basis.shell_scheme,
            ShellMode::Adaptive {
                num_bins: 3,
                max_distance: 1.8
            }
        );
        assert!(matches!(
            basis.shell_classifier().unwrap().scheme(),
            crate::topology::shells::ShellScheme::Adaptive { num_bins: 3, .. }
        ));
    }

    #[test]
    fn from_toml_str_rejects_unknown_structure_tag() {
        let result = ClusterBasis::from_toml_str(
            r#"
            lattice_structure = "diamond"
            lattice_parameter = 1.0
            max_adjacency_order = 1
            max_triplet_order = 0
            "#,
        );
        assert!(matches!(result, Err(BasisLoadError::Toml { .. })));
    }

    #[test]
    fn from_toml_str_validates_parsed_values() {
        let result = ClusterBasis::from_toml_str(
            r#"
            lattice_structure = "fcc"
            lattice_parameter = -3.0
            max_adjacency_order = 1
            max_triplet_order = 0
            "#,
        );
        assert!(matches!(
            result,
            Err(BasisLoadError::Invalid {
                source: ConfigError::InvalidParameter {
                    name: "lattice_parameter",
                    ..
                }
            })
        ));
    }

    #[test]
    fn load_succeeds_with_valid_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("basis.toml");
        fs::write(
            &file_path,
            "lattice_structure = \"hcp\"\nlattice_parameter = 3.2\nmax_adjacency_order = 3\nmax_triplet_order = 2\ntolerance = 0.02\n",
        )
        .unwrap();

        let basis = ClusterBasis::load(&file_path).unwrap();
        assert_eq!(basis.lattice_structure, LatticeStructure::IdealHcp);
        assert_eq!(basis.tolerance, 0.02);
        assert_eq!(basis.composer().labels(), &[[0, 0, 0], [0, 0, 1], [0, 0, 2], [1, 1, 2], [2, 2, 2]]);
    }

    #[test]
    fn load_fails_for_missing_file() {
        let dir = tempdir().unwrap();
        let result = ClusterBasis::load(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(BasisLoadError::Io { .. })));
    }

    #[test]
    fn load_fails_for_malformed_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("malformed.toml");
        fs::write(&file_path, "this is not toml").unwrap();
        assert!(matches!(
            ClusterBasis::load(&file_path),
            Err(BasisLoadError::Toml { .. })
        ));
    }

    #[test]
    fn serialized_basis_parses_back() {
        let basis = bcc_builder()
            .shell_scheme(ShellMode::Adaptive {
                num_bins: 2,
                max_distance: 3.0,
            })
            .build()
            .unwrap();
        let text = toml::to_string(&basis).unwrap();
        assert_eq!(ClusterBasis::from_toml_str(&text).unwrap(), basis);
    }
}
