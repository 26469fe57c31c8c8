use nalgebra::DMatrix;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("Occupation data of length {found} does not fit {num_sites} sites x {num_types} types")]
    ShapeMismatch {
        num_sites: usize,
        num_types: usize,
        found: usize,
    },
    #[error("Site {site} has type index {type_index}, but only {num_types} types are defined")]
    TypeOutOfRange {
        site: usize,
        type_index: usize,
        num_types: usize,
    },
    #[error("Site index {site} is out of range for {num_sites} sites")]
    SiteOutOfRange { site: usize, num_sites: usize },
    #[error("Occupation of site {site} for type {type_index} is not finite")]
    NonFinite { site: usize, type_index: usize },
    #[error("At least one site type is required")]
    NoTypes,
}

/// Per-site occupation encoding: one row per site, one column per species.
///
/// Rows are usually one-hot, but fractional occupations are allowed. Storage is row-major so
/// that a site's occupation vector is a contiguous slice.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMatrix {
    num_sites: usize,
    num_types: usize,
    occupations: Vec<f64>,
}

impl StateMatrix {
    pub fn new(num_sites: usize, num_types: usize, occupations: Vec<f64>) -> Result<Self, StateError> {
        if occupations.len() != num_sites * num_types {
            return Err(StateError::ShapeMismatch {
                num_sites,
                num_types,
                found: occupations.len(),
            });
        }
        if let Some(index) = occupations.iter().position(|x| !x.is_finite()) {
            return Err(StateError::NonFinite {
                site: index / num_types,
                type_index: index % num_types,
            });
        }
        Ok(Self {
            num_sites,
            num_types,
            occupations,
        })
    }

    pub fn zeros(num_sites: usize, num_types: usize) -> Self {
        Self {
            num_sites,
            num_types,
            occupations: vec![0.0; num_sites * num_types],
        }
    }

    /// One-hot encoding of a per-site type assignment.
    pub fn from_types(types: &[usize], num_types: usize) -> Result<Self, StateError> {
        let mut state = Self::zeros(types.len(), num_types);
        for (site, &type_index) in types.iter().enumerate() {
            if type_index >= num_types {
                return Err(StateError::TypeOutOfRange {
                    site,
                    type_index,
                    num_types,
                });
            }
            state.occupations[site * num_types + type_index] = 1.0;
        }
        Ok(state)
    }

    /// Uniformly random one-hot assignment.
    pub fn random_one_hot<R: Rng + ?Sized>(
        num_sites: usize,
        num_types: usize,
        rng: &mut R,
    ) -> Result<Self, StateError> {
        if num_types == 0 {
            return Err(StateError::NoTypes);
        }
        let types: Vec<usize> = (0..num_sites).map(|_| rng.gen_range(0..num_types)).collect();
        Self::from_types(&types, num_types)
    }

    pub fn from_matrix(matrix: &DMatrix<f64>) -> Result<Self, StateError> {
        let (num_sites, num_types) = matrix.shape();
        let mut occupations = Vec::with_capacity(num_sites * num_types);
        for site in 0..num_sites {
            for type_index in 0..num_types {
                occupations.push(matrix[(site, type_index)]);
            }
        }
        Self::new(num_sites, num_types, occupations)
    }

    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(self.num_sites, self.num_types, &self.occupations)
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn num_types(&self) -> usize {
        self.num_types
    }

    #[inline]
    pub fn row(&self, site: usize) -> &[f64] {
        let start = site * self.num_types;
        &self.occupations[start..start + self.num_types]
    }

    #[inline]
    pub fn get(&self, site: usize, type_index: usize) -> f64 {
        self.occupations[site * self.num_types + type_index]
    }

    pub fn row_sum(&self, site: usize) -> f64 {
        self.row(site).iter().sum()
    }

    pub fn set_row(&mut self, site: usize, row: &[f64]) -> Result<(), StateError> {
        self.check_site(site)?;
        if row.len() != self.num_types {
            return Err(StateError::ShapeMismatch {
                num_sites: 1,
                num_types: self.num_types,
                found: row.len(),
            });
        }
        if let Some(type_index) = row.iter().position(|x| !x.is_finite()) {
            return Err(StateError::NonFinite { site, type_index });
        }
        let start = site * self.num_types;
        self.occupations[start..start + self.num_types].copy_from_slice(row);
        Ok(())
    }

    /// Exchanges the occupation rows of two sites.
    pub fn swap_sites(&mut self, a: usize, b: usize) -> Result<(), StateError> {
        self.check_site(a)?;
        self.check_site(b)?;
        if a == b {
            return Ok(());
        }
        for type_index in 0..self.num_types {
            self.occupations
                .swap(a * self.num_types + type_index, b * self.num_types + type_index);
        }
        Ok(())
    }

    pub fn with_swapped_sites(&self, a: usize, b: usize) -> Result<Self, StateError> {
        let mut swapped = self.clone();
        swapped.swap_sites(a, b)?;
        Ok(swapped)
    }

    /// Sorted, deduplicated indices of sites whose rows differ from `other`.
    ///
    /// Both matrices must have the same shape.
    pub fn differing_sites(&self, other: &StateMatrix) -> Vec<usize> {
        (0..self.num_sites.min(other.num_sites))
            .filter(|&site| self.row(site) != other.row(site))
            .collect()
    }

    fn check_site(&self, site: usize) -> Result<(), StateError> {
        if site >= self.num_sites {
            return Err(StateError::SiteOutOfRange {
                site,
                num_sites: self.num_sites,
            });
        }
        Ok(())
    }
}
