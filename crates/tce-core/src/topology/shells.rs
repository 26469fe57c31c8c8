use super::error::TopologyError;
use crate::core::lattice::LatticeStructure;
use crate::core::sparse::{DistanceMatrix, PairRelation};
use tracing::{debug, instrument, trace, warn};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

pub const DEFAULT_TOLERANCE: f64 = 0.01;

/// Distance interval that defines one neighbor shell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellBand {
    pub lower: f64,
    pub upper: f64,
    pub lower_inclusive: bool,
    pub upper_inclusive: bool,
}

impl ShellBand {
    /// Open band `((1 - tolerance) * center, (1 + tolerance) * center)`.
    pub fn around(center: f64, tolerance: f64) -> Self {
        Self {
            lower: (1.0 - tolerance) * center,
            upper: (1.0 + tolerance) * center,
            lower_inclusive: false,
            upper_inclusive: false,
        }
    }

    #[inline]
    pub fn contains(&self, distance: f64) -> bool {
        let above = if self.lower_inclusive {
            distance >= self.lower
        } else {
            distance > self.lower
        };
        let below = if self.upper_inclusive {
            distance <= self.upper
        } else {
            distance < self.upper
        };
        above && below
    }

    pub fn overlaps(&self, other: &ShellBand) -> bool {
        let (first, second) = if self.lower <= other.lower {
            (self, other)
        } else {
            (other, self)
        };
        second.lower < first.upper
            || (second.lower == first.upper && second.lower_inclusive && first.upper_inclusive)
    }
}

/// Two shells whose tolerance bands intersect, so a pair may be classified into both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceOverlap {
    pub lower_order: usize,
    pub upper_order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShellScheme {
    /// Fixed shell distances from the lattice table, scaled by the lattice parameter.
    Table {
        structure: LatticeStructure,
        lattice_parameter: f64,
        tolerance: f64,
    },
    /// Equal-width histogram bins over the observed distances up to `max_distance`.
    Adaptive { num_bins: usize, max_distance: f64 },
}

/// Ordered stack of boolean shell relations, nearest shell first.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyStack {
    num_sites: usize,
    shells: Vec<PairRelation>,
    bands: Vec<ShellBand>,
    overlaps: Vec<ToleranceOverlap>,
}

impl AdjacencyStack {
    pub fn new(num_sites: usize, shells: Vec<PairRelation>, bands: Vec<ShellBand>) -> Self {
        let overlaps = find_overlaps(&bands);
        Self {
            num_sites,
            shells,
            bands,
            overlaps,
        }
    }

    pub fn num_sites(&self) -> usize {
        self.num_sites
    }

    pub fn len(&self) -> usize {
        self.shells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shells.is_empty()
    }

    pub fn shell(&self, order: usize) -> Option<&PairRelation> {
        self.shells.get(order)
    }

    pub fn shells(&self) -> &[PairRelation] {
        &self.shells
    }

    pub fn bands(&self) -> &[ShellBand] {
        &self.bands
    }

    pub fn tolerance_overlaps(&self) -> &[ToleranceOverlap] {
        &self.overlaps
    }
}

fn find_overlaps(bands: &[ShellBand]) -> Vec<ToleranceOverlap> {
    let mut overlaps = Vec::new();
    for (lower_order, band) in bands.iter().enumerate() {
        for (offset, other) in bands[lower_order + 1..].iter().enumerate() {
            if band.overlaps(other) {
                overlaps.push(ToleranceOverlap {
                    lower_order,
                    upper_order: lower_order + 1 + offset,
                });
            }
        }
    }
    overlaps
}

/// Turns a distance matrix into an [`AdjacencyStack`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShellClassifier {
    scheme: ShellScheme,
}

impl ShellClassifier {
    pub fn new(scheme: ShellScheme) -> Result<Self, TopologyError> {
        match scheme {
            ShellScheme::Table {
                lattice_parameter,
                tolerance,
                ..
            } => {
                if !(lattice_parameter.is_finite() && lattice_parameter > 0.0) {
                    return Err(TopologyError::Configuration(format!(
                        "lattice parameter must be positive and finite, got {lattice_parameter}"
                    )));
                }
                if !(tolerance > 0.0 && tolerance < 0.5) {
                    return Err(TopologyError::Configuration(format!(
                        "shell tolerance must lie in (0, 0.5), got {tolerance}"
                    )));
                }
            }
            ShellScheme::Adaptive {
                num_bins,
                max_distance,
            } => {
                if num_bins == 0 {
                    return Err(TopologyError::Configuration(
                        "adaptive shell binning needs at least one bin".to_string(),
                    ));
                }
                if !(max_distance.is_finite() && max_distance > 0.0) {
                    return Err(TopologyError::Configuration(format!(
                        "maximum distance must be positive and finite, got {max_distance}"
                    )));
                }
            }
        }
        Ok(Self { scheme })
    }

    pub fn table(
        structure: LatticeStructure,
        lattice_parameter: f64,
        tolerance: f64,
    ) -> Result<Self, TopologyError> {
        Self::new(ShellScheme::Table {
            structure,
            lattice_parameter,
            tolerance,
        })
    }

    pub fn adaptive(num_bins: usize, max_distance: f64) -> Result<Self, TopologyError> {
        Self::new(ShellScheme::Adaptive {
            num_bins,
            max_distance,
        })
    }

    pub fn scheme(&self) -> &ShellScheme {
        &self.scheme
    }

    /// Number of shells that a request for `num_orders` actually yields.
    ///
    /// Requests are truncated to the tabulated shells (table) or configured bins (adaptive),
    /// never padded with empty shells.
    pub fn available_orders(&self, num_orders: usize) -> usize {
        match self.scheme {
            ShellScheme::Table { structure, .. } => {
                num_orders.min(structure.shell_multipliers().len())
            }
            ShellScheme::Adaptive { num_bins, .. } => num_orders.min(num_bins),
        }
    }

    /// Largest distance the classifier needs to see to build `num_orders` shells.
    pub fn required_distance(&self, num_orders: usize) -> Result<f64, TopologyError> {
        match self.scheme {
            ShellScheme::Table {
                structure,
                lattice_parameter,
                tolerance,
            } => {
                let available = self.available_orders(num_orders);
                if available == 0 {
                    return Err(TopologyError::Configuration(
                        "at least one adjacency order is required".to_string(),
                    ));
                }
                let outermost = structure.shell_multipliers()[available - 1];
                Ok((1.0 + tolerance) * outermost * lattice_parameter)
            }
            ShellScheme::Adaptive { max_distance, .. } => Ok(max_distance),
        }
    }

    /// Classifies every stored distance into the first `num_orders` shells.
    ///
    /// A request beyond the tabulated shells (table mode) or the configured bins (adaptive
    /// mode) is truncated; see [`ShellClassifier::available_orders`].
    #[instrument(skip(self, distances), fields(num_sites = distances.num_sites()))]
    pub fn classify(
        &self,
        distances: &DistanceMatrix,
        num_orders: usize,
    ) -> Result<AdjacencyStack, TopologyError> {
        let available = self.available_orders(num_orders);
        if available < num_orders {
            debug!(
                requested = num_orders,
                available, "Shell request truncated to the available orders."
            );
        }

        let bands = match self.scheme {
            ShellScheme::Table {
                structure,
                lattice_parameter,
                tolerance,
            } => structure.shell_multipliers()[..available]
                .iter()
                .map(|&multiplier| ShellBand::around(multiplier * lattice_parameter, tolerance))
                .collect::<Vec<_>>(),
            ShellScheme::Adaptive { num_bins, .. } => {
                let mut bands = histogram_bands(distances.distances(), num_bins);
                bands.truncate(available);
                bands
            }
        };

        let build_shell = |band: &ShellBand| {
            PairRelation::from_pairs(
                distances.num_sites(),
                distances
                    .iter()
                    .filter(|&(_, _, d)| band.contains(d))
                    .map(|(i, j, _)| (i, j)),
            )
        };

        #[cfg(not(feature = "parallel"))]
        let shells: Vec<PairRelation> = bands.iter().map(build_shell).collect();

        #[cfg(feature = "parallel")]
        let shells: Vec<PairRelation> = bands.par_iter().map(build_shell).collect();

        for (order, shell) in shells.iter().enumerate() {
            trace!(order, pairs = shell.nnz(), "Classified shell.");
        }

        let stack = AdjacencyStack::new(distances.num_sites(), shells, bands);
        for overlap in stack.tolerance_overlaps() {
            warn!(
                lower_order = overlap.lower_order,
                upper_order = overlap.upper_order,
                "Shell tolerance bands overlap; pairs may be counted in both shells."
            );
        }
        Ok(stack)
    }
}

/// Equal-width bins over `[min, max]` of `values`; half-open except the last, which is closed.
fn histogram_bands(values: &[f64], num_bins: usize) -> Vec<ShellBand> {
    let (mut low, mut high) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if values.is_empty() {
        low = 0.0;
        high = 1.0;
    } else if low == high {
        low -= 0.5;
        high += 0.5;
    }

    let width = (high - low) / num_bins as f64;
    let edge = |k: usize| {
        if k == num_bins {
            high
        } else {
            low + width * k as f64
        }
    };

    (0..num_bins)
        .map(|k| ShellBand {
            lower: edge(k),
            upper: edge(k + 1),
            lower_inclusive: true,
            upper_inclusive: k + 1 == num_bins,
        })
        .collect()
}
