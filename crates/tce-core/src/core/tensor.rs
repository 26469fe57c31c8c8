use itertools::Itertools;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("Axis {axis} is out of range for a tensor of rank {rank}")]
    AxisOutOfRange { axis: usize, rank: usize },
    #[error("Axis {0} appears more than once")]
    DuplicateAxis(usize),
    #[error("Axes {first} and {second} have different lengths ({first_len} vs {second_len})")]
    UnequalAxisLengths {
        first: usize,
        second: usize,
        first_len: usize,
        second_len: usize,
    },
    #[error("Data of length {found} does not fit shape {shape:?}")]
    ShapeMismatch { shape: Vec<usize>, found: usize },
}

/// Dense row-major tensor of arbitrary rank.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor {
    shape: Vec<usize>,
    strides: Vec<usize>,
    data: Vec<f64>,
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}

impl DenseTensor {
    pub fn zeros(shape: &[usize]) -> Self {
        let len = shape.iter().product();
        Self {
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            data: vec![0.0; len],
        }
    }

    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> Result<Self, TensorError> {
        let len: usize = shape.iter().product();
        if data.len() != len {
            return Err(TensorError::ShapeMismatch {
                shape: shape.to_vec(),
                found: data.len(),
            });
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides: row_major_strides(shape),
            data,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    pub fn offset(&self, index: &[usize]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .map(|(i, stride)| i * stride)
            .sum()
    }

    pub fn get(&self, index: &[usize]) -> f64 {
        self.data[self.offset(index)]
    }

    pub fn scale(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|x| *x *= factor);
    }

    fn unravel(&self, mut offset: usize, index: &mut [usize]) {
        for (axis, stride) in self.strides.iter().enumerate() {
            index[axis] = offset / stride;
            offset %= stride;
        }
    }

    /// Averages the tensor over every permutation of `axes`:
    ///
    /// `sym(T) = (1 / k!) Σ_σ permute(T, σ)` for the `k` chosen axes.
    ///
    /// `None` or an empty slice selects all axes. The chosen axes must be distinct, in range,
    /// and of equal length. Symmetrizing twice gives the same result as symmetrizing once.
    pub fn symmetrize(&self, axes: Option<&[usize]>) -> Result<DenseTensor, TensorError> {
        let axes: Vec<usize> = match axes {
            Some(axes) if !axes.is_empty() => axes.to_vec(),
            _ => (0..self.rank()).collect(),
        };
        self.validate_axes(&axes)?;

        let permutations: Vec<Vec<usize>> = (0..axes.len()).permutations(axes.len()).collect();
        let norm = 1.0 / permutations.len() as f64;

        let mut result = DenseTensor::zeros(&self.shape);
        let mut index = vec![0; self.rank()];
        let mut source = vec![0; self.rank()];
        for offset in 0..self.data.len() {
            self.unravel(offset, &mut index);
            let mut total = 0.0;
            for permutation in &permutations {
                source.copy_from_slice(&index);
                for (position, &target) in permutation.iter().enumerate() {
                    source[axes[position]] = index[axes[target]];
                }
                total += self.data[self.offset(&source)];
            }
            result.data[offset] = total * norm;
        }
        Ok(result)
    }

    fn validate_axes(&self, axes: &[usize]) -> Result<(), TensorError> {
        for (position, &axis) in axes.iter().enumerate() {
            if axis >= self.rank() {
                return Err(TensorError::AxisOutOfRange {
                    axis,
                    rank: self.rank(),
                });
            }
            if axes[..position].contains(&axis) {
                return Err(TensorError::DuplicateAxis(axis));
            }
        }
        if let Some((&first, rest)) = axes.split_first() {
            for &axis in rest {
                if self.shape[axis] != self.shape[first] {
                    return Err(TensorError::UnequalAxisLengths {
                        first,
                        second: axis,
                        first_len: self.shape[first],
                        second_len: self.shape[axis],
                    });
                }
            }
        }
        Ok(())
    }
}
