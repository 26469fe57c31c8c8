use thiserror::Error;

use super::config::ConfigError;
use crate::core::state::StateError;
use crate::core::tensor::TensorError;
use crate::topology::error::TopologyError;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Invalid cluster basis: {source}")]
    Basis {
        #[from]
        source: ConfigError,
    },

    #[error("Topology construction failed: {source}")]
    Topology {
        #[from]
        source: TopologyError,
    },

    #[error("Invalid state matrix: {source}")]
    State {
        #[from]
        source: StateError,
    },

    #[error("Tensor operation failed: {source}")]
    Tensor {
        #[from]
        source: TensorError,
    },
}
