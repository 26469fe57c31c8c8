use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TopologyError {
    #[error("Invalid topology configuration: {0}")]
    Configuration(String),

    #[error("Dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
}
