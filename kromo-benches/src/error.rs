//! Benchmark setup error type.
//!
//! Lets setup code propagate core failures with `?` so each benchmark panics
//! in one place with a readable message.

use kromo_core::{ColoringError, GraphError};

/// Errors that may occur during benchmark setup.
#[derive(Debug, thiserror::Error)]
pub enum BenchSetupError {
    /// Graph parameters were rejected or generation failed.
    #[error("graph generation failed: {0}")]
    Graph(#[from] GraphError),
    /// A colouring run failed during setup or validation.
    #[error("colouring failed: {0}")]
    Coloring(#[from] ColoringError),
    /// A benchmark produced an improper colouring.
    #[error("{context} produced an invalid colouring")]
    InvalidColoring {
        /// The benchmark that produced it.
        context: &'static str,
    },
}
