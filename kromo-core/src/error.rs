//! Error types for the kromo core library.
//!
//! Defines the construction and colouring error enums exposed by the public
//! API together with their stable machine-readable codes.

use std::fmt;

use thiserror::Error;

use crate::graph::Color;

macro_rules! define_error_codes {
    (
        $(#[$enum_meta:meta])*
        enum $CodeTy:ident for $ErrTy:ident {
            $(
                $(#[$variant_meta:meta])*
                $CodeVariant:ident => $ErrVariant:ident $( { $($pattern:tt)* } )? => $code:expr
            ),+ $(,)?
        }
    ) => {
        $(#[$enum_meta])*
        #[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
        #[non_exhaustive]
        pub enum $CodeTy {
            $(
                $(#[$variant_meta])*
                $CodeVariant,
            )+
        }

        impl $CodeTy {
            /// Return the stable machine-readable representation of this error code.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$CodeVariant => $code,)+
                }
            }
        }

        impl fmt::Display for $CodeTy {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl $ErrTy {
            #[doc = concat!(
                "Retrieve the stable [`",
                stringify!($CodeTy),
                "`] for this error."
            )]
            #[must_use]
            pub const fn code(&self) -> $CodeTy {
                match self {
                    $(Self::$ErrVariant $( { $($pattern)* } )? => $CodeTy::$CodeVariant,)+
                }
            }
        }
    };
}

/// Errors raised while constructing or inspecting a [`crate::Graph`].
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GraphError {
    /// Graphs must contain at least one node.
    #[error("graph size must be at least 1 (got {got})")]
    InvalidSize {
        /// The rejected node count.
        got: usize,
    },
    /// Branching factors must be finite and non-negative.
    #[error("branching factor must be finite and non-negative (got {got})")]
    InvalidBranchingFactor {
        /// The rejected branching factor.
        got: f64,
    },
    /// Parallel construction needs at least one worker.
    #[error("worker count must be at least 1 (got {got})")]
    InvalidWorkerCount {
        /// The rejected worker count.
        got: usize,
    },
    /// Explicit adjacency lists broke a node invariant.
    #[error("invalid adjacency at node {node}: {reason}")]
    InvalidAdjacency {
        /// Node whose adjacency list was rejected.
        node: usize,
        /// Human-readable description of the violated invariant.
        reason: &'static str,
    },
    /// A node index was outside the graph.
    #[error("node {node} is out of range for a graph of {len} nodes")]
    NodeOutOfRange {
        /// The requested node.
        node: usize,
        /// Number of nodes in the graph.
        len: usize,
    },
    /// The worker thread pool could not be created.
    #[error("failed to build worker pool: {message}")]
    WorkerPool {
        /// Message reported by the pool builder.
        message: String,
    },
    /// A synchronisation primitive became poisoned after a panic.
    #[error("lock for {resource} is poisoned")]
    LockPoisoned {
        /// Name of the poisoned resource.
        resource: &'static str,
    },
}

define_error_codes! {
    /// Stable codes describing [`GraphError`] variants.
    enum GraphErrorCode for GraphError {
        /// Graphs must contain at least one node.
        InvalidSize => InvalidSize { .. } => "GRAPH_INVALID_SIZE",
        /// Branching factors must be finite and non-negative.
        InvalidBranchingFactor => InvalidBranchingFactor { .. } => "GRAPH_INVALID_BRANCHING_FACTOR",
        /// Parallel construction needs at least one worker.
        InvalidWorkerCount => InvalidWorkerCount { .. } => "GRAPH_INVALID_WORKER_COUNT",
        /// Explicit adjacency lists broke a node invariant.
        InvalidAdjacency => InvalidAdjacency { .. } => "GRAPH_INVALID_ADJACENCY",
        /// A node index was outside the graph.
        NodeOutOfRange => NodeOutOfRange { .. } => "GRAPH_NODE_OUT_OF_RANGE",
        /// The worker thread pool could not be created.
        WorkerPool => WorkerPool { .. } => "GRAPH_WORKER_POOL",
        /// A synchronisation primitive became poisoned.
        LockPoisoned => LockPoisoned { .. } => "GRAPH_LOCK_POISONED",
    }
}

/// Errors raised by the greedy colouring engines.
#[non_exhaustive]
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ColoringError {
    /// The palette must contain at least one colour.
    #[error("max_color must be at least 1 (got {got})")]
    InvalidMaxColor {
        /// The rejected palette size.
        got: Color,
    },
    /// Every colour below `max_color` is already used by a neighbour.
    #[error("node {node} has no free colour below max_color {max_color}")]
    ColorsExhausted {
        /// Node that could not be coloured.
        node: usize,
        /// Palette size supplied by the caller.
        max_color: Color,
    },
    /// The underlying graph or worker pool rejected an operation.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

define_error_codes! {
    /// Stable codes describing [`ColoringError`] variants.
    enum ColoringErrorCode for ColoringError {
        /// The palette must contain at least one colour.
        InvalidMaxColor => InvalidMaxColor { .. } => "COLORING_INVALID_MAX_COLOR",
        /// Every colour below `max_color` is already used by a neighbour.
        ColorsExhausted => ColorsExhausted { .. } => "COLORING_COLORS_EXHAUSTED",
        /// The underlying graph or worker pool rejected an operation.
        Graph => Graph { .. } => "COLORING_GRAPH_FAILURE",
    }
}

impl ColoringError {
    /// Retrieve the inner [`GraphErrorCode`] when the failure came from the graph.
    #[must_use]
    pub const fn graph_code(&self) -> Option<GraphErrorCode> {
        match self {
            Self::Graph(error) => Some(error.code()),
            _ => None,
        }
    }
}

/// Convenient alias for graph construction results.
pub type Result<T> = core::result::Result<T, GraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case(GraphError::InvalidSize { got: 0 }, "GRAPH_INVALID_SIZE")]
    #[case(GraphError::InvalidBranchingFactor { got: -1.0 }, "GRAPH_INVALID_BRANCHING_FACTOR")]
    #[case(GraphError::InvalidWorkerCount { got: 0 }, "GRAPH_INVALID_WORKER_COUNT")]
    #[case(
        GraphError::LockPoisoned { resource: "adjacency" },
        "GRAPH_LOCK_POISONED"
    )]
    fn graph_error_codes_are_stable(#[case] error: GraphError, #[case] expected: &str) {
        assert_eq!(error.code().as_str(), expected);
        assert_eq!(error.code().to_string(), expected);
    }

    #[rstest]
    #[case(
        ColoringError::ColorsExhausted { node: 3, max_color: 2 },
        "COLORING_COLORS_EXHAUSTED"
    )]
    #[case(ColoringError::InvalidMaxColor { got: 0 }, "COLORING_INVALID_MAX_COLOR")]
    fn coloring_error_codes_are_stable(#[case] error: ColoringError, #[case] expected: &str) {
        assert_eq!(error.code().as_str(), expected);
    }

    #[test]
    fn graph_errors_convert_into_coloring_errors() {
        let converted = ColoringError::from(GraphError::NodeOutOfRange { node: 9, len: 4 });
        assert_eq!(converted.code(), ColoringErrorCode::Graph);
        assert_eq!(converted.graph_code(), Some(GraphErrorCode::NodeOutOfRange));
    }
}
