//! Error types for circuit editing and simulation.

use thiserror::Error;

use crate::circuit::{ComponentId, NodeId};

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Reason an assembled MNA system could not be solved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Singularity {
    /// A group of unknown nodes has no resistive or voltage-source path to a
    /// ground reference, so its potential is undetermined.
    #[error("node {node} has no path to a ground reference")]
    FloatingSubcircuit { node: NodeId },
    /// Elimination hit a pivot that is zero relative to its column.
    #[error("degenerate pivot in row {row}")]
    DegeneratePivot { row: usize },
}

/// Errors raised by graph mutations and by the simulator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// Terminal index out of range for the component's kind
    #[error("component {component} has no terminal {terminal} (it has {count})")]
    InvalidTerminal {
        component: ComponentId,
        terminal: usize,
        count: usize,
    },

    /// A component kind MNA cannot stamp
    #[error("cannot complete MNA, circuit is non-linear: {component} is a {kind}")]
    UnsupportedComponent {
        component: ComponentId,
        kind: &'static str,
    },

    /// The assembled system has no unique solution
    #[error("singular system: {0}")]
    SingularSystem(Singularity),

    #[error("component {0} does not exist")]
    UnknownComponent(ComponentId),

    #[error("node {0} does not exist")]
    UnknownNode(NodeId),

    /// Matrix and right-hand side handed to the solver do not fit together
    #[error("cannot solve a {rows}x{cols} system with {rhs} right-hand side entries")]
    DimensionMismatch { rows: usize, cols: usize, rhs: usize },

    /// Resistors must be created with a positive, finite resistance
    #[error("invalid resistance {0}: must be positive and finite")]
    InvalidResistance(f64),
}

/// Errors raised while writing a solved assignment to disk.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Create a singular-system error for a floating island containing `node`
    pub fn floating(node: NodeId) -> Self {
        Self::SingularSystem(Singularity::FloatingSubcircuit { node })
    }

    /// Create a singular-system error for a degenerate elimination pivot
    pub fn degenerate_pivot(row: usize) -> Self {
        Self::SingularSystem(Singularity::DegeneratePivot { row })
    }

    /// Returns true for any well-posedness failure
    pub fn is_singular(&self) -> bool {
        matches!(self, SimError::SingularSystem(_))
    }
}
