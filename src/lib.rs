pub mod circuit;
pub mod cli;
pub mod error;
pub mod mna;
pub mod output;
pub mod presets;
pub mod simulator;
pub mod solver;
pub mod topology;

// Re-export commonly used types
pub use circuit::{Circuit, Component, ComponentId, ComponentKind, Connection, Disconnection, Node, NodeId};
pub use error::{ExportError, Result, SimError, Singularity};
pub use simulator::{simulate, PotentialAssignment, Simulator, SimulatorConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
