use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::circuit::{Circuit, ComponentId, NodeId};
use crate::error::{Result, SimError};
use crate::mna::MnaSystem;
use crate::solver::{LinearSolver, SolverConfig};
use crate::topology::Topology;

/// Solved potential of one unknown node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NodePotential {
    pub node: NodeId,
    pub potential: f64,
}

/// Solved branch current of one voltage source.
///
/// Positive current enters the source at its positive terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCurrent {
    pub component: ComponentId,
    pub name: String,
    pub current: f64,
}

/// Result of one operating point solve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialAssignment {
    /// Unknown node potentials, in topology order
    pub potentials: Vec<NodePotential>,
    /// Ground-bearing nodes, fixed at 0V
    pub references: Vec<NodeId>,
    /// Voltage source currents, in declaration order
    pub source_currents: Vec<SourceCurrent>,
}

impl PotentialAssignment {
    /// Potential of a node; reference nodes read 0V
    pub fn potential(&self, node: NodeId) -> Option<f64> {
        self.potentials
            .iter()
            .find(|p| p.node == node)
            .map(|p| p.potential)
            .or_else(|| self.references.contains(&node).then_some(0.0))
    }

    /// Current through a voltage source
    pub fn source_current(&self, component: ComponentId) -> Option<f64> {
        self.source_currents
            .iter()
            .find(|s| s.component == component)
            .map(|s| s.current)
    }

    pub fn is_empty(&self) -> bool {
        self.potentials.is_empty() && self.references.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub solver_config: SolverConfig,
    /// Reject circuits with an unreferenced island before factorizing
    pub check_islands: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        SimulatorConfig {
            solver_config: SolverConfig::default(),
            check_islands: true,
        }
    }
}

/// Operating point engine: reduce, assemble, solve.
///
/// Holds configuration only. Every call works from the circuit it is handed,
/// so an unchanged circuit always produces the same assignment.
#[derive(Debug, Clone)]
pub struct Simulator {
    solver: LinearSolver,
    config: SimulatorConfig,
}

impl Simulator {
    /// Create a new simulator with default configuration
    pub fn new() -> Self {
        Self::with_config(SimulatorConfig::default())
    }

    /// Create a new simulator with custom configuration
    pub fn with_config(config: SimulatorConfig) -> Self {
        let solver = LinearSolver::with_config(config.solver_config.clone());
        Simulator { solver, config }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Solve the circuit without touching it
    pub fn solve(&self, circuit: &Circuit) -> Result<PotentialAssignment> {
        info!("Starting operating point analysis of '{}'", circuit.title);

        let topology = Topology::reduce(circuit)?;

        if self.config.check_islands {
            if let Some(node) = topology.find_floating_node() {
                return Err(SimError::floating(node));
            }
        }

        let mna = MnaSystem::assemble(&topology);
        let (solution, stats) = self.solver.solve_dense(&mna.matrix, &mna.rhs)?;
        if !stats.success {
            warn!(
                "Residual norm {:.2e} exceeds tolerance {:.2e}",
                stats.residual_norm, self.config.solver_config.residual_tolerance
            );
        }

        let potentials = topology
            .unknowns
            .iter()
            .zip(mna.node_potentials(&solution))
            .map(|(&node, &potential)| NodePotential { node, potential })
            .collect();

        let source_currents = topology
            .voltage_sources
            .iter()
            .zip(mna.source_currents(&solution))
            .map(|(branch, &current)| SourceCurrent {
                component: branch.component,
                name: circuit
                    .component(branch.component)
                    .map(|c| c.name.clone())
                    .unwrap_or_default(),
                current,
            })
            .collect();

        info!(
            "Operating point solved: {} nodes, {} voltage sources in {:.3}ms",
            mna.num_nodes,
            mna.num_voltage_sources,
            stats.solve_time * 1000.0
        );

        Ok(PotentialAssignment {
            potentials,
            references: topology.references,
            source_currents,
        })
    }

    /// Solve the circuit and write every resolved potential onto its node.
    ///
    /// Nothing is written unless the whole solve succeeds.
    pub fn simulate(&self, circuit: &mut Circuit) -> Result<PotentialAssignment> {
        let assignment = self.solve(circuit)?;

        for p in &assignment.potentials {
            circuit.set_potential(p.node, p.potential)?;
        }
        for &node in &assignment.references {
            circuit.set_potential(node, 0.0)?;
        }

        Ok(assignment)
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulate with the default configuration
pub fn simulate(circuit: &mut Circuit) -> Result<PotentialAssignment> {
    Simulator::new().simulate(circuit)
}
