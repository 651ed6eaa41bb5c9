use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::topology::{Terminal, Topology};

/// MNA system representation: [A][x] = [z]
///
/// ```text
///     | G  Bt |        | I |
/// A = |       |    z = |   |
///     | B  0  |        | E |
/// ```
///
/// The first `num_nodes` unknowns are node potentials in topology order, the
/// remaining `num_voltage_sources` are the currents through each voltage source.
#[derive(Debug, Clone)]
pub struct MnaSystem {
    /// System matrix A (coefficient matrix)
    pub matrix: DMatrix<f64>,
    /// Right-hand side vector z
    pub rhs: DVector<f64>,
    /// Total system size
    pub size: usize,
    /// Number of unknown node potentials
    pub num_nodes: usize,
    /// Number of voltage sources
    pub num_voltage_sources: usize,
}

impl MnaSystem {
    /// Stamp every branch of a reduced topology into a fresh system
    pub fn assemble(topology: &Topology) -> Self {
        let num_nodes = topology.num_nodes();
        let num_voltage_sources = topology.num_voltage_sources();

        let conductance = conductance_matrix(topology);
        let incidence = incidence_matrix(topology);
        let matrix = system_matrix(&conductance, &incidence);
        let rhs = source_vector(&current_vector(topology), &voltage_vector(topology));

        debug!(
            "Assembled MNA system: {}x{} ({} nodes, {} voltage sources)",
            matrix.nrows(),
            matrix.ncols(),
            num_nodes,
            num_voltage_sources
        );

        MnaSystem {
            size: num_nodes + num_voltage_sources,
            matrix,
            rhs,
            num_nodes,
            num_voltage_sources,
        }
    }

    /// Node potential block of a solution vector
    pub fn node_potentials<'a>(&self, solution: &'a DVector<f64>) -> &'a [f64] {
        &solution.as_slice()[..self.num_nodes]
    }

    /// Voltage source current block of a solution vector
    pub fn source_currents<'a>(&self, solution: &'a DVector<f64>) -> &'a [f64] {
        &solution.as_slice()[self.num_nodes..self.size]
    }
}

/// Conductance matrix G (n x n).
///
/// Every resistor adds its conductance to the diagonal entry of each unknown
/// node it touches. Off-diagonal coupling is only stamped when neither end is
/// on a reference node.
pub fn conductance_matrix(topology: &Topology) -> DMatrix<f64> {
    let n = topology.num_nodes();
    let mut g = DMatrix::zeros(n, n);

    for resistor in &topology.resistors {
        let conductance = resistor.value;

        if let Terminal::Unknown(i) = resistor.from {
            g[(i, i)] += conductance;
        }
        if let Terminal::Unknown(j) = resistor.to {
            g[(j, j)] += conductance;
        }

        if !resistor.is_grounded() {
            if let (Terminal::Unknown(i), Terminal::Unknown(j)) = (resistor.from, resistor.to) {
                g[(i, j)] -= conductance;
                g[(j, i)] -= conductance;
            }
        }
    }

    g
}

/// Voltage incidence matrix B (m x n): -1 at the negative terminal's column,
/// +1 at the positive terminal's column, nothing for reference nodes.
pub fn incidence_matrix(topology: &Topology) -> DMatrix<f64> {
    let mut b = DMatrix::zeros(topology.num_voltage_sources(), topology.num_nodes());

    for (k, source) in topology.voltage_sources.iter().enumerate() {
        if let Terminal::Unknown(i) = source.from {
            b[(k, i)] -= 1.0;
        }
        if let Terminal::Unknown(j) = source.to {
            b[(k, j)] += 1.0;
        }
    }

    b
}

/// Injected current per unknown node; a current source feeds its "to" node
pub fn current_vector(topology: &Topology) -> DVector<f64> {
    let mut currents = DVector::zeros(topology.num_nodes());

    for source in &topology.current_sources {
        if let Terminal::Unknown(j) = source.to {
            currents[j] += source.value;
        }
    }

    currents
}

/// Fixed value of each voltage source, in declaration order
pub fn voltage_vector(topology: &Topology) -> DVector<f64> {
    DVector::from_iterator(
        topology.num_voltage_sources(),
        topology.voltage_sources.iter().map(|source| source.value),
    )
}

/// Place G, Bt, B and a zero block into the (n+m) x (n+m) system matrix
pub fn system_matrix(conductance: &DMatrix<f64>, incidence: &DMatrix<f64>) -> DMatrix<f64> {
    let n = conductance.nrows();
    let m = incidence.nrows();
    let mut a = DMatrix::zeros(n + m, n + m);

    a.view_mut((0, 0), (n, n)).copy_from(conductance);
    a.view_mut((0, n), (n, m)).copy_from(&incidence.transpose());
    a.view_mut((n, 0), (m, n)).copy_from(incidence);

    a
}

/// Stack the current and voltage vectors into z
pub fn source_vector(currents: &DVector<f64>, voltages: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        currents.len() + voltages.len(),
        currents.iter().chain(voltages.iter()).copied(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{Circuit, Component, ComponentId};

    /// V1 (5V) -> top -> R1 (10) -> mid -> R2 (10) -> ground
    fn divider() -> Circuit {
        let mut circuit = Circuit::new("Divider");
        let v1 = circuit.add_component(Component::voltage_source("V1", 5.0));
        let r1 = circuit.add_component(Component::resistor("R1", 10.0).unwrap());
        let r2 = circuit.add_component(Component::resistor("R2", 10.0).unwrap());
        let gnd = circuit.add_component(Component::ground("GND"));
        circuit.connect(v1, 1, r1, 0).unwrap();
        circuit.connect(r1, 1, r2, 0).unwrap();
        circuit.connect(r2, 1, gnd, 0).unwrap();
        circuit.connect(v1, 0, gnd, 0).unwrap();
        circuit
    }

    #[test]
    fn test_mna_divider_blocks() {
        let topology = Topology::reduce(&divider()).unwrap();
        let mna = MnaSystem::assemble(&topology);

        assert_eq!(mna.size, 3); // 2 nodes + 1 voltage source
        assert_eq!(mna.num_nodes, 2);
        assert_eq!(mna.num_voltage_sources, 1);

        let expected = DMatrix::from_row_slice(
            3,
            3,
            &[
                0.1, -0.1, 1.0, //
                -0.1, 0.2, 0.0, //
                1.0, 0.0, 0.0,
            ],
        );
        assert_eq!(mna.matrix, expected);
        assert_eq!(mna.rhs, DVector::from_vec(vec![0.0, 0.0, 5.0]));
    }

    #[test]
    fn test_grounded_resistor_only_stamps_diagonal() {
        let mut circuit = Circuit::new("Test");
        let gnd = circuit.add_component(Component::ground("GND"));
        let r1 = circuit.add_component(Component::resistor("R1", 4.0).unwrap());
        let i1 = circuit.add_component(Component::current_source("I1", 0.001));
        circuit.connect(r1, 0, gnd, 0).unwrap();
        circuit.connect(i1, 0, gnd, 0).unwrap();
        circuit.connect(i1, 1, r1, 1).unwrap();

        let topology = Topology::reduce(&circuit).unwrap();
        let mna = MnaSystem::assemble(&topology);

        assert_eq!(mna.size, 1); // Only 1 node (no voltage sources)
        assert_eq!(mna.matrix[(0, 0)], 0.25);
        assert_eq!(mna.rhs[0], 0.001); // Current source contributes to RHS
    }

    #[test]
    fn test_parallel_resistors_accumulate() {
        let mut circuit = Circuit::new("Parallel");
        let gnd = circuit.add_component(Component::ground("GND"));
        let ids: Vec<ComponentId> = (0..3)
            .map(|i| circuit.add_component(Component::resistor(format!("R{}", i), 2.0).unwrap()))
            .collect();
        let v1 = circuit.add_component(Component::voltage_source("V1", 1.0));
        circuit.connect(v1, 0, gnd, 0).unwrap();
        for &id in &ids {
            circuit.connect(id, 0, v1, 1).unwrap();
        }
        // Second node shared by the far ends, floating except through the resistors
        circuit.connect(ids[0], 1, ids[1], 1).unwrap();
        circuit.connect(ids[0], 1, ids[2], 1).unwrap();

        let topology = Topology::reduce(&circuit).unwrap();
        let g = conductance_matrix(&topology);
        assert_eq!(g[(0, 0)], 1.5);
        assert_eq!(g[(1, 1)], 1.5);
        assert_eq!(g[(0, 1)], -1.5);
        assert_eq!(g[(1, 0)], -1.5);
    }

    #[test]
    fn test_degenerate_inputs() {
        // Single grounded resistor with an open far end
        let mut circuit = Circuit::new("Nodal");
        let gnd = circuit.add_component(Component::ground("GND"));
        let r1 = circuit.add_component(Component::resistor("R1", 1.0).unwrap());
        circuit.connect(r1, 0, gnd, 0).unwrap();
        let topology = Topology::reduce(&circuit).unwrap();

        assert_eq!(incidence_matrix(&topology).nrows(), 0);
        assert_eq!(voltage_vector(&topology).len(), 0);
        assert_eq!(current_vector(&topology).len(), 0);

        let empty = Topology::reduce(&Circuit::new("Empty")).unwrap();
        let mna = MnaSystem::assemble(&empty);
        assert_eq!(mna.size, 0);
        assert_eq!(mna.matrix.nrows(), 0);
    }

    #[test]
    fn test_source_without_resistors() {
        let mut circuit = Circuit::new("Source only");
        let gnd = circuit.add_component(Component::ground("GND"));
        let v1 = circuit.add_component(Component::voltage_source("V1", 3.3));
        let open = circuit.add_component(Component::resistor("R1", 1.0).unwrap());
        circuit.connect(v1, 0, gnd, 0).unwrap();
        // Open far end, so the resistor is never stamped
        circuit.connect(v1, 1, open, 0).unwrap();

        let topology = Topology::reduce(&circuit).unwrap();
        assert!(topology.resistors.is_empty());
        assert_eq!(conductance_matrix(&topology), DMatrix::zeros(1, 1));

        let mna = MnaSystem::assemble(&topology);
        assert_eq!(mna.matrix, DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]));
        assert_eq!(mna.rhs, DVector::from_vec(vec![0.0, 3.3]));
    }

    #[test]
    fn test_incidence_signs_follow_terminals() {
        let mut circuit = Circuit::new("Floating source");
        let gnd = circuit.add_component(Component::ground("GND"));
        let ra = circuit.add_component(Component::resistor("RA", 1.0).unwrap());
        let rb = circuit.add_component(Component::resistor("RB", 1.0).unwrap());
        let v1 = circuit.add_component(Component::voltage_source("V1", 3.0));
        circuit.connect(ra, 0, gnd, 0).unwrap();
        circuit.connect(rb, 0, gnd, 0).unwrap();
        circuit.connect(v1, 0, ra, 1).unwrap();
        circuit.connect(v1, 1, rb, 1).unwrap();

        let topology = Topology::reduce(&circuit).unwrap();
        let b = incidence_matrix(&topology);
        // RA's far end is recorded first
        assert_eq!(b, DMatrix::from_row_slice(1, 2, &[-1.0, 1.0]));

        let a = system_matrix(&conductance_matrix(&topology), &b);
        assert_eq!(a[(0, 2)], -1.0);
        assert_eq!(a[(1, 2)], 1.0);
        assert_eq!(a[(2, 2)], 0.0);
    }
}
