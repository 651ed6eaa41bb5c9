//! Topology reduction: turns the editable component arena into the ordered
//! unknown-node list and the branch lists the assembler stamps.

use std::collections::HashMap;

use log::{debug, warn};

use crate::circuit::{Circuit, ComponentId, ComponentKind, NodeId};
use crate::error::{Result, SimError};

/// Where a branch terminal lands in the MNA unknown vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// Row/column index into the unknown node list
    Unknown(usize),
    /// A ground-bearing node pinned to 0V; has no row or column
    Reference,
}

impl Terminal {
    pub fn index(self) -> Option<usize> {
        match self {
            Terminal::Unknown(i) => Some(i),
            Terminal::Reference => None,
        }
    }
}

/// A two-terminal element ready for stamping.
///
/// `value` is the conductance for resistors, the source value for sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Branch {
    pub component: ComponentId,
    pub from: Terminal,
    pub to: Terminal,
    pub value: f64,
}

impl Branch {
    /// True when either end sits on a reference node
    pub fn is_grounded(&self) -> bool {
        self.from == Terminal::Reference || self.to == Terminal::Reference
    }
}

/// Reduced view of a circuit with ground markers removed
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Unknown-potential nodes in canonical row/column order
    pub unknowns: Vec<NodeId>,
    /// Ground-bearing nodes, in order of first encounter
    pub references: Vec<NodeId>,
    pub resistors: Vec<Branch>,
    /// Voltage sources in declaration order; their position is the current index
    pub voltage_sources: Vec<Branch>,
    pub current_sources: Vec<Branch>,
    index: HashMap<NodeId, usize>,
}

impl Topology {
    /// Validate the component set and reduce it.
    ///
    /// Nodes are numbered by walking terminals in component-list order, so the
    /// same circuit always yields the same ordering.
    pub fn reduce(circuit: &Circuit) -> Result<Self> {
        let mut topology = Topology::default();

        for (id, component) in circuit.components() {
            let value = match component.kind() {
                ComponentKind::Resistor(r) => r.conductance(),
                ComponentKind::VoltageSource { voltage } => *voltage,
                ComponentKind::CurrentSource { current } => *current,
                ComponentKind::Ground => 0.0,
                other => {
                    return Err(SimError::UnsupportedComponent {
                        component: id,
                        kind: other.label(),
                    })
                }
            };

            for &node in component.terminals().iter().flatten() {
                topology.record_node(circuit, node);
            }

            if component.kind().is_ground() {
                continue;
            }

            let (from, to) = match (component.terminal(0), component.terminal(1)) {
                (Some(from), Some(to)) => (topology.terminal(from), topology.terminal(to)),
                _ => {
                    warn!(
                        "Skipping {} '{}' ({}): terminal not connected",
                        component.kind().label(),
                        component.name,
                        id
                    );
                    continue;
                }
            };

            let branch = Branch {
                component: id,
                from,
                to,
                value,
            };

            match component.kind() {
                ComponentKind::Resistor(_) if from == to => {
                    debug!("Skipping shorted resistor '{}' ({})", component.name, id);
                }
                ComponentKind::Resistor(_) => topology.resistors.push(branch),
                ComponentKind::VoltageSource { .. } => topology.voltage_sources.push(branch),
                _ => topology.current_sources.push(branch),
            }
        }

        debug!(
            "Reduced topology: {} unknown nodes {:?}, {} reference nodes, {} resistors, {} voltage sources, {} current sources",
            topology.unknowns.len(),
            topology.unknowns,
            topology.references.len(),
            topology.resistors.len(),
            topology.voltage_sources.len(),
            topology.current_sources.len()
        );

        Ok(topology)
    }

    pub fn num_nodes(&self) -> usize {
        self.unknowns.len()
    }

    pub fn num_voltage_sources(&self) -> usize {
        self.voltage_sources.len()
    }

    /// Row/column index of an unknown node
    pub fn index_of(&self, node: NodeId) -> Option<usize> {
        self.index.get(&node).copied()
    }

    /// Find an unknown node whose potential nothing pins down.
    ///
    /// Resistors and voltage sources tie node potentials together; current
    /// sources do not. Any unknown node not tied, directly or transitively, to a
    /// reference node makes the system singular.
    pub fn find_floating_node(&self) -> Option<NodeId> {
        let reference = self.unknowns.len();
        let mut sets = DisjointSet::new(reference + 1);
        let slot = |t: Terminal| t.index().unwrap_or(reference);

        for branch in self.resistors.iter().chain(&self.voltage_sources) {
            sets.union(slot(branch.from), slot(branch.to));
        }

        let root = sets.find(reference);
        (0..reference)
            .find(|&i| sets.find(i) != root)
            .map(|i| self.unknowns[i])
    }

    fn record_node(&mut self, circuit: &Circuit, node: NodeId) {
        if circuit.is_grounded(node) {
            if !self.references.contains(&node) {
                self.references.push(node);
            }
        } else if !self.index.contains_key(&node) {
            self.index.insert(node, self.unknowns.len());
            self.unknowns.push(node);
        }
    }

    fn terminal(&self, node: NodeId) -> Terminal {
        self.index_of(node).map_or(Terminal::Reference, Terminal::Unknown)
    }
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        DisjointSet {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}
