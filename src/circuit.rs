use std::collections::HashMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Handle to a node slot in a [`Circuit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(index: usize) -> Self {
        NodeId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// Handle to a component slot in a [`Circuit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(usize);

impl ComponentId {
    pub fn new(index: usize) -> Self {
        ComponentId(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// An electrical junction. All terminals bound here share one potential.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    potential: f64,
    /// Ordered set of components with at least one terminal bound here
    members: Vec<ComponentId>,
}

impl Node {
    fn new() -> Self {
        Node {
            potential: 0.0,
            members: Vec::new(),
        }
    }

    /// Potential written by the last successful simulation
    pub fn potential(&self) -> f64 {
        self.potential
    }

    pub fn members(&self) -> &[ComponentId] {
        &self.members
    }

    pub fn contains(&self, component: ComponentId) -> bool {
        self.members.contains(&component)
    }

    fn add_member(&mut self, component: ComponentId) {
        if !self.contains(component) {
            self.members.push(component);
        }
    }

    fn remove_member(&mut self, component: ComponentId) {
        self.members.retain(|&m| m != component);
    }
}

/// Resistor parameters. Setters ignore non-positive values and keep the old one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resistor {
    resistance: f64,
}

impl Resistor {
    pub fn new(resistance: f64) -> Result<Self> {
        if resistance > 0.0 && resistance.is_finite() {
            Ok(Resistor { resistance })
        } else {
            Err(SimError::InvalidResistance(resistance))
        }
    }

    pub fn resistance(&self) -> f64 {
        self.resistance
    }

    pub fn conductance(&self) -> f64 {
        1.0 / self.resistance
    }

    pub fn set_resistance(&mut self, resistance: f64) {
        if resistance > 0.0 && resistance.is_finite() {
            self.resistance = resistance;
        }
    }

    pub fn set_conductance(&mut self, conductance: f64) {
        let resistance = 1.0 / conductance;
        if conductance > 0.0 && resistance.is_finite() {
            self.resistance = resistance;
        }
    }
}

/// Kinds of circuit components
///
/// Only the linear kinds can be stamped into an MNA system. The semiconductor
/// kinds can be placed and wired like any other component but make a solve fail.
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentKind {
    Resistor(Resistor),
    VoltageSource { voltage: f64 },
    CurrentSource { current: f64 },
    /// Marks the node it is bound to as the 0V reference
    Ground,
    Diode,
    Bjt,
    Mosfet,
}

impl ComponentKind {
    /// Number of terminal slots a component of this kind owns
    pub fn terminal_count(&self) -> usize {
        match self {
            ComponentKind::Ground => 1,
            ComponentKind::Resistor(_)
            | ComponentKind::VoltageSource { .. }
            | ComponentKind::CurrentSource { .. }
            | ComponentKind::Diode => 2,
            ComponentKind::Bjt => 3,    // Collector, Base, Emitter
            ComponentKind::Mosfet => 4, // Drain, Gate, Source, Bulk
        }
    }

    /// Returns true if this kind can take part in a linear solve
    pub fn is_linear(&self) -> bool {
        matches!(
            self,
            ComponentKind::Resistor(_)
                | ComponentKind::VoltageSource { .. }
                | ComponentKind::CurrentSource { .. }
                | ComponentKind::Ground
        )
    }

    pub fn is_ground(&self) -> bool {
        matches!(self, ComponentKind::Ground)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Resistor(_) => "resistor",
            ComponentKind::VoltageSource { .. } => "voltage source",
            ComponentKind::CurrentSource { .. } => "current source",
            ComponentKind::Ground => "ground",
            ComponentKind::Diode => "diode",
            ComponentKind::Bjt => "bjt",
            ComponentKind::Mosfet => "mosfet",
        }
    }
}

/// A circuit element with a fixed number of terminal slots.
///
/// Terminal 0 is the negative ("from") side and terminal 1 the positive
/// ("to") side of a two-terminal element. Slots are only rebound through
/// [`Circuit::connect`] and the disconnect family.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    kind: ComponentKind,
    terminals: Vec<Option<NodeId>>,
}

impl Component {
    pub fn new(name: impl Into<String>, kind: ComponentKind) -> Self {
        let terminals = vec![None; kind.terminal_count()];
        Component {
            name: name.into(),
            kind,
            terminals,
        }
    }

    pub fn resistor(name: impl Into<String>, resistance: f64) -> Result<Self> {
        Ok(Component::new(name, ComponentKind::Resistor(Resistor::new(resistance)?)))
    }

    pub fn voltage_source(name: impl Into<String>, voltage: f64) -> Self {
        Component::new(name, ComponentKind::VoltageSource { voltage })
    }

    pub fn current_source(name: impl Into<String>, current: f64) -> Self {
        Component::new(name, ComponentKind::CurrentSource { current })
    }

    pub fn ground(name: impl Into<String>) -> Self {
        Component::new(name, ComponentKind::Ground)
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Mutable resistor parameters, if this is a resistor
    pub fn resistor_mut(&mut self) -> Option<&mut Resistor> {
        match &mut self.kind {
            ComponentKind::Resistor(r) => Some(r),
            _ => None,
        }
    }

    /// Change a voltage source's value. Returns false for other kinds.
    pub fn set_voltage(&mut self, value: f64) -> bool {
        match &mut self.kind {
            ComponentKind::VoltageSource { voltage } => {
                *voltage = value;
                true
            }
            _ => false,
        }
    }

    /// Change a current source's value. Returns false for other kinds.
    pub fn set_current(&mut self, value: f64) -> bool {
        match &mut self.kind {
            ComponentKind::CurrentSource { current } => {
                *current = value;
                true
            }
            _ => false,
        }
    }

    pub fn terminals(&self) -> &[Option<NodeId>] {
        &self.terminals
    }

    /// Node bound to `index`, or None if the slot is empty or out of range
    pub fn terminal(&self, index: usize) -> Option<NodeId> {
        self.terminals.get(index).copied().flatten()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn is_connected_to(&self, node: NodeId) -> bool {
        self.terminals.contains(&Some(node))
    }

    /// True when every terminal slot is bound
    pub fn is_fully_connected(&self) -> bool {
        self.terminals.iter().all(Option::is_some)
    }
}

/// Outcome of [`Circuit::connect`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// Both terminals were empty; a new node now joins them
    Created(NodeId),
    /// Two distinct nodes were unified; `retired` no longer exists
    Merged { survivor: NodeId, retired: NodeId },
    /// Node count is unchanged; the terminals share this node
    Unchanged(NodeId),
}

impl Connection {
    /// Node joining the two terminals after the call
    pub fn node(&self) -> NodeId {
        match *self {
            Connection::Created(node) | Connection::Unchanged(node) => node,
            Connection::Merged { survivor, .. } => survivor,
        }
    }

    /// Change in live node count caused by the call
    pub fn node_delta(&self) -> isize {
        match self {
            Connection::Created(_) => 1,
            Connection::Merged { .. } => -1,
            Connection::Unchanged(_) => 0,
        }
    }
}

/// Outcome of the disconnect family of operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnection {
    /// Terminals were cleared; the node still has other members
    Detached(NodeId),
    /// The node lost its last member and was destroyed
    Destroyed(NodeId),
    /// Nothing was bound, nothing changed
    Unchanged,
}

/// Arena of nodes and components making up one editable circuit.
///
/// Slots are never reused, so a handle to a removed component or a retired
/// node stays invalid instead of aliasing a newer entity.
#[derive(Debug, Clone, Default)]
pub struct Circuit {
    pub title: String,
    nodes: Vec<Option<Node>>,
    components: Vec<Option<Component>>,
}

impl Circuit {
    pub fn new(title: impl Into<String>) -> Self {
        Circuit {
            title: title.into(),
            nodes: Vec::new(),
            components: Vec::new(),
        }
    }

    /// Add a component with all terminals unbound and return its handle
    pub fn add_component(&mut self, component: Component) -> ComponentId {
        let id = ComponentId(self.components.len());
        self.components.push(Some(component));
        id
    }

    /// Disconnect every terminal of a component and free its slot
    pub fn remove_component(&mut self, id: ComponentId) -> Result<Component> {
        let count = self.get_component(id)?.terminal_count();
        for terminal in 0..count {
            self.disconnect_terminal(id, terminal)?;
        }
        self.components[id.0]
            .take()
            .ok_or(SimError::UnknownComponent(id))
    }

    pub fn component(&self, id: ComponentId) -> Option<&Component> {
        self.components.get(id.0).and_then(Option::as_ref)
    }

    /// Mutable access to a component's name and parameters
    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut Component> {
        self.components.get_mut(id.0).and_then(Option::as_mut)
    }

    /// Live components in list (insertion) order
    pub fn components(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|c| (ComponentId(i), c)))
    }

    pub fn component_count(&self) -> usize {
        self.components.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Live nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|n| (NodeId(i), n)))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|slot| slot.is_some()).count()
    }

    /// Potential written onto a node by the last successful simulation
    pub fn potential(&self, node: NodeId) -> Result<f64> {
        self.get_node(node).map(Node::potential)
    }

    pub(crate) fn set_potential(&mut self, node: NodeId, potential: f64) -> Result<()> {
        self.get_node_mut(node)?.potential = potential;
        Ok(())
    }

    /// True if a ground component is among the node's members
    pub fn is_grounded(&self, node: NodeId) -> bool {
        self.node(node).map_or(false, |n| {
            n.members
                .iter()
                .filter_map(|&m| self.component(m))
                .any(|c| c.kind.is_ground())
        })
    }

    /// Join terminal `terminal_a` of `a` to terminal `terminal_b` of `b`.
    ///
    /// Two empty terminals get a fresh node, one empty terminal joins the other
    /// side's node, and two bound terminals merge their nodes into the node of `a`.
    pub fn connect(
        &mut self,
        a: ComponentId,
        terminal_a: usize,
        b: ComponentId,
        terminal_b: usize,
    ) -> Result<Connection> {
        let bound_a = self.terminal_slot(a, terminal_a)?;
        let bound_b = self.terminal_slot(b, terminal_b)?;

        let connection = match (bound_a, bound_b) {
            (None, None) => {
                let node = self.allocate_node();
                self.bind(a, terminal_a, node)?;
                self.bind(b, terminal_b, node)?;
                Connection::Created(node)
            }
            (Some(node_a), Some(node_b)) if node_a == node_b => Connection::Unchanged(node_a),
            (Some(node_a), Some(node_b)) => {
                self.merge_nodes(node_a, node_b)?;
                Connection::Merged {
                    survivor: node_a,
                    retired: node_b,
                }
            }
            (Some(node), None) => {
                self.bind(b, terminal_b, node)?;
                Connection::Unchanged(node)
            }
            (None, Some(node)) => {
                self.bind(a, terminal_a, node)?;
                Connection::Unchanged(node)
            }
        };

        debug!("connect {}:{} -> {}:{} = {:?}", a, terminal_a, b, terminal_b, connection);
        Ok(connection)
    }

    /// Clear the first terminal of `component` bound to `node`
    pub fn disconnect(&mut self, component: ComponentId, node: NodeId) -> Result<Disconnection> {
        self.get_node(node)?;
        let position = self
            .get_component(component)?
            .terminals
            .iter()
            .position(|&t| t == Some(node));

        match position {
            Some(terminal) => self.disconnect_terminal(component, terminal),
            None => Ok(Disconnection::Unchanged),
        }
    }

    /// Clear one terminal slot and drop membership once no slot points at the node
    pub fn disconnect_terminal(
        &mut self,
        component: ComponentId,
        terminal: usize,
    ) -> Result<Disconnection> {
        let node = match self.terminal_slot(component, terminal)? {
            Some(node) => node,
            None => return Ok(Disconnection::Unchanged),
        };

        let still_bound = {
            let comp = self.get_component_mut(component)?;
            comp.terminals[terminal] = None;
            comp.is_connected_to(node)
        };
        if !still_bound {
            self.get_node_mut(node)?.remove_member(component);
        }

        Ok(self.retire_if_empty(node))
    }

    /// Detach several components from a node, clearing every terminal they have on it.
    ///
    /// All handles are checked before anything is changed.
    pub fn disconnect_components(
        &mut self,
        node: NodeId,
        components: &[ComponentId],
    ) -> Result<Disconnection> {
        self.get_node(node)?;
        for &id in components {
            self.get_component(id)?;
        }

        let mut detached = false;
        for &id in components {
            let comp = self.get_component_mut(id)?;
            for slot in comp.terminals.iter_mut().filter(|t| **t == Some(node)) {
                *slot = None;
                detached = true;
            }
            self.get_node_mut(node)?.remove_member(id);
        }

        if detached {
            Ok(self.retire_if_empty(node))
        } else {
            Ok(Disconnection::Unchanged)
        }
    }

    /// Check that node membership and terminal bindings agree in both directions
    pub fn is_consistent(&self) -> bool {
        let mut expected: HashMap<NodeId, Vec<ComponentId>> = HashMap::new();
        for (id, comp) in self.components() {
            for node in comp.terminals.iter().flatten() {
                if self.node(*node).is_none() {
                    return false;
                }
                let members = expected.entry(*node).or_default();
                if !members.contains(&id) {
                    members.push(id);
                }
            }
        }

        self.nodes().all(|(id, node)| {
            let mut actual = node.members.clone();
            actual.sort();
            let before = actual.len();
            actual.dedup();
            let mut wanted = expected.remove(&id).unwrap_or_default();
            wanted.sort();
            before == actual.len() && !actual.is_empty() && actual == wanted
        })
    }

    /// Print circuit summary
    pub fn print_summary(&self) {
        println!("Circuit: {}", self.title);
        println!("Nodes: {}", self.node_count());
        println!("Components: {}", self.component_count());

        let mut type_counts: Vec<(&str, usize)> = Vec::new();
        for (_, component) in self.components() {
            let label = component.kind.label();
            match type_counts.iter_mut().find(|(name, _)| *name == label) {
                Some((_, count)) => *count += 1,
                None => type_counts.push((label, 1)),
            }
        }
        for (type_name, count) in type_counts {
            println!("  {}: {}", type_name, count);
        }
    }

    fn get_component(&self, id: ComponentId) -> Result<&Component> {
        self.component(id).ok_or(SimError::UnknownComponent(id))
    }

    fn get_component_mut(&mut self, id: ComponentId) -> Result<&mut Component> {
        self.component_mut(id).ok_or(SimError::UnknownComponent(id))
    }

    fn get_node(&self, id: NodeId) -> Result<&Node> {
        self.node(id).ok_or(SimError::UnknownNode(id))
    }

    fn get_node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(SimError::UnknownNode(id))
    }

    /// Current binding of a terminal, validating both handle and index
    fn terminal_slot(&self, id: ComponentId, terminal: usize) -> Result<Option<NodeId>> {
        let comp = self.get_component(id)?;
        comp.terminals
            .get(terminal)
            .copied()
            .ok_or(SimError::InvalidTerminal {
                component: id,
                terminal,
                count: comp.terminal_count(),
            })
    }

    fn allocate_node(&mut self) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(Node::new()));
        id
    }

    fn bind(&mut self, id: ComponentId, terminal: usize, node: NodeId) -> Result<()> {
        self.get_component_mut(id)?.terminals[terminal] = Some(node);
        self.get_node_mut(node)?.add_member(id);
        Ok(())
    }

    /// Move every member and terminal of `retired` onto `survivor`, then free `retired`
    fn merge_nodes(&mut self, survivor: NodeId, retired: NodeId) -> Result<()> {
        self.get_node(survivor)?;
        let old = self.nodes[retired.0]
            .take()
            .ok_or(SimError::UnknownNode(retired))?;

        for comp in self.components.iter_mut().flatten() {
            for slot in comp.terminals.iter_mut().filter(|t| **t == Some(retired)) {
                *slot = Some(survivor);
            }
        }

        let target = self.get_node_mut(survivor)?;
        for member in old.members {
            target.add_member(member);
        }
        Ok(())
    }

    fn retire_if_empty(&mut self, node: NodeId) -> Disconnection {
        match self.node(node) {
            Some(n) if n.members.is_empty() => {
                self.nodes[node.0] = None;
                Disconnection::Destroyed(node)
            }
            _ => Disconnection::Detached(node),
        }
    }
}
