//! [`GuardedAutomaton`] – arena graph of nodes and guarded edges.
//!
//! Nodes are keyed by [`NodeId`] and edges by [`EdgeId`]; edge ids grow in
//! construction order, which is also the order the runtime considers
//! candidate edges in. Each node keeps the ids of its outgoing and incoming
//! edges so roots (no incoming) and final nodes (no outgoing) can be read
//! off directly.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tgoals_registry::Registries;
use tgoals_types::GoalError;

use crate::guard::{guards_hold, Guard};

pub type NodeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Acceptance classification of a label-automaton state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeClass {
    Plain,
    Accepting,
    Rejecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomatonKind {
    /// Built from label-automaton text; actions are carried by guards.
    Label,
    /// Built from a planner digraph; actions are carried by edges.
    Policy { is_plan: bool },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomatonNode {
    id: NodeId,
    class: NodeClass,
    outgoing: Vec<EdgeId>,
    incoming: Vec<EdgeId>,
    fluents: Vec<(String, bool)>,
}

impl AutomatonNode {
    fn new(id: NodeId, class: NodeClass) -> Self {
        Self {
            id,
            class,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            fluents: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn class(&self) -> NodeClass {
        self.class
    }

    pub fn outgoing(&self) -> &[EdgeId] {
        &self.outgoing
    }

    pub fn incoming(&self) -> &[EdgeId] {
        &self.incoming
    }

    /// Planner fluents true (or false) in this node, as `(canonical, polarity)`.
    pub fn fluents(&self) -> &[(String, bool)] {
        &self.fluents
    }

    pub fn is_root(&self) -> bool {
        self.incoming.is_empty()
    }

    pub fn is_final(&self) -> bool {
        self.outgoing.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutomatonEdge {
    id: EdgeId,
    from: NodeId,
    to: NodeId,
    guards: Vec<Guard>,
    action: Option<String>,
}

impl AutomatonEdge {
    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn from(&self) -> NodeId {
        self.from
    }

    pub fn to(&self) -> NodeId {
        self.to
    }

    pub fn guards(&self) -> &[Guard] {
        &self.guards
    }

    /// Canonical action name carried by a policy edge.
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    /// Action guards that must be `true` on this edge.
    pub fn positive_actions(&self) -> impl Iterator<Item = &Guard> {
        self.guards.iter().filter(|g| g.is_action() && g.expected)
    }

    pub fn is_unguarded(&self) -> bool {
        self.guards.is_empty()
    }

    pub fn is_verified(&self, registries: &Registries) -> Result<bool, GoalError> {
        guards_hold(&self.guards, registries)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GuardedAutomaton {
    kind: AutomatonKind,
    nodes: BTreeMap<NodeId, AutomatonNode>,
    edges: BTreeMap<EdgeId, AutomatonEdge>,
    next_edge: usize,
    initial: NodeId,
}

impl GuardedAutomaton {
    /// Empty automaton whose initial node is created immediately.
    pub fn new(kind: AutomatonKind, initial: NodeId) -> Self {
        let mut automaton = Self {
            kind,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            next_edge: 0,
            initial,
        };
        automaton.add_node(initial, NodeClass::Plain);
        automaton
    }

    /// One-node plan with no edges; the runtime idles on it forever.
    pub fn idle_plan() -> Self {
        Self::new(AutomatonKind::Policy { is_plan: true }, 0)
    }

    pub fn kind(&self) -> AutomatonKind {
        self.kind
    }

    pub fn initial(&self) -> NodeId {
        self.initial
    }

    pub fn set_initial(&mut self, id: NodeId) -> Result<(), GoalError> {
        if !self.nodes.contains_key(&id) {
            return Err(GoalError::MalformedAutomaton(format!(
                "initial node {id} does not exist"
            )));
        }
        self.initial = id;
        Ok(())
    }

    /// Insert a node, or upgrade the class of an existing one.
    pub fn add_node(&mut self, id: NodeId, class: NodeClass) -> &mut AutomatonNode {
        let node = self
            .nodes
            .entry(id)
            .or_insert_with(|| AutomatonNode::new(id, class));
        if class != NodeClass::Plain {
            node.class = class;
        }
        node
    }

    pub(crate) fn set_fluents(&mut self, id: NodeId, fluents: Vec<(String, bool)>) {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.fluents = fluents;
        }
    }

    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        guards: Vec<Guard>,
        action: Option<String>,
    ) -> Result<EdgeId, GoalError> {
        for endpoint in [from, to] {
            if !self.nodes.contains_key(&endpoint) {
                return Err(GoalError::MalformedAutomaton(format!(
                    "edge {from} -> {to} references undeclared node {endpoint}"
                )));
            }
        }
        let id = EdgeId(self.next_edge);
        self.next_edge += 1;
        self.edges.insert(
            id,
            AutomatonEdge {
                id,
                from,
                to,
                guards,
                action,
            },
        );
        if let Some(node) = self.nodes.get_mut(&from) {
            node.outgoing.push(id);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.incoming.push(id);
        }
        Ok(id)
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Option<AutomatonEdge> {
        let edge = self.edges.remove(&id)?;
        if let Some(node) = self.nodes.get_mut(&edge.from) {
            node.outgoing.retain(|e| *e != id);
        }
        if let Some(node) = self.nodes.get_mut(&edge.to) {
            node.incoming.retain(|e| *e != id);
        }
        Some(edge)
    }

    /// Remove a node together with every edge touching it.
    pub fn remove_node(&mut self, id: NodeId) -> Option<AutomatonNode> {
        let node = self.nodes.get(&id)?;
        let attached: Vec<EdgeId> = node
            .outgoing
            .iter()
            .chain(node.incoming.iter())
            .copied()
            .collect();
        for edge in attached {
            self.remove_edge(edge);
        }
        self.nodes.remove(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&AutomatonNode> {
        self.nodes.get(&id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&AutomatonEdge> {
        self.edges.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &AutomatonNode> {
        self.nodes.values()
    }

    /// Edges in construction order.
    pub fn edges(&self) -> impl Iterator<Item = &AutomatonEdge> {
        self.edges.values()
    }

    /// Outgoing edges of `id` in construction order.
    pub fn outgoing(&self, id: NodeId) -> Vec<&AutomatonEdge> {
        let mut edges: Vec<&AutomatonEdge> = self
            .nodes
            .get(&id)
            .map(|n| n.outgoing.iter().filter_map(|e| self.edges.get(e)).collect())
            .unwrap_or_default();
        edges.sort_by_key(|e| e.id);
        edges
    }

    pub fn accepting(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_of_class(NodeClass::Accepting)
    }

    pub fn rejecting(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes_of_class(NodeClass::Rejecting)
    }

    fn nodes_of_class(&self, class: NodeClass) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .values()
            .filter(move |n| n.class == class)
            .map(|n| n.id)
    }

    pub fn is_accepting(&self, id: NodeId) -> bool {
        self.nodes
            .get(&id)
            .is_some_and(|n| n.class == NodeClass::Accepting)
    }

    /// Number of terminal-classified nodes: accepting plus rejecting states
    /// for label automata, final nodes for policies.
    pub fn terminal_count(&self) -> usize {
        match self.kind {
            AutomatonKind::Label => self
                .nodes
                .values()
                .filter(|n| n.class != NodeClass::Plain)
                .count(),
            AutomatonKind::Policy { .. } => self.nodes.values().filter(|n| n.is_final()).count(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}

impl fmt::Display for GuardedAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            AutomatonKind::Label => "label automaton",
            AutomatonKind::Policy { is_plan: true } => "plan",
            AutomatonKind::Policy { is_plan: false } => "policy",
        };
        writeln!(
            f,
            "{kind}: {} nodes, {} edges, initial {}",
            self.nodes.len(),
            self.edges.len(),
            self.initial
        )?;
        for edge in self.edges.values() {
            let guards: Vec<String> = edge.guards.iter().map(ToString::to_string).collect();
            write!(f, "  {} -> {} [{}]", edge.from, edge.to, guards.join(" & "))?;
            if let Some(action) = &edge.action {
                write!(f, " / {action}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
