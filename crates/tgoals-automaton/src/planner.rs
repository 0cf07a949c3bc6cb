//! Planner digraphs and their conversion into policy automata.
//!
//! A planner emits a directed graph whose nodes are labeled with the set of
//! atoms true (or false) in that state, `{(ball-seen), (not (near ball))}`,
//! and whose edges are labeled with the action to perform, `kick ball`.
//!
//! Atoms naming a registered fluent become node fluents. The guard of an
//! edge lists the destination polarity of every fluent that changes along
//! the edge; edges leaving a root node carry every fluent of their
//! destination, since nothing has been observed yet when the robot starts.

use std::collections::BTreeMap;

use tgoals_registry::Registries;
use tgoals_types::{GoalError, StoreKind};
use tracing::debug;

use crate::guard::{Guard, GuardTarget};
use crate::model::{AutomatonKind, GuardedAutomaton, NodeClass, NodeId};

// ────────────────────────────────────────────────────────────────────────────
// Digraph
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// Action label used by policies.
    pub label: Option<String>,
    /// Action label used by plans.
    pub action: Option<String>,
}

/// Planner output as plain data: labeled nodes and labeled edges, in the
/// order the planner produced them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannerDigraph {
    nodes: BTreeMap<NodeId, String>,
    edges: Vec<PlannerEdge>,
}

impl PlannerDigraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or relabel a node.
    pub fn add_node(&mut self, id: NodeId, label: impl Into<String>) {
        self.nodes.insert(id, label.into());
    }

    pub(crate) fn ensure_node(&mut self, id: NodeId) {
        self.nodes.entry(id).or_default();
    }

    /// Add a policy edge carrying `label`. Missing endpoints are created
    /// with an empty label.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: impl Into<String>) {
        self.push_edge(from, to, Some(label.into()), None);
    }

    /// Add a plan edge carrying `action`.
    pub fn add_plan_edge(&mut self, from: NodeId, to: NodeId, action: impl Into<String>) {
        self.push_edge(from, to, None, Some(action.into()));
    }

    pub(crate) fn push_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        label: Option<String>,
        action: Option<String>,
    ) {
        self.nodes.entry(from).or_default();
        self.nodes.entry(to).or_default();
        self.edges.push(PlannerEdge {
            from,
            to,
            label,
            action,
        });
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &str)> {
        self.nodes.iter().map(|(id, label)| (*id, label.as_str()))
    }

    pub fn edges(&self) -> &[PlannerEdge] {
        &self.edges
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Node labels
// ────────────────────────────────────────────────────────────────────────────

/// One atom of a node label, `(name arg…)` or `(not (name arg…))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluentAtom {
    pub name: String,
    pub args: Vec<String>,
    pub positive: bool,
}

/// Split a node label into atoms. Surrounding quotes and braces are optional.
pub fn parse_node_label(label: &str) -> Result<Vec<FluentAtom>, GoalError> {
    let body = label
        .trim()
        .trim_matches('"')
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}');
    let mut atoms = Vec::new();
    for raw in body.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (inner, positive) = if let Some(rest) = raw.strip_prefix("(not (") {
            let inner = rest.strip_suffix("))").ok_or_else(|| bad_atom(raw))?;
            (inner, false)
        } else if let Some(rest) = raw.strip_prefix('(') {
            let inner = rest.strip_suffix(')').ok_or_else(|| bad_atom(raw))?;
            (inner, true)
        } else {
            return Err(bad_atom(raw));
        };
        let mut words = inner.split_whitespace();
        let name = words.next().ok_or_else(|| bad_atom(raw))?.to_string();
        atoms.push(FluentAtom {
            name,
            args: words.map(str::to_string).collect(),
            positive,
        });
    }
    Ok(atoms)
}

fn bad_atom(raw: &str) -> GoalError {
    GoalError::MalformedAutomaton(format!("invalid node atom '{raw}'"))
}

/// Canonical fluent an atom refers to. Atoms that do not name a fluent are
/// skipped, unless they carry the fluent prefix.
fn resolve_atom(atom: &FluentAtom, registries: &Registries) -> Result<Option<String>, GoalError> {
    let fluents = registries.store(StoreKind::Fluent);
    let underscored = atom.name.replace('-', "_");
    if let Some(name) = fluents
        .resolve_name(&atom.name)
        .or_else(|| fluents.resolve_name(&underscored))
    {
        return Ok(Some(name));
    }
    if underscored.to_lowercase().starts_with(StoreKind::Fluent.prefix()) {
        return Err(GoalError::UnknownParameter(atom.name.clone()));
    }
    debug!(atom = %atom.name, "node atom is not a fluent, ignored");
    Ok(None)
}

/// Split an edge label into template name and positional arguments.
fn parse_action_label(raw: &str) -> Result<(String, Vec<String>), GoalError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '(' | ')'))
        .collect();
    let mut words = cleaned.split_whitespace();
    let template = words.next().ok_or_else(|| {
        GoalError::MalformedAutomaton(format!("empty action label '{raw}'"))
    })?;
    Ok((template.to_string(), words.map(str::to_string).collect()))
}

// ────────────────────────────────────────────────────────────────────────────
// Construction
// ────────────────────────────────────────────────────────────────────────────

impl GuardedAutomaton {
    /// Build a policy: fluent-labeled nodes, action-labeled edges.
    pub fn from_policy_digraph(
        graph: &PlannerDigraph,
        registries: &mut Registries,
    ) -> Result<Self, GoalError> {
        Self::from_digraph(graph, registries, false)
    }

    /// Build a plan: a policy whose nodes carry no fluents and whose edges
    /// read their action from the `action` attribute.
    pub fn from_plan_digraph(
        graph: &PlannerDigraph,
        registries: &mut Registries,
    ) -> Result<Self, GoalError> {
        Self::from_digraph(graph, registries, true)
    }

    fn from_digraph(
        graph: &PlannerDigraph,
        registries: &mut Registries,
        is_plan: bool,
    ) -> Result<Self, GoalError> {
        let mut fluents: BTreeMap<NodeId, Vec<(String, bool)>> = BTreeMap::new();
        for (id, label) in graph.nodes() {
            let mut node_fluents = Vec::new();
            if !is_plan {
                for atom in parse_node_label(label)? {
                    if let Some(name) = resolve_atom(&atom, registries)? {
                        if !node_fluents.iter().any(|(n, _)| *n == name) {
                            node_fluents.push((name, atom.positive));
                        }
                    }
                }
            }
            fluents.insert(id, node_fluents);
        }

        let has_incoming = |id: NodeId| graph.edges().iter().any(|e| e.to == id);

        // Guards first, so a malformed graph registers no actions.
        let mut guards = Vec::with_capacity(graph.edges().len());
        for edge in graph.edges() {
            let empty = Vec::new();
            let source = fluents.get(&edge.from).unwrap_or(&empty);
            let destination = fluents.get(&edge.to).unwrap_or(&empty);
            let source_is_root = !has_incoming(edge.from);
            let mut edge_guards = Vec::new();
            for (name, polarity) in source {
                let Some((_, target_polarity)) = destination.iter().find(|(n, _)| n == name) else {
                    return Err(GoalError::MalformedAutomaton(format!(
                        "fluent '{name}' of node {} is missing from node {}",
                        edge.from, edge.to
                    )));
                };
                if polarity != target_polarity || source_is_root {
                    edge_guards.push(Guard::new(name.clone(), *target_polarity, GuardTarget::Fluent));
                }
            }
            guards.push(edge_guards);
        }

        let initial = if fluents.contains_key(&0) {
            0
        } else {
            fluents
                .keys()
                .copied()
                .find(|id| !has_incoming(*id))
                .ok_or_else(|| GoalError::MalformedAutomaton("digraph has no root node".to_string()))?
        };

        let mut automaton = GuardedAutomaton::new(AutomatonKind::Policy { is_plan }, initial);
        for (id, node_fluents) in fluents {
            automaton.add_node(id, NodeClass::Plain);
            automaton.set_fluents(id, node_fluents);
        }
        // Actions minted so far are dropped again if a later edge fails.
        let mut minted = Vec::new();
        if let Err(e) = Self::add_action_edges(&mut automaton, graph, guards, registries, is_plan, &mut minted) {
            registries.discard_actions(&minted);
            return Err(e);
        }

        debug!(
            nodes = automaton.node_count(),
            edges = automaton.edge_count(),
            initial,
            is_plan,
            "policy built from planner digraph"
        );
        Ok(automaton)
    }

    fn add_action_edges(
        automaton: &mut GuardedAutomaton,
        graph: &PlannerDigraph,
        guards: Vec<Vec<Guard>>,
        registries: &mut Registries,
        is_plan: bool,
        minted: &mut Vec<String>,
    ) -> Result<(), GoalError> {
        for (edge, edge_guards) in graph.edges().iter().zip(guards) {
            let raw = if is_plan {
                edge.action.as_ref().or(edge.label.as_ref())
            } else {
                edge.label.as_ref().or(edge.action.as_ref())
            }
            .ok_or_else(|| {
                GoalError::MalformedAutomaton(format!(
                    "edge {} -> {} has no action label",
                    edge.from, edge.to
                ))
            })?;
            let (template, args) = parse_action_label(raw)?;
            let action = registries.instantiate_action(&template, &args)?;
            minted.push(action.clone());
            automaton.add_edge(edge.from, edge.to, edge_guards, Some(action))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tgoals_registry::{ActionTemplate, ParamSelector, RegistryConfig};

    fn registries() -> Registries {
        let mut reg = Registries::new(RegistryConfig::default());
        reg.set(StoreKind::Fluent, "near", false, None).unwrap();
        reg.set(StoreKind::Fluent, "ball_seen", false, None).unwrap();
        reg.register_action_template(ActionTemplate::new("search", "Search"))
            .unwrap();
        reg.register_action_template(
            ActionTemplate::new("kick", "Kick").with_selection(vec![ParamSelector::Index(0)]),
        )
        .unwrap();
        reg
    }

    #[test]
    fn node_labels_split_into_atoms() {
        let atoms = parse_node_label("\"{(ball-seen), (not (near ball)), }\"").unwrap();
        assert_eq!(
            atoms,
            vec![
                FluentAtom { name: "ball-seen".into(), args: vec![], positive: true },
                FluentAtom { name: "near".into(), args: vec!["ball".into()], positive: false },
            ]
        );
        assert!(parse_node_label("{near}").is_err());
        assert!(parse_node_label("{}").unwrap().is_empty());
    }

    #[test]
    fn action_labels_drop_quotes_and_parentheses() {
        assert_eq!(
            parse_action_label("\"(kick ball)\"").unwrap(),
            ("kick".to_string(), vec!["ball".to_string()])
        );
        assert!(parse_action_label("  ").is_err());
    }

    #[test]
    fn policy_guards_follow_fluent_changes() {
        let mut reg = registries();
        let mut graph = PlannerDigraph::new();
        graph.add_node(0, "{(not (near)), (not (ball-seen))}");
        graph.add_node(1, "{(not (near)), (ball-seen)}");
        graph.add_node(2, "{(near), (ball-seen)}");
        graph.add_edge(0, 1, "search");
        graph.add_edge(1, 2, "kick ball");

        let policy = GuardedAutomaton::from_policy_digraph(&graph, &mut reg).unwrap();
        assert_eq!(policy.kind(), AutomatonKind::Policy { is_plan: false });
        assert_eq!(policy.initial(), 0);

        // Root edge carries every destination fluent.
        let first = policy.outgoing(0)[0];
        assert_eq!(
            first.guards(),
            [
                Guard::new("fluent_near", false, GuardTarget::Fluent),
                Guard::new("fluent_ball_seen", true, GuardTarget::Fluent),
            ]
        );
        // Later edges only carry what changed.
        let second = policy.outgoing(1)[0];
        assert_eq!(second.guards(), [Guard::new("fluent_near", true, GuardTarget::Fluent)]);

        let action = reg.action(second.action().unwrap()).unwrap();
        assert_eq!(action.skill(), "Kick");
        assert_eq!(action.base_name(), "kick");
        assert_eq!(policy.node(2).unwrap().fluents().len(), 2);
    }

    #[test]
    fn unregistered_prefixed_fluent_is_an_error() {
        let mut reg = registries();
        let mut graph = PlannerDigraph::new();
        graph.add_node(0, "{(fluent-has-ball)}");
        assert!(matches!(
            GuardedAutomaton::from_policy_digraph(&graph, &mut reg),
            Err(GoalError::UnknownParameter(_))
        ));
    }

    #[test]
    fn non_fluent_atoms_are_ignored() {
        let mut reg = registries();
        let mut graph = PlannerDigraph::new();
        graph.add_node(0, "{(at robot field), (near)}");
        let policy = GuardedAutomaton::from_policy_digraph(&graph, &mut reg).unwrap();
        assert_eq!(
            policy.node(0).unwrap().fluents(),
            [("fluent_near".to_string(), true)]
        );
    }

    #[test]
    fn fluent_missing_in_destination_is_malformed() {
        let mut reg = registries();
        let mut graph = PlannerDigraph::new();
        graph.add_node(0, "{(near)}");
        graph.add_node(1, "{(ball-seen)}");
        graph.add_edge(0, 1, "search");
        let before = reg.actions().len();
        assert!(matches!(
            GuardedAutomaton::from_policy_digraph(&graph, &mut reg),
            Err(GoalError::MalformedAutomaton(_))
        ));
        assert_eq!(reg.actions().len(), before);
    }

    #[test]
    fn initial_falls_back_to_first_root() {
        let mut reg = registries();
        let mut graph = PlannerDigraph::new();
        graph.add_plan_edge(5, 3, "(search)");
        graph.add_plan_edge(3, 4, "(check-ball)");
        let plan = GuardedAutomaton::from_plan_digraph(&graph, &mut reg).unwrap();
        assert_eq!(plan.initial(), 5);
        let check = plan.outgoing(3)[0].action().unwrap();
        assert_eq!(reg.action(check).unwrap().skill(), "Idle");
    }

    #[test]
    fn failed_build_leaves_no_minted_actions() {
        let mut reg = registries();
        let mut graph = PlannerDigraph::new();
        graph.add_node(0, "{(not (near))}");
        graph.add_node(1, "{(near)}");
        graph.add_node(2, "{(near)}");
        graph.add_edge(0, 1, "search");
        graph.add_edge(1, 2, "kick ball");
        graph.add_edge(2, 0, "dance");
        let before = reg.actions().len();
        assert!(matches!(
            GuardedAutomaton::from_policy_digraph(&graph, &mut reg),
            Err(GoalError::UnknownTemplate(_))
        ));
        assert_eq!(reg.actions().len(), before);
        assert!(!reg.actions().actions().any(|a| a.base_name() == "search"));
    }

    #[test]
    fn unknown_template_propagates() {
        let mut reg = registries();
        let mut graph = PlannerDigraph::new();
        graph.add_plan_edge(0, 1, "(dance)");
        assert!(matches!(
            GuardedAutomaton::from_plan_digraph(&graph, &mut reg),
            Err(GoalError::UnknownTemplate(_))
        ));
    }
}
