//! [`AutomatonRuntime`] – steps a [`GuardedAutomaton`] against the live stores.
//!
//! Each call to [`AutomatonRuntime::get_next_action`] looks at the outgoing
//! edges of the current node, keeps those whose guards hold right now, picks
//! one according to the automaton kind, and returns the action to send to the
//! robot. There is no terminal state: when nothing qualifies the runtime stays
//! where it is and keeps issuing the previous action (label automata) or the
//! idle action (policies).
//!
//! # Selection rules
//!
//! | Kind | Candidates | Choice |
//! |------|------------|--------|
//! | Label | verified edges with exactly one positive action guard | first in construction order, else the held edge |
//! | Policy | verified edges, only once the last action completed or was idle | the only one; of two, the guarded one; none → idle |
//!
//! Every change of held edge appends a [`TraceEntry`]. The trace starts with
//! a synthetic idle entry at the initial node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tgoals_registry::{Action, IDLE_ACTION, Registries};
use tgoals_types::GoalError;
use tracing::{debug, info, warn};

use crate::model::{AutomatonEdge, AutomatonKind, EdgeId, GuardedAutomaton, NodeId};
use crate::postprocess::Postprocess;

/// One transition the runtime took.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// `None` for the seed entry and for falling back to idle.
    pub edge: Option<EdgeId>,
    /// Canonical name of the action issued.
    pub action: String,
    pub destination: NodeId,
    pub timestamp: DateTime<Utc>,
}

impl TraceEntry {
    fn idle_at(node: NodeId) -> Self {
        Self {
            edge: None,
            action: IDLE_ACTION.to_string(),
            destination: node,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct AutomatonRuntime {
    automaton: GuardedAutomaton,
    current_node: NodeId,
    previous_node: Option<NodeId>,
    current_edge: Option<EdgeId>,
    trace: Vec<TraceEntry>,
}

impl AutomatonRuntime {
    pub fn new(automaton: GuardedAutomaton) -> Self {
        let initial = automaton.initial();
        Self {
            automaton,
            current_node: initial,
            previous_node: None,
            current_edge: None,
            trace: vec![TraceEntry::idle_at(initial)],
        }
    }

    /// Apply `steps` in order before starting.
    pub fn with_postprocessing(mut automaton: GuardedAutomaton, steps: &[Postprocess]) -> Self {
        for step in steps {
            step(&mut automaton);
        }
        Self::new(automaton)
    }

    pub fn automaton(&self) -> &GuardedAutomaton {
        &self.automaton
    }

    /// Back to the initial node with a fresh trace.
    pub fn reset(&mut self) {
        let initial = self.automaton.initial();
        self.current_node = initial;
        self.previous_node = None;
        self.current_edge = None;
        self.trace = vec![TraceEntry::idle_at(initial)];
        debug!(initial, "runtime reset");
    }

    /// Take at most one transition and return the action to perform.
    pub fn get_next_action(&mut self, registries: &Registries, verbose: bool) -> Result<Action, GoalError> {
        let chosen = match self.automaton.kind() {
            AutomatonKind::Label => self.choose_label_edge(registries)?,
            AutomatonKind::Policy { is_plan } => self.choose_policy_edge(registries, is_plan)?,
        };

        let (action, destination) = match chosen {
            Some(id) => {
                let edge = self.automaton.edge(id).ok_or_else(|| {
                    GoalError::MalformedAutomaton(format!("held edge {id} no longer exists"))
                })?;
                (self.edge_action(edge)?, edge.to())
            }
            None => (IDLE_ACTION.to_string(), self.current_node),
        };

        if chosen != self.current_edge {
            if verbose {
                info!(from = self.current_node, to = destination, action = %action, "transition");
            } else {
                debug!(from = self.current_node, to = destination, action = %action, "transition");
            }
            self.trace.push(TraceEntry {
                edge: chosen,
                action: action.clone(),
                destination,
                timestamp: Utc::now(),
            });
            self.previous_node = Some(self.current_node);
            self.current_node = destination;
            self.current_edge = chosen;
        } else if verbose {
            info!(node = self.current_node, action = %action, "holding current action");
        }

        lookup(registries, &action)
    }

    fn verified_edges(&self, registries: &Registries) -> Result<Vec<&AutomatonEdge>, GoalError> {
        let mut verified = Vec::new();
        for edge in self.automaton.outgoing(self.current_node) {
            if edge.is_verified(registries)? {
                verified.push(edge);
            }
        }
        Ok(verified)
    }

    fn choose_label_edge(&self, registries: &Registries) -> Result<Option<EdgeId>, GoalError> {
        let mut candidates = Vec::new();
        for edge in self.verified_edges(registries)? {
            match edge.positive_actions().count() {
                0 => {}
                1 => candidates.push(edge.id()),
                n => {
                    return Err(GoalError::ConsistencyViolation {
                        node: self.current_node,
                        details: format!("edge {} requires {n} actions at once", edge.id()),
                    });
                }
            }
        }
        Ok(candidates.first().copied().or(self.current_edge))
    }

    fn choose_policy_edge(&self, registries: &Registries, is_plan: bool) -> Result<Option<EdgeId>, GoalError> {
        let outgoing = self.automaton.outgoing(self.current_node).len();
        if is_plan && outgoing > 1 {
            return Err(GoalError::ConsistencyViolation {
                node: self.current_node,
                details: format!("plan node has {outgoing} outgoing edges"),
            });
        }
        if !self.last_action_settled(registries) {
            return Ok(self.current_edge);
        }
        let verified = self.verified_edges(registries)?;
        match verified.as_slice() {
            [] => Ok(None),
            [only] => Ok(Some(only.id())),
            [first, second] => match (first.is_unguarded(), second.is_unguarded()) {
                (true, false) => Ok(Some(second.id())),
                (false, true) => Ok(Some(first.id())),
                _ => Err(GoalError::ConsistencyViolation {
                    node: self.current_node,
                    details: format!(
                        "edges {} and {} are both verified and neither is the default branch",
                        first.id(),
                        second.id()
                    ),
                }),
            },
            more => Err(GoalError::ConsistencyViolation {
                node: self.current_node,
                details: format!("{} outgoing edges are verified at once", more.len()),
            }),
        }
    }

    /// Whether the last issued action finished or was idle.
    fn last_action_settled(&self, registries: &Registries) -> bool {
        let last = self.current_action_name();
        match registries.action(last) {
            Some(action) => action.completed() || registries.actions().is_idle(action),
            None => {
                warn!(action = %last, "last issued action is gone, treating it as finished");
                true
            }
        }
    }

    fn edge_action(&self, edge: &AutomatonEdge) -> Result<String, GoalError> {
        match self.automaton.kind() {
            AutomatonKind::Label => {
                let mut actions = edge.positive_actions();
                match (actions.next(), actions.next()) {
                    (Some(guard), None) => Ok(guard.name.clone()),
                    _ => Err(GoalError::ConsistencyViolation {
                        node: edge.from(),
                        details: format!("edge {} does not carry exactly one action", edge.id()),
                    }),
                }
            }
            AutomatonKind::Policy { .. } => edge.action().map(str::to_string).ok_or_else(|| {
                GoalError::MalformedAutomaton(format!("policy edge {} has no action", edge.id()))
            }),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Accessors
    // ────────────────────────────────────────────────────────────────────────

    pub fn current_node(&self) -> NodeId {
        self.current_node
    }

    pub fn previous_node(&self) -> Option<NodeId> {
        self.previous_node
    }

    pub fn current_edge(&self) -> Option<EdgeId> {
        self.current_edge
    }

    pub fn current_action_name(&self) -> &str {
        match self.trace.as_slice() {
            [] | [_] => IDLE_ACTION,
            [.., last] => &last.action,
        }
    }

    pub fn previous_action_name(&self) -> &str {
        match self.trace.as_slice() {
            [.., previous, _] => &previous.action,
            _ => IDLE_ACTION,
        }
    }

    pub fn current_action(&self, registries: &Registries) -> Result<Action, GoalError> {
        lookup(registries, self.current_action_name())
    }

    pub fn previous_action(&self, registries: &Registries) -> Result<Action, GoalError> {
        lookup(registries, self.previous_action_name())
    }

    pub fn last_transition_timestamp(&self) -> Option<DateTime<Utc>> {
        self.trace.last().map(|entry| entry.timestamp)
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// One line per trace entry: destination, edge and action with its skill.
    pub fn trace_summary(&self, registries: &Registries) -> String {
        let mut summary = String::new();
        for (step, entry) in self.trace.iter().enumerate() {
            let edge = entry
                .edge
                .map(|e| e.to_string())
                .unwrap_or_else(|| "-".to_string());
            let skill = registries
                .action(&entry.action)
                .map(|a| a.skill().to_string())
                .unwrap_or_else(|| "?".to_string());
            summary.push_str(&format!(
                "{step:>3}  node {:<4} {edge:<5} {} ({skill}) @ {}\n",
                entry.destination,
                entry.action,
                entry.timestamp.format("%H:%M:%S%.3f")
            ));
        }
        summary
    }
}

fn lookup(registries: &Registries, name: &str) -> Result<Action, GoalError> {
    registries
        .action(name)
        .cloned()
        .ok_or_else(|| GoalError::UnknownParameter(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::{Guard, GuardTarget};
    use crate::model::NodeClass;
    use crate::planner::PlannerDigraph;
    use crate::postprocess::remove_dummy_initial_state;
    use tgoals_registry::{ActionTemplate, RegistryConfig};
    use tgoals_types::StoreKind;

    const KICK_WHEN_NEAR: &str = "\
DFA for formula with free variables: near kick
Initial state: 0
Accepting states: 1
Rejecting states: 0
Transitions:
State 0: 0X -> 0
State 0: 11 -> 1
State 1: XX -> 1
";

    fn label_registries() -> Registries {
        let mut reg = Registries::new(RegistryConfig::default());
        reg.set(StoreKind::Literal, "near", false, None).unwrap();
        reg.set(StoreKind::Action, "kick", "Kick", None).unwrap();
        reg
    }

    fn search_then_kick(reg: &mut Registries) -> GuardedAutomaton {
        reg.set(StoreKind::Fluent, "near", false, None).unwrap();
        reg.register_action_template(ActionTemplate::new("search", "Search"))
            .unwrap();
        reg.register_action_template(ActionTemplate::new("kick", "Kick"))
            .unwrap();
        let mut graph = PlannerDigraph::new();
        graph.add_node(0, "{}");
        graph.add_node(1, "{(not (near))}");
        graph.add_node(2, "{(near)}");
        graph.add_edge(0, 1, "search");
        graph.add_edge(1, 1, "search");
        graph.add_edge(1, 2, "kick");
        GuardedAutomaton::from_policy_digraph(&graph, reg).unwrap()
    }

    #[test]
    fn starts_idle_with_seeded_trace() {
        let reg = label_registries();
        let a = GuardedAutomaton::from_label_text(KICK_WHEN_NEAR, &reg).unwrap();
        let rt = AutomatonRuntime::new(a);
        assert_eq!(rt.trace().len(), 1);
        assert_eq!(rt.current_action(&reg).unwrap().name(), IDLE_ACTION);
        assert_eq!(rt.previous_action(&reg).unwrap().name(), IDLE_ACTION);
        assert_eq!(rt.previous_node(), None);
        assert!(rt.last_transition_timestamp().is_some());
    }

    #[test]
    fn label_automaton_round_trip_with_persistence() {
        let mut reg = label_registries();
        let a = GuardedAutomaton::from_label_text(KICK_WHEN_NEAR, &reg).unwrap();
        let mut rt = AutomatonRuntime::new(a);

        // Not near: the only verified edge carries no action, so idle.
        let action = rt.get_next_action(&reg, false).unwrap();
        assert_eq!(action.name(), IDLE_ACTION);
        assert_eq!(rt.current_node(), 0);
        assert_eq!(rt.trace().len(), 1);

        reg.set(StoreKind::Literal, "near", true, None).unwrap();
        let action = rt.get_next_action(&reg, true).unwrap();
        assert_eq!(action.name(), "action_kick");
        assert_eq!(rt.current_node(), 1);
        assert_eq!(rt.previous_node(), Some(0));
        assert_eq!(rt.trace().len(), 2);

        // Node 1 has no action edge: the held edge persists.
        reg.set(StoreKind::Literal, "near", false, None).unwrap();
        let action = rt.get_next_action(&reg, false).unwrap();
        assert_eq!(action.name(), "action_kick");
        assert_eq!(rt.current_node(), 1);
        assert_eq!(rt.trace().len(), 2);
        assert_eq!(rt.current_action_name(), "action_kick");
        assert_eq!(rt.previous_action_name(), IDLE_ACTION);
    }

    #[test]
    fn label_edge_with_two_actions_is_inconsistent() {
        let mut reg = label_registries();
        reg.set(StoreKind::Action, "walk", "Walk", None).unwrap();
        let mut a = GuardedAutomaton::new(AutomatonKind::Label, 0);
        a.add_node(1, NodeClass::Accepting);
        a.add_edge(
            0,
            1,
            vec![
                Guard::new("action_kick", true, GuardTarget::Action),
                Guard::new("action_walk", true, GuardTarget::Action),
            ],
            None,
        )
        .unwrap();
        let mut rt = AutomatonRuntime::new(a);
        assert!(matches!(
            rt.get_next_action(&reg, false),
            Err(GoalError::ConsistencyViolation { node: 0, .. })
        ));
    }

    #[test]
    fn policy_prefers_guarded_edge_over_default() {
        let mut reg = Registries::new(RegistryConfig::default());
        let policy = search_then_kick(&mut reg);
        let mut rt = AutomatonRuntime::new(policy);

        let first = rt.get_next_action(&reg, false).unwrap();
        assert_eq!(first.skill(), "Search");
        assert_eq!(rt.current_node(), 1);

        // Not completed yet: the same action is re-issued even though the
        // world changed.
        reg.set(StoreKind::Fluent, "near", true, None).unwrap();
        let again = rt.get_next_action(&reg, false).unwrap();
        assert_eq!(again.name(), first.name());
        assert_eq!(rt.trace().len(), 2);

        reg.set(StoreKind::Fluent, "near", false, None).unwrap();
        reg.signal_action_completed(first.name()).unwrap();
        let looping = rt.get_next_action(&reg, false).unwrap();
        assert_eq!(looping.skill(), "Search");
        assert_ne!(looping.name(), first.name());
        assert_eq!(rt.current_node(), 1);

        reg.signal_action_completed(looping.name()).unwrap();
        reg.set(StoreKind::Fluent, "near", true, None).unwrap();
        let kick = rt.get_next_action(&reg, false).unwrap();
        assert_eq!(kick.skill(), "Kick");
        assert_eq!(rt.current_node(), 2);
        assert_eq!(rt.trace().len(), 4);
    }

    #[test]
    fn policy_idles_when_nothing_is_verified() {
        let mut reg = Registries::new(RegistryConfig::default());
        reg.set(StoreKind::Fluent, "near", false, None).unwrap();
        reg.register_action_template(ActionTemplate::new("kick", "Kick"))
            .unwrap();
        let mut graph = PlannerDigraph::new();
        graph.add_node(0, "{(not (near))}");
        graph.add_node(1, "{(near)}");
        graph.add_edge(0, 1, "kick");
        let mut rt = AutomatonRuntime::new(GuardedAutomaton::from_policy_digraph(&graph, &mut reg).unwrap());

        let action = rt.get_next_action(&reg, false).unwrap();
        assert_eq!(action.name(), IDLE_ACTION);
        assert_eq!(rt.current_node(), 0);
    }

    #[test]
    fn two_default_branches_are_inconsistent() {
        let mut reg = Registries::new(RegistryConfig::default());
        reg.set(StoreKind::Action, "a", "A", None).unwrap();
        reg.set(StoreKind::Action, "b", "B", None).unwrap();
        let mut policy = GuardedAutomaton::new(AutomatonKind::Policy { is_plan: false }, 0);
        policy.add_node(1, NodeClass::Plain);
        policy.add_node(2, NodeClass::Plain);
        policy.add_edge(0, 1, vec![], Some("action_a".into())).unwrap();
        policy.add_edge(0, 2, vec![], Some("action_b".into())).unwrap();
        let mut rt = AutomatonRuntime::new(policy);
        assert!(matches!(
            rt.get_next_action(&reg, false),
            Err(GoalError::ConsistencyViolation { .. })
        ));
    }

    #[test]
    fn plan_nodes_have_at_most_one_edge() {
        let mut reg = Registries::new(RegistryConfig::default());
        reg.set(StoreKind::Action, "a", "A", None).unwrap();
        let mut plan = GuardedAutomaton::new(AutomatonKind::Policy { is_plan: true }, 0);
        plan.add_node(1, NodeClass::Plain);
        plan.add_edge(0, 1, vec![], Some("action_a".into())).unwrap();
        plan.add_edge(0, 0, vec![], Some("action_a".into())).unwrap();
        let mut rt = AutomatonRuntime::new(plan);
        assert!(matches!(
            rt.get_next_action(&reg, false),
            Err(GoalError::ConsistencyViolation { .. })
        ));
    }

    #[test]
    fn idle_plan_always_idles() {
        let reg = Registries::new(RegistryConfig::default());
        let mut rt = AutomatonRuntime::new(GuardedAutomaton::idle_plan());
        for _ in 0..3 {
            assert_eq!(rt.get_next_action(&reg, false).unwrap().skill(), "Idle");
        }
        assert_eq!(rt.trace().len(), 1);
    }

    #[test]
    fn postprocessing_skips_dummy_initial_state() {
        let reg = label_registries();
        let text = "\
DFA for formula with free variables: near kick
Initial state: 1
Accepting states: 2
Rejecting states: 1
State 1: XX -> 2
State 2: 11 -> 2
";
        let a = GuardedAutomaton::from_label_text(text, &reg).unwrap();
        let rt = AutomatonRuntime::with_postprocessing(a, &[remove_dummy_initial_state]);
        assert_eq!(rt.current_node(), 2);
        assert_eq!(rt.automaton().initial(), 2);
        assert_eq!(rt.trace()[0].destination, 2);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut reg = label_registries();
        let a = GuardedAutomaton::from_label_text(KICK_WHEN_NEAR, &reg).unwrap();
        let mut rt = AutomatonRuntime::new(a);
        reg.set(StoreKind::Literal, "near", true, None).unwrap();
        rt.get_next_action(&reg, false).unwrap();
        assert_eq!(rt.current_node(), 1);

        rt.reset();
        assert_eq!(rt.current_node(), 0);
        assert_eq!(rt.current_edge(), None);
        assert_eq!(rt.trace().len(), 1);
    }

    #[test]
    fn trace_serializes_and_summarizes() {
        let mut reg = label_registries();
        let a = GuardedAutomaton::from_label_text(KICK_WHEN_NEAR, &reg).unwrap();
        let mut rt = AutomatonRuntime::new(a);
        reg.set(StoreKind::Literal, "near", true, None).unwrap();
        rt.get_next_action(&reg, false).unwrap();

        let json = serde_json::to_value(rt.trace()).unwrap();
        assert_eq!(json[1]["action"], "action_kick");
        assert_eq!(json[1]["destination"], 1);
        assert!(json[0]["edge"].is_null());

        let summary = rt.trace_summary(&reg);
        assert_eq!(summary.lines().count(), 2);
        assert!(summary.contains("action_kick (Kick)"));
    }
}
