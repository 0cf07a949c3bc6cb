//! Label-automaton text reader.
//!
//! The input is the textual DFA dump of a temporal-logic compiler:
//!
//! ```text
//! DFA for formula with free variables: near kick
//! Initial state: 0
//! Accepting states: 1
//! Rejecting states: 0
//! Automaton has 2 states and 3 BDD-nodes
//! Transitions:
//! State 0: 0X -> 0
//! State 0: 11 -> 1
//! State 1: XX -> 1
//! ```
//!
//! Character *i* of a transition's ternary string constrains free variable
//! *i*: `1` must be true, `0` must be false, `X` is unconstrained. Every free
//! variable must name exactly one literal or action item.

use tgoals_registry::Registries;
use tgoals_types::{GoalError, StoreKind};
use tracing::debug;

use crate::guard::{Guard, GuardTarget};
use crate::model::{AutomatonKind, GuardedAutomaton, NodeClass, NodeId};

const FREE_VARIABLES: &str = "DFA for formula with free variables:";
const INITIAL_STATE: &str = "Initial state:";
const ACCEPTING_STATES: &str = "Accepting states:";
const REJECTING_STATES: &str = "Rejecting states:";
const TRANSITION: &str = "State ";

#[derive(Debug, Default)]
struct Header {
    variables: Vec<String>,
    initial: Option<NodeId>,
    accepting: Vec<NodeId>,
    rejecting: Vec<NodeId>,
}

impl Header {
    fn parse(text: &str) -> Result<Self, GoalError> {
        let mut header = Header::default();
        for line in text.lines().map(str::trim) {
            if let Some(rest) = line.strip_prefix(FREE_VARIABLES) {
                header.variables = rest.split_whitespace().map(str::to_string).collect();
            } else if let Some(rest) = line.strip_prefix(INITIAL_STATE) {
                let ids = parse_ids(rest)?;
                header.initial = Some(*ids.first().ok_or_else(|| {
                    GoalError::MalformedAutomaton("empty initial state line".to_string())
                })?);
            } else if let Some(rest) = line.strip_prefix(ACCEPTING_STATES) {
                header.accepting = parse_ids(rest)?;
            } else if let Some(rest) = line.strip_prefix(REJECTING_STATES) {
                header.rejecting = parse_ids(rest)?;
            }
        }
        Ok(header)
    }
}

fn parse_id(raw: &str) -> Result<NodeId, GoalError> {
    raw.trim()
        .trim_end_matches(',')
        .parse()
        .map_err(|_| GoalError::MalformedAutomaton(format!("invalid state id '{raw}'")))
}

fn parse_ids(raw: &str) -> Result<Vec<NodeId>, GoalError> {
    raw.split_whitespace().map(parse_id).collect()
}

#[derive(Debug, PartialEq)]
struct Transition<'a> {
    from: NodeId,
    ternary: &'a str,
    to: NodeId,
}

/// Parse the part of a transition line after `State `:
/// `<id>[,]: <ternary> -> <id>`.
fn parse_transition(rest: &str) -> Result<Transition<'_>, GoalError> {
    let malformed = || GoalError::MalformedAutomaton(format!("invalid transition 'State {rest}'"));
    let (lhs, to) = rest.split_once("->").ok_or_else(malformed)?;
    let (from, ternary) = lhs.split_once(':').ok_or_else(malformed)?;
    Ok(Transition {
        from: parse_id(from)?,
        ternary: ternary.trim(),
        to: parse_id(to)?,
    })
}

/// Canonical name and store of a free variable.
fn classify(variable: &str, registries: &Registries) -> Result<(String, GuardTarget), GoalError> {
    let literal = registries.store(StoreKind::Literal).resolve_name(variable);
    let action = registries.store(StoreKind::Action).resolve_name(variable);
    match (literal, action) {
        (Some(name), None) => Ok((name, GuardTarget::Literal)),
        (None, Some(name)) => Ok((name, GuardTarget::Action)),
        (Some(_), Some(_)) => Err(GoalError::AmbiguousParameter {
            name: variable.to_string(),
            stores: vec![StoreKind::Literal, StoreKind::Action],
        }),
        (None, None) => Err(GoalError::MalformedAutomaton(format!(
            "free variable '{variable}' is neither a registered literal nor an action"
        ))),
    }
}

impl GuardedAutomaton {
    /// Build a label automaton from its textual dump, resolving every free
    /// variable against `registries` now.
    pub fn from_label_text(text: &str, registries: &Registries) -> Result<Self, GoalError> {
        let header = Header::parse(text)?;
        let initial = header
            .initial
            .ok_or_else(|| GoalError::MalformedAutomaton("missing initial state".to_string()))?;
        let variables = header
            .variables
            .iter()
            .map(|v| classify(v, registries))
            .collect::<Result<Vec<_>, _>>()?;

        let mut automaton = GuardedAutomaton::new(AutomatonKind::Label, initial);
        for id in &header.accepting {
            automaton.add_node(*id, NodeClass::Accepting);
        }
        for id in &header.rejecting {
            if header.accepting.contains(id) {
                return Err(GoalError::MalformedAutomaton(format!(
                    "state {id} is both accepting and rejecting"
                )));
            }
            automaton.add_node(*id, NodeClass::Rejecting);
        }

        for rest in text.lines().filter_map(|l| l.trim().strip_prefix(TRANSITION)) {
            let transition = parse_transition(rest)?;
            if transition.ternary.chars().count() != variables.len() {
                return Err(GoalError::MalformedAutomaton(format!(
                    "transition 'State {rest}' constrains {} variables, expected {}",
                    transition.ternary.chars().count(),
                    variables.len()
                )));
            }
            let mut guards = Vec::new();
            for (symbol, (name, target)) in transition.ternary.chars().zip(&variables) {
                let expected = match symbol {
                    'X' => continue,
                    '1' => true,
                    '0' => false,
                    other => {
                        return Err(GoalError::MalformedAutomaton(format!(
                            "invalid guard symbol '{other}' in 'State {rest}'"
                        )));
                    }
                };
                guards.push(Guard::new(name.clone(), expected, *target));
            }
            automaton.add_edge(transition.from, transition.to, guards, None)?;
        }

        debug!(
            nodes = automaton.node_count(),
            edges = automaton.edge_count(),
            initial,
            "label automaton parsed"
        );
        Ok(automaton)
    }
}
