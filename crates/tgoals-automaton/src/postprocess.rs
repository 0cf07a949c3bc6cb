//! Structural clean-ups applied after construction.

use tracing::info;

use crate::model::GuardedAutomaton;

/// A clean-up step; returns whether it changed the automaton.
pub type Postprocess = fn(&mut GuardedAutomaton) -> bool;

/// Drop an initial node whose only way out is a single unconditional,
/// action-free edge, and start from its successor instead.
///
/// Automata with exactly one terminal-classified node are left alone, as
/// are initial nodes whose only edge loops back to themselves.
pub fn remove_dummy_initial_state(automaton: &mut GuardedAutomaton) -> bool {
    if automaton.terminal_count() == 1 {
        return false;
    }
    let initial = automaton.initial();
    let Some(node) = automaton.node(initial) else {
        return false;
    };
    let [edge_id] = node.outgoing() else {
        return false;
    };
    let Some(edge) = automaton.edge(*edge_id) else {
        return false;
    };
    if edge.to() == initial || !edge.is_unguarded() || edge.action().is_some() {
        return false;
    }
    let successor = edge.to();
    automaton.remove_node(initial);
    if automaton.set_initial(successor).is_err() {
        return false;
    }
    info!(removed = initial, initial = successor, "dummy initial state removed");
    true
}
