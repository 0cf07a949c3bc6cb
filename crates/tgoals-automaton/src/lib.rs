//! `tgoals-automaton` – guarded automata and the runtime that steps them.
//!
//! A [`GuardedAutomaton`][model::GuardedAutomaton] is built either from the
//! textual DFA dump of a temporal-logic compiler (a *label* automaton whose
//! edges are guarded by literals and actions) or from a planner digraph (a
//! *policy* whose nodes carry fluents and whose edges carry actions). The
//! [`AutomatonRuntime`][runtime::AutomatonRuntime] then picks, on every tick,
//! the action the robot should perform given the current state of the
//! [`Registries`][tgoals_registry::Registries].
//!
//! # Modules
//!
//! - [`guard`] – [`Guard`][guard::Guard]: one boolean condition on a literal,
//!   fluent or action.
//! - [`model`] – [`GuardedAutomaton`][model::GuardedAutomaton] and its nodes
//!   and edges.
//! - [`label`] – parsing label-automaton text.
//! - [`planner`] – [`PlannerDigraph`][planner::PlannerDigraph] and the
//!   policy/plan constructors.
//! - [`dot`] – reading planner digraphs from DOT files.
//! - [`postprocess`] – structural clean-ups such as
//!   [`remove_dummy_initial_state`][postprocess::remove_dummy_initial_state].
//! - [`runtime`] – [`AutomatonRuntime`][runtime::AutomatonRuntime] and its
//!   [`TraceEntry`][runtime::TraceEntry] history.
//!
//! # Example
//!
//! ```
//! use tgoals_automaton::{AutomatonRuntime, GuardedAutomaton};
//! use tgoals_registry::{Registries, RegistryConfig};
//! use tgoals_types::StoreKind;
//!
//! let mut reg = Registries::new(RegistryConfig::default());
//! reg.set(StoreKind::Literal, "near", true, None).unwrap();
//! reg.set(StoreKind::Action, "kick", "Kick", None).unwrap();
//!
//! let text = "DFA for formula with free variables: near kick\n\
//!             Initial state: 0\n\
//!             Accepting states: 1\n\
//!             Rejecting states: 0\n\
//!             State 0: 0X -> 0\n\
//!             State 0: 11 -> 1\n\
//!             State 1: XX -> 1\n";
//! let automaton = GuardedAutomaton::from_label_text(text, &reg).unwrap();
//! let mut runtime = AutomatonRuntime::new(automaton);
//!
//! let action = runtime.get_next_action(&reg, false).unwrap();
//! assert_eq!(action.skill(), "Kick");
//! assert_eq!(runtime.current_node(), 1);
//! ```

pub mod dot;
pub mod guard;
pub mod label;
pub mod model;
pub mod planner;
pub mod postprocess;
pub mod runtime;

pub use guard::{Guard, GuardTarget};
pub use model::{
    AutomatonEdge, AutomatonKind, AutomatonNode, EdgeId, GuardedAutomaton, NodeClass, NodeId,
};
pub use planner::{FluentAtom, PlannerDigraph, PlannerEdge, parse_node_label};
pub use postprocess::{Postprocess, remove_dummy_initial_state};
pub use runtime::{AutomatonRuntime, TraceEntry};
