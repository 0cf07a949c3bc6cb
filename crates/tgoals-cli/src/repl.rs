//! REPL – drive the stores and the automaton runtime by hand.
//!
//! Supported slash-commands:
//!   /help                              – show this list
//!   /set <store> <name> <value>        – write a value, literal, fluent or action
//!   /get <name>                        – read any item by name
//!   /list [store]                      – list items with their current values
//!   /behavior <path>                   – apply a behavior file
//!   /load <label|policy|plan> <path>   – load an automaton
//!   /tick [n]                          – ask the runtime for the next action
//!   /complete [action]                 – mark an action (default: current) as done
//!   /trace [json]                      – print the runtime trace
//!   /reset                             – rewind the runtime to its initial node
//!   /status                            – automaton and runtime summary
//!   /quit | /exit                      – leave

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tgoals_automaton::{
    AutomatonKind, AutomatonRuntime, GuardedAutomaton, PlannerDigraph, remove_dummy_initial_state,
};
use tgoals_registry::Registries;
use tgoals_types::{GoalError, ParamValue, StoreKind};
use tracing::debug;

use crate::behavior::Behavior;
use crate::config::{AutomatonFormat, Config};

/// What the loop should do after a command.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Registries plus the runtime loaded into them.
pub struct Session {
    registries: Registries,
    runtime: Option<AutomatonRuntime>,
    verbose: bool,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            registries: Registries::new(config.registry_config()),
            runtime: None,
            verbose: config.verbose,
        }
    }

    pub fn registries(&self) -> &Registries {
        &self.registries
    }

    pub fn runtime(&self) -> Option<&AutomatonRuntime> {
        self.runtime.as_ref()
    }

    pub fn load_behavior(&mut self, path: &Path) -> Result<usize, String> {
        let behavior = Behavior::load(path)?;
        behavior.apply(&mut self.registries).map_err(|e| e.to_string())
    }

    pub fn load_automaton(&mut self, format: AutomatonFormat, path: &Path) -> Result<String, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read automaton at {}: {}", path.display(), e))?;
        self.load_automaton_text(format, &text).map_err(|e| e.to_string())
    }

    /// Build an automaton from `text` and replace the current runtime.
    pub fn load_automaton_text(&mut self, format: AutomatonFormat, text: &str) -> Result<String, GoalError> {
        let automaton = match format {
            AutomatonFormat::Label => GuardedAutomaton::from_label_text(text, &self.registries)?,
            AutomatonFormat::Policy => {
                GuardedAutomaton::from_policy_digraph(&PlannerDigraph::from_dot(text)?, &mut self.registries)?
            }
            AutomatonFormat::Plan => {
                GuardedAutomaton::from_plan_digraph(&PlannerDigraph::from_dot(text)?, &mut self.registries)?
            }
        };
        let runtime = AutomatonRuntime::with_postprocessing(automaton, &[remove_dummy_initial_state]);
        let summary = format!(
            "{format} automaton with {} nodes and {} edges, starting at node {}",
            runtime.automaton().node_count(),
            runtime.automaton().edge_count(),
            runtime.current_node()
        );
        self.runtime = Some(runtime);
        Ok(summary)
    }

    /// Run one REPL line.
    pub fn execute(&mut self, line: &str) -> Result<Reply, GoalError> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(Reply::Text(String::new()));
        };
        let args: Vec<&str> = words.collect();
        debug!(command, ?args, "repl command");

        match command {
            "/help" => Ok(Reply::Text(help())),
            "/set" => self.cmd_set(&args),
            "/get" => self.cmd_get(&args),
            "/list" => self.cmd_list(&args),
            "/behavior" => {
                let [path] = args.as_slice() else {
                    return Err(usage("/behavior <path>"));
                };
                let applied = self.load_behavior(Path::new(path)).map_err(GoalError::InvalidValue)?;
                Ok(Reply::Text(format!("{} {applied} entries applied", "✓".green())))
            }
            "/load" => {
                let [format, path] = args.as_slice() else {
                    return Err(usage("/load <label|policy|plan> <path>"));
                };
                let format = format.parse::<AutomatonFormat>().map_err(GoalError::InvalidValue)?;
                let summary = self
                    .load_automaton(format, Path::new(path))
                    .map_err(GoalError::InvalidValue)?;
                Ok(Reply::Text(format!("{} loaded {summary}", "✓".green())))
            }
            "/tick" => self.cmd_tick(&args),
            "/complete" => self.cmd_complete(&args),
            "/trace" => {
                let runtime = self.runtime.as_ref().ok_or_else(no_automaton)?;
                match args.as_slice() {
                    [] => Ok(Reply::Text(runtime.trace_summary(&self.registries))),
                    ["json"] => serde_json::to_string_pretty(runtime.trace())
                        .map(Reply::Text)
                        .map_err(|e| GoalError::InvalidValue(format!("trace serialization failed: {e}"))),
                    _ => Err(usage("/trace [json]")),
                }
            }
            "/reset" => {
                let runtime = self.runtime.as_mut().ok_or_else(no_automaton)?;
                runtime.reset();
                Ok(Reply::Text(format!(
                    "{} runtime back at node {}",
                    "✓".green(),
                    runtime.current_node()
                )))
            }
            "/status" => Ok(Reply::Text(self.status())),
            "/quit" | "/exit" => Ok(Reply::Quit),
            other => Ok(Reply::Text(format!(
                "{} '{}'. Type {} for available commands.",
                "Unknown command:".red(),
                other.yellow(),
                "/help".bold()
            ))),
        }
    }

    // ────────────────────────────────────────────────────────────────────────
    // Command handlers
    // ────────────────────────────────────────────────────────────────────────

    fn cmd_set(&mut self, args: &[&str]) -> Result<Reply, GoalError> {
        let [store, name, value @ ..] = args else {
            return Err(usage("/set <store> <name> <value>"));
        };
        if value.is_empty() {
            return Err(usage("/set <store> <name> <value>"));
        }
        let kind = store.parse::<StoreKind>()?;
        let value = parse_value(&value.join(" "))?;
        let canonical = self.registries.set(kind, name, value.clone(), None)?;
        Ok(Reply::Text(format!("{} {canonical} = {value}", "✓".green())))
    }

    fn cmd_get(&self, args: &[&str]) -> Result<Reply, GoalError> {
        let [name] = args else {
            return Err(usage("/get <name>"));
        };
        let (kind, canonical) = self.registries.resolve(name)?;
        let value = self.registries.value_of(name)?;
        Ok(Reply::Text(format!(
            "{canonical} = {} ({kind}, {})",
            value.to_string().bold(),
            value.type_name()
        )))
    }

    fn cmd_list(&self, args: &[&str]) -> Result<Reply, GoalError> {
        let kinds = match args {
            [] => StoreKind::ALL.to_vec(),
            [store] => vec![store.parse::<StoreKind>()?],
            _ => return Err(usage("/list [store]")),
        };
        let mut out = String::new();
        for kind in kinds {
            let store = self.registries.store(kind);
            out.push_str(&format!("{} ({})\n", kind.to_string().bold().underline(), store.len()));
            for name in store.names() {
                let value = match self.registries.value_of(name) {
                    Ok(value) => value.to_string(),
                    Err(e) => format!("<{e}>").dimmed().to_string(),
                };
                let pending = if self.registries.is_pending(kind, name) {
                    " (pending)".yellow().to_string()
                } else {
                    String::new()
                };
                out.push_str(&format!("  {name} = {value}{pending}\n"));
            }
        }
        Ok(Reply::Text(out))
    }

    fn cmd_tick(&mut self, args: &[&str]) -> Result<Reply, GoalError> {
        let count = match args {
            [] => 1,
            [n] => n
                .parse::<usize>()
                .map_err(|_| GoalError::InvalidValue(format!("'{n}' is not a tick count")))?,
            _ => return Err(usage("/tick [n]")),
        };
        let runtime = self.runtime.as_mut().ok_or_else(no_automaton)?;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let action = runtime.get_next_action(&self.registries, self.verbose)?;
            let parameters = action.render_parameters(&self.registries)?;
            out.push(format!(
                "node {} → {} ({}){}",
                runtime.current_node(),
                action.name().bold(),
                action.skill().cyan(),
                if parameters.is_empty() {
                    String::new()
                } else {
                    format!(" {parameters}")
                }
            ));
        }
        Ok(Reply::Text(out.join("\n")))
    }

    fn cmd_complete(&mut self, args: &[&str]) -> Result<Reply, GoalError> {
        let name = match args {
            [] => self
                .runtime
                .as_ref()
                .ok_or_else(no_automaton)?
                .current_action_name()
                .to_string(),
            [name] => self.registries.store(StoreKind::Action).resolve_name(name).unwrap_or_else(|| name.to_string()),
            _ => return Err(usage("/complete [action]")),
        };
        self.registries.signal_action_completed(&name)?;
        Ok(Reply::Text(format!("{} {name} completed", "✓".green())))
    }

    fn status(&self) -> String {
        let mut out = format!(
            "stores: {} values, {} literals, {} fluents, {} actions\n",
            self.registries.store(StoreKind::Value).len(),
            self.registries.store(StoreKind::Literal).len(),
            self.registries.store(StoreKind::Fluent).len(),
            self.registries.actions().len()
        );
        match &self.runtime {
            None => out.push_str(&format!("automaton: {}\n", "none loaded".yellow())),
            Some(runtime) => {
                let automaton = runtime.automaton();
                let kind = match automaton.kind() {
                    AutomatonKind::Label => "label",
                    AutomatonKind::Policy { is_plan: true } => "plan",
                    AutomatonKind::Policy { is_plan: false } => "policy",
                };
                out.push_str(&format!(
                    "automaton: {kind}, {} nodes, {} edges, initial {}\n",
                    automaton.node_count(),
                    automaton.edge_count(),
                    automaton.initial()
                ));
                out.push_str(&format!(
                    "runtime: node {}, action {}, {} transitions\n",
                    runtime.current_node(),
                    runtime.current_action_name().bold(),
                    runtime.trace().len() - 1
                ));
                if let Some(at) = runtime.last_transition_timestamp() {
                    out.push_str(&format!("last transition: {}\n", at.format("%Y-%m-%d %H:%M:%S%.3f")));
                }
            }
        }
        out
    }
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(mut session: Session, shutdown: Arc<AtomicBool>) {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        print!("{} ", "tgoals>".bold().cyan());
        stdout.flush().ok();

        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }

        match session.execute(line.trim()) {
            Ok(Reply::Text(text)) if text.is_empty() => {}
            Ok(Reply::Text(text)) => println!("{}", text.trim_end()),
            Ok(Reply::Quit) => {
                println!("{}", "Goodbye.".green());
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(e) => println!("{}: {}", "Error".red(), e),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn help() -> String {
    let rows = [
        ("/set <store> <name> <value>", "write a value, literal, fluent or action skill"),
        ("/get <name>", "read any item by name"),
        ("/list [store]", "list items with their current values"),
        ("/behavior <path>", "apply a behavior file"),
        ("/load <label|policy|plan> <path>", "load an automaton"),
        ("/tick [n]", "ask the runtime for the next action"),
        ("/complete [action]", "mark an action as completed"),
        ("/trace [json]", "print the runtime trace"),
        ("/reset", "rewind the runtime"),
        ("/status", "automaton and runtime summary"),
        ("/quit  /exit", "exit the CLI"),
    ];
    let mut out = format!("{}\n", "tgoals Commands".bold().underline());
    for (command, what) in rows {
        out.push_str(&format!("  {:<34} – {what}\n", command.bold().cyan()));
    }
    out
}

/// Scalars parse loosely; comma-separated scalars form a tuple.
fn parse_value(raw: &str) -> Result<ParamValue, GoalError> {
    let raw = raw.trim().trim_start_matches('(').trim_end_matches(')');
    if raw.contains(',') {
        ParamValue::tuple(raw.split(',').map(ParamValue::parse_loose).collect())
    } else {
        Ok(ParamValue::parse_loose(raw))
    }
}

fn usage(text: &str) -> GoalError {
    GoalError::InvalidValue(format!("usage: {text}"))
}

fn no_automaton() -> GoalError {
    GoalError::InvalidValue("no automaton loaded, try /load".to_string())
}
