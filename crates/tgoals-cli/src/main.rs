//! `tgoals` – interactive shell for temporal-goal robot behaviors.
//!
//! The binary:
//!
//! 1. Loads `~/.tgoals/config.toml`, writing a default one on first run.
//! 2. Initialises tracing (compact or JSON, optionally exported over OTLP).
//! 3. Applies the configured behavior file and loads the configured
//!    automaton, if any.
//! 4. Drops the user into a REPL that stands in for the robot: set facts,
//!    tick the runtime, complete actions.
//! 5. Intercepts Ctrl-C and exits after the current command.

mod behavior;
mod config;
mod repl;
mod telemetry;

use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

fn main() {
    let (cfg, first_run) = match config::load() {
        Ok(Some(cfg)) => (cfg, false),
        Ok(None) => {
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            (cfg, true)
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            (config::Config::default(), false)
        }
    };

    let _telemetry = telemetry::init_tracing("tgoals", cfg.verbose);

    print_banner();

    if first_run {
        match config::save(&config::Config::default()) {
            Ok(()) => println!(
                "  {} Default config written to {}",
                "✓".green().bold(),
                config::config_path().display().to_string().bold()
            ),
            Err(e) => println!("{}: {}", "Error saving config".red(), e),
        }
    } else {
        println!(
            "  Config loaded from {}",
            config::config_path().display().to_string().bold()
        );
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – exiting after the current command …".yellow().bold());
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    let mut session = repl::Session::new(&cfg);

    if !cfg.behavior_path.is_empty() {
        print!("  Applying behavior {} … ", cfg.behavior_path.dimmed());
        match session.load_behavior(Path::new(&cfg.behavior_path)) {
            Ok(applied) => println!("{} ({applied} entries)", "OK".green()),
            Err(e) => println!("{}: {}", "FAILED".red(), e),
        }
    }

    if !cfg.automaton_path.is_empty() {
        print!(
            "  Loading {} automaton {} … ",
            cfg.automaton_format,
            cfg.automaton_path.dimmed()
        );
        match session.load_automaton(cfg.automaton_format, Path::new(&cfg.automaton_path)) {
            Ok(summary) => {
                println!("{}", "OK".green());
                println!("  {summary}");
            }
            Err(e) => println!("{}: {}", "FAILED".red(), e),
        }
    }

    info!(verbose = cfg.verbose, strict = cfg.strict_dependencies, "tgoals started");

    println!();
    println!("  Type {} for a list of commands.\n", "/help".bold().cyan());

    repl::run(session, shutdown);
}

fn print_banner() {
    println!();
    println!("  {} {}",
        "tgoals".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Temporal-goal behavior runtime");
    println!();
}
