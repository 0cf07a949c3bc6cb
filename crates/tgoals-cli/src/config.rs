//! Configuration vault – reads/writes `~/.tgoals/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tgoals_registry::RegistryConfig;

/// How the file at `automaton_path` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomatonFormat {
    /// Label-automaton text from a temporal-logic compiler.
    #[default]
    Label,
    /// Planner policy in DOT, actions on edge labels.
    Policy,
    /// Planner plan in DOT, actions on the `action` edge attribute.
    Plan,
}

impl std::fmt::Display for AutomatonFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutomatonFormat::Label => write!(f, "label"),
            AutomatonFormat::Policy => write!(f, "policy"),
            AutomatonFormat::Plan => write!(f, "plan"),
        }
    }
}

impl std::str::FromStr for AutomatonFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "label" | "mona" | "dfa" => Ok(AutomatonFormat::Label),
            "policy" => Ok(AutomatonFormat::Policy),
            "plan" => Ok(AutomatonFormat::Plan),
            other => Err(format!("unknown automaton format '{other}' (label / policy / plan)")),
        }
    }
}

/// Persisted user configuration stored in `~/.tgoals/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Skill sent to the robot when nothing else applies.
    #[serde(default = "default_idle_skill")]
    pub idle_skill: String,

    #[serde(default)]
    pub strict_dependencies: bool,

    /// Behavior file loaded at startup.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub behavior_path: String,

    /// Automaton loaded at startup.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub automaton_path: String,

    #[serde(default)]
    pub automaton_format: AutomatonFormat,

    /// Log every runtime transition at `info`.
    #[serde(default)]
    pub verbose: bool,
}

fn default_idle_skill() -> String {
    "Idle".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            idle_skill: default_idle_skill(),
            strict_dependencies: false,
            behavior_path: String::new(),
            automaton_path: String::new(),
            automaton_format: AutomatonFormat::default(),
            verbose: false,
        }
    }
}

impl Config {
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            idle_skill: self.idle_skill.clone(),
            strict_dependencies: self.strict_dependencies,
            ..RegistryConfig::default()
        }
    }
}

/// Return the path to `~/.tgoals/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".tgoals").join("config.toml")
}

/// Load the config from disk. Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TGOALS_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TGOALS_IDLE_SKILL` | `idle_skill` |
/// | `TGOALS_STRICT` | `strict_dependencies` |
/// | `TGOALS_BEHAVIOR` | `behavior_path` |
/// | `TGOALS_AUTOMATON` | `automaton_path` |
/// | `TGOALS_AUTOMATON_FORMAT` | `automaton_format` |
/// | `TGOALS_VERBOSE` | `verbose` |
///
/// Unparseable booleans and formats are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TGOALS_IDLE_SKILL") {
        cfg.idle_skill = v;
    }
    if let Ok(v) = std::env::var("TGOALS_STRICT")
        && let Ok(strict) = v.parse::<bool>()
    {
        cfg.strict_dependencies = strict;
    }
    if let Ok(v) = std::env::var("TGOALS_BEHAVIOR") {
        cfg.behavior_path = v;
    }
    if let Ok(v) = std::env::var("TGOALS_AUTOMATON") {
        cfg.automaton_path = v;
    }
    if let Ok(v) = std::env::var("TGOALS_AUTOMATON_FORMAT")
        && let Ok(format) = v.parse::<AutomatonFormat>()
    {
        cfg.automaton_format = format;
    }
    if let Ok(v) = std::env::var("TGOALS_VERBOSE")
        && let Ok(verbose) = v.parse::<bool>()
    {
        cfg.verbose = verbose;
    }
}

/// Save the config to disk, creating `~/.tgoals/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
