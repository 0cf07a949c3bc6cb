use serde::{Deserialize, Serialize};

use crate::action::ActionParam;

/// Construction-time settings for [`Registries`](crate::Registries).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Skill sent to the robot when no action qualifies.
    pub idle_skill: String,
    pub idle_skill_parameters: Vec<ActionParam>,
    /// Reject computed items whose parameters are not registered yet instead
    /// of queueing them.
    pub strict_dependencies: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            idle_skill: "Idle".to_string(),
            idle_skill_parameters: Vec::new(),
            strict_dependencies: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: RegistryConfig = serde_json::from_str(r#"{"strict_dependencies": true}"#).unwrap();
        assert_eq!(cfg.idle_skill, "Idle");
        assert!(cfg.strict_dependencies);
        assert!(cfg.idle_skill_parameters.is_empty());
    }
}
