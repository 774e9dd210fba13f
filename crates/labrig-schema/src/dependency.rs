//! Staged readiness dependencies between nodes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Readiness state another node must reach before a dependent node's
/// create stage may proceed. Serializes to the orchestrator's fixed
/// wire tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DependencyState {
    Create,
    CreateLinks,
    Configure,
    Healthy,
    Exit,
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Create => "create",
            Self::CreateLinks => "create-links",
            Self::Configure => "configure",
            Self::Healthy => "healthy",
            Self::Exit => "exit",
        };
        f.write_str(token)
    }
}

/// "Wait for `node` to reach `state`" declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagedDependency {
    pub node: String,
    pub state: DependencyState,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_serialize_to_wire_tokens() {
        for (state, token) in [
            (DependencyState::Create, "\"create\""),
            (DependencyState::CreateLinks, "\"create-links\""),
            (DependencyState::Configure, "\"configure\""),
            (DependencyState::Healthy, "\"healthy\""),
            (DependencyState::Exit, "\"exit\""),
        ] {
            assert_eq!(serde_json::to_string(&state).unwrap(), token);
        }
    }

    #[test]
    fn staged_dependency_round_trips_from_manifest_form() {
        let dep: StagedDependency =
            serde_json::from_value(serde_json::json!({"node": "db", "state": "healthy"})).unwrap();
        assert_eq!(dep.node, "db");
        assert_eq!(dep.state, DependencyState::Healthy);
    }

    #[test]
    fn unknown_state_token_is_rejected() {
        let result: Result<StagedDependency, _> =
            serde_json::from_value(serde_json::json!({"node": "db", "state": "ready"}));
        assert!(result.is_err());
    }
}
