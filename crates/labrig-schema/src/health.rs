//! Health check specification, encoded for the orchestrator to execute.
//!
//! The core never runs health checks itself; fields left unset in a
//! definition are omitted from the emitted document rather than being
//! defaulted to zero.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<Vec<String>>,
    #[serde(
        default,
        rename = "start-period",
        alias = "start_period",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_period: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl HealthCheck {
    pub fn is_empty(&self) -> bool {
        self.test.is_none()
            && self.start_period.is_none()
            && self.retries.is_none()
            && self.interval.is_none()
            && self.timeout.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_fields_are_omitted() {
        let check = HealthCheck {
            test: Some(vec!["CMD".to_owned(), "true".to_owned()]),
            interval: Some(10),
            ..HealthCheck::default()
        };
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json, serde_json::json!({"test": ["CMD", "true"], "interval": 10}));
    }

    #[test]
    fn accepts_snake_case_start_period_from_manifests() {
        let check: HealthCheck =
            serde_json::from_value(serde_json::json!({"start_period": 30})).unwrap();
        assert_eq!(check.start_period, Some(30));
        // but serializes in the orchestrator's kebab form
        let json = serde_json::to_value(&check).unwrap();
        assert_eq!(json, serde_json::json!({"start-period": 30}));
    }

    #[test]
    fn default_is_empty() {
        assert!(HealthCheck::default().is_empty());
    }
}
