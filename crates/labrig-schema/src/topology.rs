//! The compiled topology document consumed by the orchestrator.
//!
//! Field order and mapping iteration order are deterministic for a given
//! input; the reconfiguration check compares rendered documents as
//! strings, so the rendering must be byte-stable.

use crate::dependency::StagedDependency;
use crate::health::HealthCheck;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDoc {
    pub name: String,
    pub topology: TopologySection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySection {
    pub nodes: BTreeMap<String, NodeDescriptor>,
    pub links: Vec<LinkEntry>,
}

/// One virtual link between two `node:interface` endpoints. Reciprocal
/// declarations from both ends are kept as two entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub endpoints: [String; 2],
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<HealthCheck>,
    /// Omitted when equal to the default "bridge".
    #[serde(
        default,
        rename = "network-mode",
        skip_serializing_if = "Option::is_none"
    )]
    pub network_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stages: Option<Stages>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub binds: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stages {
    pub create: CreateStage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStage {
    #[serde(rename = "wait-for")]
    pub wait_for: Vec<StagedDependency>,
}

impl TopologyDoc {
    /// Stable pretty rendering used both for the persisted file and for
    /// staleness comparison.
    pub fn render(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
