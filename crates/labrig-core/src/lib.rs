//! Lab lifecycle engine for labrig.
//!
//! This crate turns a loaded lab definition into a concrete layer tree
//! (lab, services, nodes), compiles the tree into the topology document
//! the orchestrator consumes, decides whether a running deployment is
//! stale, and drives the whole lifecycle through an injected
//! orchestrator backend.

pub mod compile;
pub mod engine;
pub mod layer;
pub mod reconfigure;

pub use compile::compile_topology;
pub use engine::{Engine, StatusReport};
pub use layer::{Lab, Node, NodeConfig, Service, ServiceConfig, Signal};
pub use reconfigure::needs_reconfigure;

use labrig_runtime::RuntimeError;
use labrig_schema::{BindError, ManifestError, ResolveError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Bind(#[from] BindError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("failed to encode topology document: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("node '{node}': {detail}")]
    MutuallyExclusiveConfig { node: String, detail: String },
    #[error("node '{node}': malformed '{field}': {detail}")]
    MalformedField {
        node: String,
        field: String,
        detail: String,
    },
    #[error("node '{node}': no value for placeholder '{{{key}}}'")]
    UnknownPlaceholder { node: String, key: String },
    #[error("duplicate node name '{0}' across services")]
    DuplicateNode(String),
}
