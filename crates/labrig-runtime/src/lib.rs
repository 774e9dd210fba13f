//! Orchestrator backends for labrig.
//!
//! The core never talks to containerlab or docker directly; it holds a
//! boxed [`Orchestrator`] and hands it file paths and names. This crate
//! provides the containerlab-backed implementation, a recording mock for
//! tests and dry runs, and the process-spawning seam both share.

pub mod backend;
pub mod clab;
pub mod mock;
pub mod runner;

pub use backend::{
    select_backend, strip_container_prefix, ContainerRecord, ExecOutput, InspectReport,
    Orchestrator,
};
pub use clab::ContainerlabBackend;
pub use mock::MockBackend;
pub use runner::{CommandOutput, CommandRunner, HostRunner};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("orchestrator binary '{name}' not found on PATH")]
    OrchestratorNotFound { name: String },
    #[error("unknown backend '{0}'")]
    UnknownBackend(String),
    #[error("refusing to run an empty command")]
    EmptyCommand,
    #[error("command `{command}` failed with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("exec returned no result for node '{0}'")]
    EmptyExecReport(String),
    #[error("failed to decode orchestrator output: {0}")]
    Decode(#[from] serde_json::Error),
}
